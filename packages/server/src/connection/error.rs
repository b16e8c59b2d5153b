//! Connection-local errors. None of these ever leave the owning connection.

use std::{error::Error as StdError, io};

use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, error::ProtocolError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Send or receive failed on the transport
    #[error("transport error: {0}")]
    Transport(String),

    /// Oversized, malformed or unsupported frame
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// No liveness acknowledgment within the pong wait
    #[error("read deadline exceeded")]
    ReadTimeout,

    /// Peer closed the connection (close frame, going away, or stream end)
    #[error("peer closed the connection")]
    PeerClosed,

    /// Our own cleanup closed the transport
    #[error("connection closed locally")]
    Closed,
}

impl ConnectionError {
    /// Ordinary shutdowns end a loop silently instead of being reported
    pub fn is_ordinary_shutdown(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::Closed)
    }

    /// Classify a receive error from the transport.
    ///
    /// A reset, an abort or a close without handshake anywhere in the source
    /// chain means the peer went away (abnormal closure) and maps to
    /// [`PeerClosed`](Self::PeerClosed). Anything else is a transport failure.
    pub fn from_transport(error: &(dyn StdError + 'static)) -> Self {
        let mut current = Some(error);
        while let Some(err) = current {
            if let Some(ws) = err.downcast_ref::<tungstenite::Error>()
                && matches!(
                    ws,
                    tungstenite::Error::ConnectionClosed
                        | tungstenite::Error::AlreadyClosed
                        | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
                )
            {
                return Self::PeerClosed;
            }
            if let Some(io) = err.downcast_ref::<io::Error>()
                && matches!(
                    io.kind(),
                    io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::BrokenPipe
                        | io::ErrorKind::UnexpectedEof
                )
            {
                return Self::PeerClosed;
            }
            current = err.source();
        }
        Self::Transport(error.to_string())
    }
}
