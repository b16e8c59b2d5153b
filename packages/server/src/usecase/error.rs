//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::ValueObjectError;

/// ログイン失敗
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// ルーム作成失敗
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreateRoomError {
    #[error("invalid room id: {0}")]
    InvalidRoomId(ValueObjectError),

    #[error("hub is not running")]
    HubUnavailable,
}

/// ルーム参加（WebSocket 接続）失敗
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// トークンが無い、無効、使用済み、または期限切れ
    #[error("missing, invalid or expired one-time token")]
    Unauthorized,

    #[error("invalid user id: {0}")]
    InvalidClientId(ValueObjectError),

    #[error("invalid room id: {0}")]
    InvalidRoomId(ValueObjectError),

    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("client '{0}' is already connected to this room")]
    DuplicateClientId(String),

    #[error("hub is not running")]
    HubUnavailable,
}

/// ルーム参照失敗
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomQueryError {
    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("hub is not running")]
    HubUnavailable,
}
