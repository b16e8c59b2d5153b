//! Test fixtures: a real server on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;

use clap::Parser;
use futures_util::StreamExt;
use hubchat_server::ServerConfig;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start with the default test login table (`alice:secret`, `bob:secret`)
    pub async fn start() -> Self {
        Self::start_with_args(&[]).await
    }

    pub async fn start_with_args(extra: &[&str]) -> Self {
        let mut args = vec!["hubchat-server", "--users", "alice:secret,bob:secret"];
        args.extend_from_slice(extra);
        let config = ServerConfig::parse_from(args);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            hubchat_server::ui::serve(listener, config, shutdown)
                .await
                .expect("Server failed");
        });

        Self {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, room_id: &str, otp: &str, user_id: &str) -> String {
        format!(
            "ws://{}/ws/rooms/{}?otp={}&user_id={}",
            self.addr, room_id, otp, user_id
        )
    }

    /// Log in over HTTP and return the one-time token key
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = reqwest::Client::new()
            .post(format!("{}/api/login", self.base_url()))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await
            .expect("Failed to send login request");
        assert_eq!(response.status(), 200, "login should succeed");
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        body["key"].as_str().expect("key should be a string").to_string()
    }

    /// Log in and open a WebSocket to `room_id`
    pub async fn connect(&self, user: &str, room_id: &str) -> WsClient {
        let otp = self.login(user, "secret").await;
        let (ws, _response) = tokio_tungstenite::connect_async(self.ws_url(room_id, &otp, user))
            .await
            .expect("Failed to connect WebSocket");
        ws
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Next text frame as JSON, skipping control frames. Panics after 5 seconds.
pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    let deadline = tokio::time::Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).expect("Server sent invalid JSON");
                }
                Some(Ok(_)) => continue,
                other => panic!("WebSocket ended while waiting for a message: {other:?}"),
            }
        }
    })
    .await
    .expect("Timed out waiting for a message")
}
