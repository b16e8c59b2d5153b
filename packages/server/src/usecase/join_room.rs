//! UseCase: ルーム参加
//!
//! WebSocket へのアップグレード前に呼び出されます。
//! ワンタイムトークンを検証し、クライアントを作成して Hub に登録します。
//! 登録が完了した時点で、クライアントはルームのメンバーになっています。

use std::sync::Arc;

use crate::{
    config::ConnectionSettings,
    connection::{Client, OutboundReceiver},
    domain::{ClientId, RoomId},
    hub::{HubError, HubHandle},
    infrastructure::credential::CredentialStore,
};

use super::error::JoinError;

/// ルーム参加要求
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_id: String,
    pub otp: Option<String>,
    pub user_id: String,
    pub username: Option<String>,
}

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    credentials: Arc<CredentialStore>,
    hub: HubHandle,
    settings: ConnectionSettings,
    auto_create_rooms: bool,
}

impl JoinRoomUseCase {
    pub fn new(
        credentials: Arc<CredentialStore>,
        hub: HubHandle,
        settings: ConnectionSettings,
        auto_create_rooms: bool,
    ) -> Self {
        Self {
            credentials,
            hub,
            settings,
            auto_create_rooms,
        }
    }

    /// ルーム参加を実行
    ///
    /// ID の検証はトークン消費より先に行います。不正な ID の要求でトークンが
    /// 失われることはありません。
    ///
    /// # Returns
    ///
    /// * `Ok((Arc<Client>, OutboundReceiver))` - 登録済みクライアントと送信キュー
    /// * `Err(JoinError)` - 参加失敗
    pub async fn execute(&self, request: JoinRequest) -> Result<(Arc<Client>, OutboundReceiver), JoinError> {
        let otp = request
            .otp
            .filter(|otp| !otp.is_empty())
            .ok_or(JoinError::Unauthorized)?;
        let client_id = ClientId::new(request.user_id).map_err(JoinError::InvalidClientId)?;
        let room_id = RoomId::new(request.room_id).map_err(JoinError::InvalidRoomId)?;

        if !self.credentials.verify(&otp).await {
            tracing::warn!(client_id = %client_id, room_id = %room_id, "Rejected join with invalid token");
            return Err(JoinError::Unauthorized);
        }

        if self.auto_create_rooms {
            self.hub
                .create_room(room_id.clone(), room_id.as_str().to_string())
                .await
                .map_err(|_| JoinError::HubUnavailable)?;
        }

        let username = request
            .username
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| client_id.as_str().to_string());
        let (client, outbound) = Client::new(
            client_id.clone(),
            username,
            self.settings.outbound_queue_capacity,
        );

        self.hub
            .register(client.clone(), room_id.clone())
            .await
            .map_err(|e| match e {
                HubError::RoomNotFound(id) => JoinError::RoomNotFound(id.into_string()),
                HubError::DuplicateMember(id) => JoinError::DuplicateClientId(id.into_string()),
                HubError::Closed | HubError::ClientClosed => JoinError::HubUnavailable,
            })?;

        tracing::info!(client_id = %client_id, room_id = %room_id, "Client joined room");
        Ok((client, outbound))
    }
}
