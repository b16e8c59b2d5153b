//! UseCase: ルーム作成
//!
//! ルームテーブルは Hub だけが変更します。このユースケースは作成要求を
//! Hub に送り、その結果を返すだけです。

use crate::{
    domain::{RoomId, RoomSnapshot},
    hub::HubHandle,
};

use super::error::CreateRoomError;

/// ルーム作成のユースケース
pub struct CreateRoomUseCase {
    hub: HubHandle,
}

impl CreateRoomUseCase {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    /// ルーム作成を実行
    ///
    /// 同じ ID のルームが既に存在する場合は、既存のルームをそのまま返します。
    pub async fn execute(&self, id: String, name: String) -> Result<RoomSnapshot, CreateRoomError> {
        let room_id = RoomId::new(id).map_err(CreateRoomError::InvalidRoomId)?;
        self.hub
            .create_room(room_id, name)
            .await
            .map_err(|_| CreateRoomError::HubUnavailable)
    }
}
