//! UseCase: ルーム参照

use crate::{
    domain::{RoomId, RoomSnapshot},
    hub::HubHandle,
};

use super::error::RoomQueryError;

/// ルーム一覧・詳細取得のユースケース
pub struct QueryRoomsUseCase {
    hub: HubHandle,
}

impl QueryRoomsUseCase {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    /// 全ルーム（ID 順）
    pub async fn list(&self) -> Result<Vec<RoomSnapshot>, RoomQueryError> {
        self.hub
            .list_rooms()
            .await
            .map_err(|_| RoomQueryError::HubUnavailable)
    }

    /// ID でルームを取得
    pub async fn get(&self, id: String) -> Result<RoomSnapshot, RoomQueryError> {
        // 不正な ID のルームは存在し得ない
        let room_id = RoomId::new(id.clone()).map_err(|_| RoomQueryError::RoomNotFound(id.clone()))?;
        self.hub
            .room_snapshot(room_id)
            .await
            .map_err(|_| RoomQueryError::HubUnavailable)?
            .ok_or(RoomQueryError::RoomNotFound(id))
    }
}
