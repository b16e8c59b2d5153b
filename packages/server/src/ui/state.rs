//! Shared application state.

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::ConnectionSettings,
    hub::HubHandle,
    infrastructure::credential::CredentialStore,
    usecase::{CreateRoomUseCase, JoinRoomUseCase, LoginUseCase, QueryRoomsUseCase},
};

/// Shared application state
pub struct AppState {
    /// Hub（ルームテーブルを所有する唯一のタスク）への窓口
    pub hub: HubHandle,
    /// ワンタイムトークンの保管庫
    pub credentials: Arc<CredentialStore>,
    /// username -> password
    pub users: Arc<HashMap<String, String>>,
    pub connection: ConnectionSettings,
    pub auto_create_rooms: bool,
}

impl AppState {
    pub fn login_usecase(&self) -> LoginUseCase {
        LoginUseCase::new(self.users.clone(), self.credentials.clone())
    }

    pub fn create_room_usecase(&self) -> CreateRoomUseCase {
        CreateRoomUseCase::new(self.hub.clone())
    }

    pub fn query_rooms_usecase(&self) -> QueryRoomsUseCase {
        QueryRoomsUseCase::new(self.hub.clone())
    }

    pub fn join_room_usecase(&self) -> JoinRoomUseCase {
        JoinRoomUseCase::new(
            self.credentials.clone(),
            self.hub.clone(),
            self.connection,
            self.auto_create_rooms,
        )
    }
}
