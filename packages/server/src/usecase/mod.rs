//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層と Hub を操作します。

pub mod create_room;
pub mod error;
pub mod join_room;
pub mod login;
pub mod query_rooms;

pub use create_room::CreateRoomUseCase;
pub use error::{CreateRoomError, JoinError, LoginError, RoomQueryError};
pub use join_room::{JoinRequest, JoinRoomUseCase};
pub use login::LoginUseCase;
pub use query_rooms::QueryRoomsUseCase;
