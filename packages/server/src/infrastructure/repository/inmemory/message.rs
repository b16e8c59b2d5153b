//! InMemory Message Repository 実装
//!
//! ドメイン層が定義する MessageRepository trait の具体的な実装。
//! ルームごとに挿入順の Vec を保持します。
//!
//! プロセス終了とともに履歴は失われます。永続化が必要になった場合は
//! 同じ trait を実装する DB 版を追加してください。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Message, MessageRepository, RepositoryError, RoomId};

/// インメモリ Message Repository 実装
#[derive(Default)]
pub struct InMemoryMessageRepository {
    /// room_id -> 挿入順のメッセージ
    messages: Mutex<HashMap<RoomId, Vec<Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全ルームの保存済みメッセージ数
    pub async fn count(&self) -> usize {
        let messages = self.messages.lock().await;
        messages.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), RepositoryError> {
        let mut messages = self.messages.lock().await;
        messages
            .entry(message.room_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn find_recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.lock().await;
        let recent = messages
            .get(room_id)
            .map(|room_messages| room_messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(recent)
    }
}
