//! Live room: a named set of connected clients with best-effort fan-out.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use crate::{
    connection::Client,
    domain::{ClientId, Message, RoomId, RoomSnapshot},
};

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Non-blocking deliveries attempted
    pub attempted: usize,
    pub delivered: usize,
    /// Dropped because the member's queue was full or closed
    pub dropped: usize,
}

/// A client dropped without running cleanup leaves a dead entry behind;
/// dead entries count as absent.
fn is_live(member: &Weak<Client>) -> bool {
    member.strong_count() > 0
}

/// Members are held weakly; a room never keeps a client alive.
pub struct Room {
    id: RoomId,
    name: String,
    members: Mutex<HashMap<ClientId, Weak<Client>>>,
}

impl Room {
    pub fn new(id: RoomId, name: String) -> Self {
        Self {
            id,
            name,
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn members(&self) -> MutexGuard<'_, HashMap<ClientId, Weak<Client>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` if a live client is already registered under the id
    pub(crate) fn add_member(&self, client: &Arc<Client>) -> bool {
        let mut members = self.members();
        if members.get(client.id()).is_some_and(is_live) {
            return false;
        }
        members.insert(client.id().clone(), Arc::downgrade(client));
        true
    }

    /// Remove `client` if it is the member registered under its id.
    ///
    /// Another connection that happens to share the id is left alone.
    pub(crate) fn remove_member(&self, client: &Arc<Client>) -> bool {
        let mut members = self.members();
        let is_same = members
            .get(client.id())
            .is_some_and(|member| std::ptr::eq(member.as_ptr(), Arc::as_ptr(client)));
        if is_same {
            members.remove(client.id());
        }
        is_same
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.members().get(client_id).is_some_and(is_live)
    }

    pub fn member_count(&self) -> usize {
        self.members().values().filter(|member| is_live(member)).count()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let mut members: Vec<ClientId> = self
            .members()
            .iter()
            .filter(|(_, member)| is_live(member))
            .map(|(id, _)| id.clone())
            .collect();
        members.sort();
        RoomSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            members,
        }
    }

    /// Offer `message` to every member except `skip`.
    ///
    /// Each delivery is a `try_send`; a full or closed queue drops the message
    /// for that member only and never stalls the others.
    pub fn broadcast(&self, message: &Arc<Message>, skip: Option<&ClientId>) -> FanOut {
        let mut members = self.members();
        let before = members.len();
        members.retain(|_, member| is_live(member));
        if members.len() < before {
            tracing::debug!(
                room_id = %self.id,
                pruned = before - members.len(),
                "Pruned members dropped without cleanup"
            );
        }
        let mut report = FanOut::default();

        for (member_id, member) in members.iter() {
            if skip == Some(member_id) {
                continue;
            }
            let Some(client) = member.upgrade() else {
                continue;
            };
            report.attempted += 1;

            match client.try_deliver(Arc::clone(message)) {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    report.dropped += 1;
                    tracing::warn!(
                        room_id = %self.id,
                        client_id = %member_id,
                        "Dropped message for member: {}",
                        reason
                    );
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::OutboundReceiver, domain::MessageContent};

    fn client(name: &str, capacity: usize) -> (Arc<Client>, OutboundReceiver) {
        Client::new(ClientId::new(name.to_string()).unwrap(), name.to_string(), capacity)
    }

    fn test_room() -> Room {
        Room::new(RoomId::new("r1".to_string()).unwrap(), "Room 1".to_string())
    }

    fn message(from: &str) -> Arc<Message> {
        Arc::new(Message::new(
            RoomId::new("r1".to_string()).unwrap(),
            ClientId::new(from.to_string()).unwrap(),
            MessageContent::new("hello".to_string()).unwrap(),
        ))
    }

    #[test]
    fn test_add_member_is_idempotent() {
        // テスト項目: 同じクライアントを 2 回追加してもメンバーは 1 人
        let room = test_room();
        let (alice, _rx) = client("alice", 4);

        assert!(room.add_member(&alice));
        assert!(!room.add_member(&alice));
        assert_eq!(room.member_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member() {
        // テスト項目: N 人のメンバーに対して N 回の配送を試みる
        // given (前提条件):
        let room = test_room();
        let (alice, mut alice_rx) = client("alice", 4);
        let (bob, mut bob_rx) = client("bob", 4);
        let (carol, mut carol_rx) = client("carol", 4);
        for c in [&alice, &bob, &carol] {
            room.add_member(c);
        }

        // when (操作):
        let report = room.broadcast(&message("alice"), None);

        // then (期待する結果):
        assert_eq!(
            report,
            FanOut {
                attempted: 3,
                delivered: 3,
                dropped: 0
            }
        );
        assert!(alice_rx.recv().await.is_some());
        assert!(bob_rx.recv().await.is_some());
        assert!(carol_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_queue_only_affects_that_member() {
        // テスト項目: 1 人のキューが満杯でも他のメンバーには配送される
        // given (前提条件):
        let room = test_room();
        let (slow, _slow_rx) = client("slow", 1);
        let (bob, mut bob_rx) = client("bob", 4);
        let (carol, mut carol_rx) = client("carol", 4);
        slow.try_deliver(message("x")).unwrap(); // slow のキューを埋める
        for c in [&slow, &bob, &carol] {
            room.add_member(c);
        }

        // when (操作):
        let report = room.broadcast(&message("alice"), None);

        // then (期待する結果):
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 1);
        assert!(bob_rx.recv().await.is_some());
        assert!(carol_rx.recv().await.is_some());
        assert!(room.contains(slow.id()), "slow member must not be evicted");
    }

    #[test]
    fn test_broadcast_skips_sender() {
        // テスト項目: skip に指定したメンバーには配送しない
        let room = test_room();
        let (alice, mut alice_rx) = client("alice", 4);
        let (bob, mut bob_rx) = client("bob", 4);
        room.add_member(&alice);
        room.add_member(&bob);

        let report = room.broadcast(&message("alice"), Some(alice.id()));

        assert_eq!(report.attempted, 1);
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_ok());
    }

    #[test]
    fn test_remove_member_ignores_other_connection_with_same_id() {
        // テスト項目: 同じ ID を持つ別の接続はメンバーから削除されない
        // given (前提条件):
        let room = test_room();
        let (first, _rx1) = client("alice", 4);
        let (second, _rx2) = client("alice", 4);
        room.add_member(&first);

        // when (操作):
        let removed_other = room.remove_member(&second);
        let removed_self = room.remove_member(&first);

        // then (期待する結果):
        assert!(!removed_other);
        assert!(removed_self);
        assert_eq!(room.member_count(), 0);
    }

    #[test]
    fn test_dropped_client_is_not_kept_alive() {
        // テスト項目: ルームはクライアントを弱参照で保持する
        // given (前提条件):
        let room = test_room();
        let (alice, rx) = client("alice", 4);
        room.add_member(&alice);

        // when (操作):
        drop(alice);
        drop(rx);
        let report = room.broadcast(&message("bob"), None);

        // then (期待する結果): 配送対象にならず、同じ ID で再参加できる
        assert_eq!(report, FanOut::default());
        assert!(!room.contains(&ClientId::new("alice".to_string()).unwrap()));
        let (again, _again_rx) = client("alice", 4);
        assert!(room.add_member(&again));
    }

    #[test]
    fn test_fan_out_counts_only_live_members() {
        // テスト項目: cleanup されずに破棄されたメンバーは配送回数に含まれず、ルームから取り除かれる
        // given (前提条件):
        let room = test_room();
        let (alice, mut alice_rx) = client("alice", 4);
        let (bob, mut bob_rx) = client("bob", 4);
        let (ghost, ghost_rx) = client("ghost", 4);
        for c in [&alice, &bob, &ghost] {
            room.add_member(c);
        }
        drop(ghost);
        drop(ghost_rx);

        // when (操作):
        let report = room.broadcast(&message("carol"), None);

        // then (期待する結果):
        assert_eq!(
            report,
            FanOut {
                attempted: 2,
                delivered: 2,
                dropped: 0
            }
        );
        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_ok());
        assert_eq!(room.member_count(), 2);
        assert_eq!(room.members().len(), 2);
    }

    #[test]
    fn test_snapshot_lists_sorted_members() {
        // テスト項目: スナップショットのメンバーはソートされている
        let room = test_room();
        let (carol, _c) = client("carol", 1);
        let (alice, _a) = client("alice", 1);
        room.add_member(&carol);
        room.add_member(&alice);

        let snapshot = room.snapshot();

        assert_eq!(snapshot.name, "Room 1");
        assert_eq!(
            snapshot
                .members
                .iter()
                .map(ClientId::as_str)
                .collect::<Vec<_>>(),
            vec!["alice", "carol"]
        );
    }
}
