//! Per-connection read and write loops.
//!
//! Each loop runs on its own task and detects failure on its own path; there
//! is no cancellation signal shared between them. Whichever loop ends first
//! runs [`cleanup`], which closes the transport latch (ending the reader) and
//! the outbound queue (ending the writer).

use std::{fmt, sync::Arc};

use axum::{body::Bytes, extract::ws::Message as WsMessage};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{
    config::ConnectionSettings,
    domain::{ClientId, Message, MessageContent, RoomId},
    hub::HubHandle,
    infrastructure::dto::websocket::{IncomingMessageDto, MessageDto},
};

use super::{Client, ConnectionError, OutboundReceiver};

/// Run both loops for `client` and return once both have exited
pub async fn serve<W, R, E>(
    sink: W,
    stream: R,
    client: Arc<Client>,
    outbound: OutboundReceiver,
    hub: HubHandle,
    settings: ConnectionSettings,
) where
    W: Sink<WsMessage> + Unpin + Send + 'static,
    W::Error: fmt::Display + Send,
    R: Stream<Item = Result<WsMessage, E>> + Unpin + Send + 'static,
    E: std::error::Error + Send + 'static,
{
    client.mark_active();
    tracing::info!(client_id = %client.id(), rooms = ?client.joined_rooms(), "Connection active");

    let reader = {
        let client = Arc::clone(&client);
        let hub = hub.clone();
        tokio::spawn(async move {
            let result = read_loop(stream, &client, &hub, &settings).await;
            log_exit("inbound", client.id(), &result);
            cleanup(&client, &hub).await;
        })
    };

    let writer = {
        let client = Arc::clone(&client);
        let hub = hub.clone();
        tokio::spawn(async move {
            let result = write_loop(sink, outbound, &settings).await;
            log_exit("outbound", client.id(), &result);
            cleanup(&client, &hub).await;
        })
    };

    let (read_result, write_result) = tokio::join!(reader, writer);
    for joined in [read_result, write_result] {
        if let Err(e) = joined {
            tracing::error!(client_id = %client.id(), "Connection task failed: {}", e);
        }
    }
    // A panicked loop skipped its cleanup call.
    cleanup(&client, &hub).await;
    client.mark_closed();
    tracing::info!(client_id = %client.id(), "Connection closed");
}

/// Inbound loop: decode frames, forward them to the hub, track liveness
pub async fn read_loop<R, E>(
    mut stream: R,
    client: &Arc<Client>,
    hub: &HubHandle,
    settings: &ConnectionSettings,
) -> Result<(), ConnectionError>
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: std::error::Error + 'static,
{
    let mut transport_closed = client.transport_closed();
    if *transport_closed.borrow_and_update() {
        return Err(ConnectionError::Closed);
    }
    let mut deadline = Instant::now() + settings.pong_wait;

    loop {
        let next = tokio::select! {
            // The latch only ever flips to true, and a dropped sender means
            // the client is gone; either way the transport is closed.
            _ = transport_closed.changed() => {
                return Err(ConnectionError::Closed);
            }
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => return Err(ConnectionError::ReadTimeout),
            Ok(None) => return Err(ConnectionError::PeerClosed),
            Ok(Some(Err(e))) => return Err(ConnectionError::from_transport(&e)),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => {
                let message = decode_inbound(text.as_str(), client.id(), settings.max_message_size)?;
                if !client.is_in_room(&message.room_id) {
                    tracing::warn!(
                        client_id = %client.id(),
                        room_id = %message.room_id,
                        "Discarding message for a room the client has not joined"
                    );
                    continue;
                }
                tracing::debug!(
                    client_id = %client.id(),
                    room_id = %message.room_id,
                    "Received message"
                );
                // Waits while the hub queue is full. The hub only goes away
                // during process shutdown.
                hub.broadcast(message)
                    .await
                    .map_err(|_| ConnectionError::Closed)?;
            }
            WsMessage::Binary(data) => {
                return Err(ConnectionError::ProtocolViolation(format!(
                    "binary frames are not supported ({} bytes)",
                    data.len()
                )));
            }
            WsMessage::Pong(_) => {
                tracing::trace!(client_id = %client.id(), "pong");
                deadline = Instant::now() + settings.pong_wait;
            }
            // Answered by the transport itself.
            WsMessage::Ping(_) => {}
            WsMessage::Close(frame) => {
                tracing::debug!(client_id = %client.id(), frame = ?frame, "Peer sent close");
                return Err(ConnectionError::PeerClosed);
            }
        }
    }
}

/// Outbound loop: drain the queue and send a liveness probe every
/// `ping_interval`
pub async fn write_loop<W>(
    mut sink: W,
    mut outbound: OutboundReceiver,
    settings: &ConnectionSettings,
) -> Result<(), ConnectionError>
where
    W: Sink<WsMessage> + Unpin,
    W::Error: fmt::Display,
{
    send_frame(&mut sink, ping()).await?;

    let mut ticker = tokio::time::interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(message) => {
                    let json = serde_json::to_string(&MessageDto::from(message.as_ref()))
                        .map_err(|e| ConnectionError::ProtocolViolation(e.to_string()))?;
                    send_frame(&mut sink, WsMessage::Text(json.into())).await?;
                }
                None => {
                    // Queue closed by cleanup; the peer may already be gone.
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Ok(());
                }
            },
            _ = ticker.tick() => {
                tracing::trace!("ping");
                send_frame(&mut sink, ping()).await?;
            }
        }
    }
}

/// Tear down one connection. Safe to call any number of times from any task;
/// only the first call does anything.
pub async fn cleanup(client: &Arc<Client>, hub: &HubHandle) {
    let Some(rooms) = client.close() else {
        return;
    };
    tracing::debug!(client_id = %client.id(), rooms = rooms.len(), "Cleaning up connection");

    for room_id in rooms {
        if let Err(e) = hub.unregister(Arc::clone(client), room_id).await {
            tracing::warn!(client_id = %client.id(), "Could not leave room: {}", e);
        }
    }
}

fn ping() -> WsMessage {
    WsMessage::Ping(Bytes::new())
}

async fn send_frame<W>(sink: &mut W, frame: WsMessage) -> Result<(), ConnectionError>
where
    W: Sink<WsMessage> + Unpin,
    W::Error: fmt::Display,
{
    sink.send(frame)
        .await
        .map_err(|e| ConnectionError::Transport(e.to_string()))
}

fn decode_inbound(
    text: &str,
    sender: &ClientId,
    max_message_size: usize,
) -> Result<Message, ConnectionError> {
    if text.len() > max_message_size {
        return Err(ConnectionError::ProtocolViolation(format!(
            "frame of {} bytes exceeds the {} byte limit",
            text.len(),
            max_message_size
        )));
    }

    let incoming: IncomingMessageDto = serde_json::from_str(text)
        .map_err(|e| ConnectionError::ProtocolViolation(format!("malformed message: {e}")))?;
    let room_id = RoomId::new(incoming.room_id)
        .map_err(|e| ConnectionError::ProtocolViolation(e.to_string()))?;
    let content = MessageContent::new(incoming.content)
        .map_err(|e| ConnectionError::ProtocolViolation(e.to_string()))?;

    Ok(Message::new(room_id, sender.clone(), content))
}

fn log_exit(side: &str, client_id: &ClientId, result: &Result<(), ConnectionError>) {
    match result {
        Ok(()) => tracing::debug!(client_id = %client_id, side, "Loop finished"),
        Err(e) if e.is_ordinary_shutdown() => {
            tracing::debug!(client_id = %client_id, side, "Loop finished: {}", e)
        }
        Err(e) => tracing::warn!(client_id = %client_id, side, "Loop failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;

    use tokio::sync::mpsc;

    use crate::{
        common::Shutdown,
        config::HubSettings,
        domain::{DEPARTURE_NOTICE, MessageRepository, RepositoryError},
        hub::Hub,
        infrastructure::repository::InMemoryMessageRepository,
    };

    type TestSink = Pin<Box<dyn Sink<WsMessage, Error = String> + Send>>;
    type TestStream = Pin<Box<dyn Stream<Item = Result<WsMessage, io::Error>> + Send>>;

    /// In-memory transport half the pump writes to; every frame is
    /// timestamped so liveness cadence can be checked.
    fn test_sink() -> (TestSink, mpsc::UnboundedReceiver<(Instant, WsMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = futures_util::sink::unfold(tx, |tx, frame: WsMessage| async move {
            tx.send((Instant::now(), frame)).map_err(|e| e.to_string())?;
            Ok::<_, String>(tx)
        });
        (Box::pin(sink), rx)
    }

    /// In-memory transport half the pump reads from
    fn test_stream() -> (TestStream, mpsc::UnboundedSender<Result<WsMessage, io::Error>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (Box::pin(stream), tx)
    }

    fn settings() -> ConnectionSettings {
        ConnectionSettings::new(Duration::from_secs(10), 512, 16)
    }

    fn client(name: &str) -> (Arc<Client>, OutboundReceiver) {
        Client::new(ClientId::new(name.to_string()).unwrap(), name.to_string(), 16)
    }

    fn room_id(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn text(json: &str) -> Result<WsMessage, io::Error> {
        Ok(WsMessage::Text(json.to_string().into()))
    }

    struct Fixture {
        hub: HubHandle,
        _shutdown: Shutdown,
    }

    async fn hub_with_rooms(rooms: &[&str]) -> Fixture {
        let shutdown = Shutdown::new();
        let (hub, _task) = Hub::spawn(
            Arc::new(InMemoryMessageRepository::new()),
            HubSettings::default(),
            shutdown.signal(),
        );
        for id in rooms {
            hub.create_room(room_id(id), id.to_string()).await.unwrap();
        }
        Fixture {
            hub,
            _shutdown: shutdown,
        }
    }

    #[tokio::test]
    async fn test_inbound_message_is_forwarded_to_room() {
        // テスト項目: 受信したメッセージが Hub 経由で他のメンバーに届き、送信者 ID はサーバーが設定する
        // given (前提条件):
        let fx = hub_with_rooms(&["r1"]).await;
        let (alice, alice_out) = client("alice");
        let (bob, mut bob_rx) = client("bob");
        fx.hub.register(alice.clone(), room_id("r1")).await.unwrap();
        fx.hub.register(bob.clone(), room_id("r1")).await.unwrap();
        let (sink, _frames) = test_sink();
        let (stream, peer) = test_stream();
        tokio::spawn(serve(sink, stream, alice.clone(), alice_out, fx.hub.clone(), settings()));

        // when (操作):
        peer.send(text(r#"{"room_id":"r1","content":"m1","user_id":"mallory"}"#))
            .unwrap();

        // then (期待する結果):
        let received = tokio::time::timeout(Duration::from_secs(1), bob_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.content.as_str(), "m1");
        assert_eq!(received.user_id, *alice.id());
    }

    #[tokio::test]
    async fn test_message_for_unjoined_room_is_discarded() {
        // テスト項目: 参加していないルーム宛てのメッセージは破棄され、接続は維持される
        // given (前提条件):
        let fx = hub_with_rooms(&["r1", "r2"]).await;
        let (alice, alice_out) = client("alice");
        let (bob, mut bob_rx) = client("bob");
        fx.hub.register(alice.clone(), room_id("r1")).await.unwrap();
        fx.hub.register(bob.clone(), room_id("r1")).await.unwrap();
        fx.hub.register(bob.clone(), room_id("r2")).await.unwrap();
        let (sink, _frames) = test_sink();
        let (stream, peer) = test_stream();
        tokio::spawn(serve(sink, stream, alice.clone(), alice_out, fx.hub.clone(), settings()));

        // when (操作):
        peer.send(text(r#"{"room_id":"r2","content":"sneaky"}"#)).unwrap();
        peer.send(text(r#"{"room_id":"r1","content":"m2"}"#)).unwrap();

        // then (期待する結果): r2 宛ては届かず、後続のメッセージが最初に届く
        let received = tokio::time::timeout(Duration::from_secs(1), bob_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.content.as_str(), "m2");
        assert!(!alice.is_closed());
    }

    #[tokio::test]
    async fn test_outbound_messages_are_written_as_json() {
        // テスト項目: 送信キューのメッセージが JSON テキストフレームとして書き出される
        // given (前提条件):
        let (alice, alice_out) = client("alice");
        let (sink, mut frames) = test_sink();
        let writer = tokio::spawn(async move { write_loop(sink, alice_out, &settings()).await });
        let message = Message::new(
            room_id("r1"),
            ClientId::new("bob".to_string()).unwrap(),
            MessageContent::new("hello".to_string()).unwrap(),
        );

        // when (操作):
        alice.try_deliver(Arc::new(message.clone())).unwrap();

        // then (期待する結果): 最初は ping、その後メッセージ
        let (_, first) = frames.recv().await.unwrap();
        assert!(matches!(first, WsMessage::Ping(_)));
        let (_, second) = frames.recv().await.unwrap();
        let WsMessage::Text(json) = second else {
            panic!("expected text frame, got {second:?}");
        };
        let dto: MessageDto = serde_json::from_str(json.as_str()).unwrap();
        assert_eq!(dto, MessageDto::from(&message));

        alice.close();
        assert_eq!(writer.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_closed_queue_sends_close_frame() {
        // テスト項目: 送信キューが閉じられると close フレームを送ってループを終了する
        let (alice, alice_out) = client("alice");
        let (sink, mut frames) = test_sink();

        alice.close();
        let result = write_loop(sink, alice_out, &settings()).await;

        assert_eq!(result, Ok(()));
        let (_, ping) = frames.recv().await.unwrap();
        assert!(matches!(ping, WsMessage::Ping(_)));
        let (_, close) = frames.recv().await.unwrap();
        assert!(matches!(close, WsMessage::Close(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_cadence() {
        // テスト項目: pongWait = 10 秒のとき、どの 9 秒の区間にも少なくとも 1 回 ping が送られる
        // given (前提条件):
        let (_alice, alice_out) = client("alice");
        let (sink, mut frames) = test_sink();
        let start = Instant::now();
        tokio::spawn(async move { write_loop(sink, alice_out, &settings()).await });

        // when (操作):
        tokio::time::sleep(Duration::from_secs(40)).await;

        // then (期待する結果):
        let mut ping_times = Vec::new();
        while let Ok((at, frame)) = frames.try_recv() {
            if matches!(frame, WsMessage::Ping(_)) {
                ping_times.push(at);
            }
        }
        assert!(ping_times[0] - start < Duration::from_secs(1));
        assert!(ping_times.len() >= 5, "got {} pings", ping_times.len());
        for pair in ping_times.windows(2) {
            assert!(pair[1] - pair[0] < settings().pong_wait);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sink_does_not_burst_pings() {
        // テスト項目: 書き込みが一時的に止まっても、復帰後に ping がまとめて送られない
        // given (前提条件): 2 つ目のフレームの書き込みに 30 秒かかるトランスポート
        let (tx, mut frames) = mpsc::unbounded_channel();
        let sink = futures_util::sink::unfold(
            (tx, 0usize),
            |(tx, written), frame: WsMessage| async move {
                if written == 1 {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                tx.send((Instant::now(), frame)).map_err(|e| e.to_string())?;
                Ok::<_, String>((tx, written + 1))
            },
        );
        let (_alice, alice_out) = client("alice");
        tokio::spawn(async move { write_loop(Box::pin(sink), alice_out, &settings()).await });

        // when (操作):
        let mut times = Vec::new();
        for _ in 0..4 {
            let (at, frame) = frames.recv().await.unwrap();
            assert!(matches!(frame, WsMessage::Ping(_)));
            times.push(at);
        }

        // then (期待する結果): 復帰直後の 1 回の後は ping 間隔が空く
        assert!(times[3] - times[2] >= settings().ping_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_connection_times_out() {
        // テスト項目: pongWait の間に何も届かない接続は ReadTimeout で終了する
        // given (前提条件):
        let fx = hub_with_rooms(&[]).await;
        let (alice, _out) = client("alice");
        let (stream, _peer) = test_stream();
        let start = Instant::now();

        // when (操作):
        let result = read_loop(stream, &alice, &fx.hub, &settings()).await;

        // then (期待する結果):
        assert_eq!(result, Err(ConnectionError::ReadTimeout));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_rearms_read_deadline() {
        // テスト項目: pong を受け取ると読み取り期限が now + pongWait に延長される
        // given (前提条件):
        let fx = hub_with_rooms(&[]).await;
        let (alice, _out) = client("alice");
        let (stream, peer) = test_stream();
        let start = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(8)).await;
            let _ = peer.send(Ok(WsMessage::Pong(Bytes::new())));
            // peer を保持し続け、ストリームを終了させない
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(peer);
        });

        // when (操作):
        let result = read_loop(stream, &alice, &fx.hub, &settings()).await;

        // then (期待する結果):
        assert_eq!(result, Err(ConnectionError::ReadTimeout));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(18) && elapsed < Duration::from_secs(19));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_protocol_violation() {
        // テスト項目: 上限を超えるフレームを受け取ると ProtocolViolation で終了する
        let fx = hub_with_rooms(&["r1"]).await;
        let (alice, _out) = client("alice");
        let (stream, peer) = test_stream();
        let content = "x".repeat(600);
        peer.send(text(&format!(r#"{{"room_id":"r1","content":"{content}"}}"#)))
            .unwrap();

        let result = read_loop(stream, &alice, &fx.hub, &settings()).await;

        assert!(matches!(result, Err(ConnectionError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_protocol_violation() {
        // テスト項目: デコードできないフレームを受け取ると ProtocolViolation で終了する
        let fx = hub_with_rooms(&["r1"]).await;
        let (alice, _out) = client("alice");
        let (stream, peer) = test_stream();
        peer.send(text("not json")).unwrap();

        let result = read_loop(stream, &alice, &fx.hub, &settings()).await;

        assert!(matches!(result, Err(ConnectionError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn test_peer_close_is_ordinary_shutdown() {
        // テスト項目: 相手からの close フレームやストリーム終了は通常終了として扱われる
        let fx = hub_with_rooms(&[]).await;
        let (alice, _out) = client("alice");
        let (stream, peer) = test_stream();
        peer.send(Ok(WsMessage::Close(None))).unwrap();

        let result = read_loop(stream, &alice, &fx.hub, &settings()).await;

        assert!(result.unwrap_err().is_ordinary_shutdown());
    }

    #[tokio::test]
    async fn test_connection_reset_is_ordinary_shutdown() {
        // テスト項目: close ハンドシェイクなしのリセットは PeerClosed として扱われる
        let fx = hub_with_rooms(&[]).await;
        let (alice, _out) = client("alice");
        let (stream, peer) = test_stream();
        peer.send(Err(io::Error::from(io::ErrorKind::ConnectionReset)))
            .unwrap();

        let result = read_loop(stream, &alice, &fx.hub, &settings()).await;

        assert_eq!(result, Err(ConnectionError::PeerClosed));
    }

    /// Repository whose inserts never complete, holding the hub on its
    /// first broadcast
    struct StalledRepository;

    #[async_trait]
    impl MessageRepository for StalledRepository {
        async fn insert(&self, _message: &Message) -> Result<(), RepositoryError> {
            std::future::pending().await
        }

        async fn find_recent(
            &self,
            _room_id: &RoomId,
            _limit: usize,
        ) -> Result<Vec<Message>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_hub_holds_back_reader() {
        // テスト項目: Hub が永続化で止まっている間、読み取りループはストリームを読み進めない
        // given (前提条件): Hub のキュー容量 4、永続化が完了しないリポジトリ
        let shutdown = Shutdown::new();
        let (hub, _task) = Hub::spawn(
            Arc::new(StalledRepository),
            HubSettings {
                event_queue_capacity: 4,
                ..HubSettings::default()
            },
            shutdown.signal(),
        );
        hub.create_room(room_id("r1"), String::new()).await.unwrap();
        let (alice, _out) = client("alice");
        hub.register(alice.clone(), room_id("r1")).await.unwrap();

        let (stream, peer) = test_stream();
        let consumed = Arc::new(AtomicUsize::new(0));
        let counted = {
            let consumed = consumed.clone();
            stream.inspect(move |_| {
                consumed.fetch_add(1, Ordering::SeqCst);
            })
        };
        for i in 0..100 {
            peer.send(text(&format!(r#"{{"room_id":"r1","content":"m{i}"}}"#)))
                .unwrap();
        }

        // when (操作):
        let reader = {
            let alice = alice.clone();
            let hub = hub.clone();
            tokio::spawn(async move { read_loop(counted, &alice, &hub, &settings()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        // then (期待する結果): 処理中 1 件 + キュー 4 件 + 送信待ち 1 件まで
        assert!(!reader.is_finished());
        let read = consumed.load(Ordering::SeqCst);
        assert!(read <= 6, "reader consumed {read} frames while the hub was stalled");
        reader.abort();
    }

    #[tokio::test]
    async fn test_cleanup_ends_reader_via_transport_latch() {
        // テスト項目: cleanup でトランスポートが閉じられると読み取りループも終了する
        let fx = hub_with_rooms(&[]).await;
        let (alice, _out) = client("alice");
        let (stream, _peer) = test_stream();
        let reader = {
            let alice = alice.clone();
            let hub = fx.hub.clone();
            tokio::spawn(async move { read_loop(stream, &alice, &hub, &settings()).await })
        };

        cleanup(&alice, &fx.hub).await;

        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_concurrent_cleanup_removes_client_exactly_once() {
        // テスト項目: 両方のループから同時に cleanup しても各ルームから 1 回だけ削除される
        // given (前提条件):
        let fx = hub_with_rooms(&["r1", "r2"]).await;
        let (alice, _alice_out) = client("alice");
        let (bob, mut bob_rx) = client("bob");
        for r in ["r1", "r2"] {
            fx.hub.register(alice.clone(), room_id(r)).await.unwrap();
            fx.hub.register(bob.clone(), room_id(r)).await.unwrap();
        }

        // when (操作):
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let alice = alice.clone();
                let hub = fx.hub.clone();
                tokio::spawn(async move { cleanup(&alice, &hub).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        let rooms = fx.hub.list_rooms().await.unwrap();

        // then (期待する結果):
        for room in &rooms {
            assert_eq!(room.members, vec![bob.id().clone()]);
        }
        assert!(alice.joined_rooms().is_empty());
        let mut notices = Vec::new();
        while let Ok(message) = bob_rx.try_recv() {
            assert_eq!(message.content.as_str(), DEPARTURE_NOTICE);
            notices.push(message.room_id.clone());
        }
        notices.sort();
        assert_eq!(notices, vec![room_id("r1"), room_id("r2")]);
    }

    #[tokio::test]
    async fn test_transport_failure_removes_member_and_notifies_others() {
        // テスト項目: B の接続が失敗すると B はルームから外れ、A に退出通知が届く
        // given (前提条件):
        let fx = hub_with_rooms(&["r1"]).await;
        let (alice, mut alice_rx) = client("alice");
        let (bob, bob_out) = client("bob");
        fx.hub.register(alice.clone(), room_id("r1")).await.unwrap();
        fx.hub.register(bob.clone(), room_id("r1")).await.unwrap();
        let (sink, _frames) = test_sink();
        let (stream, peer) = test_stream();
        let connection = tokio::spawn(serve(
            sink,
            stream,
            bob.clone(),
            bob_out,
            fx.hub.clone(),
            settings(),
        ));

        // when (操作):
        peer.send(Err(io::Error::other("broken frame"))).unwrap();
        tokio::time::timeout(Duration::from_secs(1), connection)
            .await
            .unwrap()
            .unwrap();

        // then (期待する結果):
        let notice = tokio::time::timeout(Duration::from_secs(1), alice_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notice.content.as_str(), DEPARTURE_NOTICE);
        assert_eq!(notice.user_id, *bob.id());
        let snapshot = fx.hub.room_snapshot(room_id("r1")).await.unwrap().unwrap();
        assert_eq!(snapshot.members, vec![alice.id().clone()]);
        assert_eq!(bob.state(), crate::connection::ConnectionState::Closed);
    }
}
