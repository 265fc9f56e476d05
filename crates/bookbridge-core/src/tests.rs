#[cfg(test)]
mod tests {
    use crate::assistant::*;
    use crate::auth::*;
    use crate::cart::*;
    use crate::connection::ConnectionManager;
    use crate::endpoint::connection_url;
    use crate::event_bus::EventBus;
    use crate::ports::*;
    use crate::reconciler::MessageReconciler;
    use crate::session_store::SessionStore;
    use bookbridge_types::catalog::*;
    use bookbridge_types::config::*;
    use bookbridge_types::connection::*;
    use bookbridge_types::event::ChatEvent;
    use bookbridge_types::frame::OutboundFrame;
    use bookbridge_types::message::*;
    use bookbridge_types::user::*;
    use bookbridge_types::{ChatError, EntityId};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::executor::block_on;
    use serde_json::{Value, json};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;

    // ─── Mocks ───────────────────────────────────────────────

    struct MockConnection {
        url: String,
        sink: TransportSink,
        sent: Rc<RefCell<Vec<String>>>,
        closed: Rc<Cell<bool>>,
    }

    struct MockTransport {
        sent: Rc<RefCell<Vec<String>>>,
        closed: Rc<Cell<bool>>,
    }

    impl Transport for MockTransport {
        fn send_text(&self, text: &str) -> bookbridge_types::Result<()> {
            if self.closed.get() {
                return Err(ChatError::NotConnected);
            }
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }

        fn close(&self) {
            self.closed.set(true);
        }
    }

    /// Records every connection it was asked to make
    #[derive(Default)]
    struct MockTransportPort {
        connections: RefCell<Vec<MockConnection>>,
        fail: Cell<bool>,
    }

    impl MockTransportPort {
        fn count(&self) -> usize {
            self.connections.borrow().len()
        }

        fn url(&self, index: usize) -> String {
            self.connections.borrow()[index].url.clone()
        }

        fn sent(&self, index: usize) -> Vec<String> {
            self.connections.borrow()[index].sent.borrow().clone()
        }

        fn is_closed(&self, index: usize) -> bool {
            self.connections.borrow()[index].closed.get()
        }

        fn live_count(&self) -> usize {
            self.connections
                .borrow()
                .iter()
                .filter(|c| !c.closed.get())
                .count()
        }

        fn emit(&self, index: usize, event: TransportEvent) {
            // The sink may open a new connection, so no borrow is held.
            let sink = self.connections.borrow()[index].sink.clone();
            sink(event);
        }
    }

    impl TransportPort for MockTransportPort {
        fn connect(&self, url: &str, sink: TransportSink) -> bookbridge_types::Result<Box<dyn Transport>> {
            if self.fail.get() {
                return Err(ChatError::JsInterop("WebSocket unavailable".to_string()));
            }
            let sent = Rc::new(RefCell::new(Vec::new()));
            let closed = Rc::new(Cell::new(false));
            self.connections.borrow_mut().push(MockConnection {
                url: url.to_string(),
                sink,
                sent: sent.clone(),
                closed: closed.clone(),
            });
            Ok(Box::new(MockTransport { sent, closed }))
        }
    }

    /// Simulated clock; `advance` fires due callbacks in order.
    struct ManualClock {
        start: DateTime<Utc>,
        elapsed_ms: Cell<u64>,
        next_id: Cell<u64>,
        timers: RefCell<Vec<(TimerHandle, u64, Box<dyn FnOnce()>)>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                start: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                elapsed_ms: Cell::new(0),
                next_id: Cell::new(1),
                timers: RefCell::new(Vec::new()),
            }
        }

        fn pending(&self) -> usize {
            self.timers.borrow().len()
        }

        fn advance(&self, ms: u64) {
            let target = self.elapsed_ms.get() + ms;
            loop {
                let due = {
                    let mut timers = self.timers.borrow_mut();
                    let next = timers
                        .iter()
                        .enumerate()
                        .filter(|(_, (_, at, _))| *at <= target)
                        .min_by_key(|(_, (_, at, _))| *at)
                        .map(|(i, _)| i);
                    next.map(|i| timers.remove(i))
                };
                match due {
                    Some((_, at, callback)) => {
                        self.elapsed_ms.set(at);
                        callback();
                    }
                    None => break,
                }
            }
            self.elapsed_ms.set(target);
        }
    }

    impl ClockPort for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.start + Duration::milliseconds(self.elapsed_ms.get() as i64)
        }

        fn schedule(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerHandle {
            let handle = TimerHandle(self.next_id.get());
            self.next_id.set(handle.0 + 1);
            let at = self.elapsed_ms.get() + delay_ms;
            self.timers.borrow_mut().push((handle, at, callback));
            handle
        }

        fn cancel(&self, handle: TimerHandle) {
            self.timers.borrow_mut().retain(|(h, _, _)| *h != handle);
        }
    }

    struct MockApi {
        chats: RefCell<Value>,
        history: Value,
        reply: RefCell<bookbridge_types::Result<ChatbotReply>>,
        list_calls: Cell<usize>,
        fail_list: Cell<bool>,
    }

    impl MockApi {
        fn new(chats: Value) -> Self {
            Self {
                chats: RefCell::new(chats),
                history: json!([]),
                reply: RefCell::new(Ok(ChatbotReply::default())),
                list_calls: Cell::new(0),
                fail_list: Cell::new(false),
            }
        }
    }

    #[async_trait(?Send)]
    impl ChatApiPort for MockApi {
        async fn list_chats(&self) -> bookbridge_types::Result<Value> {
            self.list_calls.set(self.list_calls.get() + 1);
            if self.fail_list.get() {
                return Err(ChatError::from_status(500, r#"{"error":"database unavailable"}"#));
            }
            Ok(self.chats.borrow().clone())
        }

        async fn chat_history(&self, _chat_id: &EntityId) -> bookbridge_types::Result<Value> {
            Ok(self.history.clone())
        }

        async fn book(&self, book_id: &EntityId) -> bookbridge_types::Result<BookSummary> {
            Err(ChatError::NotFound(format!("Book {}", book_id)))
        }

        async fn books(&self) -> bookbridge_types::Result<Vec<BookSummary>> {
            Ok(Vec::new())
        }

        async fn chatbot(&self, _query: &str) -> bookbridge_types::Result<ChatbotReply> {
            self.reply.borrow().clone()
        }
    }

    #[derive(Default)]
    struct MemStorage {
        data: RefCell<HashMap<String, Vec<u8>>>,
    }

    #[async_trait(?Send)]
    impl StoragePort for MemStorage {
        async fn get(&self, key: &str) -> bookbridge_types::Result<Option<Vec<u8>>> {
            Ok(self.data.borrow().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8]) -> bookbridge_types::Result<()> {
            self.data.borrow_mut().insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn delete(&self, key: &str) -> bookbridge_types::Result<()> {
            self.data.borrow_mut().remove(key);
            Ok(())
        }

        async fn list_keys(&self, prefix: &str) -> bookbridge_types::Result<Vec<String>> {
            Ok(self
                .data
                .borrow()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn backend_name(&self) -> &str {
            "test-memory"
        }
    }

    // ─── Fixtures ────────────────────────────────────────────

    fn buyer() -> CurrentUser {
        CurrentUser::new(7u64, "alice", Role::Buyer)
    }

    fn seller() -> CurrentUser {
        CurrentUser::new(9u64, "bob", Role::Seller)
    }

    fn auth(user: CurrentUser) -> AuthSession {
        AuthSession::new("tok en", user)
    }

    struct Harness {
        transports: Rc<MockTransportPort>,
        clock: Rc<ManualClock>,
        bus: EventBus,
        manager: ConnectionManager,
    }

    fn harness(surface: ChatSurface, config: ConnectionConfig) -> Harness {
        let transports = Rc::new(MockTransportPort::default());
        let clock = Rc::new(ManualClock::new());
        let bus = EventBus::new();
        let manager = ConnectionManager::new(
            surface,
            EndpointConfig::default(),
            config,
            transports.clone(),
            clock.clone(),
            bus.clone(),
        );
        Harness {
            transports,
            clock,
            bus,
            manager,
        }
    }

    fn peer() -> Harness {
        harness(ChatSurface::Peer, ConnectionConfig::peer())
    }

    fn community() -> Harness {
        harness(ChatSurface::Community, ConnectionConfig::community())
    }

    fn errors(events: &[ChatEvent]) -> Vec<ChatError> {
        events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Error { error, .. } => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    fn received(events: &[ChatEvent]) -> Vec<Message> {
        events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::MessageReceived { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn chats_fixture() -> Value {
        json!([
            {
                "chat_id": 1,
                "book_id": 5,
                "book_title": "Dune",
                "buyer_id": 7,
                "buyer_name": "alice",
                "seller_id": 9,
                "seller_name": "bob",
                "messages": null,
                "created_at": "2024-03-01T10:00:00Z"
            },
            {
                "chat_id": "2",
                "book_id": "6",
                "book_title": "Emma",
                "buyer_id": 7,
                "buyer_name": "alice",
                "seller_id": 11,
                "seller_name": "carol",
                "messages": [
                    {"id": 40, "sender_id": 11, "sender_name": "carol", "content": "Still available", "created_at": "2024-03-01T11:00:00Z"}
                ]
            }
        ])
    }

    // ─── EventBus Tests ──────────────────────────────────────

    #[test]
    fn test_event_bus_new_is_empty() {
        let bus = EventBus::new();
        assert!(!bus.has_pending());
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_event_bus_clone_shares_state() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        bus1.emit(ChatEvent::SessionCreated { session_id: EntityId::from(3u64) });
        assert!(bus2.has_pending());

        let events = bus2.drain();
        assert_eq!(events.len(), 1);
        assert!(!bus1.has_pending());
    }

    // ─── Endpoint Tests ──────────────────────────────────────

    #[test]
    fn test_buyer_url_names_seller() {
        let url = connection_url(
            &EndpointConfig::default(),
            &ConnectionConfig::peer(),
            &ConnectTarget::pending(5u64, 9u64),
            &auth(buyer()),
        )
        .unwrap();
        assert_eq!(url, "ws://localhost:8000/ws/chat/5?seller_id=9&token=tok%20en");
    }

    #[test]
    fn test_seller_url_names_buyer() {
        let session = bookbridge_types::session::ChatSession {
            id: EntityId::from(1u64),
            ..bookbridge_types::session::ChatSession::pending(5u64, 7u64)
        };
        let config = ConnectionConfig {
            token_in_query: false,
            ..ConnectionConfig::peer()
        };
        let url = connection_url(
            &EndpointConfig::default(),
            &config,
            &ConnectTarget::session(&session),
            &auth(seller()),
        )
        .unwrap();
        assert_eq!(url, "ws://localhost:8000/ws/chat/5?buyer_id=7");
    }

    #[test]
    fn test_community_url_secure() {
        let endpoint = EndpointConfig {
            host: "books.example".to_string(),
            secure: true,
            ..EndpointConfig::default()
        };
        let url = connection_url(
            &endpoint,
            &ConnectionConfig::community(),
            &ConnectTarget::Community,
            &auth(buyer()),
        )
        .unwrap();
        assert_eq!(url, "wss://books.example/ws/community?token=tok%20en");
    }

    #[test]
    fn test_seller_cannot_start_chat() {
        let err = connection_url(
            &EndpointConfig::default(),
            &ConnectionConfig::peer(),
            &ConnectTarget::pending(5u64, 7u64),
            &auth(seller()),
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[test]
    fn test_empty_token_requires_auth() {
        let err = connection_url(
            &EndpointConfig::default(),
            &ConnectionConfig::community(),
            &ConnectTarget::Community,
            &AuthSession::new("  ", buyer()),
        )
        .unwrap_err();
        assert_eq!(err, ChatError::AuthRequired);
    }

    // ─── ConnectionManager Tests ─────────────────────────────

    #[test]
    fn test_open_goes_connecting_then_authenticated() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        assert_eq!(h.transports.count(), 1);

        h.transports.emit(0, TransportEvent::Opened);
        assert_eq!(h.manager.state(), ConnectionState::Authenticated);

        let sent = h.transports.sent(0);
        assert_eq!(sent.len(), 1);
        let frame: OutboundFrame = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(frame, OutboundFrame::Auth { token: "tok en".to_string() });

        let states: Vec<ConnectionState> = h
            .bus
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Open,
                ConnectionState::Authenticated
            ]
        );
    }

    #[test]
    fn test_community_skips_auth_frame() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        assert_eq!(h.manager.state(), ConnectionState::Open);
        assert!(h.transports.sent(0).is_empty());
    }

    #[test]
    fn test_pending_target_missing_counterpart_creates_no_transport() {
        let h = peer();
        let target = ConnectTarget::Peer {
            session_id: EntityId::from(0u64),
            book_id: Some(EntityId::from(5u64)),
            counterpart_id: None,
        };

        let err = h.manager.open(target, &auth(buyer())).unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert_eq!(h.transports.count(), 0);
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);

        // Surfaced synchronously, before any callback could run
        let errs = errors(&h.bus.drain());
        assert_eq!(errs, vec![err]);
    }

    #[test]
    fn test_invalid_open_keeps_existing_connection() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);

        let bad = ConnectTarget::Peer {
            session_id: EntityId::from(0u64),
            book_id: None,
            counterpart_id: Some(EntityId::from(9u64)),
        };
        assert!(h.manager.open(bad, &auth(buyer())).is_err());
        assert!(!h.transports.is_closed(0));
        assert!(h.manager.is_connected());
    }

    #[test]
    fn test_wrong_surface_target_rejected() {
        let h = peer();
        let err = h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert_eq!(h.transports.count(), 0);
    }

    #[test]
    fn test_second_open_leaves_one_live_connection() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        assert_eq!(h.manager.state(), ConnectionState::Authenticated);

        h.manager.open(ConnectTarget::pending(6u64, 11u64), &auth(buyer())).unwrap();
        assert_eq!(h.transports.count(), 2);
        assert!(h.transports.is_closed(0));
        assert_eq!(h.transports.live_count(), 1);
        assert!(h.transports.url(1).contains("/ws/chat/6?seller_id=11"));
    }

    #[test]
    fn test_superseded_socket_events_ignored() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.bus.drain();

        h.transports.emit(0, TransportEvent::Opened);
        h.transports.emit(0, TransportEvent::Text(r#"{"sender_id":9,"content":"old"}"#.to_string()));
        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });

        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        assert!(h.bus.drain().is_empty());
        assert_eq!(h.clock.pending(), 1, "only the open timeout of the new socket");
    }

    #[test]
    fn test_send_while_connecting_fails_not_connected() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();

        let input = String::from("Is this still available?");
        let err = h.manager.send(&input).unwrap_err();
        assert_eq!(err, ChatError::NotConnected);
        assert_eq!(input, "Is this still available?");
        assert!(h.transports.sent(0).is_empty());
    }

    #[test]
    fn test_send_when_disconnected_fails() {
        let h = peer();
        assert_eq!(h.manager.send("hello").unwrap_err(), ChatError::NotConnected);
    }

    #[test]
    fn test_send_empty_is_validation_error() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        assert!(matches!(h.manager.send("   "), Err(ChatError::Validation(_))));
    }

    #[test]
    fn test_send_on_existing_session_carries_chat_id() {
        let h = peer();
        let target = ConnectTarget::Peer {
            session_id: EntityId::from(12u64),
            book_id: Some(EntityId::from(5u64)),
            counterpart_id: Some(EntityId::from(9u64)),
        };
        h.manager.open(target, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);

        let outbound = h.manager.send(" hi there ").unwrap();
        assert_eq!(outbound.content, "hi there");
        assert_eq!(outbound.session_id, Some(EntityId::from(12u64)));

        let sent = h.transports.sent(0);
        let frame: Value = serde_json::from_str(sent.last().unwrap()).unwrap();
        assert_eq!(frame, json!({"type": "message", "content": "hi there", "chat_id": 12}));
    }

    #[test]
    fn test_send_with_correlation_tags_client_ref() {
        let config = ConnectionConfig {
            correlate_echoes: true,
            ..ConnectionConfig::community()
        };
        let h = harness(ChatSurface::Community, config);
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);

        let outbound = h.manager.send("hello all").unwrap();
        let frame: Value = serde_json::from_str(&h.transports.sent(0)[0]).unwrap();
        assert_eq!(frame["client_ref"], json!(outbound.client_ref));
        assert!(frame.get("chat_id").is_none());
    }

    #[test]
    fn test_peer_message_frame_published() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        h.transports.emit(
            0,
            TransportEvent::Text(
                json!({
                    "type": "message",
                    "content": "Yes, it is",
                    "sender_id": 9,
                    "chat_id": 3,
                    "timestamp": "2024-03-01T12:00:05Z",
                    "data": {"sender_name": "bob", "message_id": 44}
                })
                .to_string(),
            ),
        );

        let messages = received(&h.bus.drain());
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.id, EntityId::from(44u64));
        assert_eq!(message.sender_name, "bob");
        assert!(!message.is_self);
        assert_eq!(message.origin, MessageOrigin::Live);
    }

    #[test]
    fn test_chat_created_adopts_session_id() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        h.transports.emit(0, TransportEvent::Text(r#"{"type":"chat_created","chat_id":21}"#.to_string()));

        let events = h.bus.drain();
        assert_eq!(events, vec![ChatEvent::SessionCreated { session_id: EntityId::from(21u64) }]);
        let target = h.manager.target().unwrap();
        assert_eq!(target.session_id(), Some(&EntityId::from(21u64)));
    }

    #[test]
    fn test_server_error_frame_reported() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        h.transports.emit(
            0,
            TransportEvent::Text(r#"{"type":"error","content":"Chat not found"}"#.to_string()),
        );
        h.transports.emit(0, TransportEvent::Text(r#"{"type":"history","data":[{},{}]}"#.to_string()));
        h.transports.emit(0, TransportEvent::Text("not json".to_string()));

        let events = h.bus.drain();
        assert_eq!(errors(&events), vec![ChatError::Transport("Chat not found".to_string())]);
        assert!(events.contains(&ChatEvent::HistoryNotice { surface: ChatSurface::Peer, count: 2 }));
    }

    #[test]
    fn test_community_bare_frame_published() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        h.transports.emit(
            0,
            TransportEvent::Text(r#"{"sender_id":"7","sender_name":"alice","content":"hi all"}"#.to_string()),
        );
        let messages = received(&h.bus.drain());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_self);
        assert_eq!(messages[0].created_at, h.clock.now());
    }

    #[test]
    fn test_community_frames_with_same_timestamp_keep_distinct_ids() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        for content in ["hi", "there"] {
            let frame = json!({
                "sender_id": 9,
                "sender_name": "bob",
                "content": content,
                "timestamp": "2024-03-01T12:00:00Z"
            });
            h.transports.emit(0, TransportEvent::Text(frame.to_string()));
        }

        let messages = received(&h.bus.drain());
        assert_eq!(messages.len(), 2);
        assert_ne!(messages[0].id, messages[1].id);

        let mut reconciler = MessageReconciler::default();
        for message in messages {
            assert!(reconciler.apply_live(message));
        }
        let ids: HashSet<&EntityId> = reconciler.messages().iter().map(|m| &m.id).collect();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_peer_unclean_close_does_not_reconnect() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });
        assert_eq!(h.manager.state(), ConnectionState::Failed);
        let errs = errors(&h.bus.drain());
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], ChatError::Transport(_)));

        h.clock.advance(60_000);
        assert_eq!(h.transports.count(), 1);
    }

    #[test]
    fn test_peer_manual_reconnect_reuses_target() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.transports.emit(0, TransportEvent::Text(r#"{"type":"chat_created","chat_id":21}"#.to_string()));
        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });

        h.manager.reconnect().unwrap();
        assert_eq!(h.transports.count(), 2);
        assert_eq!(h.transports.url(1), h.transports.url(0));
        assert_eq!(h.manager.target().unwrap().session_id(), Some(&EntityId::from(21u64)));
    }

    #[test]
    fn test_reconnect_without_target_fails() {
        let h = peer();
        assert!(matches!(h.manager.reconnect(), Err(ChatError::Validation(_))));
    }

    #[test]
    fn test_community_unclean_close_reconnects_once_after_delay() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });
        assert_eq!(h.manager.reconnect_attempts(), 1);
        assert!(h.bus.drain().contains(&ChatEvent::ReconnectScheduled {
            surface: ChatSurface::Community,
            attempt: 1,
            delay_ms: 5_000,
        }));

        h.clock.advance(4_999);
        assert_eq!(h.transports.count(), 1);

        h.clock.advance(1);
        assert_eq!(h.transports.count(), 2);
        assert_eq!(h.manager.reconnect_attempts(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Connecting);

        // Only the new socket's open timeout remains
        assert_eq!(h.clock.pending(), 1);
        h.clock.advance(30_000);
        assert_eq!(h.transports.count(), 2);
    }

    #[test]
    fn test_community_reconnect_resets_attempts_on_open() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });
        h.clock.advance(5_000);
        h.transports.emit(1, TransportEvent::Closed { code: 1006, was_clean: false });
        assert_eq!(h.manager.reconnect_attempts(), 2);

        h.clock.advance(5_000);
        h.transports.emit(2, TransportEvent::Opened);
        assert_eq!(h.manager.reconnect_attempts(), 0);
        assert_eq!(h.transports.count(), 3);
    }

    #[test]
    fn test_rejected_open_keeps_reconnect_counter() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });
        assert_eq!(h.manager.reconnect_attempts(), 1);

        let rejected = h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer()));
        assert!(matches!(rejected, Err(ChatError::Validation(_))));
        assert_eq!(h.manager.reconnect_attempts(), 1);
        assert_eq!(h.transports.count(), 1);

        // The scheduled retry still runs and counts as a retry.
        h.clock.advance(5_000);
        assert_eq!(h.transports.count(), 2);
        assert_eq!(h.manager.reconnect_attempts(), 1);
    }

    #[test]
    fn test_timer_reconnect_failure_stops_loop() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });
        h.bus.drain();

        h.transports.fail.set(true);
        h.clock.advance(5_000);

        assert_eq!(h.transports.count(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Failed);
        assert!(matches!(errors(&h.bus.drain())[..], [ChatError::Transport(_)]));
        assert_eq!(h.clock.pending(), 0);
    }

    #[test]
    fn test_backoff_policy_stops_after_max_attempts() {
        let config = ConnectionConfig {
            reconnect: ReconnectPolicy::Backoff {
                initial_ms: 1_000,
                max_ms: 8_000,
                max_attempts: Some(1),
            },
            ..ConnectionConfig::community()
        };
        let h = harness(ChatSurface::Community, config);
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });
        h.clock.advance(1_000);
        assert_eq!(h.transports.count(), 2);

        h.transports.emit(1, TransportEvent::Closed { code: 1006, was_clean: false });
        h.clock.advance(60_000);
        assert_eq!(h.transports.count(), 2);
        assert_eq!(h.manager.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_clean_close_does_not_reconnect() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.transports.emit(0, TransportEvent::Closed { code: 1000, was_clean: true });
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        h.clock.advance(10_000);
        assert_eq!(h.transports.count(), 1);
    }

    #[test]
    fn test_close_cancels_pending_reconnect() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Closed { code: 1006, was_clean: false });
        h.manager.close();
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        h.clock.advance(10_000);
        assert_eq!(h.transports.count(), 1);
    }

    #[test]
    fn test_close_closes_transport() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.manager.close();
        assert!(h.transports.is_closed(0));
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert_eq!(h.manager.send("late").unwrap_err(), ChatError::NotConnected);
    }

    #[test]
    fn test_open_timeout_reported_without_cancelling() {
        let h = peer();
        h.manager.open(ConnectTarget::pending(5u64, 9u64), &auth(buyer())).unwrap();
        h.bus.drain();

        h.clock.advance(5_000);
        assert_eq!(errors(&h.bus.drain()), vec![ChatError::Timeout(5_000)]);
        assert!(!h.transports.is_closed(0));

        // A late open still succeeds
        h.transports.emit(0, TransportEvent::Opened);
        assert!(h.manager.is_connected());
    }

    #[test]
    fn test_open_timeout_not_reported_once_open() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();
        h.clock.advance(10_000);
        assert!(errors(&h.bus.drain()).is_empty());
    }

    #[test]
    fn test_transport_error_only_reports() {
        let h = community();
        h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap();
        h.transports.emit(0, TransportEvent::Opened);
        h.bus.drain();

        h.transports.emit(0, TransportEvent::Error("network".to_string()));
        assert_eq!(errors(&h.bus.drain()).len(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Open);
        assert_eq!(h.clock.pending(), 0);
    }

    #[test]
    fn test_transport_factory_failure_sets_failed() {
        let h = community();
        h.transports.fail.set(true);
        let err = h.manager.open(ConnectTarget::Community, &auth(buyer())).unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
        assert_eq!(h.manager.state(), ConnectionState::Failed);
    }

    // ─── SessionStore Tests ──────────────────────────────────

    #[test]
    fn test_refresh_loads_sessions_from_buyer_view() {
        let store = SessionStore::new(buyer());
        let api = MockApi::new(chats_fixture());

        let count = block_on(store.refresh(&api)).unwrap();
        assert_eq!(count, 2);

        let sessions = store.sessions();
        assert_eq!(sessions[0].counterpart_name, "bob");
        assert!(sessions[0].messages.is_empty());
        assert_eq!(sessions[1].counterpart_user_id, EntityId::from(11u64));
        assert_eq!(sessions[1].preview().unwrap().content, "Still available");
    }

    #[test]
    fn test_refresh_seller_sees_buyer() {
        let store = SessionStore::new(seller());
        store.replace_from_value(chats_fixture());
        assert_eq!(store.sessions()[0].counterpart_name, "alice");
    }

    #[test]
    fn test_refresh_non_array_yields_empty() {
        let store = SessionStore::new(buyer());
        store.replace_from_value(chats_fixture());
        assert_eq!(store.len(), 2);

        let api = MockApi::new(json!({"error": "unexpected"}));
        let count = block_on(store.refresh(&api)).unwrap();
        assert_eq!(count, 0);
        assert!(store.is_empty());

        assert_eq!(store.replace_from_value(Value::Null), 0);
        assert_eq!(store.replace_from_value(json!("nope")), 0);
    }

    #[test]
    fn test_refresh_skips_unreadable_records() {
        let store = SessionStore::new(buyer());
        let count = store.replace_from_value(json!([
            {"book_title": "no ids"},
            {"chat_id": 3, "book_id": 8, "seller_id": 9}
        ]));
        assert_eq!(count, 1);
        assert_eq!(store.sessions()[0].id, EntityId::from(3u64));
    }

    #[test]
    fn test_refresh_http_failure_propagates() {
        let store = SessionStore::new(buyer());
        store.replace_from_value(chats_fixture());
        let api = MockApi::new(json!([]));
        api.fail_list.set(true);

        let err = block_on(store.refresh(&api)).unwrap_err();
        assert!(matches!(err, ChatError::ServerRejected { status: 500, .. }));
        assert_eq!(store.len(), 2, "cache untouched on failure");
    }

    #[test]
    fn test_find_by_book_and_counterpart_normalizes_ids() {
        let store = SessionStore::new(buyer());
        store.replace_from_value(chats_fixture());

        let a = store.find_by_book_and_counterpart(5u64, "9");
        let b = store.find_by_book_and_counterpart("5", 9u64);
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(a.unwrap().id, EntityId::from(1u64));

        let c = store.find_by_book_and_counterpart("6", " 11 ");
        assert_eq!(c.unwrap().id, EntityId::from(2u64));
        assert!(store.find_by_book_and_counterpart(5u64, 11u64).is_none());
    }

    #[test]
    fn test_snapshot_survives_refresh() {
        let store = SessionStore::new(buyer());
        store.replace_from_value(chats_fixture());
        let snapshot = store.sessions();
        store.replace_from_value(json!([]));
        assert_eq!(snapshot.len(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_from_server_event_refreshes_and_activates() {
        let store = SessionStore::new(buyer());
        let api = MockApi::new(json!([]));
        block_on(store.refresh(&api)).unwrap();

        *api.chats.borrow_mut() = chats_fixture();
        let session = block_on(store.upsert_from_server_event(&EntityId::from(2u64), &api)).unwrap();

        assert_eq!(api.list_calls.get(), 2);
        assert_eq!(session.unwrap().book_title, "Emma");
        assert_eq!(store.active(), Some(EntityId::from(2u64)));
        assert_eq!(store.active_session().unwrap().book_title, "Emma");
    }

    #[test]
    fn test_upsert_unknown_session_leaves_active() {
        let store = SessionStore::new(buyer());
        let api = MockApi::new(chats_fixture());
        store.set_active(Some(EntityId::from(1u64)));

        let session = block_on(store.upsert_from_server_event(&EntityId::from(99u64), &api)).unwrap();
        assert!(session.is_none());
        assert_eq!(store.active(), Some(EntityId::from(1u64)));

        store.clear_active();
        assert!(store.active_session().is_none());
    }

    // ─── MessageReconciler Tests ─────────────────────────────

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn live(id: &str, sender: u64, content: &str, secs: i64) -> Message {
        Message {
            id: EntityId::new(id),
            session_id: Some(EntityId::from(1u64)),
            sender_id: EntityId::from(sender),
            sender_name: String::new(),
            content: content.to_string(),
            created_at: t(secs),
            is_self: sender == 7,
            origin: MessageOrigin::Live,
            client_ref: None,
        }
    }

    fn outbound(content: &str, secs: i64) -> OutboundMessage {
        OutboundMessage {
            content: content.to_string(),
            session_id: Some(EntityId::from(1u64)),
            client_ref: format!("ref-{}", content),
            sent_at: t(secs),
        }
    }

    fn history_fixture() -> Value {
        json!([
            {"id": 3, "sender_id": 9, "sender_name": "bob", "content": "third", "created_at": "2024-03-01T11:00:03Z"},
            {"id": 1, "sender_id": 7, "sender_name": "alice", "content": "first", "created_at": "2024-03-01T11:00:01Z"},
            {"id": 2, "sender_id": 9, "sender_name": "bob", "content": "second", "created_at": "2024-03-01T11:00:01Z"},
            {"id": 1, "sender_id": 7, "sender_name": "alice", "content": "first", "created_at": "2024-03-01T11:00:01Z"}
        ])
    }

    #[test]
    fn test_seed_history_sorts_and_dedups() {
        let mut reconciler = MessageReconciler::for_session(ReconcileMode::AppendOnly, EntityId::from(1u64));
        let count = reconciler.seed_history(history_fixture(), &buyer());
        assert_eq!(count, 3);

        let ids: Vec<&str> = reconciler.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(reconciler.messages()[0].is_self);
        assert!(reconciler.messages().iter().all(|m| m.origin == MessageOrigin::History));
    }

    #[test]
    fn test_seed_history_drops_non_adjacent_duplicates() {
        let mut reconciler = MessageReconciler::default();
        let count = reconciler.seed_history(
            json!([
                {"id": 1, "sender_id": 9, "content": "first", "created_at": "2024-03-01T11:00:00Z"},
                {"id": 2, "sender_id": 9, "content": "second", "created_at": "2024-03-01T11:00:01Z"},
                {"id": 1, "sender_id": 9, "content": "first", "created_at": "2024-03-01T11:00:02Z"}
            ]),
            &buyer(),
        );
        assert_eq!(count, 2);
        let ids: Vec<&str> = reconciler.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(reconciler.messages()[0].created_at, t(-3_600));
    }

    #[test]
    fn test_seed_history_accepts_object_and_garbage() {
        let mut reconciler = MessageReconciler::default();
        let count = reconciler.seed_history(json!({"messages": history_fixture()}), &buyer());
        assert_eq!(count, 3);

        let mut reconciler = MessageReconciler::default();
        assert_eq!(reconciler.seed_history(json!("oops"), &buyer()), 0);
        assert!(reconciler.is_seeded());
    }

    #[test]
    fn test_seed_history_only_once() {
        let mut reconciler = MessageReconciler::default();
        reconciler.seed_history(history_fixture(), &buyer());
        assert_eq!(reconciler.seed_history(history_fixture(), &buyer()), 0);
        assert_eq!(reconciler.len(), 3);

        reconciler.reset(Some(EntityId::from(2u64)));
        assert!(reconciler.is_empty());
        assert_eq!(reconciler.seed_history(history_fixture(), &buyer()), 3);
    }

    #[test]
    fn test_live_before_history_stays_after_it() {
        let mut reconciler = MessageReconciler::default();
        reconciler.apply_live(live("50", 9, "early live", 0));
        reconciler.seed_history(history_fixture(), &buyer());

        assert_eq!(reconciler.len(), 4);
        assert_eq!(reconciler.messages()[3].content, "early live");
    }

    #[test]
    fn test_append_only_length_is_events_plus_optimistic() {
        let user = buyer();
        let mut reconciler = MessageReconciler::default();
        reconciler.seed_history(history_fixture(), &user);
        let seeded = reconciler.len();

        reconciler.push_optimistic(&outbound("hello", 10), &user);
        let echo = Message {
            id: EntityId::from(60u64),
            ..live("60", 7, "hello", 10)
        };
        let events = vec![
            live("59", 9, "hi", 9),
            echo,
            live("61", 9, "how are you", 11),
            live("61", 9, "how are you", 11),
        ];
        let event_count = events.len();
        for event in events {
            assert!(reconciler.apply_live(event));
        }

        assert_eq!(reconciler.len(), seeded + event_count + 1);

        // Current behavior: the optimistic copy and its echo both show.
        let duplicates = reconciler.duplicate_candidates();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].content, "hello");
    }

    #[test]
    fn test_live_arrival_order_is_display_order() {
        let mut reconciler = MessageReconciler::default();
        reconciler.apply_live(live("5", 9, "later", 20));
        reconciler.apply_live(live("4", 9, "earlier", 10));
        let contents: Vec<&str> = reconciler.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["later", "earlier"]);
    }

    #[test]
    fn test_optimistic_message_shape() {
        let user = buyer();
        let mut reconciler = MessageReconciler::default();
        let message = reconciler.push_optimistic(&outbound("hi", 0), &user).clone();
        assert!(message.id.as_str().starts_with("local-"));
        assert!(message.is_self);
        assert_eq!(message.sender_name, "alice");
        assert_eq!(message.client_ref.as_deref(), Some("ref-hi"));

        let second = reconciler.push_optimistic(&outbound("hi", 0), &user).clone();
        assert_ne!(message.id, second.id);
        assert_eq!(reconciler.pending_optimistic().len(), 2);
    }

    #[test]
    fn test_correlated_replaces_optimistic_by_client_ref() {
        let user = buyer();
        let mut reconciler = MessageReconciler::new(ReconcileMode::Correlated);
        reconciler.push_optimistic(&outbound("hello", 0), &user);
        reconciler.apply_live(live("2", 9, "interleaved", 1));

        let echo = Message {
            client_ref: Some("ref-hello".to_string()),
            ..live("70", 7, "hello", 2)
        };
        assert!(reconciler.apply_live(echo));

        assert_eq!(reconciler.len(), 2);
        assert_eq!(reconciler.messages()[0].id, EntityId::from(70u64));
        assert!(reconciler.pending_optimistic().is_empty());
        assert!(reconciler.duplicate_candidates().is_empty());
    }

    #[test]
    fn test_correlated_matches_by_content_without_client_ref() {
        let user = buyer();
        let mut reconciler = MessageReconciler::new(ReconcileMode::Correlated);
        reconciler.push_optimistic(&outbound("same", 0), &user);
        reconciler.push_optimistic(&outbound("same", 1), &user);

        reconciler.apply_live(live("80", 7, "same", 2));
        assert_eq!(reconciler.len(), 2);
        assert_eq!(reconciler.messages()[0].id, EntityId::from(80u64));
        assert_eq!(reconciler.pending_optimistic().len(), 1);
    }

    #[test]
    fn test_correlated_drops_known_ids() {
        let user = buyer();
        let mut reconciler = MessageReconciler::new(ReconcileMode::Correlated);
        reconciler.seed_history(history_fixture(), &user);
        assert!(!reconciler.apply_live(live("3", 9, "third", 3)));
        assert!(reconciler.apply_live(live("4", 9, "fourth", 4)));
        assert_eq!(reconciler.len(), 4);
    }

    #[test]
    fn test_correlated_other_sender_not_matched() {
        let user = buyer();
        let mut reconciler = MessageReconciler::new(ReconcileMode::Correlated);
        reconciler.push_optimistic(&outbound("hi", 0), &user);
        reconciler.apply_live(live("9", 9, "hi", 1));
        assert_eq!(reconciler.len(), 2);
        assert_eq!(reconciler.pending_optimistic().len(), 1);
    }

    // ─── AuthStore Tests ─────────────────────────────────────

    #[test]
    fn test_auth_store_round_trip_and_logout() {
        let storage = Rc::new(MemStorage::default());
        let store = AuthStore::new(storage.clone());
        assert!(block_on(store.load()).unwrap().is_none());
        assert_eq!(block_on(store.require()).unwrap_err(), ChatError::AuthRequired);

        let session = AuthSession::new("abc", buyer());
        block_on(store.store(&session)).unwrap();
        assert_eq!(block_on(store.load()).unwrap(), Some(session.clone()));
        assert_eq!(session.bearer(), "Bearer abc");

        block_on(store.logout()).unwrap();
        assert!(!block_on(store.is_authenticated()));
    }

    #[test]
    fn test_auth_store_corrupt_profile_is_signed_out() {
        let storage = Rc::new(MemStorage::default());
        block_on(storage.set(TOKEN_KEY, b"abc")).unwrap();
        block_on(storage.set(USER_KEY, b"{not json")).unwrap();
        let store = AuthStore::new(storage);
        assert!(block_on(store.load()).unwrap().is_none());
    }

    #[test]
    fn test_auth_store_reads_login_page_profile() {
        let storage = Rc::new(MemStorage::default());
        block_on(storage.set(TOKEN_KEY, b"abc")).unwrap();
        block_on(storage.set(
            USER_KEY,
            br#"{"id":7,"username":"alice","email":"a@example.com","role":"buyer"}"#,
        ))
        .unwrap();
        let session = block_on(AuthStore::new(storage).require()).unwrap();
        assert_eq!(session.user.id, EntityId::from(7u64));
        assert_eq!(session.user.role, Role::Buyer);
    }

    // ─── CartStore Tests ─────────────────────────────────────

    fn cart_item(id: u64, price: f64) -> CartItem {
        CartItem {
            id: EntityId::from(id),
            title: format!("Book {}", id),
            author: "Anon".to_string(),
            price,
            seller_id: Some(EntityId::from(9u64)),
            seller_username: Some("bob".to_string()),
            image_url: None,
            quantity: 1,
        }
    }

    #[test]
    fn test_cart_add_increments_existing() {
        let cart = CartStore::new(Rc::new(MemStorage::default()));
        block_on(cart.add(cart_item(1, 100.0))).unwrap();
        block_on(cart.add(cart_item(2, 50.0))).unwrap();
        let items = block_on(cart.add(cart_item(1, 100.0))).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(block_on(cart.count()).unwrap(), 3);
    }

    #[test]
    fn test_cart_rejects_invalid_items() {
        let cart = CartStore::new(Rc::new(MemStorage::default()));
        assert!(matches!(
            block_on(cart.add(cart_item(1, 0.0))),
            Err(ChatError::Validation(_))
        ));
        let mut untitled = cart_item(2, 10.0);
        untitled.title = String::new();
        assert!(block_on(cart.add(untitled)).is_err());
        assert!(block_on(cart.items()).unwrap().is_empty());
    }

    #[test]
    fn test_cart_update_quantity_clamps_and_remove() {
        let cart = CartStore::new(Rc::new(MemStorage::default()));
        block_on(cart.add(cart_item(1, 100.0))).unwrap();

        let items = block_on(cart.update_quantity(&EntityId::from(1u64), 0)).unwrap();
        assert_eq!(items[0].quantity, 1);
        let items = block_on(cart.update_quantity(&EntityId::from(1u64), 4)).unwrap();
        assert_eq!(items[0].quantity, 4);
        assert!(matches!(
            block_on(cart.update_quantity(&EntityId::from(5u64), 2)),
            Err(ChatError::NotFound(_))
        ));

        assert!(block_on(cart.remove(&EntityId::from(1u64))).unwrap().is_empty());
        block_on(cart.add(cart_item(3, 10.0))).unwrap();
        block_on(cart.clear()).unwrap();
        assert_eq!(block_on(cart.count()).unwrap(), 0);
    }

    #[test]
    fn test_cart_corrupt_storage_reads_empty() {
        let storage = Rc::new(MemStorage::default());
        block_on(storage.set(CART_KEY, b"[{broken")).unwrap();
        let cart = CartStore::new(storage);
        assert!(block_on(cart.items()).unwrap().is_empty());
    }

    #[test]
    fn test_cart_summary_and_codes() {
        let mut item = cart_item(1, 100.0);
        item.quantity = 2;
        let items = vec![item, cart_item(2, 50.0)];

        let summary = CartSummary::compute(&items, discount_for_code("books20").unwrap());
        assert_eq!(summary.subtotal, 250.0);
        assert_eq!(summary.shipping, SHIPPING_FEE);
        assert_eq!(summary.discount, 50.0);
        assert_eq!(summary.total, 240.0);

        let empty = CartSummary::compute(&[], 10);
        assert_eq!(empty.total, 0.0);

        assert_eq!(discount_for_code("WELCOME10"), Some(10));
        assert_eq!(discount_for_code(" summer30 "), Some(30));
        assert_eq!(discount_for_code("FREEBOOKS"), None);
    }

    // ─── AssistantChat Tests ─────────────────────────────────

    #[test]
    fn test_assistant_starts_with_welcome() {
        let chat = AssistantChat::new();
        assert_eq!(chat.transcript().len(), 1);
        assert_eq!(chat.transcript()[0].role, AssistantRole::Assistant);
        assert_eq!(chat.transcript()[0].text, WELCOME_TEXT);
    }

    #[test]
    fn test_assistant_ignores_blank_query() {
        let mut chat = AssistantChat::new();
        let api = MockApi::new(json!([]));
        assert!(!block_on(chat.ask(&api, "   ")));
        assert_eq!(chat.transcript().len(), 1);
    }

    #[test]
    fn test_assistant_formats_recommendations() {
        let mut chat = AssistantChat::new();
        let api = MockApi::new(json!([]));
        *api.reply.borrow_mut() = Ok(ChatbotReply {
            response: "Here are some picks.".to_string(),
            books: vec![BookSummary {
                id: EntityId::from(12u64),
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                price: Some(299.0),
                image_url: None,
                seller_id: None,
                seller_username: None,
            }],
        });

        assert!(block_on(chat.ask(&api, "sci-fi please")));
        let turns = chat.transcript();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, AssistantRole::User);
        assert_eq!(turns[1].text, "sci-fi please");
        assert_eq!(
            turns[2].text,
            "Here are some picks.\n\n**Book Recommendations:**\n- [Dune by Frank Herbert](book-detail.html?id=12)"
        );
        assert!(!chat.is_waiting());
    }

    #[test]
    fn test_assistant_failure_and_empty_reply() {
        let mut chat = AssistantChat::new();
        let api = MockApi::new(json!([]));

        *api.reply.borrow_mut() = Err(ChatError::Network("offline".to_string()));
        block_on(chat.ask(&api, "hello"));
        assert_eq!(chat.transcript()[2].text, ERROR_REPLY_TEXT);

        *api.reply.borrow_mut() = Ok(ChatbotReply::default());
        block_on(chat.ask(&api, "hello again"));
        assert_eq!(chat.transcript()[4].text, EMPTY_REPLY_TEXT);
    }

    #[test]
    fn test_assistant_begin_marks_waiting() {
        let mut chat = AssistantChat::new();
        assert_eq!(chat.begin("  romance  ").as_deref(), Some("romance"));
        assert!(chat.is_waiting());
        chat.complete(Ok(ChatbotReply {
            response: "Try Emma.".to_string(),
            books: Vec::new(),
        }));
        assert!(!chat.is_waiting());
        assert_eq!(chat.transcript().last().unwrap().text, "Try Emma.");
    }
}
