//! Connection manager: one real-time socket per chat surface.
//!
//! Lifecycle:
//! 1. `open(target)` validates the target, releases any previous socket and
//!    starts connecting (`Connecting`)
//! 2. The transport reports `Opened` (`Open`); the peer surface then sends
//!    its auth frame (`Authenticated`)
//! 3. Inbound frames are decoded and published on the event bus
//! 4. `close()`, a superseding `open()` or a transport close ends it
//!
//! Every `open` starts a new generation. Callbacks from a socket of an older
//! generation are dropped, so at most one socket is ever treated as current.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use bookbridge_types::{
    ChatError, Result,
    config::{ConnectionConfig, EndpointConfig},
    connection::{ChatSurface, ConnectTarget, ConnectionState},
    event::ChatEvent,
    frame::{OutboundFrame, PeerFrame, WireMessage},
    message::OutboundMessage,
};
use serde_json::Value;

use crate::auth::AuthSession;
use crate::endpoint::connection_url;
use crate::event_bus::EventBus;
use crate::ports::{ClockPort, TimerHandle, Transport, TransportEvent, TransportPort, TransportSink};

const CONNECTION_ERROR: &str = "Connection error. Please try again.";
const CONNECTION_LOST: &str = "Connection lost. Please try reconnecting.";

/// Whether a connect starts a new reconnect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Fresh,
    Retry,
}

/// Owns the single live connection of one chat surface. Clone-cheap; all
/// clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Rc<RefCell<Inner>>,
    deps: Rc<Deps>,
}

struct Deps {
    surface: ChatSurface,
    endpoint: EndpointConfig,
    config: ConnectionConfig,
    transports: Rc<dyn TransportPort>,
    clock: Rc<dyn ClockPort>,
    event_bus: EventBus,
}

struct Inner {
    state: ConnectionState,
    generation: u64,
    transport: Option<Box<dyn Transport>>,
    target: Option<ConnectTarget>,
    auth: Option<AuthSession>,
    reconnect_attempts: u32,
    /// Numbers unnumbered inbound messages; never reset, so synthesized
    /// ids stay unique for the lifetime of the manager.
    live_seq: u64,
    open_timer: Option<TimerHandle>,
    reconnect_timer: Option<TimerHandle>,
}

impl ConnectionManager {
    pub fn new(
        surface: ChatSurface,
        endpoint: EndpointConfig,
        config: ConnectionConfig,
        transports: Rc<dyn TransportPort>,
        clock: Rc<dyn ClockPort>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: ConnectionState::Disconnected,
                generation: 0,
                transport: None,
                target: None,
                auth: None,
                reconnect_attempts: 0,
                live_seq: 0,
                open_timer: None,
                reconnect_timer: None,
            })),
            deps: Rc::new(Deps {
                surface,
                endpoint,
                config,
                transports,
                clock,
                event_bus,
            }),
        }
    }

    pub fn surface(&self) -> ChatSurface {
        self.deps.surface
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.borrow().state
    }

    pub fn target(&self) -> Option<ConnectTarget> {
        self.inner.borrow().target.clone()
    }

    /// Automatic reconnects scheduled since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.borrow().reconnect_attempts
    }

    pub fn is_connected(&self) -> bool {
        self.state().accepts_sends()
    }

    /// Open a connection for `target`, superseding any current one.
    ///
    /// Invalid targets are rejected before anything else happens: the error
    /// is published for the UI and returned, no transport is created and
    /// the current connection is left alone.
    pub fn open(&self, target: ConnectTarget, auth: &AuthSession) -> Result<()> {
        self.connect(target, auth.clone(), Attempt::Fresh)
    }

    /// Re-open the last target with the last credentials.
    pub fn reconnect(&self) -> Result<()> {
        let (target, auth) = {
            let inner = self.inner.borrow();
            (inner.target.clone(), inner.auth.clone())
        };
        match (target, auth) {
            (Some(target), Some(auth)) => {
                log::info!("{} reconnecting", self.deps.surface.label());
                self.connect(target, auth, Attempt::Retry)
            }
            _ => Err(ChatError::Validation("No chat selected to reconnect".to_string())),
        }
    }

    /// Send the auth frame on an open socket. The handshake may already have
    /// authenticated through the URL; this is the in-band path.
    pub fn authenticate(&self) -> Result<()> {
        let token = {
            let inner = self.inner.borrow();
            if !inner.state.accepts_sends() {
                return Err(ChatError::NotConnected);
            }
            inner
                .auth
                .as_ref()
                .map(|a| a.token.clone())
                .ok_or(ChatError::AuthRequired)?
        };
        self.send_frame(&OutboundFrame::Auth { token })?;
        self.set_state(ConnectionState::Authenticated);
        Ok(())
    }

    /// Transmit a chat message. Nothing is queued: when the socket is not
    /// open this fails with `NotConnected` and the caller retries later.
    pub fn send(&self, content: &str) -> Result<OutboundMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation("Message is empty".to_string()));
        }

        let session_id = {
            let inner = self.inner.borrow();
            if !inner.state.accepts_sends() {
                return Err(ChatError::NotConnected);
            }
            inner.target.as_ref().and_then(|t| t.session_id().cloned())
        };

        let client_ref = uuid::Uuid::new_v4().to_string();
        let frame = OutboundFrame::Message {
            content: content.to_string(),
            chat_id: session_id.clone(),
            client_ref: self.deps.config.correlate_echoes.then(|| client_ref.clone()),
        };
        self.send_frame(&frame)?;

        Ok(OutboundMessage {
            content: content.to_string(),
            session_id,
            client_ref,
            sent_at: self.deps.clock.now(),
        })
    }

    /// Close the current connection, if any. No reconnect follows.
    pub fn close(&self) {
        if self.release() {
            log::info!("{} connection closed", self.deps.surface.label());
        }
        self.set_state(ConnectionState::Disconnected);
    }

    // ─── Internals ───────────────────────────────────────────

    fn connect(&self, target: ConnectTarget, auth: AuthSession, attempt: Attempt) -> Result<()> {
        if target.surface() != self.deps.surface {
            let err = ChatError::Validation(format!(
                "{} connection cannot open a {} target",
                self.deps.surface.label(),
                target.surface().label()
            ));
            self.report(err.clone());
            return Err(err);
        }

        let url = match connection_url(&self.deps.endpoint, &self.deps.config, &target, &auth) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("{} open rejected: {}", self.deps.surface.label(), e);
                self.report(e.clone());
                return Err(e);
            }
        };

        self.release();

        let generation = {
            let mut inner = self.inner.borrow_mut();
            if attempt == Attempt::Fresh {
                inner.reconnect_attempts = 0;
            }
            inner.generation += 1;
            inner.target = Some(target);
            inner.auth = Some(auth);
            inner.generation
        };
        self.set_state(ConnectionState::Connecting);
        log::info!("{} connecting (generation {})", self.deps.surface.label(), generation);

        let transport = match self.deps.transports.connect(&url, self.sink(generation)) {
            Ok(transport) => transport,
            Err(e) => {
                log::error!("{} transport failed to start: {}", self.deps.surface.label(), e);
                self.set_state(ConnectionState::Failed);
                let err = ChatError::Transport(format!("Failed to create connection: {}", e));
                self.report(err.clone());
                return Err(err);
            }
        };

        let timeout_ms = self.deps.config.open_timeout_ms;
        let weak = Rc::downgrade(&self.inner);
        let deps = self.deps.clone();
        let open_timer = self.deps.clock.schedule(
            timeout_ms,
            Box::new(move || {
                if let Some(manager) = Self::upgrade(&weak, &deps) {
                    manager.on_open_timeout(generation);
                }
            }),
        );

        let mut inner = self.inner.borrow_mut();
        inner.transport = Some(transport);
        inner.open_timer = Some(open_timer);
        Ok(())
    }

    /// Drop the current socket and its timers. Returns whether there was one.
    fn release(&self) -> bool {
        let (transport, timers) = {
            let mut inner = self.inner.borrow_mut();
            // Anything still in flight from the old socket is now stale.
            inner.generation += 1;
            if inner.transport.is_some() {
                inner.state = ConnectionState::Closing;
            }
            let timers = [inner.open_timer.take(), inner.reconnect_timer.take()];
            (inner.transport.take(), timers)
        };
        for handle in timers.into_iter().flatten() {
            self.deps.clock.cancel(handle);
        }
        match transport {
            Some(transport) => {
                transport.close();
                true
            }
            None => false,
        }
    }

    fn sink(&self, generation: u64) -> TransportSink {
        let weak = Rc::downgrade(&self.inner);
        let deps = self.deps.clone();
        Rc::new(move |event| {
            if let Some(manager) = Self::upgrade(&weak, &deps) {
                manager.handle_event(generation, event);
            }
        })
    }

    fn upgrade(weak: &Weak<RefCell<Inner>>, deps: &Rc<Deps>) -> Option<Self> {
        weak.upgrade().map(|inner| Self {
            inner,
            deps: deps.clone(),
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.borrow().generation == generation
    }

    fn handle_event(&self, generation: u64, event: TransportEvent) {
        if !self.is_current(generation) {
            log::debug!(
                "{} ignoring event from superseded connection: {:?}",
                self.deps.surface.label(),
                event
            );
            return;
        }

        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Text(text) => self.on_text(&text),
            TransportEvent::Error(message) => {
                log::error!("{} socket error: {}", self.deps.surface.label(), message);
                self.report(ChatError::Transport(CONNECTION_ERROR.to_string()));
            }
            TransportEvent::Closed { code, was_clean } => self.on_closed(code, was_clean),
        }
    }

    fn on_opened(&self) {
        let open_timer = {
            let mut inner = self.inner.borrow_mut();
            inner.reconnect_attempts = 0;
            inner.open_timer.take()
        };
        if let Some(handle) = open_timer {
            self.deps.clock.cancel(handle);
        }
        log::info!("{} connection established", self.deps.surface.label());
        self.set_state(ConnectionState::Open);

        if self.deps.config.send_auth_frame {
            if let Err(e) = self.authenticate() {
                log::warn!("{} auth frame not sent: {}", self.deps.surface.label(), e);
            }
        }
    }

    fn on_text(&self, text: &str) {
        match self.deps.surface {
            ChatSurface::Peer => match PeerFrame::parse(text) {
                Ok(frame) => self.on_peer_frame(frame),
                Err(e) => log::warn!("Unreadable chat frame: {}", e),
            },
            ChatSurface::Community => match WireMessage::parse(text) {
                Ok(wire) => self.publish_message(wire),
                Err(e) => log::warn!("Unreadable community frame: {}", e),
            },
        }
    }

    fn on_peer_frame(&self, frame: PeerFrame) {
        match frame {
            PeerFrame::Message(wire) => self.publish_message(wire),
            PeerFrame::ChatCreated { chat_id } => {
                log::info!("Chat session {} created", chat_id);
                if let Some(ConnectTarget::Peer { session_id, .. }) =
                    self.inner.borrow_mut().target.as_mut()
                {
                    *session_id = chat_id.clone();
                }
                self.deps
                    .event_bus
                    .emit(ChatEvent::SessionCreated { session_id: chat_id });
            }
            PeerFrame::History { data, messages } => {
                let count = data
                    .or(messages)
                    .as_ref()
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                log::debug!("Server pushed {} history messages", count);
                self.deps.event_bus.emit(ChatEvent::HistoryNotice {
                    surface: self.deps.surface,
                    count,
                });
            }
            PeerFrame::Error { content } => {
                log::error!("Chat server error: {}", content);
                self.report(ChatError::Transport(content));
            }
            PeerFrame::ConnectionSuccess { content } => {
                log::info!("Connection success: {}", content);
            }
            PeerFrame::Unknown => log::debug!("Unknown chat frame type"),
        }
    }

    fn publish_message(&self, wire: WireMessage) {
        let (user, seq) = {
            let mut inner = self.inner.borrow_mut();
            let Some(user) = inner.auth.as_ref().map(|auth| auth.user.clone()) else {
                return;
            };
            inner.live_seq += 1;
            (user, inner.live_seq)
        };
        let message = wire.into_message(&user, self.deps.clock.now(), seq);
        self.deps.event_bus.emit(ChatEvent::MessageReceived {
            surface: self.deps.surface,
            message,
        });
    }

    fn on_closed(&self, code: u16, was_clean: bool) {
        let open_timer = {
            let mut inner = self.inner.borrow_mut();
            inner.transport = None;
            inner.open_timer.take()
        };
        if let Some(handle) = open_timer {
            self.deps.clock.cancel(handle);
        }

        if was_clean {
            log::info!("{} connection closed (code {})", self.deps.surface.label(), code);
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        log::warn!("{} connection lost (code {})", self.deps.surface.label(), code);
        self.set_state(ConnectionState::Failed);
        self.report(ChatError::Transport(CONNECTION_LOST.to_string()));
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&self) {
        let (attempt, generation) = {
            let inner = self.inner.borrow();
            (inner.reconnect_attempts + 1, inner.generation)
        };
        let Some(delay_ms) = self.deps.config.reconnect.delay_for(attempt) else {
            return;
        };

        self.inner.borrow_mut().reconnect_attempts = attempt;
        log::info!(
            "{} reconnect attempt {} in {}ms",
            self.deps.surface.label(),
            attempt,
            delay_ms
        );
        self.deps.event_bus.emit(ChatEvent::ReconnectScheduled {
            surface: self.deps.surface,
            attempt,
            delay_ms,
        });

        let weak = Rc::downgrade(&self.inner);
        let deps = self.deps.clone();
        let handle = self.deps.clock.schedule(
            delay_ms,
            Box::new(move || {
                let Some(manager) = Self::upgrade(&weak, &deps) else {
                    return;
                };
                if !manager.is_current(generation) {
                    return;
                }
                manager.inner.borrow_mut().reconnect_timer = None;
                // Failures are already reported on the bus.
                if let Err(e) = manager.reconnect() {
                    log::debug!(
                        "{} reconnect attempt {} stopped: {}",
                        manager.deps.surface.label(),
                        manager.reconnect_attempts(),
                        e
                    );
                }
            }),
        );
        self.inner.borrow_mut().reconnect_timer = Some(handle);
    }

    fn on_open_timeout(&self, generation: u64) {
        let timed_out = {
            let mut inner = self.inner.borrow_mut();
            if inner.generation != generation {
                return;
            }
            inner.open_timer = None;
            inner.state == ConnectionState::Connecting
        };
        if timed_out {
            // The attempt itself keeps running; a late `Opened` still wins.
            let ms = self.deps.config.open_timeout_ms;
            log::warn!("{} connection not open after {}ms", self.deps.surface.label(), ms);
            self.report(ChatError::Timeout(ms));
        }
    }

    fn send_frame(&self, frame: &OutboundFrame) -> Result<()> {
        let json = frame.to_json()?;
        let inner = self.inner.borrow();
        let transport = inner.transport.as_ref().ok_or(ChatError::NotConnected)?;
        transport.send_text(&json)
    }

    fn set_state(&self, state: ConnectionState) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state == state {
                return;
            }
            inner.state = state;
        }
        self.deps.event_bus.emit(ChatEvent::StateChanged {
            surface: self.deps.surface,
            state,
        });
    }

    fn report(&self, error: ChatError) {
        self.deps.event_bus.emit(ChatEvent::Error {
            surface: self.deps.surface,
            error,
        });
    }
}
