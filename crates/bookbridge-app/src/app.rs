//! Main egui application: composes the panels and drives the chat core.
//!
//! Async work (storage, REST) runs in `spawn_local` tasks that report back
//! through an unbounded channel drained at the top of every frame, next to
//! the core's event bus. Nothing borrows app state across an await.

use std::rc::Rc;
use std::time::Duration;

use egui::{self, CentralPanel, RichText, TopBottomPanel};
use futures::channel::mpsc;
use serde_json::Value;

use bookbridge_core::auth::{AuthSession, AuthStore};
use bookbridge_core::connection::ConnectionManager;
use bookbridge_core::event_bus::EventBus;
use bookbridge_core::ports::{ChatApiPort, ClockPort, StoragePort, TransportPort};
use bookbridge_core::session_store::SessionStore;
use bookbridge_platform::storage::auto_detect_storage;
use bookbridge_platform::{
    BrowserClock, RestChatApi, WebSocketTransportFactory, endpoint_from_location, navigate,
    query_param,
};
use bookbridge_types::{
    ChatError, EntityId, Result,
    catalog::ChatbotReply,
    config::ChatConfig,
    connection::{ChatSurface, ConnectTarget},
    session::ChatSession,
    user::Role,
};
use bookbridge_ui::panels::{PanelAction, assistant, chat, community};
use bookbridge_ui::state::{LoadState, Tab, UiState};
use bookbridge_ui::theme;

const CONFIG_STORAGE_KEY: &str = "bookbridge:config";
const LOGIN_PAGE: &str = "login.html?redirect=chat.html";
const API_BASE: &str = "/api";

/// Results of async tasks, applied on the UI thread
enum AppMsg {
    ConfigRestored(ChatConfig),
    SignedIn(AuthSession),
    SignedOut,
    SessionsLoaded(Result<usize>),
    SessionUpserted(Result<Option<ChatSession>>),
    HistoryLoaded {
        session_id: EntityId,
        result: Result<Value>,
    },
    AssistantReply(Result<ChatbotReply>),
}

/// What the page URL asked to open
enum Deeplink {
    Session(EntityId),
    Pending { book_id: EntityId, seller_id: EntityId },
}

/// The main application state
pub struct BookBridgeApp {
    ui_state: UiState,
    config: ChatConfig,
    ctx: egui::Context,
    event_bus: EventBus,
    storage: Rc<dyn StoragePort>,
    auth_store: AuthStore,
    api: Rc<RestChatApi>,
    transports: Rc<dyn TransportPort>,
    clock: Rc<dyn ClockPort>,
    peer: ConnectionManager,
    community: ConnectionManager,
    auth: Option<AuthSession>,
    sessions: Option<SessionStore>,
    deeplink: Option<Deeplink>,
    inbox_tx: mpsc::UnboundedSender<AppMsg>,
    inbox_rx: mpsc::UnboundedReceiver<AppMsg>,
    first_frame: bool,
}

impl BookBridgeApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut config = ChatConfig::default();
        match endpoint_from_location(API_BASE) {
            Ok(endpoint) => config.endpoint = endpoint,
            Err(e) => log::warn!("Using default endpoint: {}", e),
        }

        let storage = auto_detect_storage();
        let event_bus = EventBus::new();
        let transports: Rc<dyn TransportPort> = Rc::new(WebSocketTransportFactory::new());
        let clock: Rc<dyn ClockPort> = Rc::new(BrowserClock::new());
        let (peer, community) = Self::connections(&config, &transports, &clock, &event_bus);
        let (inbox_tx, inbox_rx) = mpsc::unbounded();

        let app = Self {
            ui_state: UiState::new(config.reconcile),
            api: Rc::new(RestChatApi::new(config.endpoint.clone())),
            config,
            ctx: cc.egui_ctx.clone(),
            event_bus,
            auth_store: AuthStore::new(storage.clone()),
            storage,
            transports,
            clock,
            peer,
            community,
            auth: None,
            sessions: None,
            deeplink: Self::read_deeplink(),
            inbox_tx,
            inbox_rx,
            first_frame: true,
        };

        app.startup();
        app
    }

    fn connections(
        config: &ChatConfig,
        transports: &Rc<dyn TransportPort>,
        clock: &Rc<dyn ClockPort>,
        event_bus: &EventBus,
    ) -> (ConnectionManager, ConnectionManager) {
        let manager = |surface, connection| {
            ConnectionManager::new(
                surface,
                config.endpoint.clone(),
                connection,
                transports.clone(),
                clock.clone(),
                event_bus.clone(),
            )
        };
        (
            manager(ChatSurface::Peer, config.peer.clone()),
            manager(ChatSurface::Community, config.community.clone()),
        )
    }

    fn read_deeplink() -> Option<Deeplink> {
        if let Some(chat_id) = query_param("chat_id") {
            return Some(Deeplink::Session(EntityId::new(chat_id)));
        }
        let book_id = query_param("book_id")?;
        let seller_id = query_param("seller_id")?;
        Some(Deeplink::Pending {
            book_id: EntityId::new(book_id),
            seller_id: EntityId::new(seller_id),
        })
    }

    // ─── Async tasks ─────────────────────────────────────────

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = AppMsg> + 'static,
    {
        let tx = self.inbox_tx.clone();
        let ctx = self.ctx.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let msg = task.await;
            // The receiver only goes away with the app.
            let _ = tx.unbounded_send(msg);
            ctx.request_repaint();
        });
    }

    /// Restore (or seed) the persisted config, then read the login.
    fn startup(&self) {
        let storage = self.storage.clone();
        let auth_store = self.auth_store.clone();
        let defaults = self.config.clone();
        let tx = self.inbox_tx.clone();
        let ctx = self.ctx.clone();

        wasm_bindgen_futures::spawn_local(async move {
            match storage.get(CONFIG_STORAGE_KEY).await {
                Ok(Some(data)) => match serde_json::from_slice::<ChatConfig>(&data) {
                    Ok(config) => {
                        log::info!("Config restored from storage");
                        let _ = tx.unbounded_send(AppMsg::ConfigRestored(config));
                    }
                    Err(e) => log::warn!("Stored config unreadable, using defaults: {}", e),
                },
                Ok(None) => Self::save_config(storage.as_ref(), &defaults).await,
                Err(e) => log::warn!("Config storage unavailable: {}", e),
            }

            let msg = match auth_store.load().await {
                Ok(Some(session)) => AppMsg::SignedIn(session),
                Ok(None) => AppMsg::SignedOut,
                Err(e) => {
                    log::error!("Failed to read login: {}", e);
                    AppMsg::SignedOut
                }
            };
            let _ = tx.unbounded_send(msg);
            ctx.request_repaint();
        });
    }

    async fn save_config(storage: &dyn StoragePort, config: &ChatConfig) {
        match serde_json::to_vec(config) {
            Ok(json) => match storage.set(CONFIG_STORAGE_KEY, &json).await {
                Ok(()) => log::info!("Config saved to storage"),
                Err(e) => log::warn!("Config not saved: {}", e),
            },
            Err(e) => log::warn!("Config not serializable: {}", e),
        }
    }

    fn refresh_sessions(&mut self) {
        let Some(store) = self.sessions.clone() else {
            return;
        };
        self.ui_state.sessions_load = LoadState::Loading;
        let api = self.api.clone();
        self.spawn(async move { AppMsg::SessionsLoaded(store.refresh(api.as_ref()).await) });
    }

    fn load_history(&mut self, session_id: EntityId) {
        self.ui_state.peer.history = LoadState::Loading;
        let api = self.api.clone();
        self.spawn(async move {
            let result = api.chat_history(&session_id).await;
            AppMsg::HistoryLoaded { session_id, result }
        });
    }

    // ─── Inbox ───────────────────────────────────────────────

    fn drain_inbox(&mut self) -> bool {
        let mut any = false;
        while let Ok(Some(msg)) = self.inbox_rx.try_next() {
            any = true;
            self.apply(msg);
        }
        any
    }

    fn apply(&mut self, msg: AppMsg) {
        match msg {
            AppMsg::ConfigRestored(config) => self.apply_config(config),
            AppMsg::SignedIn(session) => self.sign_in(session),
            AppMsg::SignedOut => {
                self.sign_out();
                self.ui_state.status_text = "Please log in to chat".to_string();
                // A "Contact seller" visit goes straight to login and comes back.
                if let Some(Deeplink::Pending { book_id, seller_id }) = &self.deeplink {
                    let href = format!(
                        "login.html?redirect=chat.html?book_id={}%26seller_id={}",
                        book_id, seller_id
                    );
                    self.go_to(&href);
                }
            }
            AppMsg::SessionsLoaded(result) => match result {
                Ok(_) => {
                    self.publish_sessions();
                    self.open_deeplink();
                }
                Err(e) => self.load_failed(&e, |state, text| state.sessions_load = LoadState::Failed(text)),
            },
            AppMsg::SessionUpserted(result) => match result {
                Ok(Some(session)) => {
                    log::info!("Chat {} about \"{}\" is now listed", session.id, session.book_title);
                    self.publish_sessions();
                    self.ui_state.active_session = Some(session.id);
                }
                Ok(None) => self.publish_sessions(),
                Err(e) => self.load_failed(&e, |state, text| state.sessions_load = LoadState::Failed(text)),
            },
            AppMsg::HistoryLoaded { session_id, result } => {
                if self.ui_state.active_session.as_ref() != Some(&session_id) {
                    log::debug!("Dropping history of chat {} (no longer active)", session_id);
                    return;
                }
                match result {
                    Ok(value) => {
                        if let Some(user) = self.ui_state.user.clone() {
                            let count = self.ui_state.peer.reconciler.seed_history(value, &user);
                            log::info!("Loaded {} messages of chat {}", count, session_id);
                        }
                        self.ui_state.peer.history = LoadState::Loaded;
                    }
                    Err(e) => self.load_failed(&e, |state, text| state.peer.history = LoadState::Failed(text)),
                }
            }
            AppMsg::AssistantReply(result) => self.ui_state.assistant.complete(result),
        }
    }

    fn load_failed(&mut self, error: &ChatError, mark: impl FnOnce(&mut UiState, String)) {
        log::error!("Load failed: {}", error);
        if error.requires_login() {
            self.sign_out();
            self.go_to(LOGIN_PAGE);
        }
        mark(&mut self.ui_state, error.user_message());
    }

    fn publish_sessions(&mut self) {
        if let Some(store) = &self.sessions {
            self.ui_state.set_sessions(store.sessions());
        }
    }

    fn apply_config(&mut self, mut config: ChatConfig) {
        // The page host wins over a stored endpoint.
        config.endpoint = self.config.endpoint.clone();
        // Connections are opened after sign-in, so nothing is live yet.
        let (peer, community) =
            Self::connections(&config, &self.transports, &self.clock, &self.event_bus);
        self.peer = peer;
        self.community = community;
        self.api = Rc::new(RestChatApi::new(config.endpoint.clone()));
        self.ui_state = UiState::new(config.reconcile);
        self.config = config;
    }

    fn sign_in(&mut self, session: AuthSession) {
        log::info!("Signed in as {} ({})", session.user.username, session.user.role.label());
        self.api.set_token(Some(session.token.clone()));
        self.ui_state.user = Some(session.user.clone());
        self.sessions = Some(SessionStore::new(session.user.clone()));

        if let Err(e) = self.community.open(ConnectTarget::Community, &session) {
            log::warn!("Community chat not opened: {}", e);
        }
        self.auth = Some(session);
        self.refresh_sessions();
    }

    fn sign_out(&mut self) {
        self.peer.close();
        self.community.close();
        self.api.set_token(None);
        self.auth = None;
        self.sessions = None;
        self.ui_state.user = None;
    }

    /// Open what the page URL pointed at, once the session list is known.
    fn open_deeplink(&mut self) {
        let Some(link) = self.deeplink.take() else {
            return;
        };
        match link {
            Deeplink::Session(id) => self.select_session(id),
            Deeplink::Pending { book_id, seller_id } => self.start_chat(book_id, seller_id),
        }
    }

    /// Contact a seller about a book: reuse the existing chat if there is
    /// one, otherwise open a pending one the server creates on connect.
    fn start_chat(&mut self, book_id: EntityId, seller_id: EntityId) {
        let existing = self
            .sessions
            .as_ref()
            .and_then(|store| store.find_by_book_and_counterpart(book_id.clone(), seller_id.clone()));
        if let Some(session) = existing {
            self.select_session(session.id);
            return;
        }

        let Some(auth) = self.auth.clone() else {
            return;
        };
        if auth.user.role != Role::Buyer {
            self.ui_state
                .peer
                .show_error(&ChatError::Validation("Only buyers can initiate chats with sellers.".to_string()));
            return;
        }

        self.ui_state.tab = Tab::Chats;
        self.ui_state.active_session = None;
        self.ui_state.peer.switch_session(None);
        self.ui_state.peer.history = LoadState::Loaded;
        if let Err(e) = self.peer.open(ConnectTarget::pending(book_id, seller_id), &auth) {
            log::warn!("New chat not opened: {}", e);
        }
    }

    fn select_session(&mut self, id: EntityId) {
        let Some(store) = self.sessions.clone() else {
            return;
        };
        let Some(auth) = self.auth.clone() else {
            return;
        };
        let Some(session) = store.get(&id) else {
            self.ui_state.peer.show_error(&ChatError::NotFound("Chat not found".to_string()));
            return;
        };

        store.set_active(Some(id.clone()));
        self.ui_state.tab = Tab::Chats;
        self.ui_state.active_session = Some(id.clone());
        self.ui_state.peer.switch_session(Some(id.clone()));
        self.load_history(id);

        if let Err(e) = self.peer.open(ConnectTarget::session(&session), &auth) {
            log::warn!("Chat connection not opened: {}", e);
        }
    }

    fn on_session_created(&mut self, session_id: EntityId) {
        let Some(store) = self.sessions.clone() else {
            return;
        };
        let api = self.api.clone();
        self.spawn(async move {
            AppMsg::SessionUpserted(store.upsert_from_server_event(&session_id, api.as_ref()).await)
        });
    }

    // ─── Panel actions ───────────────────────────────────────

    fn handle_action(&mut self, action: PanelAction) {
        match action {
            PanelAction::SendPeer(text) => self.dispatch_send(ChatSurface::Peer, &text),
            PanelAction::SendCommunity(text) => self.dispatch_send(ChatSurface::Community, &text),
            PanelAction::SelectSession(id) => self.select_session(id),
            PanelAction::RetrySessions => self.refresh_sessions(),
            PanelAction::RetryHistory => {
                if let Some(id) = self.ui_state.active_session.clone() {
                    self.load_history(id);
                }
            }
            PanelAction::ReconnectPeer => self.reconnect(ChatSurface::Peer),
            PanelAction::ReconnectCommunity => self.reconnect(ChatSurface::Community),
            PanelAction::AskAssistant(query) => {
                if let Some(query) = self.ui_state.assistant.begin(&query) {
                    let api = self.api.clone();
                    self.spawn(async move { AppMsg::AssistantReply(api.chatbot(&query).await) });
                }
            }
            PanelAction::Login => self.go_to(LOGIN_PAGE),
        }
    }

    fn go_to(&self, href: &str) {
        if let Err(e) = navigate(href) {
            log::error!("{}", e);
        }
    }

    fn manager(&self, surface: ChatSurface) -> &ConnectionManager {
        match surface {
            ChatSurface::Peer => &self.peer,
            ChatSurface::Community => &self.community,
        }
    }

    /// Send and project the outcome; the input is only cleared on success.
    fn dispatch_send(&mut self, surface: ChatSurface, text: &str) {
        let Some(user) = self.ui_state.user.clone() else {
            return;
        };
        let result = self.manager(surface).send(text);
        self.ui_state.view_mut(surface).apply_send_result(result, &user);
    }

    fn reconnect(&mut self, surface: ChatSurface) {
        let result = match (surface, &self.auth) {
            (ChatSurface::Community, Some(auth)) if self.community.target().is_none() => {
                self.community.open(ConnectTarget::Community, auth)
            }
            _ => self.manager(surface).reconnect(),
        };
        if let Err(e) = result {
            self.ui_state.view_mut(surface).show_error(&e);
        }
    }

    fn logout(&mut self) {
        let auth_store = self.auth_store.clone();
        self.spawn(async move {
            if let Err(e) = auth_store.logout().await {
                log::error!("Logout failed: {}", e);
            }
            AppMsg::SignedOut
        });
    }
}

impl eframe::App for BookBridgeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.first_frame {
            theme::apply_theme(ctx);
            self.first_frame = false;
        }

        let mut changed = self.drain_inbox();

        // Drain events from the connection managers
        if self.event_bus.has_pending() {
            self.ui_state.process_events(self.event_bus.drain());
            changed = true;
        }
        if let Some(session_id) = self.ui_state.created_session.take() {
            self.on_session_created(session_id);
        }
        if changed {
            ctx.request_repaint();
        }

        // Socket callbacks do not wake egui; poll while a socket is up.
        if self.peer.state().is_live() || self.community.state().is_live() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        // ── Top bar ──────────────────────────────────────────
        let mut logout = false;
        TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new("BookBridge")
                        .strong()
                        .color(theme::ACCENT)
                        .size(16.0),
                );
                ui.separator();
                for (tab, label) in [
                    (Tab::Chats, "Chats"),
                    (Tab::Community, "Community"),
                    (Tab::Assistant, "Assistant"),
                ] {
                    if ui.selectable_label(self.ui_state.tab == tab, label).clicked() {
                        self.ui_state.tab = tab;
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(user) = &self.ui_state.user {
                        if ui.small_button("Logout").clicked() {
                            logout = true;
                        }
                        ui.label(
                            RichText::new(format!("{} ({})", user.username, user.role.label()))
                                .color(theme::TEXT_SECONDARY)
                                .small(),
                        );
                    }
                    ui.label(
                        RichText::new(&self.ui_state.status_text)
                            .color(theme::TEXT_SECONDARY)
                            .small(),
                    );
                });
            });
        });
        if logout {
            self.logout();
        }

        // ── Main content ─────────────────────────────────────
        let action = CentralPanel::default()
            .show(ctx, |ui| match self.ui_state.tab {
                Tab::Chats => chat::chat_panel(ui, &mut self.ui_state),
                Tab::Community => community::community_panel(ui, &mut self.ui_state),
                Tab::Assistant => assistant::assistant_panel(ui, &mut self.ui_state),
            })
            .inner;

        if let Some(action) = action {
            self.handle_action(action);
            ctx.request_repaint();
        }
    }
}
