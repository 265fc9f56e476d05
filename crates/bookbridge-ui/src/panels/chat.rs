//! Chat panel: session list on the left, the active buyer/seller
//! conversation on the right.

use egui::{self, Align, Color32, Layout, RichText, ScrollArea, Vec2};

use bookbridge_types::{message::Message, session::ChatSession, user::CurrentUser};
use crate::panels::PanelAction;
use crate::state::{ChatView, LoadState, UiState};
use crate::theme::*;

/// Render the session list and the active peer chat.
pub fn chat_panel(ui: &mut egui::Ui, state: &mut UiState) -> Option<PanelAction> {
    let mut action = None;

    egui::SidePanel::left("chat_sessions")
        .resizable(true)
        .default_width(240.0)
        .frame(egui::Frame::default().fill(BG_SECONDARY).inner_margin(PANEL_PADDING))
        .show_inside(ui, |ui| {
            if let Some(a) = session_list(ui, state) {
                action = Some(a);
            }
        });

    egui::CentralPanel::default()
        .frame(egui::Frame::default().fill(BG_PRIMARY).inner_margin(PANEL_PADDING))
        .show_inside(ui, |ui| {
            if let Some(a) = conversation(ui, state) {
                action = Some(a);
            }
        });

    action
}

fn session_list(ui: &mut egui::Ui, state: &UiState) -> Option<PanelAction> {
    let mut action = None;

    ui.heading(RichText::new("Chats").color(TEXT_PRIMARY).strong());
    ui.separator();

    match &state.sessions_load {
        LoadState::Loading => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(RichText::new("Loading chats...").color(TEXT_SECONDARY));
            });
            return None;
        }
        LoadState::Failed(message) => {
            if failure(ui, message, true) {
                action = Some(PanelAction::RetrySessions);
            }
            return action;
        }
        LoadState::Idle | LoadState::Loaded => {}
    }

    if state.sessions.is_empty() {
        ui.label(RichText::new("No chats yet").color(TEXT_SECONDARY));
        return None;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for session in state.sessions.iter() {
                let selected = state.active_session.as_ref() == Some(&session.id);
                if session_row(ui, session, selected) {
                    action = Some(PanelAction::SelectSession(session.id.clone()));
                }
                ui.add_space(4.0);
            }
        });

    action
}

fn session_row(ui: &mut egui::Ui, session: &ChatSession, selected: bool) -> bool {
    let fill = if selected { ACCENT.linear_multiply(0.3) } else { BG_SURFACE };
    let response = egui::Frame::default()
        .fill(fill)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(RichText::new(&session.counterpart_name).color(TEXT_PRIMARY).strong());
            ui.label(RichText::new(&session.book_title).color(TEXT_SECONDARY).small());
            if let Some(preview) = session.preview() {
                ui.label(RichText::new(truncate(&preview.content, 40)).color(TEXT_SECONDARY).small());
            }
        })
        .response;
    response.interact(egui::Sense::click()).clicked()
}

fn conversation(ui: &mut egui::Ui, state: &mut UiState) -> Option<PanelAction> {
    let Some(user) = state.user.clone() else {
        return login_prompt(ui);
    };

    let title = match state.active() {
        Some(session) => format!("{} · {}", session.counterpart_name, session.book_title),
        None if state.peer.connection.is_live() => "New chat".to_string(),
        None => {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("Select a chat to start messaging").color(TEXT_SECONDARY));
            });
            return None;
        }
    };

    let mut action = None;
    ui.horizontal(|ui| {
        ui.heading(RichText::new(title).color(TEXT_PRIMARY).strong());
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            if connection_badge(ui, &state.peer) {
                action = Some(PanelAction::ReconnectPeer);
            }
        });
    });
    ui.separator();

    if let Some(a) = chat_body(ui, &mut state.peer, &user, "Type a message...") {
        action = Some(a);
    }
    action.map(|a| match a {
        PanelAction::SendCommunity(text) => PanelAction::SendPeer(text),
        PanelAction::ReconnectCommunity => PanelAction::ReconnectPeer,
        other => other,
    })
}

/// Banner, message list and input row shared by both chat surfaces. Send
/// and reconnect requests come back as the community variants; the peer
/// panel maps them.
pub(crate) fn chat_body(
    ui: &mut egui::Ui,
    view: &mut ChatView,
    user: &CurrentUser,
    hint: &str,
) -> Option<PanelAction> {
    let mut action = None;

    if let Some(banner) = view.banner.clone() {
        let mut dismissed = false;
        egui::Frame::default()
            .fill(ERROR_BG)
            .corner_radius(PANEL_ROUNDING)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(&banner.text).color(ERROR));
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if ui.small_button("✕").clicked() {
                            dismissed = true;
                        }
                        if banner.requires_login && ui.small_button("Log in").clicked() {
                            action = Some(PanelAction::Login);
                        } else if banner.retryable
                            && !view.connection.is_live()
                            && ui.small_button("Reconnect").clicked()
                        {
                            action = Some(PanelAction::ReconnectCommunity);
                        }
                    });
                });
            });
        if dismissed {
            view.dismiss_banner();
        }
        ui.add_space(4.0);
    }

    if let Some(notice) = &view.reconnect_notice {
        ui.label(RichText::new(notice).color(WARNING).small());
    }

    let available_height = ui.available_height() - 60.0;
    ScrollArea::vertical()
        .max_height(available_height)
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| match &view.history {
            LoadState::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new("Loading messages...").color(TEXT_SECONDARY));
                });
            }
            LoadState::Failed(message) => {
                if failure(ui, message, true) {
                    action = Some(PanelAction::RetryHistory);
                }
            }
            LoadState::Idle | LoadState::Loaded => {
                if view.reconciler.is_empty() {
                    ui.label(RichText::new("No messages yet").color(TEXT_SECONDARY));
                }
                for message in view.reconciler.messages() {
                    render_message(ui, message, user);
                    ui.add_space(4.0);
                }
            }
        });

    ui.add_space(8.0);

    // The input stays enabled while disconnected; a failed send keeps the text.
    ui.horizontal(|ui| {
        let input = egui::TextEdit::singleline(&mut view.input_text)
            .hint_text(hint)
            .desired_width(ui.available_width() - 70.0)
            .font(egui::FontId::proportional(14.0));
        let response = ui.add(input);

        let has_text = !view.input_text.trim().is_empty();
        let send_btn = ui.add_enabled(
            has_text,
            egui::Button::new(RichText::new("Send").color(TEXT_PRIMARY))
                .fill(if has_text && view.can_send() { ACCENT } else { BG_SURFACE })
                .corner_radius(PANEL_ROUNDING)
                .min_size(Vec2::new(60.0, 0.0)),
        );

        let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if has_text && (entered || send_btn.clicked()) {
            action = Some(PanelAction::SendCommunity(view.input_text.trim().to_string()));
            response.request_focus();
        }
    });

    action
}

/// Connection state label; offers a reconnect button when the socket is
/// down. Returns true when it was clicked.
pub(crate) fn connection_badge(ui: &mut egui::Ui, view: &ChatView) -> bool {
    let color = if view.can_send() {
        SUCCESS
    } else if view.connection.is_live() {
        WARNING
    } else {
        ERROR
    };
    let mut clicked = false;
    if !view.connection.is_live() {
        clicked = ui.small_button("Reconnect").clicked();
    }
    ui.label(RichText::new(view.connection.label()).color(color).small());
    clicked
}

/// Danger-styled failure text with an optional retry control.
pub(crate) fn failure(ui: &mut egui::Ui, message: &str, retry: bool) -> bool {
    let mut clicked = false;
    egui::Frame::default()
        .fill(ERROR_BG)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.label(RichText::new(message).color(ERROR));
            if retry {
                clicked = ui.button("Retry").clicked();
            }
        });
    clicked
}

pub(crate) fn login_prompt(ui: &mut egui::Ui) -> Option<PanelAction> {
    let mut action = None;
    ui.vertical_centered(|ui| {
        ui.add_space(40.0);
        ui.label(RichText::new("Please log in to chat").color(TEXT_SECONDARY));
        if ui.button("Log in").clicked() {
            action = Some(PanelAction::Login);
        }
    });
    action
}

pub(crate) fn render_message(ui: &mut egui::Ui, message: &Message, user: &CurrentUser) {
    let (name_color, bg) = if message.is_self {
        (ACCENT, BG_SURFACE)
    } else {
        (SUCCESS, BG_SECONDARY)
    };
    let layout = if message.is_self {
        Layout::top_down(Align::Max)
    } else {
        Layout::top_down(Align::Min)
    };

    ui.with_layout(layout, |ui| {
        egui::Frame::default()
            .fill(bg)
            .corner_radius(PANEL_ROUNDING)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(message.display_name(user))
                            .color(name_color)
                            .strong()
                            .small(),
                    );
                    ui.label(RichText::new(time_label(message)).color(TEXT_SECONDARY).small());
                    if message.is_optimistic() {
                        ui.label(RichText::new("sending").color(TEXT_SECONDARY).italics().small());
                    }
                });
                ui.label(RichText::new(&message.content).color(TEXT_PRIMARY));
            });
    });
}

fn time_label(message: &Message) -> String {
    message
        .created_at
        .with_timezone(&chrono::Local)
        .format("%H:%M")
        .to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}…", &text[..index]),
        None => text.to_string(),
    }
}

const ERROR_BG: Color32 = Color32::from_rgb(50, 20, 20);
