//! Community panel: the site-wide room every signed-in user shares.

use egui::{self, Align, Layout, RichText};

use crate::panels::PanelAction;
use crate::panels::chat::{chat_body, connection_badge, login_prompt};
use crate::state::UiState;
use crate::theme::*;

pub fn community_panel(ui: &mut egui::Ui, state: &mut UiState) -> Option<PanelAction> {
    let mut action = None;

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            let Some(user) = state.user.clone() else {
                action = login_prompt(ui);
                return;
            };

            ui.horizontal(|ui| {
                ui.heading(RichText::new("Community Chat").color(TEXT_PRIMARY).strong());
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    if connection_badge(ui, &state.community) {
                        action = Some(PanelAction::ReconnectCommunity);
                    }
                });
            });
            ui.separator();

            if let Some(a) = chat_body(ui, &mut state.community, &user, "Say hello to everyone...") {
                action = Some(a);
            }
        });

    action
}
