//! Book assistant panel: chatbot transcript with book recommendations.

use egui::{self, RichText, ScrollArea, Vec2};

use bookbridge_core::assistant::{AssistantRole, AssistantTurn};
use crate::panels::PanelAction;
use crate::state::UiState;
use crate::theme::*;

pub fn assistant_panel(ui: &mut egui::Ui, state: &mut UiState) -> Option<PanelAction> {
    let mut action = None;

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            ui.heading(RichText::new("Book Assistant").color(TEXT_PRIMARY).strong());
            ui.separator();

            let available_height = ui.available_height() - 60.0;
            ScrollArea::vertical()
                .max_height(available_height)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for turn in state.assistant.transcript() {
                        render_turn(ui, turn);
                        ui.add_space(4.0);
                    }
                    if state.assistant.is_waiting() {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label(RichText::new("Thinking...").color(TEXT_SECONDARY).small());
                        });
                    }
                });

            ui.add_space(8.0);

            ui.horizontal(|ui| {
                let input = egui::TextEdit::singleline(&mut state.assistant_input)
                    .hint_text("Ask about books, authors or genres...")
                    .desired_width(ui.available_width() - 70.0)
                    .font(egui::FontId::proportional(14.0));
                let response = ui.add(input);

                let enabled =
                    !state.assistant_input.trim().is_empty() && !state.assistant.is_waiting();
                let ask_btn = ui.add_enabled(
                    enabled,
                    egui::Button::new(RichText::new("Ask").color(TEXT_PRIMARY))
                        .fill(if enabled { ACCENT } else { BG_SURFACE })
                        .corner_radius(PANEL_ROUNDING)
                        .min_size(Vec2::new(60.0, 0.0)),
                );

                let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if enabled && (entered || ask_btn.clicked()) {
                    action = Some(PanelAction::AskAssistant(state.assistant_input.trim().to_string()));
                    state.assistant_input.clear();
                    response.request_focus();
                }
            });
        });

    action
}

fn render_turn(ui: &mut egui::Ui, turn: &AssistantTurn) {
    let (label, color, bg) = match turn.role {
        AssistantRole::User => ("You", ACCENT, BG_SURFACE),
        AssistantRole::Assistant => ("BookBridge", SUCCESS, BG_SECONDARY),
    };

    egui::Frame::default()
        .fill(bg)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.label(RichText::new(label).color(color).strong().small());
            for line in turn.text.lines() {
                match recommendation_link(line) {
                    Some((title, href)) => {
                        ui.hyperlink_to(RichText::new(title).color(ACCENT), href);
                    }
                    None => {
                        ui.label(RichText::new(line.replace("**", "")).color(TEXT_PRIMARY));
                    }
                }
            }
        });
}

/// Split a `- [title](href)` recommendation line.
pub(crate) fn recommendation_link(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("- [")?;
    let (title, rest) = rest.split_once("](")?;
    let href = rest.strip_suffix(')')?;
    Some((title, href))
}
