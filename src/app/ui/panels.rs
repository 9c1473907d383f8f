use std::time::Instant;

use eframe::egui::{self, Align2, Context};

use super::super::session::{PendingConfirm, Session, SessionAction};

impl Session {
    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        let moving = self
            .frames
            .advance(Instant::now())
            .is_some_and(|tick| self.tick(tick.dt, tick.time));

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_controls(ui, &mut actions));

        egui::TopBottomPanel::bottom("status_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_status(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui, &mut actions));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));

        self.draw_confirm(ctx, &mut actions);

        for action in actions {
            self.apply_action(action);
        }

        if moving || self.camera.is_animating() || self.gateway.is_dragging_node() {
            ctx.request_repaint();
        } else if self.feed_running() {
            ctx.request_repaint_after(self.feed_poll);
        }
    }

    fn draw_confirm(&self, ctx: &Context, actions: &mut Vec<SessionAction>) {
        let Some(pending) = &self.pending_confirm else {
            return;
        };

        let prompt = match pending {
            PendingConfirm::ResetGraph => {
                "Remove every node and edge? Unsaved positions are lost.".to_owned()
            }
            PendingConfirm::DeleteNode(id) => {
                let name = self
                    .model
                    .get(id)
                    .map_or(id.as_str(), |entity| entity.record.display_name());
                format!("Delete \"{name}\" and all of its edges?")
            }
        };

        egui::Window::new("Confirm")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(prompt);
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Confirm").clicked() {
                        actions.push(SessionAction::Confirm);
                    }
                    if ui.button("Cancel").clicked() {
                        actions.push(SessionAction::Cancel);
                    }
                });
            });
    }
}
