use eframe::egui::{self, Align, Layout, Slider, Ui};

use super::super::session::{Session, SessionAction};

impl Session {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui, actions: &mut Vec<SessionAction>) {
        ui.horizontal(|ui| {
            ui.heading("ontograph");
            ui.separator();

            if ui
                .button("Rearrange")
                .on_hover_text("Reheat the layout without moving the camera")
                .clicked()
            {
                actions.push(SessionAction::Rearrange);
            }
            if ui.button("Reset view").clicked() {
                actions.push(SessionAction::ResetView);
            }
            let has_root = self.model.root_index.is_some();
            if ui
                .add_enabled(has_root, egui::Button::new("Focus root"))
                .clicked()
            {
                actions.push(SessionAction::FocusRoot);
            }
            ui.separator();
            if ui.button("Save").clicked() {
                actions.push(SessionAction::Save);
            }
            if ui
                .add_enabled(!self.model.is_empty(), egui::Button::new("Reset graph"))
                .clicked()
            {
                actions.push(SessionAction::RequestReset);
            }

            ui.separator();
            ui.menu_button("Layout", |ui| self.draw_layout_tuning(ui));

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if self.feed_running() {
                    ui.label("feed: watching");
                }
            });
        });
    }

    fn draw_layout_tuning(&mut self, ui: &mut Ui) {
        let config = self.layout.config();
        let mut repulsion = config.repulsion;
        let mut link_distance = config.link_distance;
        let mut velocity_decay = config.velocity_decay;
        let growth_alpha = config.growth_alpha;

        let mut changed = false;
        changed |= ui
            .add(Slider::new(&mut repulsion, 0.0..=12_000.0).text("Repulsion"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut link_distance, 1.0..=200.0).text("Link distance"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut velocity_decay, 0.0..=0.95).text("Velocity decay"))
            .changed();

        if changed {
            self.layout.set_repulsion(repulsion);
            self.layout.set_link_distance(link_distance);
            self.layout.set_velocity_decay(velocity_decay);
            self.layout.reheat_to(growth_alpha);
        }
    }

    pub(in crate::app) fn draw_status(&self, ui: &mut Ui) {
        let skipped = self.store.skipped_total();
        ui.horizontal(|ui| {
            ui.label(format!("nodes: {}", self.model.len()));
            ui.label(format!("edges: {}", self.model.edges.len()));
            if self.model.dropped_edges > 0 {
                ui.label(format!("dangling: {}", self.model.dropped_edges));
            }
            if skipped.total() > 0 {
                ui.label(format!(
                    "skipped: {} duplicate, {} malformed",
                    skipped.duplicate_nodes + skipped.duplicate_edges,
                    skipped.malformed()
                ));
            }
            ui.label(format!(
                "layout: {} ({:.3})",
                self.layout.phase().label(),
                self.layout.alpha()
            ));

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if let Some(status) = &self.status {
                    ui.label(status.as_str());
                }
            });
        });
    }
}
