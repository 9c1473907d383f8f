use eframe::egui::{CursorIcon, Sense, Ui};

use super::interaction::{PointerSample, pick_node};
use super::render::{FrameInputs, draw_scene, project_nodes};
use super::session::Session;

impl Session {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.camera.set_viewport(rect);
        let mut projected = std::mem::take(&mut self.projected);
        project_nodes(
            &self.model,
            &self.layout,
            &self.camera,
            &self.pipeline,
            self.time,
            &mut projected,
        );

        let sample = PointerSample::from_response(ui, &response);
        self.hovered = sample.hover.and_then(|pointer| pick_node(&projected, pointer));
        if self.gateway.is_dragging_node() {
            ui.ctx().set_cursor_icon(CursorIcon::Grabbing);
        } else if self.hovered.is_some() {
            ui.ctx().set_cursor_icon(CursorIcon::PointingHand);
        }

        let events = self
            .gateway
            .handle(&sample, &projected, &self.model, &self.camera);
        self.projected = projected;
        for event in events {
            self.handle_event(event);
        }

        if self.model.is_empty() {
            painter.rect_filled(rect, 0.0, self.pipeline.palette().background);
            ui.put(rect, eframe::egui::Label::new("Waiting for the first batch..."));
            return;
        }

        let frame = FrameInputs {
            model: &self.model,
            layout: &self.layout,
            camera: &self.camera,
            pipeline: &self.pipeline,
            selected: self.selected_index(),
            hovered: self.hovered,
            time: self.time,
        };
        draw_scene(&painter, rect, &frame, &self.projected);
    }
}
