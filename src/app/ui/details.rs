use eframe::egui::{self, RichText, TextEdit, Ui};

use crate::graph::NodeEdit;

use super::super::session::{Session, SessionAction};

/// Text buffers for the selection panel, bound to one node at a time.
#[derive(Clone, Debug, Default)]
pub(in crate::app) struct DetailsDraft {
    node_id: Option<String>,
    name: String,
    description: String,
    link_name: String,
}

impl DetailsDraft {
    fn bind(&mut self, node_id: &str, name: &str, description: &str) {
        if self.node_id.as_deref() == Some(node_id) {
            return;
        }
        self.node_id = Some(node_id.to_owned());
        self.name = name.to_owned();
        self.description = description.to_owned();
        self.link_name.clear();
    }
}

impl Session {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui, actions: &mut Vec<SessionAction>) {
        ui.heading("Selection");
        ui.add_space(6.0);

        let Some(index) = self.selected_index() else {
            self.draft = DetailsDraft::default();
            ui.label("Click a node to inspect it.");
            return;
        };

        let entity = &self.model.nodes[index];
        let record = &entity.record;
        let id = record.id.clone();
        let stored_name = record.name.clone().unwrap_or_default();
        let stored_description = record.description.clone().unwrap_or_default();
        self.draft.bind(&id, &stored_name, &stored_description);

        ui.label(RichText::new(record.display_name()).strong());
        ui.small(id.as_str());
        ui.add_space(6.0);

        if entity.is_root {
            ui.label("Root node");
        }
        if let Some(role) = &record.role {
            ui.label(format!("Role: {role}"));
        }
        if let Some(group) = record.group_id {
            ui.label(format!("Group: {group}"));
        }
        if let Some(importance) = record.importance {
            ui.label(format!("Importance: {importance:.1}"));
        }
        ui.label(format!("Connections: {}", entity.connections));
        if let Some(keyword) = &record.keyword {
            ui.label(format!("Keyword: {keyword}"));
        }
        if let Some(source) = &record.generation_source {
            let source_name = self
                .model
                .get(source)
                .map_or(source.as_str(), |parent| parent.record.display_name());
            ui.label(format!("Generated from: {source_name}"));
        }

        ui.separator();
        ui.label(RichText::new("Edit").strong());
        ui.add(TextEdit::singleline(&mut self.draft.name).hint_text("Name"));
        ui.add(
            TextEdit::multiline(&mut self.draft.description)
                .hint_text("Description")
                .desired_rows(4),
        );

        let edit = NodeEdit {
            name: (self.draft.name != stored_name).then(|| self.draft.name.clone()),
            description: (self.draft.description != stored_description)
                .then(|| self.draft.description.clone()),
        };
        let dirty = edit != NodeEdit::default();
        if ui
            .add_enabled(dirty, egui::Button::new("Apply changes"))
            .clicked()
        {
            actions.push(SessionAction::Edit {
                id: id.clone(),
                edit,
            });
        }

        ui.separator();
        ui.label(RichText::new("Add linked node").strong());
        ui.horizontal(|ui| {
            ui.add(TextEdit::singleline(&mut self.draft.link_name).hint_text("Name"));
            let can_add = !self.draft.link_name.trim().is_empty();
            if ui.add_enabled(can_add, egui::Button::new("Add")).clicked() {
                actions.push(SessionAction::AddLinked {
                    from: id.clone(),
                    name: std::mem::take(&mut self.draft.link_name),
                });
            }
        });

        ui.separator();
        ui.horizontal(|ui| {
            if self.layout.is_pinned(&id) && ui.button("Release pin").clicked() {
                actions.push(SessionAction::ReleasePin(id.clone()));
            }
            if ui.button("Delete node").clicked() {
                actions.push(SessionAction::RequestDelete(id.clone()));
            }
        });
    }
}
