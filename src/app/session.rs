use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::graph::{
    BatchFeed, ChangeSet, EdgeRecord, EntityModel, FeedMessage, GraphStore, IncomingBatch,
    NodeEdit, NodeRecord, Snapshot, save_snapshot,
};

use super::LaunchOptions;
use super::camera::CameraController;
use super::frame_loop::FrameLoop;
use super::interaction::{GraphCallbacks, GraphEvent, InteractionGateway};
use super::layout::LayoutEngine;
use super::render::{ProjectedNode, RenderPipeline};
use super::ui::DetailsDraft;

/// A user intent coming from the control panels.
#[derive(Clone, Debug, PartialEq)]
pub(in crate::app) enum SessionAction {
    Rearrange,
    ResetView,
    FocusRoot,
    Save,
    RequestReset,
    RequestDelete(String),
    Confirm,
    Cancel,
    ReleasePin(String),
    Edit { id: String, edit: NodeEdit },
    AddLinked { from: String, name: String },
}

/// Destructive actions wait here until the user confirms them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(in crate::app) enum PendingConfirm {
    ResetGraph,
    DeleteNode(String),
}

/// Everything one open graph needs across frames.
pub(in crate::app) struct Session {
    pub(in crate::app) store: GraphStore,
    pub(in crate::app) model: EntityModel,
    model_revision: Option<u64>,
    pub(in crate::app) layout: LayoutEngine,
    pub(in crate::app) pipeline: RenderPipeline,
    pub(in crate::app) camera: CameraController,
    pub(in crate::app) gateway: InteractionGateway,
    pub(in crate::app) callbacks: GraphCallbacks,
    pub(in crate::app) frames: FrameLoop,
    feed: Option<BatchFeed>,
    pub(in crate::app) selected: Option<String>,
    pub(in crate::app) hovered: Option<usize>,
    pub(in crate::app) projected: Vec<ProjectedNode>,
    pub(in crate::app) highlight_set: HashSet<String>,
    rearrange_token: u64,
    applied_rearrange: u64,
    pub(in crate::app) pending_confirm: Option<PendingConfirm>,
    pub(in crate::app) status: Option<String>,
    pub(in crate::app) draft: DetailsDraft,
    pub(in crate::app) feed_poll: Duration,
    save_path: PathBuf,
    pub(in crate::app) time: f64,
}

impl Session {
    pub(in crate::app) fn new(snapshot: Snapshot, options: &LaunchOptions) -> Self {
        let config = &options.config;
        let (store, changes) = GraphStore::new(snapshot);

        let feed = options.batch_dir.clone().map(|dir| {
            let mut feed = BatchFeed::new(dir, config.feed.poll_interval());
            feed.start();
            feed
        });

        let mut frames = FrameLoop::default();
        frames.start(Instant::now());

        let mut session = Self {
            store,
            model: EntityModel::default(),
            model_revision: None,
            layout: LayoutEngine::new(config.layout.clone()),
            pipeline: RenderPipeline::new(config.render.clone()),
            camera: CameraController::new(config.camera.clone()),
            gateway: InteractionGateway::default(),
            callbacks: GraphCallbacks::default(),
            frames,
            feed,
            selected: None,
            hovered: None,
            projected: Vec::new(),
            highlight_set: HashSet::new(),
            rearrange_token: 0,
            applied_rearrange: 0,
            pending_confirm: None,
            status: None,
            draft: DetailsDraft::default(),
            feed_poll: config.feed.poll_interval(),
            save_path: options.save_path.clone(),
            time: 0.0,
        };
        session.sync_model();
        if changes.skipped.total() > 0 {
            session.status = Some(format!(
                "loaded with {} skipped entries",
                changes.skipped.total()
            ));
        }
        session
    }

    pub(in crate::app) fn feed_running(&self) -> bool {
        self.feed.as_ref().is_some_and(BatchFeed::is_running)
    }

    pub(in crate::app) fn selected_index(&self) -> Option<usize> {
        self.selected.as_deref().and_then(|id| self.model.index_of(id))
    }

    /// Rebuilds derived state when the store moved on. Returns whether it did.
    pub(in crate::app) fn sync_model(&mut self) -> bool {
        let revision = self.store.revision();
        if self.model_revision == Some(revision) {
            return false;
        }

        self.model = EntityModel::from_snapshot(&self.store.snapshot());
        self.model_revision = Some(revision);
        self.pipeline.rebuild(&self.model);
        let report = self.layout.sync(&self.model, &self.pipeline.radii());

        if self.selected.as_deref().is_some_and(|id| self.model.index_of(id).is_none()) {
            self.selected = None;
        }
        self.highlight_set.retain(|id| self.model.index_of(id).is_some());
        self.hovered = None;

        debug!(
            revision,
            nodes = self.model.len(),
            edges = self.model.edges.len(),
            dropped_edges = self.model.dropped_edges,
            added = report.added,
            removed = report.removed,
            "entity model rebuilt"
        );
        true
    }

    fn apply_changes(&mut self, changes: &ChangeSet) {
        if changes.reset {
            self.selected = None;
            self.highlight_set.clear();
            self.pipeline.clear();
            self.layout.clear();
        }
        self.highlight_set.extend(changes.added.iter().cloned());
        self.sync_model();
    }

    pub(in crate::app) fn ingest(&mut self, batch: IncomingBatch) -> ChangeSet {
        let changes = self.store.merge_batch(batch);
        self.apply_changes(&changes);
        if changes.skipped.total() > 0 {
            self.status = Some(format!(
                "batch merged: {} new nodes, {} skipped",
                changes.added.len(),
                changes.skipped.total()
            ));
        }
        changes
    }

    pub(in crate::app) fn poll_feed(&mut self) {
        let messages = self.feed.as_ref().map(BatchFeed::drain).unwrap_or_default();
        for message in messages {
            match message {
                FeedMessage::Batch { source, batch } => {
                    let changes = self.ingest(batch);
                    debug!(
                        source = %source.display(),
                        added = changes.added.len(),
                        "feed batch applied"
                    );
                }
                FeedMessage::Failed { source, error } => {
                    warn!(source = %source.display(), %error, "skipping batch file");
                    self.status = Some(format!("skipped {}: {error}", source.display()));
                }
            }
        }
    }

    /// Bumps the external rearrange counter; the next frame reheats.
    pub(in crate::app) fn request_rearrange(&mut self) {
        self.rearrange_token = self.rearrange_token.wrapping_add(1);
    }

    /// One simulation and animation step. Returns whether anything is still
    /// moving, so the caller knows to schedule another frame.
    pub(in crate::app) fn tick(&mut self, dt: f32, time: f64) -> bool {
        self.time = time;
        self.poll_feed();
        self.sync_model();

        if self.rearrange_token != self.applied_rearrange {
            self.applied_rearrange = self.rearrange_token;
            self.layout.reheat();
            info!("layout rearrange requested");
        }

        self.pipeline.observe_highlight_set(&self.highlight_set, time);
        let layout_moving = self.layout.is_active() && self.layout.step();
        let camera_moving = self.camera.update(dt);
        let effects_live = self.pipeline.advance(dt, time);

        let pipeline = &self.pipeline;
        self.highlight_set
            .retain(|id| pipeline.highlights().is_highlighted(id, time));

        layout_moving || self.layout.is_active() || camera_moving || effects_live
    }

    pub(in crate::app) fn handle_event(&mut self, event: GraphEvent) {
        match event {
            GraphEvent::NodeSelected(id) => {
                let Some(index) = self.model.index_of(&id) else {
                    return;
                };
                if let Some(position) = self.layout.position(index) {
                    self.camera.focus_on(position);
                }
                self.callbacks.node_clicked(&self.model.nodes[index]);
                self.selected = Some(id);
            }
            GraphEvent::BackgroundClicked => self.selected = None,
            GraphEvent::NodeDragged { id, position } => {
                if self.layout.pin(&id, position) {
                    self.layout.reheat_to(self.layout.config().growth_alpha);
                }
            }
            GraphEvent::NodeDragEnd { id, position } => {
                if !self.layout.pin(&id, position) {
                    return;
                }
                if let Some(entity) = self.model.get(&id) {
                    self.callbacks.node_drag_ended(entity, position);
                }
                debug!(%id, x = position.x, y = position.y, z = position.z, "node pinned");
            }
            GraphEvent::Orbit(delta) => self.camera.orbit(delta),
            GraphEvent::Zoom(scroll) => self.camera.zoom(scroll),
        }
    }

    pub(in crate::app) fn apply_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::Rearrange => self.request_rearrange(),
            SessionAction::ResetView => self.camera.reset_view(),
            SessionAction::FocusRoot => {
                let root = self.model.root_index.and_then(|index| self.layout.position(index));
                if !self.camera.focus_root(root) {
                    self.status = Some("no root node, showing home view".to_owned());
                }
            }
            SessionAction::Save => {
                self.status = Some(match self.save() {
                    Ok(()) => format!("saved to {}", self.save_path.display()),
                    Err(error) => {
                        warn!(error = %format!("{error:#}"), "save failed");
                        format!("save failed: {error:#}")
                    }
                });
            }
            SessionAction::RequestReset => self.pending_confirm = Some(PendingConfirm::ResetGraph),
            SessionAction::RequestDelete(id) => {
                self.pending_confirm = Some(PendingConfirm::DeleteNode(id));
            }
            SessionAction::Cancel => self.pending_confirm = None,
            SessionAction::Confirm => match self.pending_confirm.take() {
                Some(PendingConfirm::ResetGraph) => {
                    let changes = self.store.reset();
                    self.apply_changes(&changes);
                    self.camera.reset_view();
                    self.status = Some("graph reset".to_owned());
                }
                Some(PendingConfirm::DeleteNode(id)) => match self.store.delete_node(&id) {
                    Ok(changes) => {
                        self.apply_changes(&changes);
                        self.status = Some(format!("deleted {id}"));
                    }
                    Err(error) => self.status = Some(error.to_string()),
                },
                None => {}
            },
            SessionAction::ReleasePin(id) => {
                if self.layout.unpin(&id) {
                    self.layout.reheat_to(self.layout.config().growth_alpha);
                }
            }
            SessionAction::Edit { id, edit } => match self.store.edit_node(&id, edit) {
                Ok(changes) => self.apply_changes(&changes),
                Err(error) => self.status = Some(error.to_string()),
            },
            SessionAction::AddLinked { from, name } => {
                let name = name.trim();
                if name.is_empty() {
                    self.status = Some("a new node needs a name".to_owned());
                    return;
                }
                let id = self.unused_id(name);
                let mut node = NodeRecord::named(id.clone(), name);
                node.generation_source = Some(from.clone());
                match self.store.add_node(node, vec![EdgeRecord::new(&from, &id)]) {
                    Ok(changes) => {
                        self.apply_changes(&changes);
                        self.status = Some(format!("added {id}"));
                    }
                    Err(error) => self.status = Some(error.to_string()),
                }
            }
        }
    }

    fn unused_id(&self, name: &str) -> String {
        let slug = name
            .chars()
            .map(|ch| if ch.is_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
            .collect::<String>();
        let slug = slug.trim_matches('-');
        let base = if slug.is_empty() { "node" } else { slug };

        let snapshot = self.store.snapshot();
        if snapshot.node(base).is_none() {
            return base.to_owned();
        }
        (2..)
            .map(|suffix| format!("{base}-{suffix}"))
            .find(|candidate| snapshot.node(candidate).is_none())
            .unwrap_or_else(|| base.to_owned())
    }

    /// Current snapshot with layout positions written into `x, y, z`.
    pub(in crate::app) fn snapshot_with_positions(&self) -> Snapshot {
        let positions = self.layout.export_positions();
        let mut snapshot = Snapshot::clone(&self.store.snapshot());
        for node in &mut snapshot.nodes {
            if let Some(Vec3 { x, y, z }) = positions.get(&node.id).copied() {
                node.x = Some(x);
                node.y = Some(y);
                node.z = Some(z);
            }
        }
        snapshot
    }

    fn save(&self) -> anyhow::Result<()> {
        save_snapshot(&self.save_path, &self.snapshot_with_positions())
    }

    pub(in crate::app) fn stop(&mut self) {
        self.frames.stop();
        if let Some(feed) = self.feed.as_mut() {
            feed.stop();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
        debug!("session stopped");
    }
}
