use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use super::ingest::IncomingBatch;
use super::merge::{SkipCounts, merge};
use super::model::{EdgeRecord, NodeRecord, Snapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node id must not be empty")]
    EmptyId,
    #[error("node `{0}` already exists")]
    DuplicateNode(String),
    #[error("node `{0}` does not exist")]
    UnknownNode(String),
}

/// Display fields a user edit may replace. Unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeEdit {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub edited: Vec<String>,
    pub added_edges: usize,
    pub removed_edges: usize,
    pub skipped: SkipCounts,
    pub reset: bool,
}

impl ChangeSet {
    pub fn is_structural(&self) -> bool {
        self.reset
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || self.added_edges > 0
            || self.removed_edges > 0
    }

    pub fn is_empty(&self) -> bool {
        !self.is_structural() && self.edited.is_empty()
    }
}

/// Owner of the canonical snapshot. Every mutation replaces the snapshot as
/// a whole and bumps the revision, so readers holding an `Arc` keep a
/// consistent view.
#[derive(Debug, Default)]
pub struct GraphStore {
    snapshot: Arc<Snapshot>,
    revision: u64,
    skipped_total: SkipCounts,
}

impl GraphStore {
    pub fn new(snapshot: Snapshot) -> (Self, ChangeSet) {
        let mut store = Self::default();
        let changes = store.replace(snapshot);
        (store, changes)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn skipped_total(&self) -> SkipCounts {
        self.skipped_total
    }

    fn commit(&mut self, snapshot: Snapshot) {
        self.snapshot = Arc::new(snapshot);
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn merge_batch(&mut self, batch: IncomingBatch) -> ChangeSet {
        let malformed_nodes = batch.malformed_nodes;
        let malformed_edges = batch.malformed_edges;
        let Some(incoming) = batch.into_snapshot() else {
            debug!("ignoring batch without success status");
            return ChangeSet::default();
        };

        let outcome = merge(&self.snapshot, &incoming);
        let mut skipped = outcome.skipped;
        skipped.malformed_nodes += malformed_nodes;
        skipped.malformed_edges += malformed_edges;
        self.skipped_total.absorb(skipped);

        let changes = ChangeSet {
            added: outcome.added_nodes,
            added_edges: outcome.added_edges,
            skipped,
            ..ChangeSet::default()
        };

        if changes.is_structural() {
            self.commit(outcome.snapshot);
        }

        info!(
            added_nodes = changes.added.len(),
            added_edges = changes.added_edges,
            skipped = skipped.total(),
            malformed = skipped.malformed(),
            revision = self.revision,
            "merged batch"
        );
        changes
    }

    pub fn add_node(
        &mut self,
        node: NodeRecord,
        links: Vec<EdgeRecord>,
    ) -> Result<ChangeSet, GraphError> {
        let id = node.id.trim().to_owned();
        if id.is_empty() {
            return Err(GraphError::EmptyId);
        }
        if self.snapshot.node(&id).is_some() {
            return Err(GraphError::DuplicateNode(id));
        }

        let outcome = merge(&self.snapshot, &Snapshot::new(vec![node], links));
        self.commit(outcome.snapshot);
        info!(%id, edges = outcome.added_edges, "added node");

        Ok(ChangeSet {
            added: outcome.added_nodes,
            added_edges: outcome.added_edges,
            skipped: outcome.skipped,
            ..ChangeSet::default()
        })
    }

    /// Replaces display fields in place. Structure is untouched, so layout
    /// positions and simulation energy carry over.
    pub fn edit_node(&mut self, id: &str, edit: NodeEdit) -> Result<ChangeSet, GraphError> {
        let Some(position) = self.snapshot.nodes.iter().position(|node| node.id == id) else {
            return Err(GraphError::UnknownNode(id.to_owned()));
        };

        let mut next = Snapshot::clone(&self.snapshot);
        let node = &mut next.nodes[position];
        if let Some(name) = edit.name {
            node.name = Some(name);
        }
        if let Some(description) = edit.description {
            node.description = Some(description);
        }
        self.commit(next);
        info!(%id, "edited node");

        Ok(ChangeSet {
            edited: vec![id.to_owned()],
            ..ChangeSet::default()
        })
    }

    /// Removes the node and every edge touching it in one transaction.
    pub fn delete_node(&mut self, id: &str) -> Result<ChangeSet, GraphError> {
        if self.snapshot.node(id).is_none() {
            return Err(GraphError::UnknownNode(id.to_owned()));
        }

        let nodes = self
            .snapshot
            .nodes
            .iter()
            .filter(|node| node.id != id)
            .cloned()
            .collect::<Vec<_>>();
        let links = self
            .snapshot
            .links
            .iter()
            .filter(|link| link.source_id() != Some(id) && link.target_id() != Some(id))
            .cloned()
            .collect::<Vec<_>>();
        let removed_edges = self.snapshot.links.len() - links.len();

        self.commit(Snapshot::new(nodes, links));
        info!(%id, removed_edges, "deleted node");

        Ok(ChangeSet {
            removed: vec![id.to_owned()],
            removed_edges,
            ..ChangeSet::default()
        })
    }

    pub fn reset(&mut self) -> ChangeSet {
        let removed = self
            .snapshot
            .nodes
            .iter()
            .map(|node| node.id.clone())
            .collect::<Vec<_>>();
        let removed_edges = self.snapshot.links.len();

        self.commit(Snapshot::default());
        self.skipped_total = SkipCounts::default();
        info!(nodes = removed.len(), "graph reset");

        ChangeSet {
            removed,
            removed_edges,
            reset: true,
            ..ChangeSet::default()
        }
    }

    /// Swaps in a loaded snapshot, normalizing it through the merge path.
    pub fn replace(&mut self, snapshot: Snapshot) -> ChangeSet {
        let mut changes = self.reset();
        let outcome = merge(&Snapshot::default(), &snapshot);
        self.skipped_total.absorb(outcome.skipped);
        self.commit(outcome.snapshot);

        changes.added = outcome.added_nodes;
        changes.added_edges = outcome.added_edges;
        changes.skipped = outcome.skipped;
        changes
    }
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    info!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        links = snapshot.links.len(),
        "loaded snapshot"
    );
    Ok(snapshot)
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create snapshot {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)
        .with_context(|| format!("failed to encode snapshot {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    info!(path = %path.display(), nodes = snapshot.nodes.len(), "saved snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::entity::EntityModel;

    fn batch(json: &str) -> IncomingBatch {
        IncomingBatch::parse(json).unwrap()
    }

    fn seeded() -> GraphStore {
        let (store, _) = GraphStore::new(Snapshot::new(
            vec![NodeRecord::new("a"), NodeRecord::new("b"), NodeRecord::new("c")],
            vec![EdgeRecord::new("a", "b"), EdgeRecord::new("b", "c")],
        ));
        store
    }

    #[test]
    fn merge_bumps_revision_only_on_change() {
        let mut store = seeded();
        let before = store.revision();

        let changes = store.merge_batch(batch(
            r#"{"status": "success", "nodes": [{"id": "a"}], "links": [{"source": "a", "target": "b"}]}"#,
        ));
        assert!(changes.is_empty());
        assert_eq!(store.revision(), before);

        let changes = store.merge_batch(batch(
            r#"{"status": "success", "nodes": [{"id": "d"}], "links": [{"source": "c", "target": "d"}]}"#,
        ));
        assert_eq!(changes.added, vec!["d".to_owned()]);
        assert_eq!(changes.added_edges, 1);
        assert_eq!(store.revision(), before + 1);
    }

    #[test]
    fn failed_status_is_not_merged() {
        let mut store = seeded();
        let before = store.snapshot();

        let changes = store.merge_batch(batch(
            r#"{"status": "error", "nodes": [{"id": "zz"}], "links": []}"#,
        ));

        assert!(changes.is_empty());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn delete_removes_touching_edges() {
        let mut store = seeded();

        let changes = store.delete_node("b").unwrap();

        assert_eq!(changes.removed_edges, 2);
        let model = EntityModel::from_snapshot(&store.snapshot());
        assert_eq!(model.len(), 2);
        assert!(model.edges.is_empty());
        assert_eq!(store.delete_node("b"), Err(GraphError::UnknownNode("b".to_owned())));
    }

    #[test]
    fn edit_changes_display_fields_only() {
        let mut store = seeded();

        let changes = store
            .edit_node(
                "a",
                NodeEdit {
                    name: Some("Alpha".to_owned()),
                    description: None,
                },
            )
            .unwrap();

        assert!(!changes.is_structural());
        let snapshot = store.snapshot();
        assert_eq!(snapshot.nodes[0].display_name(), "Alpha");
        assert_eq!(snapshot.links.len(), 2);
    }

    #[test]
    fn add_node_rejects_duplicates_and_empty_ids() {
        let mut store = seeded();

        assert_eq!(
            store.add_node(NodeRecord::new("a"), Vec::new()),
            Err(GraphError::DuplicateNode("a".to_owned()))
        );
        assert_eq!(
            store.add_node(NodeRecord::new(" "), Vec::new()),
            Err(GraphError::EmptyId)
        );

        let changes = store
            .add_node(NodeRecord::new("e"), vec![EdgeRecord::new("e", "a")])
            .unwrap();
        assert_eq!(changes.added, vec!["e".to_owned()]);
        assert_eq!(changes.added_edges, 1);
    }

    #[test]
    fn reset_empties_the_graph() {
        let mut store = seeded();

        let changes = store.reset();

        assert!(changes.reset);
        assert_eq!(changes.removed.len(), 3);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.json");
        let mut snapshot = Snapshot::clone(&seeded().snapshot());
        snapshot.nodes[0].importance = Some(3.5);
        snapshot.nodes[1].attributes.insert("centrality".to_owned(), serde_json::Value::from(0.25_f64));

        save_snapshot(&path, &snapshot).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded, snapshot);
        let model = EntityModel::from_snapshot(&loaded);
        assert_eq!(model.connections("b"), Some(2));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_snapshot(&dir.path().join("absent.json")).unwrap_err();
        assert!(error.to_string().contains("failed to open snapshot"));
    }
}
