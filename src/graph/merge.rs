use std::collections::HashSet;

use super::model::{EdgeRecord, Endpoint, NodeRecord, Snapshot};

/// Items dropped while folding a batch into a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub malformed_nodes: usize,
    pub malformed_edges: usize,
    pub duplicate_nodes: usize,
    pub duplicate_edges: usize,
}

impl SkipCounts {
    pub fn malformed(&self) -> usize {
        self.malformed_nodes + self.malformed_edges
    }

    pub fn total(&self) -> usize {
        self.malformed() + self.duplicate_nodes + self.duplicate_edges
    }

    pub fn absorb(&mut self, other: SkipCounts) {
        self.malformed_nodes += other.malformed_nodes;
        self.malformed_edges += other.malformed_edges;
        self.duplicate_nodes += other.duplicate_nodes;
        self.duplicate_edges += other.duplicate_edges;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    pub added_nodes: Vec<String>,
    pub added_edges: usize,
    pub skipped: SkipCounts,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub label: String,
}

impl EdgeKey {
    pub fn of(edge: &EdgeRecord) -> Option<Self> {
        Some(Self {
            source: edge.source_id()?.to_owned(),
            target: edge.target_id()?.to_owned(),
            label: edge.normalized_label().to_owned(),
        })
    }
}

struct Accumulator {
    node_ids: HashSet<String>,
    edge_keys: HashSet<EdgeKey>,
    nodes: Vec<NodeRecord>,
    links: Vec<EdgeRecord>,
    skipped: SkipCounts,
}

impl Accumulator {
    fn with_capacity(nodes: usize, links: usize) -> Self {
        Self {
            node_ids: HashSet::with_capacity(nodes),
            edge_keys: HashSet::with_capacity(links),
            nodes: Vec::with_capacity(nodes),
            links: Vec::with_capacity(links),
            skipped: SkipCounts::default(),
        }
    }

    fn push_node(&mut self, node: &NodeRecord) -> bool {
        let id = node.id.trim();
        if id.is_empty() {
            self.skipped.malformed_nodes += 1;
            return false;
        }
        if !self.node_ids.insert(id.to_owned()) {
            self.skipped.duplicate_nodes += 1;
            return false;
        }

        let mut node = node.clone();
        if node.id.len() != id.len() {
            node.id = id.to_owned();
        }
        self.nodes.push(node);
        true
    }

    fn push_edge(&mut self, edge: &EdgeRecord) -> bool {
        let Some(key) = EdgeKey::of(edge) else {
            self.skipped.malformed_edges += 1;
            return false;
        };
        if self.edge_keys.contains(&key) {
            self.skipped.duplicate_edges += 1;
            return false;
        }

        let mut edge = edge.clone();
        edge.source = Some(Endpoint::Id(key.source.clone()));
        edge.target = Some(Endpoint::Id(key.target.clone()));
        self.edge_keys.insert(key);
        self.links.push(edge);
        true
    }
}

/// Folds `incoming` into `existing` without touching either input.
///
/// Existing order is preserved and new items are appended in incoming order,
/// so the same pair always produces the same snapshot. The first occurrence
/// of a node id wins; edges collapse on `(source, target, label)` after their
/// endpoints are normalized to bare ids. Entries without an id or with a
/// missing endpoint are skipped and counted.
pub fn merge(existing: &Snapshot, incoming: &Snapshot) -> MergeOutcome {
    let mut acc = Accumulator::with_capacity(
        existing.nodes.len() + incoming.nodes.len(),
        existing.links.len() + incoming.links.len(),
    );

    for node in &existing.nodes {
        acc.push_node(node);
    }
    for edge in &existing.links {
        acc.push_edge(edge);
    }

    // Existing duplicates are folded away but are not part of this batch.
    let carried = acc.skipped;
    acc.skipped = SkipCounts::default();

    let mut added_nodes = Vec::new();
    for node in &incoming.nodes {
        if acc.push_node(node) {
            added_nodes.push(node.id.trim().to_owned());
        }
    }

    let mut added_edges = 0usize;
    for edge in &incoming.links {
        if acc.push_edge(edge) {
            added_edges += 1;
        }
    }

    let mut skipped = acc.skipped;
    skipped.malformed_nodes += carried.malformed_nodes;
    skipped.malformed_edges += carried.malformed_edges;

    MergeOutcome {
        snapshot: Snapshot::new(acc.nodes, acc.links),
        added_nodes,
        added_edges,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn snapshot(nodes: &[&str], links: &[(&str, &str, Option<&str>)]) -> Snapshot {
        Snapshot::new(
            nodes.iter().map(|id| NodeRecord::new(*id)).collect(),
            links
                .iter()
                .map(|(source, target, name)| match name {
                    Some(name) => EdgeRecord::labeled(source, target, name),
                    None => EdgeRecord::new(source, target),
                })
                .collect(),
        )
    }

    fn ids(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    #[test]
    fn repeated_node_id_is_dropped() {
        let existing = snapshot(&["x"], &[]);
        let mut renamed = NodeRecord::named("x", "Other name");
        renamed.importance = Some(9.0);
        let incoming = Snapshot::new(vec![renamed], Vec::new());

        let outcome = merge(&existing, &incoming);

        assert_eq!(outcome.snapshot.nodes.len(), 1);
        assert_eq!(outcome.snapshot.nodes[0].name, None);
        assert!(outcome.added_nodes.is_empty());
        assert_eq!(outcome.skipped.duplicate_nodes, 1);
    }

    #[test]
    fn default_label_edges_collapse() {
        let existing = snapshot(&["a", "b"], &[("a", "b", Some("RELATED"))]);
        let incoming = snapshot(&[], &[("a", "b", None)]);

        let outcome = merge(&existing, &incoming);

        assert_eq!(outcome.snapshot.links.len(), 1);
        assert_eq!(outcome.added_edges, 0);
        assert_eq!(outcome.skipped.duplicate_edges, 1);
    }

    #[test]
    fn differently_labeled_edges_are_kept() {
        let existing = snapshot(&["a", "b"], &[("a", "b", Some("CAUSES"))]);
        let incoming = snapshot(&[], &[("a", "b", Some("PRECEDES")), ("b", "a", Some("CAUSES"))]);

        let outcome = merge(&existing, &incoming);

        assert_eq!(outcome.snapshot.links.len(), 3);
        assert_eq!(outcome.added_edges, 2);
    }

    #[test]
    fn embedded_endpoints_are_normalized_before_dedup() {
        let existing = snapshot(&["a", "b"], &[("a", "b", None)]);
        let incoming: Snapshot = serde_json::from_str(
            r#"{"nodes": [], "links": [{"source": {"id": "a", "name": "A"}, "target": {"id": "b"}}]}"#,
        )
        .unwrap();

        let outcome = merge(&existing, &incoming);

        assert_eq!(outcome.snapshot.links.len(), 1);
        assert_eq!(outcome.skipped.duplicate_edges, 1);
    }

    #[test]
    fn output_edges_carry_bare_ids() {
        let incoming: Snapshot = serde_json::from_str(
            r#"{"nodes": [{"id": "a"}, {"id": "b"}], "links": [{"source": {"id": "a"}, "target": "b"}]}"#,
        )
        .unwrap();

        let outcome = merge(&Snapshot::default(), &incoming);

        assert_eq!(
            outcome.snapshot.links[0].source,
            Some(Endpoint::Id("a".to_owned()))
        );
    }

    #[test]
    fn malformed_entries_are_counted_not_fatal() {
        let incoming: Snapshot = serde_json::from_str(
            r#"{
                "nodes": [{"name": "no id"}, {"id": "  "}, {"id": "ok"}],
                "links": [{"source": "ok"}, {"target": "ok"}, {"source": {"name": "x"}, "target": "ok"}]
            }"#,
        )
        .unwrap();

        let outcome = merge(&Snapshot::default(), &incoming);

        assert_eq!(ids(&outcome.snapshot), vec!["ok"]);
        assert!(outcome.snapshot.links.is_empty());
        assert_eq!(outcome.skipped.malformed_nodes, 2);
        assert_eq!(outcome.skipped.malformed_edges, 3);
    }

    #[test]
    fn inputs_are_not_mutated_and_order_is_stable() {
        let existing = snapshot(&["c", "a"], &[("c", "a", None)]);
        let incoming = snapshot(&["b", "a", "d"], &[("b", "d", None)]);
        let existing_before = existing.clone();
        let incoming_before = incoming.clone();

        let outcome = merge(&existing, &incoming);

        assert_eq!(existing, existing_before);
        assert_eq!(incoming, incoming_before);
        assert_eq!(ids(&outcome.snapshot), vec!["c", "a", "b", "d"]);
        assert_eq!(outcome.added_nodes, vec!["b".to_owned(), "d".to_owned()]);
    }

    fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
        let ids = prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]);
        let labels = prop::option::of(prop::sample::select(vec!["RELATED", "CAUSES", ""]));
        (
            prop::collection::vec(ids.clone(), 0..8),
            prop::collection::vec((ids.clone(), ids, labels), 0..12),
        )
            .prop_map(|(nodes, links)| {
                Snapshot::new(
                    nodes.into_iter().map(NodeRecord::new).collect(),
                    links
                        .into_iter()
                        .map(|(source, target, label)| match label {
                            Some(label) => EdgeRecord::labeled(source, target, label),
                            None => EdgeRecord::new(source, target),
                        })
                        .collect(),
                )
            })
    }

    proptest! {
        #[test]
        fn remerging_the_same_batch_adds_nothing(a in arb_snapshot(), b in arb_snapshot()) {
            let once = merge(&a, &b).snapshot;
            let twice = merge(&once, &b);

            prop_assert_eq!(&twice.snapshot, &once);
            prop_assert!(twice.added_nodes.is_empty());
            prop_assert_eq!(twice.added_edges, 0);
        }

        #[test]
        fn merge_is_deterministic(a in arb_snapshot(), b in arb_snapshot()) {
            prop_assert_eq!(merge(&a, &b), merge(&a, &b));
        }
    }
}
