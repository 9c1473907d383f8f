use std::collections::HashMap;

use super::model::{NodeRecord, Snapshot};

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub record: NodeRecord,
    pub connections: usize,
    pub is_root: bool,
}

impl Entity {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityEdge {
    pub source: usize,
    pub target: usize,
    pub label: Option<String>,
    pub weight: f32,
}

impl EntityEdge {
    pub fn touches(&self, index: usize) -> bool {
        self.source == index || self.target == index
    }
}

/// Clean working copy of a snapshot: owned nodes, edges resolved to node
/// indices, and derived connection counts. Nothing in here refers back to
/// the snapshot it was built from.
#[derive(Clone, Debug, Default)]
pub struct EntityModel {
    pub nodes: Vec<Entity>,
    pub edges: Vec<EntityEdge>,
    pub index_by_id: HashMap<String, usize>,
    pub neighbors: Vec<Vec<usize>>,
    pub root_index: Option<usize>,
    pub dropped_edges: usize,
}

impl EntityModel {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        let mut index_by_id = HashMap::with_capacity(snapshot.nodes.len());

        for record in &snapshot.nodes {
            if record.id.is_empty() || index_by_id.contains_key(&record.id) {
                continue;
            }
            index_by_id.insert(record.id.clone(), nodes.len());
            nodes.push(Entity {
                is_root: record.is_root(),
                record: record.clone(),
                connections: 0,
            });
        }

        let mut edges = Vec::with_capacity(snapshot.links.len());
        let mut neighbors = vec![Vec::new(); nodes.len()];
        let mut dropped_edges = 0usize;

        for link in &snapshot.links {
            let resolved = link
                .source_id()
                .and_then(|id| index_by_id.get(id))
                .zip(link.target_id().and_then(|id| index_by_id.get(id)));
            let Some((&source, &target)) = resolved else {
                dropped_edges += 1;
                continue;
            };

            nodes[source].connections += 1;
            if source != target {
                nodes[target].connections += 1;
                neighbors[source].push(target);
                neighbors[target].push(source);
            }

            edges.push(EntityEdge {
                source,
                target,
                label: link.visible_label().map(str::to_owned),
                weight: link.weight.filter(|weight| weight.is_finite()).unwrap_or(1.0),
            });
        }

        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        let root_index = nodes.iter().position(|entity| entity.is_root);

        Self {
            nodes,
            edges,
            index_by_id,
            neighbors,
            root_index,
            dropped_edges,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn connections(&self, id: &str) -> Option<usize> {
        self.get(id).map(|entity| entity.connections)
    }

    /// Heritage source of a node, when that source is still in the graph.
    pub fn generation_source_index(&self, index: usize) -> Option<usize> {
        let source = self.nodes.get(index)?.record.generation_source.as_deref()?;
        self.index_of(source).filter(|&source_index| source_index != index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::EdgeRecord;

    fn star() -> Snapshot {
        Snapshot::new(
            vec![NodeRecord::new("A"), NodeRecord::new("B"), NodeRecord::new("C")],
            vec![EdgeRecord::new("A", "B"), EdgeRecord::new("A", "C")],
        )
    }

    #[test]
    fn counts_connections_per_node() {
        let model = EntityModel::from_snapshot(&star());

        assert_eq!(model.connections("A"), Some(2));
        assert_eq!(model.connections("B"), Some(1));
        assert_eq!(model.connections("C"), Some(1));
        assert_eq!(model.neighbors[0], vec![1, 2]);
    }

    #[test]
    fn dangling_edges_are_excluded() {
        let mut snapshot = star();
        snapshot.links.push(EdgeRecord::new("A", "z"));
        snapshot.links.push(EdgeRecord::new("z", "B"));

        let model = EntityModel::from_snapshot(&snapshot);

        assert_eq!(model.edges.len(), 2);
        assert_eq!(model.dropped_edges, 2);
        assert_eq!(model.connections("A"), Some(2));
        assert!(model.get("z").is_none());
    }

    #[test]
    fn clean_copy_does_not_alias_the_snapshot() {
        let snapshot = star();
        let mut model = EntityModel::from_snapshot(&snapshot);

        model.nodes[0].record.x = Some(42.0);

        assert_eq!(snapshot.nodes[0].x, None);
    }

    #[test]
    fn self_loop_counts_once() {
        let snapshot = Snapshot::new(vec![NodeRecord::new("A")], vec![EdgeRecord::new("A", "A")]);

        let model = EntityModel::from_snapshot(&snapshot);

        assert_eq!(model.connections("A"), Some(1));
        assert!(model.neighbors[0].is_empty());
    }

    #[test]
    fn default_labels_are_hidden_but_edges_kept() {
        let snapshot = Snapshot::new(
            vec![NodeRecord::new("A"), NodeRecord::new("B")],
            vec![
                EdgeRecord::labeled("A", "B", "RELATED"),
                EdgeRecord::labeled("B", "A", "CITES"),
            ],
        );

        let model = EntityModel::from_snapshot(&snapshot);

        assert_eq!(model.edges.len(), 2);
        assert_eq!(model.edges[0].label, None);
        assert_eq!(model.edges[1].label.as_deref(), Some("CITES"));
    }

    #[test]
    fn root_index_follows_role() {
        let mut root = NodeRecord::new("R");
        root.role = Some("root".to_owned());
        let snapshot = Snapshot::new(vec![NodeRecord::new("A"), root], Vec::new());

        let model = EntityModel::from_snapshot(&snapshot);

        assert_eq!(model.root_index, Some(1));
        assert!(model.nodes[1].is_root);
    }
}
