use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_EDGE_LABEL: &str = "RELATED";

/// A node as producers deliver it. Derived fields (connections, hero flags)
/// live on [`super::Entity`], positions live in the layout engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "label", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, alias = "val", skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    #[serde(
        default,
        rename = "groupId",
        alias = "group",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<i64>,
    #[serde(
        default,
        rename = "generationSource",
        skip_serializing_if = "Option::is_none"
    )]
    pub generation_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(id)
        }
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.id)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(role))
    }

    pub fn is_root(&self) -> bool {
        self.has_role("root")
            || self.has_role("concept")
            || self
                .keyword
                .as_deref()
                .is_some_and(|keyword| keyword.trim().eq_ignore_ascii_case(self.id.trim()))
    }

    /// Importance clamped to `[0, cap]`; non-finite values count as missing.
    pub fn clamped_importance(&self, cap: f32) -> Option<f32> {
        self.importance
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, cap.max(0.0)))
    }

    pub fn stored_position(&self) -> Option<[f32; 3]> {
        match (self.x, self.y, self.z) {
            (Some(x), Some(y), Some(z)) if x.is_finite() && y.is_finite() && z.is_finite() => {
                Some([x, y, z])
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndpointObject {
    #[serde(default)]
    pub id: Option<String>,
}

/// Producers send either a bare id or the whole node object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Id(String),
    Node(EndpointObject),
}

impl Endpoint {
    pub fn id(&self) -> Option<&str> {
        let id = match self {
            Self::Id(id) => id.as_str(),
            Self::Node(node) => node.id.as_deref()?,
        };
        let id = id.trim();
        (!id.is_empty()).then_some(id)
    }
}

impl From<&str> for Endpoint {
    fn from(value: &str) -> Self {
        Self::Id(value.to_owned())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(default)]
    pub source: Option<Endpoint>,
    #[serde(default)]
    pub target: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl EdgeRecord {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: Some(source.into()),
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn labeled(source: &str, target: &str, name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            ..Self::new(source, target)
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source.as_ref().and_then(Endpoint::id)
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target.as_ref().and_then(Endpoint::id)
    }

    /// `name`, then `type`, then [`DEFAULT_EDGE_LABEL`].
    pub fn normalized_label(&self) -> &str {
        [self.name.as_deref(), self.kind.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|label| !label.is_empty())
            .unwrap_or(DEFAULT_EDGE_LABEL)
    }

    /// The predicate worth drawing, `None` for empty or default labels.
    pub fn visible_label(&self) -> Option<&str> {
        let label = self.normalized_label();
        (!label.eq_ignore_ascii_case(DEFAULT_EDGE_LABEL)).then_some(label)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<EdgeRecord>,
}

impl Snapshot {
    pub fn new(nodes: Vec<NodeRecord>, links: Vec<EdgeRecord>) -> Self {
        Self { nodes, links }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_accepts_id_or_embedded_node() {
        let edge: EdgeRecord = serde_json::from_str(
            r#"{"source": "a", "target": {"id": "b", "name": "Bee", "x": 3.0}, "type": "CAUSES"}"#,
        )
        .unwrap();

        assert_eq!(edge.source_id(), Some("a"));
        assert_eq!(edge.target_id(), Some("b"));
        assert_eq!(edge.normalized_label(), "CAUSES");
    }

    #[test]
    fn label_falls_back_to_related() {
        let mut edge = EdgeRecord::new("a", "b");
        assert_eq!(edge.normalized_label(), DEFAULT_EDGE_LABEL);
        assert_eq!(edge.visible_label(), None);

        edge.name = Some("  ".to_owned());
        edge.kind = Some("MENTIONS".to_owned());
        assert_eq!(edge.normalized_label(), "MENTIONS");
        assert_eq!(edge.visible_label(), Some("MENTIONS"));
    }

    #[test]
    fn node_accepts_producer_aliases_and_keeps_unknown_fields() {
        let node: NodeRecord = serde_json::from_str(
            r#"{"id": "ai", "label": "Concept", "val": 7.5, "group": 3, "centrality": 0.2}"#,
        )
        .unwrap();

        assert_eq!(node.role.as_deref(), Some("Concept"));
        assert_eq!(node.importance, Some(7.5));
        assert_eq!(node.group_id, Some(3));
        assert_eq!(node.attributes.get("centrality"), Some(&Value::from(0.2)));

        let encoded = serde_json::to_value(&node).unwrap();
        assert_eq!(encoded["groupId"], Value::from(3));
        assert_eq!(encoded["centrality"], Value::from(0.2));
    }

    #[test]
    fn root_detection_uses_role_concept_or_keyword() {
        let mut node = NodeRecord::new("Climate");
        assert!(!node.is_root());

        node.keyword = Some("climate".to_owned());
        assert!(node.is_root());

        let mut other = NodeRecord::new("x");
        other.role = Some("ROOT".to_owned());
        assert!(other.is_root());

        let mut concept = NodeRecord::new("y");
        concept.role = Some("Concept".to_owned());
        assert!(concept.is_root());

        concept.role = Some("Event".to_owned());
        assert!(!concept.is_root());
    }

    #[test]
    fn importance_is_clamped_and_nan_is_missing() {
        let mut node = NodeRecord::new("n");
        node.importance = Some(40.0);
        assert_eq!(node.clamped_importance(12.0), Some(12.0));

        node.importance = Some(-3.0);
        assert_eq!(node.clamped_importance(12.0), Some(0.0));

        node.importance = Some(f32::NAN);
        assert_eq!(node.clamped_importance(12.0), None);
    }
}
