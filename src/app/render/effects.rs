use std::collections::{HashMap, HashSet};

use crate::graph::EntityModel;
use crate::util::stable_phase;

/// Time-based emphasis for newly arrived nodes.
///
/// A mark lasts for a fixed window and then expires on its own. Callers may
/// keep passing the same id set every frame; only ids that newly appear in
/// it start a fresh mark, so an externally held set that is never cleared
/// still decays.
#[derive(Clone, Debug)]
pub struct HighlightTracker {
    window: f64,
    marked_at: HashMap<String, f64>,
    external: HashSet<String>,
}

impl HighlightTracker {
    pub fn new(window_secs: f32) -> Self {
        Self {
            window: f64::from(window_secs.max(0.0)),
            marked_at: HashMap::new(),
            external: HashSet::new(),
        }
    }

    pub fn mark(&mut self, id: &str, now: f64) {
        self.marked_at.insert(id.to_owned(), now);
    }

    /// Marks ids that were not in the previously observed external set and
    /// returns them.
    pub fn observe_external(&mut self, ids: &HashSet<String>, now: f64) -> Vec<String> {
        let mut fresh = ids.difference(&self.external).cloned().collect::<Vec<_>>();
        fresh.sort();
        for id in &fresh {
            self.marked_at.insert(id.clone(), now);
        }
        self.external.clone_from(ids);
        fresh
    }

    /// Emphasis in `[0, 1]`: full right after marking, zero once the window
    /// has elapsed.
    pub fn strength(&self, id: &str, now: f64) -> f32 {
        let Some(&marked_at) = self.marked_at.get(id) else {
            return 0.0;
        };
        if self.window <= 0.0 {
            return 0.0;
        }
        let elapsed = (now - marked_at).max(0.0);
        (1.0 - elapsed / self.window).clamp(0.0, 1.0) as f32
    }

    pub fn is_highlighted(&self, id: &str, now: f64) -> bool {
        self.strength(id, now) > 0.0
    }

    /// Drops expired marks. Returns whether any are still live.
    pub fn prune(&mut self, now: f64) -> bool {
        let window = self.window;
        self.marked_at.retain(|_, marked_at| now - *marked_at < window);
        !self.marked_at.is_empty()
    }

    pub fn clear(&mut self) {
        self.marked_at.clear();
        self.external.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecorationKind {
    OuterRing,
    InnerRing,
    Pulse,
}

/// One animated ornament attached to a node. Angles are in radians around
/// the node's local x and z axes.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoration {
    pub node_id: String,
    pub kind: DecorationKind,
    pub tilt: f32,
    pub spin: f32,
    pub phase: f32,
    pub expires_at: Option<f64>,
}

impl Decoration {
    fn new(node_id: &str, kind: DecorationKind, expires_at: Option<f64>) -> Self {
        let phase = stable_phase((node_id, kind));
        Self {
            node_id: node_id.to_owned(),
            kind,
            tilt: phase * std::f32::consts::TAU,
            spin: 0.0,
            phase,
            expires_at,
        }
    }

    /// Scale factor for the pulse halo at `time`.
    pub fn pulse_scale(&self, time: f64) -> f32 {
        let angle = time * 2.0 + f64::from(self.phase) * std::f64::consts::TAU;
        1.0 + (angle.sin() as f32) * 0.2
    }
}

/// Plain list of per-node ornaments, advanced once per frame.
#[derive(Clone, Debug, Default)]
pub struct Decorations {
    items: Vec<Decoration>,
}

impl Decorations {
    /// Rebuilds the permanent ornaments for `model`. Rings keep their current
    /// angles; timed pulses survive while their node still exists.
    pub fn rebuild(&mut self, model: &EntityModel, ring_importance: f32, importance_cap: f32) {
        let mut previous = std::mem::take(&mut self.items)
            .into_iter()
            .map(|item| ((item.node_id.clone(), item.kind, item.expires_at.is_some()), item))
            .collect::<HashMap<_, _>>();

        for entity in &model.nodes {
            let important = entity
                .record
                .clamped_importance(importance_cap)
                .is_some_and(|importance| importance > ring_importance);

            let mut wanted = Vec::with_capacity(3);
            if entity.is_root || important {
                wanted.push(DecorationKind::OuterRing);
            }
            if entity.is_root {
                wanted.push(DecorationKind::InnerRing);
                wanted.push(DecorationKind::Pulse);
            }

            for kind in wanted {
                let key = (entity.id().to_owned(), kind, false);
                let item = previous
                    .remove(&key)
                    .unwrap_or_else(|| Decoration::new(entity.id(), kind, None));
                self.items.push(item);
            }
        }

        let mut timed = previous
            .into_values()
            .filter(|item| item.expires_at.is_some() && model.index_of(&item.node_id).is_some())
            .collect::<Vec<_>>();
        timed.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        self.items.extend(timed);
    }

    /// Adds or refreshes a pulse that ends at `until`.
    pub fn pulse_until(&mut self, node_id: &str, until: f64) {
        let existing = self.items.iter_mut().find(|item| {
            item.node_id == node_id
                && item.kind == DecorationKind::Pulse
                && item.expires_at.is_some()
        });
        if let Some(existing) = existing {
            existing.expires_at = Some(until);
            return;
        }
        self.items.push(Decoration::new(node_id, DecorationKind::Pulse, Some(until)));
    }

    /// Spins rings by elapsed time and drops expired pulses.
    pub fn advance(&mut self, dt: f32, now: f64) {
        let dt = dt.max(0.0);
        self.items
            .retain(|item| item.expires_at.is_none_or(|until| now < until));
        for item in &mut self.items {
            match item.kind {
                DecorationKind::OuterRing => {
                    item.spin += 0.6 * dt;
                    item.tilt += 0.3 * dt;
                }
                DecorationKind::InnerRing => {
                    item.spin -= 1.2 * dt;
                    item.tilt += 0.6 * dt;
                }
                DecorationKind::Pulse => {}
            }
            item.spin = item.spin.rem_euclid(std::f32::consts::TAU);
            item.tilt = item.tilt.rem_euclid(std::f32::consts::TAU);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeRecord, Snapshot};

    #[test]
    fn highlight_decays_after_window() {
        let mut tracker = HighlightTracker::new(5.0);
        tracker.mark("fresh", 10.0);

        assert_eq!(tracker.strength("fresh", 10.0), 1.0);
        let midway = tracker.strength("fresh", 12.5);
        assert!(midway > 0.0 && midway < 1.0);
        assert!(tracker.is_highlighted("fresh", 14.9));
        assert!(!tracker.is_highlighted("fresh", 15.0));
        assert_eq!(tracker.strength("fresh", 60.0), 0.0);
        assert!(!tracker.prune(15.0));
    }

    #[test]
    fn external_set_never_cleared_still_decays() {
        let mut tracker = HighlightTracker::new(5.0);
        let set = HashSet::from(["a".to_owned()]);

        for frame in 0..600 {
            tracker.observe_external(&set, f64::from(frame) * 0.016);
        }
        assert!(!tracker.is_highlighted("a", 9.6));

        let grown = HashSet::from(["a".to_owned(), "b".to_owned()]);
        assert_eq!(tracker.observe_external(&grown, 10.0), vec!["b".to_owned()]);
        assert!(!tracker.is_highlighted("a", 10.0));
        assert!(tracker.is_highlighted("b", 10.0));
    }

    #[test]
    fn remark_restarts_the_window() {
        let mut tracker = HighlightTracker::new(5.0);
        tracker.mark("a", 0.0);
        tracker.mark("a", 4.0);
        assert!(tracker.is_highlighted("a", 8.0));
    }

    fn model_with_root_and_important() -> EntityModel {
        let mut root = NodeRecord::new("root");
        root.role = Some("root".to_owned());
        let mut big = NodeRecord::new("big");
        big.importance = Some(8.0);
        let mut small = NodeRecord::new("small");
        small.importance = Some(1.0);
        EntityModel::from_snapshot(&Snapshot::new(vec![root, big, small], Vec::new()))
    }

    #[test]
    fn ornaments_follow_root_and_importance() {
        let model = model_with_root_and_important();
        let mut decorations = Decorations::default();
        decorations.rebuild(&model, 4.0, 12.0);

        let kinds = |id: &str| {
            decorations
                .iter()
                .filter(|item| item.node_id == id)
                .map(|item| item.kind)
                .collect::<Vec<_>>()
        };
        assert_eq!(
            kinds("root"),
            vec![DecorationKind::OuterRing, DecorationKind::InnerRing, DecorationKind::Pulse]
        );
        assert_eq!(kinds("big"), vec![DecorationKind::OuterRing]);
        assert!(kinds("small").is_empty());
    }

    #[test]
    fn rings_keep_angles_across_rebuild_and_pulses_expire() {
        let model = model_with_root_and_important();
        let mut decorations = Decorations::default();
        decorations.rebuild(&model, 4.0, 12.0);
        decorations.pulse_until("small", 5.0);
        decorations.advance(1.0, 1.0);

        let spun = decorations
            .iter()
            .find(|item| item.node_id == "big")
            .map(|item| item.spin)
            .unwrap();
        assert!(spun > 0.0);

        decorations.rebuild(&model, 4.0, 12.0);
        let kept = decorations.iter().find(|item| item.node_id == "big").unwrap();
        assert_eq!(kept.spin, spun);
        assert!(decorations.iter().any(|item| item.node_id == "small"));

        decorations.advance(0.1, 5.0);
        assert!(!decorations.iter().any(|item| item.node_id == "small"));
    }

    #[test]
    fn pulse_scale_stays_within_amplitude() {
        let pulse = Decoration::new("n", DecorationKind::Pulse, None);
        for step in 0..100 {
            let scale = pulse.pulse_scale(f64::from(step) * 0.1);
            assert!((0.8..=1.2).contains(&scale));
        }
    }
}
