mod effects;
mod paint;
mod palette;

use std::collections::HashSet;

use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

use crate::graph::{Entity, EntityModel};

pub use effects::{Decoration, DecorationKind, Decorations, HighlightTracker};
pub use paint::{FrameInputs, ProjectedNode, draw_scene, project_nodes};
pub use palette::Palette;
use palette::{blend_color, parse_hex, with_opacity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub group_palette: Vec<String>,
    pub default_color: String,
    pub event_color: String,
    pub event_role: String,
    pub selected_color: String,
    pub highlight_color: String,
    pub label_color: String,
    pub edge_color: String,
    pub edge_selected_color: String,
    pub background_color: String,
    pub default_size: f32,
    pub min_size: f32,
    pub importance_cap: f32,
    pub connection_weight: f32,
    pub max_scale_factor: f32,
    pub root_boost: f32,
    pub ring_importance: f32,
    pub heritage_tint: f32,
    pub hero_connections: usize,
    pub label_fade_start: f32,
    pub label_cutoff: f32,
    pub hero_fade_start: f32,
    pub hero_cutoff: f32,
    pub max_label_opacity: f32,
    pub label_max_chars: usize,
    pub highlight_window_secs: f32,
    pub edge_width: f32,
    pub edge_width_selected: f32,
    pub edge_opacity: f32,
    pub edge_opacity_selected: f32,
    pub particles: usize,
    pub particles_selected: usize,
    pub particle_speed: f32,
    pub particle_speed_selected: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            group_palette: ["#00FFFF", "#BD00FF", "#FF0055", "#FFFF00", "#00FF99", "#FF9900"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            default_color: "#4285F4".to_owned(),
            event_color: "#FF5252".to_owned(),
            event_role: "event".to_owned(),
            selected_color: "#F5CE5D".to_owned(),
            highlight_color: "#FFFFA0".to_owned(),
            label_color: "#E3E3E3".to_owned(),
            edge_color: "#6495ED".to_owned(),
            edge_selected_color: "#F6CE68".to_owned(),
            background_color: "#050505".to_owned(),
            default_size: 2.0,
            min_size: 0.5,
            importance_cap: 12.0,
            connection_weight: 0.35,
            max_scale_factor: 3.0,
            root_boost: 1.5,
            ring_importance: 4.0,
            heritage_tint: 0.25,
            hero_connections: 6,
            label_fade_start: 250.0,
            label_cutoff: 500.0,
            hero_fade_start: 500.0,
            hero_cutoff: 1000.0,
            max_label_opacity: 0.9,
            label_max_chars: 32,
            highlight_window_secs: 5.0,
            edge_width: 1.0,
            edge_width_selected: 2.6,
            edge_opacity: 0.4,
            edge_opacity_selected: 0.9,
            particles: 2,
            particles_selected: 6,
            particle_speed: 0.3,
            particle_speed_selected: 0.9,
        }
    }
}

/// World-space glyph size. Grows with importance and connection count,
/// capped at `max_scale_factor` times the boosted base so no degree can
/// blow a glyph up. `emphasis` in `[0, 1]` scales towards the root boost;
/// roots always get the full boost.
pub fn node_size(entity: &Entity, emphasis: f32, config: &RenderConfig) -> f32 {
    let cap = config.importance_cap.max(config.min_size);
    let base = entity
        .record
        .clamped_importance(cap)
        .map(|importance| importance.max(config.min_size))
        .unwrap_or(config.default_size);

    let growth = 1.0 + config.connection_weight.max(0.0) * (entity.connections as f32).ln_1p();
    let scale = growth.min(config.max_scale_factor.max(1.0));
    let emphasis = if entity.is_root {
        1.0
    } else if emphasis.is_finite() {
        emphasis.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let boost = 1.0 + (config.root_boost.max(1.0) - 1.0) * emphasis;

    base * scale * boost
}

/// Colour before selection or highlight overrides: event role, then an
/// explicit colour attribute, then the group palette, then the default.
pub fn base_color(entity: &Entity, palette: &Palette, config: &RenderConfig) -> Color32 {
    if entity.record.has_role(&config.event_role) {
        return palette.event;
    }
    entity
        .record
        .color
        .as_deref()
        .and_then(parse_hex)
        .or_else(|| entity.record.group_id.and_then(|group| palette.group_color(group)))
        .unwrap_or(palette.default_node)
}

pub fn is_hero(entity: &Entity, selected: bool, config: &RenderConfig) -> bool {
    selected || entity.is_root || entity.connections >= config.hero_connections.max(1)
}

/// Label opacity for a node seen from `distance`. Full (`max_label_opacity`)
/// up to the fade start, linear down to zero at the cutoff, zero beyond.
/// Hero nodes use the farther pair of thresholds.
pub fn label_opacity(distance: f32, hero: bool, config: &RenderConfig) -> f32 {
    let (start, cutoff) = if hero {
        (config.hero_fade_start, config.hero_cutoff)
    } else {
        (config.label_fade_start, config.label_cutoff)
    };
    let max = config.max_label_opacity.clamp(0.0, 1.0);

    if !distance.is_finite() || distance >= cutoff {
        return 0.0;
    }
    if distance <= start {
        return max;
    }
    let span = (cutoff - start).max(f32::EPSILON);
    (max * (1.0 - (distance - start) / span)).clamp(0.0, max)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeStyle {
    pub width: f32,
    pub color: Color32,
    pub particles: usize,
    pub particle_speed: f32,
}

pub fn edge_style(touches_selection: bool, palette: &Palette, config: &RenderConfig) -> EdgeStyle {
    if touches_selection {
        EdgeStyle {
            width: config.edge_width_selected,
            color: with_opacity(palette.edge_selected, config.edge_opacity_selected),
            particles: config.particles_selected,
            particle_speed: config.particle_speed_selected,
        }
    } else {
        EdgeStyle {
            width: config.edge_width,
            color: with_opacity(palette.edge, config.edge_opacity),
            particles: config.particles,
            particle_speed: config.particle_speed,
        }
    }
}

/// Fractions along an edge where flow particles sit at `time`.
pub fn particle_offsets(style: &EdgeStyle, phase: f32, time: f64) -> impl Iterator<Item = f32> {
    let count = style.particles;
    let travelled = (time * f64::from(style.particle_speed)).fract() as f32;
    (0..count).map(move |slot| (travelled + phase + slot as f32 / count as f32).fract())
}

/// Per-node visual state that only changes with the model.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeGlyph {
    pub size: f32,
    pub color: Color32,
    pub label: String,
}

/// Owns styling state that outlives a single frame: resolved palette,
/// per-node glyphs, highlight marks and animated ornaments.
pub struct RenderPipeline {
    config: RenderConfig,
    palette: Palette,
    glyphs: Vec<NodeGlyph>,
    highlights: HighlightTracker,
    decorations: Decorations,
}

impl RenderPipeline {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            palette: Palette::from_config(&config),
            highlights: HighlightTracker::new(config.highlight_window_secs),
            config,
            glyphs: Vec::new(),
            decorations: Decorations::default(),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn glyphs(&self) -> &[NodeGlyph] {
        &self.glyphs
    }

    pub fn highlights(&self) -> &HighlightTracker {
        &self.highlights
    }

    pub fn decorations(&self) -> &Decorations {
        &self.decorations
    }

    /// Glyph sizes aligned with the model, used for collision radii.
    pub fn radii(&self) -> Vec<f32> {
        self.glyphs.iter().map(|glyph| glyph.size).collect()
    }

    /// Recomputes glyphs after the entity model changed.
    pub fn rebuild(&mut self, model: &EntityModel) {
        let base = model
            .nodes
            .iter()
            .map(|entity| base_color(entity, &self.palette, &self.config))
            .collect::<Vec<_>>();
        let tint = self.config.heritage_tint.clamp(0.0, 1.0);

        self.glyphs = model
            .nodes
            .iter()
            .enumerate()
            .map(|(index, entity)| {
                let color = match model.generation_source_index(index) {
                    Some(source) if tint > 0.0 => blend_color(base[index], base[source], tint),
                    _ => base[index],
                };
                NodeGlyph {
                    size: node_size(entity, 0.0, &self.config),
                    color,
                    label: crate::util::truncate_label(
                        entity.record.display_name(),
                        self.config.label_max_chars.max(1),
                    ),
                }
            })
            .collect();

        self.decorations.rebuild(
            model,
            self.config.ring_importance,
            self.config.importance_cap,
        );
    }

    /// Glyph size at `now`. Highlighted nodes are boosted and shrink back
    /// as their highlight decays.
    pub fn display_size(&self, model: &EntityModel, index: usize, now: f64) -> f32 {
        let Some(entity) = model.nodes.get(index) else {
            return self.config.default_size;
        };
        let strength = self.highlights.strength(entity.id(), now);
        if strength > 0.0 {
            return node_size(entity, strength, &self.config);
        }
        self.glyphs
            .get(index)
            .map_or_else(|| node_size(entity, 0.0, &self.config), |glyph| glyph.size)
    }

    /// Starts the timed emphasis for freshly merged nodes.
    pub fn highlight_new<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>, now: f64) {
        let until = now + f64::from(self.config.highlight_window_secs.max(0.0));
        for id in ids {
            self.highlights.mark(id, now);
            self.decorations.pulse_until(id, until);
        }
    }

    /// Picks up ids that newly entered an externally held highlight set.
    /// Expiry stays time-based regardless of when the set is cleared.
    pub fn observe_highlight_set(&mut self, ids: &HashSet<String>, now: f64) {
        let fresh = self.highlights.observe_external(ids, now);
        self.highlight_new(&fresh, now);
    }

    /// Advances time-based state. Returns whether anything is still animating.
    pub fn advance(&mut self, dt: f32, now: f64) -> bool {
        self.decorations.advance(dt, now);
        let live_highlights = self.highlights.prune(now);
        live_highlights || self.decorations.len() > 0
    }

    pub fn clear(&mut self) {
        self.glyphs.clear();
        self.highlights.clear();
        self.decorations.clear();
    }
}
