use std::collections::HashMap;

use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke, vec2};
use glam::{EulerRot, Quat, Vec3};

use crate::app::camera::CameraController;
use crate::app::layout::LayoutEngine;
use crate::graph::EntityModel;
use crate::util::stable_phase;

use super::palette::{blend_color, with_opacity};
use super::{
    Decoration, DecorationKind, RenderPipeline, edge_style, is_hero, label_opacity,
    particle_offsets,
};

const RING_SEGMENTS: usize = 40;
const MIN_SCREEN_RADIUS: f32 = 1.5;
const MAX_SCREEN_RADIUS: f32 = 64.0;
const MIN_PARTICLE_SPAN: f32 = 1.0;

/// A node's footprint on screen for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedNode {
    pub index: usize,
    pub pos: Pos2,
    pub radius: f32,
    pub depth: f32,
}

pub struct FrameInputs<'a> {
    pub model: &'a EntityModel,
    pub layout: &'a LayoutEngine,
    pub camera: &'a CameraController,
    pub pipeline: &'a RenderPipeline,
    pub selected: Option<usize>,
    pub hovered: Option<usize>,
    pub time: f64,
}

/// Projects every positioned node, far to near. Nodes without a finite
/// position or behind the camera are left out.
pub fn project_nodes(
    model: &EntityModel,
    layout: &LayoutEngine,
    camera: &CameraController,
    pipeline: &RenderPipeline,
    time: f64,
    projected: &mut Vec<ProjectedNode>,
) {
    projected.clear();
    for index in 0..model.len() {
        let Some(world) = layout.position(index) else {
            continue;
        };
        let Some(screen) = camera.project_to_screen(world) else {
            continue;
        };
        let size = pipeline.display_size(model, index, time);
        let radius = camera
            .pixels_per_unit(screen.depth)
            .map_or(MIN_SCREEN_RADIUS, |scale| {
                (size * scale).clamp(MIN_SCREEN_RADIUS, MAX_SCREEN_RADIUS)
            });
        projected.push(ProjectedNode {
            index,
            pos: screen.pos(),
            radius,
            depth: screen.depth,
        });
    }
    projected.sort_by(|a, b| b.depth.total_cmp(&a.depth));
}

pub fn draw_scene(
    painter: &Painter,
    rect: Rect,
    frame: &FrameInputs<'_>,
    projected: &[ProjectedNode],
) {
    let palette = frame.pipeline.palette();
    painter.rect_filled(rect, 0.0, palette.background);

    let mut slot_by_index = vec![None; frame.model.len()];
    for (slot, node) in projected.iter().enumerate() {
        if let Some(entry) = slot_by_index.get_mut(node.index) {
            *entry = Some(slot);
        }
    }

    draw_edges(painter, frame, projected, &slot_by_index);

    let mut ornaments: HashMap<usize, Vec<&Decoration>> = HashMap::new();
    for decoration in frame.pipeline.decorations().iter() {
        if let Some(index) = frame.model.index_of(&decoration.node_id) {
            ornaments.entry(index).or_default().push(decoration);
        }
    }

    for node in projected {
        draw_node(painter, frame, node, ornaments.get(&node.index).map(Vec::as_slice));
    }

    for node in projected {
        draw_label(painter, frame, node);
    }
}

fn draw_edges(
    painter: &Painter,
    frame: &FrameInputs<'_>,
    projected: &[ProjectedNode],
    slot_by_index: &[Option<usize>],
) {
    let config = frame.pipeline.config();
    let palette = frame.pipeline.palette();
    let lookup = |index: usize| {
        slot_by_index
            .get(index)
            .copied()
            .flatten()
            .map(|slot| projected[slot])
    };

    for (edge_index, edge) in frame.model.edges.iter().enumerate() {
        if edge.source == edge.target {
            continue;
        }
        let (Some(start), Some(end)) = (lookup(edge.source), lookup(edge.target)) else {
            continue;
        };

        let touches_selection = frame.selected.is_some_and(|selected| edge.touches(selected));
        let style = edge_style(touches_selection, palette, config);
        painter.line_segment([start.pos, end.pos], Stroke::new(style.width, style.color));

        let span = end.pos - start.pos;
        if span.length() > MIN_PARTICLE_SPAN {
            let (particle_radius, particle_opacity) = if touches_selection {
                (2.0, 0.9)
            } else {
                (1.2, 0.5)
            };
            let particle_color = with_opacity(palette.particle, particle_opacity);
            for offset in particle_offsets(&style, stable_phase(edge_index), frame.time) {
                painter.circle_filled(start.pos + span * offset, particle_radius, particle_color);
            }
        }

        if touches_selection
            && let Some(label) = edge.label.as_deref()
            && let (Some(a), Some(b)) = (
                frame.layout.position(edge.source),
                frame.layout.position(edge.target),
            )
        {
            let midpoint = (a + b) * 0.5;
            let opacity = label_opacity(frame.camera.distance_to(midpoint), false, config);
            if opacity > 0.01 {
                painter.text(
                    start.pos + span * 0.5,
                    Align2::CENTER_CENTER,
                    label,
                    FontId::proportional(11.0),
                    with_opacity(palette.edge_selected, opacity),
                );
            }
        }
    }
}

fn draw_node(
    painter: &Painter,
    frame: &FrameInputs<'_>,
    node: &ProjectedNode,
    ornaments: Option<&[&Decoration]>,
) {
    let palette = frame.pipeline.palette();
    let Some(entity) = frame.model.nodes.get(node.index) else {
        return;
    };
    let Some(glyph) = frame.pipeline.glyphs().get(node.index) else {
        return;
    };

    let is_selected = frame.selected == Some(node.index);
    let highlight = frame.pipeline.highlights().strength(entity.id(), frame.time);
    let mut color = blend_color(glyph.color, palette.highlight, highlight);
    if is_selected {
        color = palette.selected;
    }

    let glow_scale = if entity.is_root { 3.2 } else { 2.2 };
    painter.circle_filled(node.pos, node.radius * glow_scale, with_opacity(color, 0.10));
    painter.circle_filled(
        node.pos,
        node.radius * (1.0 + glow_scale) * 0.5,
        with_opacity(color, 0.18),
    );

    let core = if entity.is_root && !is_selected {
        blend_color(color, palette.root_core, 0.55)
    } else {
        color
    };
    painter.circle_filled(node.pos, node.radius, with_opacity(core, 0.9));

    if is_selected {
        painter.circle_stroke(node.pos, node.radius + 4.0, Stroke::new(2.0, palette.selected));
    } else if frame.hovered == Some(node.index) {
        painter.circle_stroke(
            node.pos,
            node.radius + 2.0,
            Stroke::new(1.4, Color32::from_gray(235)),
        );
    }

    let Some(world) = frame.layout.position(node.index) else {
        return;
    };
    for ornament in ornaments.into_iter().flatten() {
        match ornament.kind {
            DecorationKind::OuterRing => draw_ring(
                painter,
                frame.camera,
                world,
                glyph.size * 1.5,
                ornament,
                Stroke::new(1.2, with_opacity(color, 0.8)),
            ),
            DecorationKind::InnerRing => draw_ring(
                painter,
                frame.camera,
                world,
                glyph.size * 2.2,
                ornament,
                Stroke::new(0.8, with_opacity(Color32::WHITE, 0.5)),
            ),
            DecorationKind::Pulse => {
                let scale = ornament.pulse_scale(frame.time);
                let strength = if ornament.expires_at.is_some() {
                    highlight.max(0.3)
                } else {
                    0.6
                };
                painter.circle_stroke(
                    node.pos,
                    node.radius * 1.6 * scale,
                    Stroke::new(1.5, with_opacity(color, strength)),
                );
            }
        }
    }
}

fn draw_ring(
    painter: &Painter,
    camera: &CameraController,
    center: Vec3,
    radius: f32,
    ornament: &Decoration,
    stroke: Stroke,
) {
    let rotation = Quat::from_euler(EulerRot::XZY, ornament.tilt, ornament.spin, 0.0);
    let points = (0..RING_SEGMENTS)
        .filter_map(|segment| {
            let angle = segment as f32 / RING_SEGMENTS as f32 * std::f32::consts::TAU;
            let local = Vec3::new(angle.cos(), angle.sin(), 0.0) * radius;
            camera.project_to_screen(center + rotation * local)
        })
        .map(|point| point.pos())
        .collect::<Vec<_>>();

    if points.len() == RING_SEGMENTS {
        painter.add(Shape::closed_line(points, stroke));
    }
}

fn draw_label(painter: &Painter, frame: &FrameInputs<'_>, node: &ProjectedNode) {
    let config = frame.pipeline.config();
    let (Some(entity), Some(glyph), Some(world)) = (
        frame.model.nodes.get(node.index),
        frame.pipeline.glyphs().get(node.index),
        frame.layout.position(node.index),
    ) else {
        return;
    };

    let hero = is_hero(entity, frame.selected == Some(node.index), config);
    let opacity = label_opacity(frame.camera.distance_to(world), hero, config);
    if opacity <= 0.01 {
        return;
    }

    let font_size = if entity.is_root {
        14.0
    } else if hero {
        13.0
    } else {
        12.0
    };
    painter.text(
        node.pos - vec2(0.0, node.radius + 4.0),
        Align2::CENTER_BOTTOM,
        &glyph.label,
        FontId::proportional(font_size),
        with_opacity(frame.pipeline.palette().label, opacity),
    );
}

#[cfg(test)]
mod tests {
    use eframe::egui::Pos2;

    use super::*;
    use crate::app::camera::CameraConfig;
    use crate::app::layout::LayoutConfig;
    use crate::app::render::RenderConfig;
    use crate::graph::{NodeRecord, Snapshot};

    fn radius_of(projected: &[ProjectedNode], index: usize) -> f32 {
        projected
            .iter()
            .find(|node| node.index == index)
            .map(|node| node.radius)
            .unwrap()
    }

    #[test]
    fn fresh_nodes_draw_larger_until_their_highlight_expires() {
        let model = EntityModel::from_snapshot(&Snapshot::new(
            vec![NodeRecord::new("known"), NodeRecord::new("fresh")],
            Vec::new(),
        ));
        let mut pipeline = RenderPipeline::new(RenderConfig::default());
        pipeline.rebuild(&model);
        let mut layout = LayoutEngine::new(LayoutConfig::default());
        layout.sync(&model, &pipeline.radii());
        assert!(layout.pin("known", Vec3::new(-20.0, 0.0, 0.0)));
        assert!(layout.pin("fresh", Vec3::new(20.0, 0.0, 0.0)));
        let mut camera = CameraController::new(CameraConfig::default());
        camera.set_viewport(Rect::from_min_size(Pos2::ZERO, vec2(800.0, 600.0)));
        let mut projected = Vec::new();

        pipeline.highlight_new(&["fresh".to_owned()], 0.0);
        project_nodes(&model, &layout, &camera, &pipeline, 0.0, &mut projected);
        let known = radius_of(&projected, 0);
        let fresh = radius_of(&projected, 1);
        assert!(fresh > known * 1.4, "fresh {fresh} known {known}");

        project_nodes(&model, &layout, &camera, &pipeline, 2.5, &mut projected);
        let fading = radius_of(&projected, 1);
        assert!(fading < fresh && fading > known);

        pipeline.advance(0.1, 6.0);
        project_nodes(&model, &layout, &camera, &pipeline, 6.0, &mut projected);
        assert!((radius_of(&projected, 1) - radius_of(&projected, 0)).abs() < 1e-4);
    }
}
