use eframe::egui::{self, Pos2, Vec2};
use glam::Vec3;

use crate::graph::{Entity, EntityModel};

use super::camera::CameraController;
use super::render::ProjectedNode;

/// Extra pick radius in screen pixels so tiny glyphs stay clickable.
const PICK_SLACK: f32 = 4.0;

#[derive(Clone, Debug, PartialEq)]
pub enum GraphEvent {
    NodeSelected(String),
    BackgroundClicked,
    NodeDragged { id: String, position: Vec3 },
    NodeDragEnd { id: String, position: Vec3 },
    Orbit(Vec2),
    Zoom(f32),
}

/// Raw pointer state for one frame, decoupled from egui's response type.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerSample {
    pub hover: Option<Pos2>,
    pub press_origin: Option<Pos2>,
    pub clicked: bool,
    pub drag_started: bool,
    pub dragging: bool,
    pub drag_stopped: bool,
    pub drag_delta: Vec2,
    pub scroll: f32,
}

impl PointerSample {
    pub fn from_response(ui: &egui::Ui, response: &egui::Response) -> Self {
        let primary = egui::PointerButton::Primary;
        let (hover, press_origin, scroll) = ui.input(|input| {
            (
                input.pointer.hover_pos(),
                input.pointer.press_origin(),
                input.raw_scroll_delta.y,
            )
        });

        Self {
            hover,
            press_origin,
            clicked: response.clicked_by(primary),
            drag_started: response.drag_started_by(primary),
            dragging: response.dragged_by(primary),
            drag_stopped: response.drag_stopped_by(primary),
            drag_delta: response.drag_delta(),
            scroll: if response.hovered() { scroll } else { 0.0 },
        }
    }
}

/// Front-most node whose glyph covers `pointer`.
pub fn pick_node(projected: &[ProjectedNode], pointer: Pos2) -> Option<usize> {
    projected
        .iter()
        .filter_map(|node| {
            let distance = node.pos.distance(pointer);
            (distance <= node.radius + PICK_SLACK).then_some((node, distance))
        })
        .min_by(|(a, a_distance), (b, b_distance)| {
            a_distance
                .total_cmp(b_distance)
                .then(a.depth.total_cmp(&b.depth))
        })
        .map(|(node, _)| node.index)
}

#[derive(Clone, Debug, PartialEq)]
struct NodeDrag {
    id: String,
    depth: f32,
    last_position: Option<Vec3>,
}

/// Turns pointer samples into graph events. Holds only the in-flight drag.
#[derive(Default)]
pub struct InteractionGateway {
    drag: Option<NodeDrag>,
}

impl InteractionGateway {
    pub fn is_dragging_node(&self) -> bool {
        self.drag.is_some()
    }

    pub fn handle(
        &mut self,
        sample: &PointerSample,
        projected: &[ProjectedNode],
        model: &EntityModel,
        camera: &CameraController,
    ) -> Vec<GraphEvent> {
        let mut events = Vec::new();

        if sample.drag_started {
            self.drag = sample
                .press_origin
                .or(sample.hover)
                .and_then(|origin| pick_node(projected, origin))
                .and_then(|index| {
                    let depth = projected.iter().find(|node| node.index == index)?.depth;
                    Some(NodeDrag {
                        id: model.nodes.get(index)?.id().to_owned(),
                        depth,
                        last_position: None,
                    })
                });
        }

        if sample.dragging {
            match &mut self.drag {
                Some(drag) => {
                    if let Some(position) = sample
                        .hover
                        .and_then(|pointer| camera.unproject(pointer, drag.depth))
                    {
                        drag.last_position = Some(position);
                        events.push(GraphEvent::NodeDragged {
                            id: drag.id.clone(),
                            position,
                        });
                    }
                }
                None if sample.drag_delta != Vec2::ZERO => {
                    events.push(GraphEvent::Orbit(sample.drag_delta));
                }
                None => {}
            }
        }

        if sample.drag_stopped
            && let Some(drag) = self.drag.take()
            && let Some(position) = drag.last_position
        {
            events.push(GraphEvent::NodeDragEnd {
                id: drag.id,
                position,
            });
        }

        if sample.clicked {
            let picked = sample
                .hover
                .and_then(|pointer| pick_node(projected, pointer))
                .and_then(|index| model.nodes.get(index));
            events.push(match picked {
                Some(entity) => GraphEvent::NodeSelected(entity.id().to_owned()),
                None => GraphEvent::BackgroundClicked,
            });
        }

        if sample.scroll.abs() > f32::EPSILON {
            events.push(GraphEvent::Zoom(sample.scroll));
        }

        events
    }
}

type NodeClick = Box<dyn FnMut(&Entity)>;
type NodeDragEnd = Box<dyn FnMut(&Entity, Vec3)>;

/// Upward hooks for selection and drag-end. Both receive the full entity,
/// derived fields included.
#[derive(Default)]
pub struct GraphCallbacks {
    pub on_node_click: Option<NodeClick>,
    pub on_node_drag_end: Option<NodeDragEnd>,
}

impl GraphCallbacks {
    pub fn node_clicked(&mut self, entity: &Entity) {
        if let Some(callback) = self.on_node_click.as_mut() {
            callback(entity);
        }
    }

    pub fn node_drag_ended(&mut self, entity: &Entity, position: Vec3) {
        if let Some(callback) = self.on_node_drag_end.as_mut() {
            callback(entity, position);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use eframe::egui::Rect;

    use super::*;
    use crate::app::camera::CameraConfig;
    use crate::graph::{NodeRecord, Snapshot};

    fn projected() -> Vec<ProjectedNode> {
        vec![
            ProjectedNode {
                index: 0,
                pos: Pos2::new(100.0, 100.0),
                radius: 10.0,
                depth: 300.0,
            },
            ProjectedNode {
                index: 1,
                pos: Pos2::new(104.0, 100.0),
                radius: 10.0,
                depth: 200.0,
            },
            ProjectedNode {
                index: 2,
                pos: Pos2::new(400.0, 300.0),
                radius: 3.0,
                depth: 400.0,
            },
        ]
    }

    fn model() -> EntityModel {
        EntityModel::from_snapshot(&Snapshot::new(
            vec![NodeRecord::new("a"), NodeRecord::new("b"), NodeRecord::new("c")],
            Vec::new(),
        ))
    }

    fn camera() -> CameraController {
        let mut camera = CameraController::new(CameraConfig::default());
        camera.set_viewport(Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)));
        camera
    }

    #[test]
    fn pick_prefers_nearest_then_front() {
        let nodes = projected();
        assert_eq!(pick_node(&nodes, Pos2::new(103.0, 100.0)), Some(1));
        assert_eq!(pick_node(&nodes, Pos2::new(96.0, 100.0)), Some(0));
        assert_eq!(pick_node(&nodes, Pos2::new(406.0, 300.0)), Some(2));
        assert_eq!(pick_node(&nodes, Pos2::new(700.0, 50.0)), None);
        assert_eq!(pick_node(&[], Pos2::ZERO), None);
    }

    #[test]
    fn click_selects_node_or_background() {
        let mut gateway = InteractionGateway::default();
        let nodes = projected();
        let click = |at: Pos2| PointerSample {
            hover: Some(at),
            clicked: true,
            ..PointerSample::default()
        };

        let events = gateway.handle(&click(Pos2::new(400.0, 300.0)), &nodes, &model(), &camera());
        assert_eq!(events, vec![GraphEvent::NodeSelected("c".to_owned())]);

        let events = gateway.handle(&click(Pos2::new(700.0, 50.0)), &nodes, &model(), &camera());
        assert_eq!(events, vec![GraphEvent::BackgroundClicked]);
    }

    #[test]
    fn dragging_a_node_pins_then_ends() {
        let mut gateway = InteractionGateway::default();
        let nodes = projected();
        let model = model();
        let camera = camera();

        let start = PointerSample {
            hover: Some(Pos2::new(400.0, 300.0)),
            press_origin: Some(Pos2::new(400.0, 300.0)),
            drag_started: true,
            dragging: true,
            drag_delta: Vec2::new(5.0, 0.0),
            ..PointerSample::default()
        };
        let events = gateway.handle(&start, &nodes, &model, &camera);
        assert!(gateway.is_dragging_node());
        let Some(GraphEvent::NodeDragged { id, position }) = events.first() else {
            panic!("expected drag event, got {events:?}");
        };
        assert_eq!(id, "c");
        assert!(position.is_finite());

        let stop = PointerSample {
            hover: Some(Pos2::new(420.0, 300.0)),
            drag_stopped: true,
            ..PointerSample::default()
        };
        let events = gateway.handle(&stop, &nodes, &model, &camera);
        assert!(matches!(
            events.as_slice(),
            [GraphEvent::NodeDragEnd { id, .. }] if id == "c"
        ));
        assert!(!gateway.is_dragging_node());
    }

    #[test]
    fn dragging_background_orbits_and_scroll_zooms() {
        let mut gateway = InteractionGateway::default();
        let sample = PointerSample {
            hover: Some(Pos2::new(700.0, 50.0)),
            press_origin: Some(Pos2::new(700.0, 50.0)),
            drag_started: true,
            dragging: true,
            drag_delta: Vec2::new(3.0, -2.0),
            scroll: 40.0,
            ..PointerSample::default()
        };

        let events = gateway.handle(&sample, &projected(), &model(), &camera());
        assert_eq!(
            events,
            vec![GraphEvent::Orbit(Vec2::new(3.0, -2.0)), GraphEvent::Zoom(40.0)]
        );
    }

    #[test]
    fn callbacks_receive_full_entity() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut callbacks = GraphCallbacks {
            on_node_click: Some(Box::new(move |entity: &Entity| {
                sink.borrow_mut().push((entity.id().to_owned(), entity.connections));
            })),
            on_node_drag_end: None,
        };

        let model = model();
        callbacks.node_clicked(&model.nodes[1]);
        callbacks.node_drag_ended(&model.nodes[1], Vec3::ONE);

        assert_eq!(seen.borrow().as_slice(), &[("b".to_owned(), 0)]);
    }
}
