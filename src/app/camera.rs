use eframe::egui::{Pos2, Rect, Vec2};
use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

const MIN_PITCH: f32 = -1.5;
const MAX_PITCH: f32 = 1.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub focus_standoff: f32,
    pub focus_duration: f32,
    pub home_position: [f32; 3],
    pub reset_duration: f32,
    pub root_standoff: f32,
    pub root_duration: f32,
    pub orbit_sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 50.0,
            near: 0.1,
            far: 10_000.0,
            focus_standoff: 80.0,
            focus_duration: 2.0,
            home_position: [0.0, 0.0, 400.0],
            reset_duration: 1.0,
            root_standoff: 160.0,
            root_duration: 1.5,
            orbit_sensitivity: 0.005,
            zoom_sensitivity: 0.0018,
            min_distance: 5.0,
            max_distance: 5_000.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    /// View-space distance along the camera's forward axis.
    pub depth: f32,
}

impl ScreenPoint {
    pub fn pos(self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug)]
struct Transition {
    from_position: Vec3,
    from_target: Vec3,
    to_position: Vec3,
    to_target: Vec3,
    elapsed: f32,
    duration: f32,
}

impl Transition {
    fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) * 0.5
    }
}

/// Perspective camera orbiting a look target, with eased transitions
/// between named views.
pub struct CameraController {
    config: CameraConfig,
    position: Vec3,
    target: Vec3,
    transition: Option<Transition>,
    viewport: Option<Rect>,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let position = Vec3::from_array(config.home_position);
        Self {
            config,
            position,
            target: Vec3::ZERO,
            transition: None,
            viewport: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect);
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }

    /// Moves towards `node` along the ray from the origin through it.
    pub fn focus_on(&mut self, node: Vec3) {
        self.fly_to_node(node, self.config.focus_standoff, self.config.focus_duration);
    }

    pub fn reset_view(&mut self) {
        self.animate_to(
            Vec3::from_array(self.config.home_position),
            Vec3::ZERO,
            self.config.reset_duration,
        );
    }

    /// Falls back to the home view when there is no root to look at.
    pub fn focus_root(&mut self, root: Option<Vec3>) -> bool {
        match root.filter(|position| position.is_finite()) {
            Some(position) => {
                self.fly_to_node(position, self.config.root_standoff, self.config.root_duration);
                true
            }
            None => {
                self.reset_view();
                false
            }
        }
    }

    fn fly_to_node(&mut self, node: Vec3, standoff: f32, duration: f32) {
        if !node.is_finite() {
            return;
        }
        let direction = if node.length_squared() > 1e-6 {
            node.normalize()
        } else {
            (self.position - self.target).normalize_or(Vec3::Z)
        };
        self.animate_to(node + direction * standoff, node, duration);
    }

    fn animate_to(&mut self, position: Vec3, target: Vec3, duration: f32) {
        self.transition = Some(Transition {
            from_position: self.position,
            from_target: self.target,
            to_position: position,
            to_target: target,
            elapsed: 0.0,
            duration: duration.max(0.0),
        });
    }

    /// Advances any running transition. Returns whether one is still active.
    pub fn update(&mut self, dt: f32) -> bool {
        let Some(mut transition) = self.transition.take() else {
            return false;
        };

        transition.elapsed += dt.max(0.0);
        let eased = ease_in_out_cubic(transition.progress());
        self.position = transition.from_position.lerp(transition.to_position, eased);
        self.target = transition.from_target.lerp(transition.to_target, eased);

        if transition.progress() < 1.0 {
            self.transition = Some(transition);
            true
        } else {
            false
        }
    }

    /// Rotates around the look target. Cancels any transition.
    pub fn orbit(&mut self, delta: Vec2) {
        self.transition = None;
        let offset = self.position - self.target;
        let radius = offset.length().max(self.config.min_distance);
        let direction = offset.normalize_or(Vec3::Z);

        let yaw = direction.x.atan2(direction.z) - delta.x * self.config.orbit_sensitivity;
        let pitch = (direction.y.clamp(-1.0, 1.0).asin() + delta.y * self.config.orbit_sensitivity)
            .clamp(MIN_PITCH, MAX_PITCH);

        let rotation = Quat::from_euler(EulerRot::YXZ, yaw, -pitch, 0.0);
        self.position = self.target + rotation * Vec3::Z * radius;
    }

    /// Dollies towards (positive `scroll`) or away from the look target.
    pub fn zoom(&mut self, scroll: f32) {
        if scroll.abs() <= f32::EPSILON {
            return;
        }
        self.transition = None;
        let offset = self.position - self.target;
        let factor = (1.0 - scroll * self.config.zoom_sensitivity).clamp(0.8, 1.25);
        let radius = (offset.length() * factor)
            .clamp(self.config.min_distance, self.config.max_distance);
        self.position = self.target + offset.normalize_or(Vec3::Z) * radius;
    }

    fn basis(&self) -> Option<(Vec3, Vec3)> {
        let forward = self.target - self.position;
        if forward.length_squared() <= 1e-8 || !forward.is_finite() {
            return None;
        }
        let forward = forward.normalize();
        let up = if forward.dot(Vec3::Y).abs() > 0.999 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Some((forward, up))
    }

    fn fov_radians(&self) -> f32 {
        self.config.fov_degrees.clamp(1.0, 170.0).to_radians()
    }

    fn view_projection(&self, rect: Rect) -> Option<Mat4> {
        let (_, up) = self.basis()?;
        let view = Mat4::look_at_rh(self.position, self.target, up);
        let projection = Mat4::perspective_rh(
            self.fov_radians(),
            rect.aspect_ratio(),
            self.config.near,
            self.config.far,
        );
        Some(projection * view)
    }

    /// Screen position of a world point, `None` when the camera has no
    /// viewport yet, the point is not finite, or it lies behind the camera
    /// or outside the clip range.
    pub fn project_to_screen(&self, point: Vec3) -> Option<ScreenPoint> {
        let rect = self.viewport?;
        if !point.is_finite() {
            return None;
        }

        let clip = self.view_projection(rect)? * point.extend(1.0);
        if clip.w <= self.config.near {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }

        Some(ScreenPoint {
            x: rect.left() + (ndc.x + 1.0) * 0.5 * rect.width(),
            y: rect.top() + (1.0 - ndc.y) * 0.5 * rect.height(),
            depth: clip.w,
        })
    }

    /// Screen pixels covered by one world unit at view-space `depth`.
    pub fn pixels_per_unit(&self, depth: f32) -> Option<f32> {
        let rect = self.viewport?;
        if !depth.is_finite() || depth <= self.config.near {
            return None;
        }
        Some(rect.height() * 0.5 / ((self.fov_radians() * 0.5).tan() * depth))
    }

    /// World point under `screen` at view-space `depth`.
    pub fn unproject(&self, screen: Pos2, depth: f32) -> Option<Vec3> {
        let rect = self.viewport?;
        let (forward, up) = self.basis()?;
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        let ndc_x = (screen.x - rect.left()) / rect.width() * 2.0 - 1.0;
        let ndc_y = 1.0 - (screen.y - rect.top()) / rect.height() * 2.0;
        let tan_half = (self.fov_radians() * 0.5).tan();

        let offset = right * (ndc_x * tan_half * rect.aspect_ratio()) + up * (ndc_y * tan_half);
        let point = self.position + (forward + offset) * depth;
        point.is_finite().then_some(point)
    }
}
