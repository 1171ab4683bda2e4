//! Per-component camera and the small transition state machine used to
//! animate focus/rotation/distance/zoom changes between frames.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective,
    Orthographic,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// One component's view into the scene: focus point, orientation,
/// distance from the focus, and the projection used to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    focus: Vec3,
    rotation: Quat,
    distance: f32,
    projection: Projection,
    fov_degrees: f32,
    near_plane: f32,
    far_plane: f32,
    viewport: Viewport,
    min_zoom: f32,
    entire_component_zoom: f32,
    auto_zoom: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            focus: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            distance: 1.0,
            projection: Projection::Perspective,
            fov_degrees: 60.0,
            near_plane: 0.1,
            far_plane: 10_000.0,
            viewport: Viewport { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            min_zoom: 0.01,
            entire_component_zoom: 1.0,
            auto_zoom: false,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> Vec3 {
        self.focus
    }

    pub fn set_focus(&mut self, focus: Vec3) {
        self.focus = focus;
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.max(self.min_zoom);
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_entire_component_zoom(&mut self, distance: f32) {
        self.entire_component_zoom = distance.max(self.min_zoom);
    }

    pub fn auto_zoom(&self) -> bool {
        self.auto_zoom
    }

    /// Moves the camera closer (negative `delta`) or further (positive)
    /// from the focus, clamping to `[minZoom, entireComponentZoom]`.
    /// `do_transition` is advisory for the caller driving a `Transition`
    /// around this call; it has no effect on the clamp itself.
    pub fn zoom(&mut self, delta: f32, _do_transition: bool) {
        let proposed = self.distance + delta;
        if proposed > self.entire_component_zoom {
            self.auto_zoom = true;
            self.distance = self.entire_component_zoom;
        } else {
            self.auto_zoom = false;
            self.distance = proposed.max(self.min_zoom);
        }
    }

    pub fn position(&self) -> Vec3 {
        self.focus + self.rotation * Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.focus, self.rotation * Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective => {
                Mat4::perspective_rh(self.fov_degrees.to_radians(), self.viewport.aspect_ratio(), self.near_plane, self.far_plane)
            }
            Projection::Orthographic => {
                let half_height = self.distance;
                let half_width = half_height * self.viewport.aspect_ratio();
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, self.near_plane, self.far_plane)
            }
        }
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Interpolation curves offered to [`Transition::start`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Easing {
    Linear,
    EaseInEaseOut,
    Power,
    InversePower,
}

impl Easing {
    fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInEaseOut => t * t * (3.0 - 2.0 * t),
            Easing::Power => t * t,
            Easing::InversePower => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum TransitionState {
    Idle,
    Active,
    Finished,
}

/// A single animated value with an optional chained successor. `tick`
/// is the only way time advances; there is no wall-clock reference
/// since `Date.now`-style timestamps are supplied by the caller.
pub struct Transition {
    state: TransitionState,
    duration: f32,
    elapsed: f32,
    easing: Easing,
    on_step: Option<Box<dyn FnMut(f32) + Send>>,
    successor: Option<Box<Transition>>,
}

impl Default for Transition {
    fn default() -> Self {
        Self { state: TransitionState::Idle, duration: 0.0, elapsed: 0.0, easing: Easing::Linear, on_step: None, successor: None }
    }
}

impl Transition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, duration: f32, easing: Easing, f: impl FnMut(f32) + Send + 'static) {
        self.state = TransitionState::Active;
        self.duration = duration.max(0.0);
        self.elapsed = 0.0;
        self.easing = easing;
        self.on_step = Some(Box::new(f));
    }

    /// Registers `g` to start immediately once this transition finishes.
    /// Cancelling this transition before it finishes drops the chain.
    pub fn then(&mut self, g: Transition) {
        self.successor = Some(Box::new(g));
    }

    pub fn is_active(&self) -> bool {
        self.state == TransitionState::Active
    }

    pub fn is_finished(&self) -> bool {
        self.state == TransitionState::Finished
    }

    /// Advances the transition by `dt` seconds, invoking the step
    /// closure with the eased `t`. Returns whether a step was run.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.state != TransitionState::Active {
            return false;
        }

        self.elapsed = (self.elapsed + dt).min(self.duration);
        let raw_t = if self.duration > 0.0 { self.elapsed / self.duration } else { 1.0 };
        let eased = self.easing.apply(raw_t);

        if let Some(step) = self.on_step.as_mut() {
            step(eased);
        }

        if raw_t >= 1.0 {
            self.state = TransitionState::Finished;
            if let Some(successor) = self.successor.take() {
                *self = *successor;
            }
        }
        true
    }

    /// Jumps straight to the terminal state, running one final step at
    /// `t = 1` so observers see a consistent end value.
    pub fn cancel(&mut self) {
        if self.state == TransitionState::Active {
            if let Some(step) = self.on_step.as_mut() {
                step(1.0);
            }
        }
        self.state = TransitionState::Finished;
        self.successor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_clamps_to_entire_component_distance() {
        let mut camera = Camera::new();
        camera.set_entire_component_zoom(50.0);
        camera.set_distance(10.0);
        camera.zoom(1000.0, false);
        assert_eq!(camera.distance(), 50.0);
        assert!(camera.auto_zoom());
    }

    #[test]
    fn zoom_clamps_to_minimum() {
        let mut camera = Camera::new();
        camera.set_distance(1.0);
        camera.zoom(-1000.0, false);
        assert_eq!(camera.distance(), camera.min_zoom);
    }

    #[test]
    fn transition_runs_to_completion_and_chains() {
        let mut values = Vec::new();
        let mut transition = Transition::new();
        transition.start(1.0, Easing::Linear, |_| {});

        let mut successor = Transition::new();
        successor.start(1.0, Easing::Linear, move |t| values.push(t));
        transition.then(successor);

        assert!(transition.tick(0.5));
        assert!(transition.is_active());
        assert!(transition.tick(0.5));
        assert!(transition.is_active(), "chained successor should now be running");
        assert!(transition.tick(1.0));
        assert!(transition.is_finished());
    }

    #[test]
    fn cancel_jumps_to_finished_and_runs_final_step() {
        let last = std::sync::Arc::new(std::sync::Mutex::new(0.0_f32));
        let last_clone = last.clone();
        let mut transition = Transition::new();
        transition.start(10.0, Easing::Linear, move |t| *last_clone.lock().unwrap() = t);
        transition.tick(1.0);
        transition.cancel();
        assert!(transition.is_finished());
        assert_eq!(*last.lock().unwrap(), 1.0);
    }
}
