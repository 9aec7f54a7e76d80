use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

const WORLD_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT: f32 = 89.0;
const ZOOM_MIN: f32 = 1.0;
const ZOOM_MAX: f32 = 45.0;

/// Movement request applied while a key is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
}

/// First-person fly camera driven by keyboard and mouse deltas.
///
/// Yaw and pitch are stored in degrees; `zoom` is the vertical field of
/// view and shrinks as the scroll wheel zooms in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            yaw: -90.0,
            pitch: 0.0,
            zoom: 45.0,
            speed: 2.5,
            sensitivity: 0.1,
        }
    }
}

impl FlyCamera {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Unit vector the camera looks along.
    pub fn front(&self) -> Vec3 {
        let (yaw_sin, yaw_cos) = self.yaw.to_radians().sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.to_radians().sin_cos();
        Vec3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(WORLD_UP).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.front()).normalize()
    }

    /// Moves the camera for one frame of held input.
    pub fn process_keyboard(&mut self, movement: Movement, dt: f32) {
        let velocity = self.speed * dt;
        let step = match movement {
            Movement::Forward => self.front(),
            Movement::Backward => -self.front(),
            Movement::Left => -self.right(),
            Movement::Right => self.right(),
        };
        self.position += step * velocity;
    }

    /// Applies a mouse delta in window pixels (y positive when the cursor
    /// moves down, matching winit's coordinate space).
    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Applies vertical scroll, narrowing the field of view when zooming in.
    pub fn process_scroll(&mut self, delta: f32) {
        self.zoom = (self.zoom - delta).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), self.up())
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.zoom.to_radians(), aspect.max(0.01), 0.1, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_faces_negative_z() {
        let camera = FlyCamera::default();
        assert!(camera.front().distance(Vec3::NEG_Z) < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = FlyCamera::default();
        camera.process_mouse(0.0, -100_000.0);
        assert!((camera.pitch - PITCH_LIMIT).abs() < 1e-5);
        camera.process_mouse(0.0, 100_000.0);
        assert!((camera.pitch + PITCH_LIMIT).abs() < 1e-5);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = FlyCamera::default();
        camera.process_scroll(100.0);
        assert_eq!(camera.zoom, ZOOM_MIN);
        camera.process_scroll(-100.0);
        assert_eq!(camera.zoom, ZOOM_MAX);
    }

    #[test]
    fn forward_moves_along_front() {
        let mut camera = FlyCamera::default();
        camera.process_keyboard(Movement::Forward, 1.0);
        let expected = Vec3::new(0.0, 0.0, 3.0) + Vec3::NEG_Z * camera.speed;
        assert!(camera.position.distance(expected) < 1e-4);
    }

    #[test]
    fn strafing_is_perpendicular_to_front() {
        let mut camera = FlyCamera::default();
        let before = camera.position;
        camera.process_keyboard(Movement::Right, 0.5);
        let moved = camera.position - before;
        assert!(moved.dot(camera.front()).abs() < 1e-5);
    }

    #[test]
    fn view_matrix_sends_eye_to_origin() {
        let camera = FlyCamera::at(Vec3::new(2.0, 1.0, -4.0));
        let eye = camera.view_matrix().transform_point3(camera.position);
        assert!(eye.length() < 1e-4);
    }
}
