//! First-person camera

use glam::{Mat4, Vec2, Vec3};

/// Radians of turn per pixel of mouse motion at sensitivity 1
const LOOK_SCALE: f32 = 0.002;
const PITCH_LIMIT: f32 = 89.0_f32.to_radians();

/// Free-flying camera steered by yaw and pitch
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Radians around +Y; -90° looks down -Z
    pub yaw: f32,
    pub pitch: f32,
    pub aspect: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    /// World units per second
    pub speed: f32,
    pub sensitivity: f32,
}

impl Camera {
    pub fn new(position: Vec3, aspect: f32) -> Self {
        Self {
            position,
            yaw: -90.0_f32.to_radians(),
            pitch: 0.0,
            aspect,
            fovy: 90.0_f32.to_radians(),
            znear: 0.001,
            zfar: 10.0,
            speed: 1.0,
            sensitivity: 1.0,
        }
    }

    /// Unit view direction
    pub fn front(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    /// Move along the view direction and its right vector; axes in -1..=1.
    /// Diagonal movement is no faster than straight.
    pub fn fly(&mut self, forward: f32, strafe: f32, elapsed: f32) {
        let direction = (self.front() * forward + self.right() * strafe).normalize_or_zero();
        self.position += direction * self.speed * elapsed;
    }

    /// Turn by a mouse delta in pixels; y grows downwards
    pub fn look(&mut self, delta: Vec2) {
        let scale = self.sensitivity * LOOK_SCALE;
        self.yaw += delta.x * scale;
        self.pitch = (self.pitch - delta.y * scale).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.front(), Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar);
        proj * self.view()
    }
}
