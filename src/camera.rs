use glam::{Mat4, Vec3};

/// Mouse button roles recognized by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Held to rotate the view.
    Primary,
    /// Held to change the zoom (field of view).
    Secondary,
}

/// Movement commands produced by the host key mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKey {
    Forward,
    Back,
    StrafeLeft,
    StrafeRight,
    Ascend,
    Descend,
}

/// Free-flying orbit camera driven by pointer and key events.
///
/// Yaw −90° looks down −Z, so the default pose at `(0, 5, 40)` faces the
/// scene at the origin. Pitch is clamped short of ±90° to keep the look-at
/// basis away from the world-up singularity.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    speed: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    last_x: f32,
    last_y: f32,
    rotating: bool,
    zooming: bool,
}

const WORLD_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT: f32 = 89.0;
const ZOOM_MIN: f32 = 1.0;
const ZOOM_MAX: f32 = 45.0;
const ANGLE_SENSITIVITY: f32 = 0.05;
const ZOOM_SENSITIVITY: f32 = 0.1;

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 5.0, 40.0), 45.0, 40.0)
    }
}

impl Camera {
    /// Creates a camera at `position` with the given zoom (degrees) and
    /// movement speed (units per second).
    pub fn new(position: Vec3, zoom: f32, speed: f32) -> Self {
        let mut camera = Self {
            position,
            yaw: -90.0,
            pitch: 0.0,
            zoom,
            speed,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            last_x: 0.0,
            last_y: 0.0,
            rotating: false,
            zooming: false,
        };
        camera.update_vectors();
        camera
    }

    /// Call when the host reports a pointer button press or release.
    pub fn on_pointer_button(&mut self, button: PointerButton, pressed: bool) {
        match button {
            PointerButton::Primary => self.rotating = pressed,
            PointerButton::Secondary => self.zooming = pressed,
        }
    }

    /// Call when the pointer moves. The last position is tracked even when
    /// no button is held so the first drag does not jump.
    pub fn on_pointer_move(&mut self, x: f64, y: f64) {
        let dx = x as f32 - self.last_x;
        let dy = y as f32 - self.last_y;
        self.last_x = x as f32;
        self.last_y = y as f32;

        if self.rotating {
            self.yaw += dx * ANGLE_SENSITIVITY;
            self.pitch = (self.pitch - dy * ANGLE_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
            self.update_vectors();
        }

        if self.zooming {
            self.zoom = (self.zoom + dy * ZOOM_SENSITIVITY).clamp(ZOOM_MIN, ZOOM_MAX);
        }
    }

    /// Moves the eye along the current basis vectors scaled by
    /// `speed * delta_seconds`.
    pub fn on_key(&mut self, key: MoveKey, delta_seconds: f32) {
        let velocity = self.speed * delta_seconds;
        match key {
            MoveKey::Forward => self.position += self.front * velocity,
            MoveKey::Back => self.position -= self.front * velocity,
            MoveKey::StrafeLeft => self.position -= self.right * velocity,
            MoveKey::StrafeRight => self.position += self.right * velocity,
            MoveKey::Ascend => self.position += self.up * velocity,
            MoveKey::Descend => self.position -= self.up * velocity,
        }
    }

    /// Look-at transform from the eye toward `eye + front`.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Field of view in degrees, fed into the projection as fovY.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            pitch.cos() * yaw.cos(),
            pitch.sin(),
            pitch.cos() * yaw.sin(),
        )
        .normalize();
        self.right = self.front.cross(WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn drag(camera: &mut Camera, button: PointerButton, deltas: &[(f64, f64)]) {
        camera.on_pointer_button(button, true);
        let (mut x, mut y) = (camera.last_x as f64, camera.last_y as f64);
        for (dx, dy) in deltas {
            x += dx;
            y += dy;
            camera.on_pointer_move(x, y);
        }
        camera.on_pointer_button(button, false);
    }

    #[test]
    fn default_pose_looks_down_negative_z() {
        let camera = Camera::default();
        assert_eq!(camera.front(), Vec3::new(0.0, 0.0, -1.0));
        let expected = Mat4::look_at_rh(
            Vec3::new(0.0, 5.0, 40.0),
            Vec3::new(0.0, 5.0, 39.0),
            Vec3::Y,
        );
        assert_relative_eq!(
            camera.view_matrix().to_cols_array()[..],
            expected.to_cols_array()[..],
            epsilon = 1e-6
        );
    }

    #[test]
    fn horizontal_drag_scales_by_sensitivity() {
        let mut camera = Camera::default();
        drag(&mut camera, PointerButton::Primary, &[(100.0, 0.0)]);
        assert_relative_eq!(camera.yaw(), -85.0, epsilon = 1e-5);
    }

    #[test]
    fn pitch_stays_clamped_under_any_drag() {
        let mut camera = Camera::default();
        drag(
            &mut camera,
            PointerButton::Primary,
            &[(0.0, -5000.0), (3.0, -90.0), (0.0, 12000.0), (-7.0, -40.0)],
        );
        assert!(camera.pitch() >= -89.0 && camera.pitch() <= 89.0);
    }

    #[test]
    fn zoom_stays_clamped_under_any_drag() {
        let mut camera = Camera::default();
        drag(
            &mut camera,
            PointerButton::Secondary,
            &[(0.0, 900.0), (0.0, -2000.0), (0.0, 35.0)],
        );
        assert!(camera.zoom() >= 1.0 && camera.zoom() <= 45.0);
        drag(&mut camera, PointerButton::Secondary, &[(0.0, 100000.0)]);
        assert_relative_eq!(camera.zoom(), 45.0);
    }

    #[test]
    fn basis_stays_orthonormal_after_updates() {
        let mut camera = Camera::default();
        drag(
            &mut camera,
            PointerButton::Primary,
            &[(137.0, -42.0), (-260.0, 510.0), (33.0, -700.0)],
        );
        assert_relative_eq!(camera.front().length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.right().length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.up().length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.front().dot(camera.right()), 0.0, epsilon = 1e-5);
        assert_relative_eq!(camera.front().dot(camera.up()), 0.0, epsilon = 1e-5);
        assert_relative_eq!(camera.right().dot(camera.up()), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn first_drag_does_not_jump() {
        let mut camera = Camera::default();
        // Pointer wanders while no button is held.
        camera.on_pointer_move(640.0, 360.0);
        camera.on_pointer_button(PointerButton::Primary, true);
        camera.on_pointer_move(650.0, 360.0);
        assert_relative_eq!(camera.yaw(), -90.0 + 10.0 * 0.05, epsilon = 1e-5);
    }

    #[test]
    fn movement_follows_basis_vectors() {
        let mut camera = Camera::default();
        camera.on_key(MoveKey::Forward, 0.5);
        assert_relative_eq!(camera.position().z, 40.0 - 40.0 * 0.5, epsilon = 1e-5);
        camera.on_key(MoveKey::StrafeRight, 0.25);
        assert_relative_eq!(camera.position().x, 40.0 * 0.25, epsilon = 1e-5);
        camera.on_key(MoveKey::Descend, 0.1);
        assert_relative_eq!(camera.position().y, 5.0 - 40.0 * 0.1, epsilon = 1e-5);
    }

    #[test]
    fn both_buttons_may_be_held_at_once() {
        let mut camera = Camera::default();
        camera.on_pointer_button(PointerButton::Primary, true);
        camera.on_pointer_button(PointerButton::Secondary, true);
        camera.on_pointer_move(0.0, 10.0);
        assert_relative_eq!(camera.pitch(), -0.5, epsilon = 1e-5);
        assert_relative_eq!(camera.zoom(), 45.0, epsilon = 1e-5); // already at max
    }
}
