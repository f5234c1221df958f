use glam::Mat4;

/// Near clip plane shared by every pass.
pub const NEAR_PLANE: f32 = 0.1;
/// Far clip plane; the skybox renders exactly on it.
pub const FAR_PLANE: f32 = 500.0;

/// Tracks the output surface size and derives the projection from it.
///
/// Resize events update the stored size immediately; the projection is
/// recomputed every frame from the current size, never cached across a
/// resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Perspective projection with fovY taken from the camera zoom.
    pub fn projection(&self, fov_y_deg: f32) -> Mat4 {
        Mat4::perspective_rh_gl(fov_y_deg.to_radians(), self.aspect(), NEAR_PLANE, FAR_PLANE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn aspect_tracks_resize_immediately() {
        let mut viewport = Viewport::new(1280, 720);
        assert_relative_eq!(viewport.aspect(), 1280.0 / 720.0);
        viewport.resize(800, 800);
        assert_relative_eq!(viewport.aspect(), 1.0);
        let square = viewport.projection(45.0);
        viewport.resize(1600, 800);
        assert_ne!(square, viewport.projection(45.0));
    }

    #[test]
    fn zero_size_is_floored_to_one() {
        let mut viewport = Viewport::new(0, 0);
        assert_eq!(viewport.size(), (1, 1));
        viewport.resize(1920, 0);
        assert_eq!(viewport.size(), (1920, 1));
        assert!(viewport.aspect().is_finite());
    }

    #[test]
    fn projection_uses_the_camera_zoom() {
        let viewport = Viewport::new(1000, 1000);
        let wide = viewport.projection(45.0);
        let narrow = viewport.projection(1.0);
        // A narrower fov magnifies: the focal term grows.
        assert!(narrow.col(0).x > wide.col(0).x);
    }
}
