//! View and projection helpers.

use glam::{Mat4, Vec3};

/// Look-at camera.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}

impl Default for Camera {
    /// Four units back along -Z, looking at the origin.
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, -4.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

/// Perspective projection.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Projection {
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    /// Width over height; a zero dimension counts as one pixel.
    pub fn aspect(width: u32, height: u32) -> f32 {
        width.max(1) as f32 / height.max(1) as f32
    }

    pub fn matrix(&self, width: u32, height: u32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_radians,
            Self::aspect(width, height),
            self.near,
            self.far,
        )
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_radians: 45f32.to_radians(),
            near: 0.01,
            far: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_framebuffer_gives_finite_projection() {
        let p = Projection::default();
        for (w, h) in [(0, 0), (640, 0), (0, 480)] {
            assert!(Projection::aspect(w, h).is_finite());
            assert!(p.matrix(w, h).to_cols_array().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn aspect_of_default_window() {
        assert!((Projection::aspect(640, 480) - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn origin_is_in_front_of_the_default_camera() {
        let view = Camera::default().view();
        let p = view.transform_point3(Vec3::ZERO);
        // Right-handed view space looks down -Z.
        assert!((p.z + 4.0).abs() < 1e-5);
    }
}
