//! Camera navigation from mouse drags, wheel and keys

use super::{KeyCode, MouseButton};
use crate::config::CameraConfig;
use crate::render::Camera;

/// Zoom factor per pixel of vertical right-button drag
const DRAG_ZOOM_RATE: f32 = 0.01;

/// Zoom factor per wheel notch
const SCROLL_ZOOM_STEP: f32 = 0.9;

/// Maps drags, wheel and keys onto camera moves
#[derive(Debug, Clone, PartialEq)]
pub struct CameraController {
    config: CameraConfig,
}

impl CameraController {
    /// Controller using the steps and home placement in `config`
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    /// Camera configuration used for resets
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Apply a drag of `(dx, dy)` pixels with `button` held
    ///
    /// Left orbits, right zooms, middle pans. `view_height` scales panning
    /// so the scene follows the pointer.
    pub fn drag(&self, camera: &mut Camera, button: MouseButton, dx: f32, dy: f32, view_height: u32) {
        match button {
            MouseButton::Left => {
                camera.orbit(-dx * self.config.orbit_speed, -dy * self.config.orbit_speed);
            }
            MouseButton::Right => camera.zoom((dy * DRAG_ZOOM_RATE).exp()),
            MouseButton::Middle => {
                let scale = 1.0 / view_height.max(1) as f32;
                camera.pan(-dx * scale, dy * scale);
            }
        }
    }

    /// Apply wheel notches; positive zooms in
    pub fn scroll(&self, camera: &mut Camera, delta: f32) {
        camera.zoom(SCROLL_ZOOM_STEP.powf(delta));
    }

    /// Apply a key press; returns true when the camera changed
    pub fn key(&self, camera: &mut Camera, key: KeyCode) -> bool {
        let step = self.config.move_step;
        match key {
            KeyCode::W | KeyCode::Up => camera.move_forward(step),
            KeyCode::S | KeyCode::Down => camera.move_forward(-step),
            KeyCode::A | KeyCode::Left => camera.strafe(-step),
            KeyCode::D | KeyCode::Right => camera.strafe(step),
            KeyCode::R => camera.reset(&self.config),
            KeyCode::T => camera.top_down(),
            _ => return false,
        }
        true
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn test_wasd_moves_along_view() {
        let controller = CameraController::default();
        let mut camera = Camera::from_config(controller.config(), 1.0);
        let start = camera.position;
        let forward = camera.forward();

        assert!(controller.key(&mut camera, KeyCode::W));
        assert_relative_eq!(camera.position, start + forward * 0.5, epsilon = 1e-5);
        assert!(controller.key(&mut camera, KeyCode::S));
        assert_relative_eq!(camera.position, start, epsilon = 1e-5);
        assert!(!controller.key(&mut camera, KeyCode::Other));
    }

    #[test]
    fn test_reset_and_top_down() {
        let controller = CameraController::default();
        let mut camera = Camera::from_config(controller.config(), 1.0);
        let home = camera.clone();

        controller.key(&mut camera, KeyCode::D);
        controller.drag(&mut camera, MouseButton::Left, 40.0, 10.0, 100);
        assert!(controller.key(&mut camera, KeyCode::R));
        assert_eq!(camera, home);

        let distance = camera.distance();
        assert!(controller.key(&mut camera, KeyCode::T));
        assert_relative_eq!(camera.position, camera.target + Vec3::new(0.0, 0.0, -distance), epsilon = 1e-4);
    }

    #[test]
    fn test_orbit_keeps_distance_and_zoom_scales_it() {
        let controller = CameraController::default();
        let mut camera = Camera::from_config(controller.config(), 1.0);
        let distance = camera.distance();

        controller.drag(&mut camera, MouseButton::Left, 25.0, -15.0, 100);
        assert_relative_eq!(camera.distance(), distance, epsilon = 1e-4);

        controller.scroll(&mut camera, 1.0);
        assert_relative_eq!(camera.distance(), distance * 0.9, epsilon = 1e-4);
    }
}
