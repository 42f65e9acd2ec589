//! Camera and view state
//!
//! [`ViewState`] is the projection/model-view pair a pass loads before
//! drawing. The main camera and every light-space camera of the shadow
//! lights produce one.
//!
//! # Coordinate System
//! OpenGL conventions throughout: right-handed view space looking down -Z,
//! clip depth in [-1, 1], window coordinates with a bottom-left origin and
//! depth in [0, 1].

use super::backend::{MatrixMode, Viewport};
use super::context::RenderContext;
use crate::config::CameraConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};
use crate::scene::Aabb;

/// Projection and model-view matrices of one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Projection matrix
    pub projection: Mat4,
    /// Model-view (world to eye) matrix
    pub modelview: Mat4,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            projection: Mat4::identity(),
            modelview: Mat4::identity(),
        }
    }
}

impl ViewState {
    /// Create a view state
    pub fn new(projection: Mat4, modelview: Mat4) -> Self {
        Self { projection, modelview }
    }

    /// Load both matrices, leaving the model-view stack selected
    pub fn apply(&self, ctx: &mut RenderContext<'_>) {
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.load_matrix(&self.projection);
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.load_matrix(&self.modelview);
    }

    /// World to clip transform
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.modelview
    }

    /// World to shadow texture coordinates: bias * P * V
    pub fn texture_projection(&self) -> Mat4 {
        Mat4::clip_to_texture_bias() * self.view_projection()
    }

    /// World point to window coordinates `(x, y, depth)`
    ///
    /// Returns `None` for points behind the eye.
    pub fn project(&self, world: Vec3, viewport: &Viewport) -> Option<Vec3> {
        let clip = self.view_projection() * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        Some(Vec3::new(
            viewport.x as f32 + (ndc.x + 1.0) * 0.5 * viewport.width as f32,
            viewport.y as f32 + (ndc.y + 1.0) * 0.5 * viewport.height as f32,
            (ndc.z + 1.0) * 0.5,
        ))
    }

    /// Window coordinates `(x, y, depth)` back to a world point
    pub fn unproject(&self, window: Vec3, viewport: &Viewport) -> Option<Vec3> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let inverse = self.view_projection().try_inverse()?;
        let ndc = Vec4::new(
            (window.x - viewport.x as f32) / viewport.width as f32 * 2.0 - 1.0,
            (window.y - viewport.y as f32) / viewport.height as f32 * 2.0 - 1.0,
            window.z * 2.0 - 1.0,
            1.0,
        );
        let world = inverse * ndc;
        if world.w.abs() <= f32::EPSILON {
            return None;
        }
        Some(world.xyz() / world.w)
    }
}

/// Perspective look-at camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Aspect ratio (width / height)
    pub aspect: f32,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,
}

/// Closest the camera may orbit or zoom towards its target
const MIN_DISTANCE: f32 = 1e-3;

impl Camera {
    /// Create a camera from configuration
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: Vec3::from(config.position),
            target: Vec3::from(config.target),
            up: Vec3::from(config.up),
            fov: utils::deg_to_rad(config.fov_degrees),
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    /// Create a perspective camera looking at the origin
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::z(),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Update the aspect ratio after a resize
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// View matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect, self.near, self.far)
    }

    /// Matrices for the main pass
    pub fn view_state(&self) -> ViewState {
        ViewState::new(self.projection_matrix(), self.view_matrix())
    }

    /// Distance from position to target
    pub fn distance(&self) -> f32 {
        (self.target - self.position).norm()
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        let d = self.target - self.position;
        if d.norm_squared() > 0.0 { d.normalize() } else { -Vec3::z() }
    }

    /// Unit right vector
    pub fn right(&self) -> Vec3 {
        let r = self.forward().cross(&self.up);
        if r.norm_squared() > 1e-12 { r.normalize() } else { Vec3::x() }
    }

    /// Restore placement and projection from configuration, keeping the aspect
    pub fn reset(&mut self, config: &CameraConfig) {
        *self = Self::from_config(config, self.aspect);
    }

    /// Look straight down the up axis at the target from the current distance
    pub fn top_down(&mut self) {
        let up = if self.up.norm_squared() > 0.0 { self.up.normalize() } else { Vec3::z() };
        self.position = self.target + up * self.distance().max(MIN_DISTANCE);
    }

    /// Rotate the position around the target
    ///
    /// `yaw` turns about the up axis, `pitch` about the right axis. Pitch is
    /// limited so the view direction never becomes parallel to up.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        let up = if self.up.norm_squared() > 0.0 { self.up.normalize() } else { Vec3::z() };
        let offset = self.position - self.target;

        let yaw_rot = nalgebra::Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(up), yaw);
        let mut offset = yaw_rot * offset;

        let right = offset.cross(&up);
        if right.norm_squared() > 1e-12 {
            let pitch_rot = nalgebra::Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(right), pitch);
            let candidate = pitch_rot * offset;
            let cos_to_up = candidate.normalize().dot(&up).abs();
            if cos_to_up < 0.995 {
                offset = candidate;
            }
        }
        self.position = self.target + offset;
    }

    /// Scale the distance to the target by `factor`
    pub fn zoom(&mut self, factor: f32) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let offset = self.position - self.target;
        let scaled = offset * factor;
        if scaled.norm() >= MIN_DISTANCE {
            self.position = self.target + scaled;
        }
    }

    /// Move position and target in the view plane
    ///
    /// Offsets are fractions of the distance to the target.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let right = self.right();
        let camera_up = right.cross(&self.forward());
        let delta = (right * dx + camera_up * dy) * self.distance();
        self.position += delta;
        self.target += delta;
    }

    /// Move position and target along the view direction
    pub fn move_forward(&mut self, amount: f32) {
        let delta = self.forward() * amount;
        self.position += delta;
        self.target += delta;
    }

    /// Move position and target along the right vector
    pub fn strafe(&mut self, amount: f32) {
        let delta = self.right() * amount;
        self.position += delta;
        self.target += delta;
    }

    /// Aim at the centre of `bounds` from a distance that fits it in view
    ///
    /// Keeps the current view direction. Empty bounds leave the camera as is.
    pub fn frame_bounds(&mut self, bounds: &Aabb) -> bool {
        if bounds.is_empty() {
            return false;
        }
        let radius = (bounds.size().norm() * 0.5).max(MIN_DISTANCE);
        let half_fov = (self.fov * 0.5).clamp(1e-3, 1.5);
        let distance = radius / half_fov.sin() * 1.1;

        let forward = self.forward();
        self.target = bounds.center();
        self.position = self.target - forward * distance;
        self.far = self.far.max(distance + radius * 2.0);
        true
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 4.0 / 3.0)
    }
}
