//! Viewer configuration structures

use serde::{Serialize, Deserialize};

use super::{Config, ConfigError};
use crate::foundation::time::{DEFAULT_REDRAW_HZ, MIN_REDRAW_HZ};

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Default `env_logger` filter used by hosts
    pub log_level: String,
    /// Initial viewport size
    pub viewport: ViewportConfig,
    /// Shadow light defaults
    pub shadow: ShadowConfig,
    /// Picking parameters
    pub picking: PickingConfig,
    /// Camera defaults
    pub camera: CameraConfig,
    /// Redraw cadence requested from the host timer
    pub redraw_hz: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            viewport: ViewportConfig::default(),
            shadow: ShadowConfig::default(),
            picking: PickingConfig::default(),
            camera: CameraConfig::default(),
            redraw_hz: DEFAULT_REDRAW_HZ,
        }
    }
}

impl ViewerConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid("viewport size must be non-zero".to_string()));
        }
        if !(self.redraw_hz.is_finite() && self.redraw_hz >= MIN_REDRAW_HZ) {
            return Err(ConfigError::Invalid(format!(
                "redraw_hz must be at least {MIN_REDRAW_HZ}, got {}",
                self.redraw_hz
            )));
        }
        self.shadow.validate()?;
        self.picking.validate()?;
        self.camera.validate()
    }
}

impl Config for ViewerConfig {}

/// Window/viewport size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { width: 1024, height: 768 }
    }
}

/// Shadow light parameters
///
/// `focal_divisor` is the empirical constant in the light frustum focal
/// length `f = width * dist / (focal_divisor * |caster extent|)`. It is a
/// tuning knob, not a derived quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Shadow buffer width in texels
    pub width: u32,
    /// Shadow buffer height in texels
    pub height: u32,
    /// Polygon offset slope factor used during depth capture
    pub bias_factor: f32,
    /// Polygon offset constant units used during depth capture
    pub bias_units: f32,
    /// Alpha test threshold of the shadow application pass
    pub alpha_threshold: f32,
    /// Divisor of the focal length heuristic
    pub focal_divisor: f32,
    /// Lower bound of the light-space near plane
    pub near_floor: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            bias_factor: 2.0,
            bias_units: 4.0,
            alpha_threshold: 0.9,
            focal_divisor: 8.0,
            near_floor: 0.1,
        }
    }
}

impl ShadowConfig {
    /// Config with a custom buffer resolution
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self { width, height, ..Self::default() }
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("shadow buffer resolution must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.alpha_threshold) {
            return Err(ConfigError::Invalid(format!(
                "shadow alpha_threshold must be in [0, 1], got {}",
                self.alpha_threshold
            )));
        }
        if !(self.focal_divisor > 0.0) {
            return Err(ConfigError::Invalid("shadow focal_divisor must be positive".to_string()));
        }
        if !(self.near_floor > 0.0) {
            return Err(ConfigError::Invalid("shadow near_floor must be positive".to_string()));
        }
        Ok(())
    }
}

/// Picking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickingConfig {
    /// Side length in pixels of the square pick region around the cursor
    pub region_size: u32,
    /// First selection id handed out by the allocator
    pub id_base: u32,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self { region_size: 1, id_base: 1 }
    }
}

impl PickingConfig {
    /// Validate ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region_size == 0 {
            return Err(ConfigError::Invalid("picking region_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Default camera placement and projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Initial eye position
    pub position: [f32; 3],
    /// Initial look-at target
    pub target: [f32; 3],
    /// Up vector
    pub up: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Translation per navigation key press
    pub move_step: f32,
    /// Radians of orbit per dragged pixel
    pub orbit_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [-10.0, 0.0, -5.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 0.0, -1.0],
            fov_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
            move_step: 0.5,
            orbit_speed: 0.005,
        }
    }
}

impl CameraConfig {
    /// Validate ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(ConfigError::Invalid(format!(
                "camera clip planes must satisfy 0 < near < far, got {} / {}",
                self.near, self.far
            )));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!("camera fov must be in (0, 180), got {}", self.fov_degrees)));
        }
        Ok(())
    }
}
