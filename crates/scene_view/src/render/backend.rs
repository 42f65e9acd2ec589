//! Render backend contract
//!
//! An immediate-mode command set modelled on fixed-function pipelines:
//! state is global to the backend, changed by individual calls and saved or
//! restored with matrix and attribute stacks. Errors from state-changing
//! calls are queued and polled with [`RenderBackend::take_error`] rather than
//! returned, so a frame never unwinds half way through.
//!
//! Pairing is part of the contract: every push has a pop, every bind of an
//! off-screen target is followed by restoring the previous binding.

use bitflags::bitflags;

use super::{BackendError, RenderError};
use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::scene::Mesh;

/// Result type for backend resource creation
pub type BackendResult<T> = Result<T, RenderError>;

/// Number of light slots a backend must provide
pub const MAX_LIGHTS: usize = 8;

/// Number of texture units a backend must provide
pub const MAX_TEXTURE_UNITS: u32 = 4;

/// Handle to an off-screen framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u64);

/// Handle to a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Index of a fixed-function light slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightSlot(pub u8);

impl LightSlot {
    /// The primary slot shadow lights drive
    pub const PRIMARY: LightSlot = LightSlot(0);

    /// Slot index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parameters of one light slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    /// Homogeneous position; `w = 0` makes a directional light
    pub position: Vec4,
    /// Ambient intensity
    pub ambient: f32,
    /// Diffuse intensity
    pub diffuse: f32,
}

impl LightParams {
    /// Point light at `position`
    pub fn point(position: Vec3, ambient: f32, diffuse: f32) -> Self {
        Self {
            position: Vec4::new(position.x, position.y, position.z, 1.0),
            ambient,
            diffuse,
        }
    }
}

/// Window-space rectangle with a bottom-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge in pixels
    pub x: i32,
    /// Bottom edge in pixels
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Viewport anchored at the origin
    pub fn new(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// Width over height, 1 for a degenerate viewport
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Pick rectangle in window pixels, bottom-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickRegion {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl PickRegion {
    /// Square region of side `size` centred on pixel `(x, y)`
    pub fn centered(x: i32, y: i32, size: u32) -> Self {
        let size = size.max(1);
        let half = i32::try_from(size / 2).unwrap_or(i32::MAX);
        Self { x: x.saturating_sub(half), y: y.saturating_sub(half), width: size, height: size }
    }

    /// True when pixel `(x, y)` lies inside
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        x >= i64::from(self.x)
            && y >= i64::from(self.y)
            && x < i64::from(self.x) + i64::from(self.width)
            && y < i64::from(self.y) + i64::from(self.height)
    }
}

/// Hit reported by a selection pass
///
/// Depths are window depths in `[0, 1]` of the fragments the named geometry
/// produced inside the pick region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    /// Selection name active when the geometry was drawn
    pub name: u32,
    /// Nearest fragment depth
    pub min_depth: f32,
    /// Farthest fragment depth
    pub max_depth: f32,
}

/// Description of a depth texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Depth returned outside `[0, 1]` texture coordinates (clamp-to-border)
    pub border_depth: f32,
}

/// Which matrix stack matrix calls address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    /// Projection stack
    Projection,
    /// Model-view stack
    ModelView,
}

/// Shading interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadeModel {
    /// One colour per primitive
    Flat,
    /// Colour interpolated across the primitive
    Smooth,
}

/// Comparison used by depth test, alpha test and depth-compare textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    /// Never passes
    Never,
    /// `value < reference`
    Less,
    /// `value == reference`
    Equal,
    /// `value <= reference`
    LEqual,
    /// `value > reference`
    Greater,
    /// `value != reference`
    NotEqual,
    /// `value >= reference`
    GEqual,
    /// Always passes
    Always,
}

impl CompareFunc {
    /// Evaluate the comparison
    pub fn test(self, value: f32, reference: f32) -> bool {
        match self {
            CompareFunc::Never => false,
            CompareFunc::Less => value < reference,
            CompareFunc::Equal => value == reference,
            CompareFunc::LEqual => value <= reference,
            CompareFunc::Greater => value > reference,
            CompareFunc::NotEqual => value != reference,
            CompareFunc::GEqual => value >= reference,
            CompareFunc::Always => true,
        }
    }
}

bitflags! {
    /// Buffers cleared by [`RenderBackend::clear`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        /// Colour buffer
        const COLOR = 1 << 0;
        /// Depth buffer
        const DEPTH = 1 << 1;
    }
}

bitflags! {
    /// Capabilities toggled with enable/disable
    ///
    /// `TEXTURE_2D` and `TEXTURE_GEN` apply to the active texture unit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Fixed-function lighting
        const LIGHTING = 1 << 0;
        /// Depth test
        const DEPTH_TEST = 1 << 1;
        /// Depth offset for filled polygons
        const POLYGON_OFFSET_FILL = 1 << 2;
        /// Alpha test
        const ALPHA_TEST = 1 << 3;
        /// Current colour drives the material
        const COLOR_MATERIAL = 1 << 4;
        /// Renormalize transformed normals
        const NORMALIZE = 1 << 5;
        /// Texturing on the active unit
        const TEXTURE_2D = 1 << 6;
        /// Eye-linear texture coordinate generation on the active unit
        const TEXTURE_GEN = 1 << 7;
    }
}

bitflags! {
    /// State groups saved by [`RenderBackend::push_attrib`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttribMask: u32 {
        /// Every enable bit, including per-unit texture enables and light slots
        const ENABLE = 1 << 0;
        /// Light parameters, shade model, colour material
        const LIGHTING = 1 << 1;
        /// Colour mask, alpha test function, clear colour
        const COLOR_BUFFER = 1 << 2;
        /// Viewport
        const VIEWPORT = 1 << 3;
        /// Depth function
        const DEPTH_BUFFER = 1 << 4;
        /// Polygon offset parameters
        const POLYGON = 1 << 5;
        /// Active unit, bindings and texture projections
        const TEXTURE = 1 << 6;
        /// Current colour
        const CURRENT = 1 << 7;
    }
}

/// Immediate-mode rendering backend
pub trait RenderBackend {
    /// Clear buffers of the bound target
    fn clear(&mut self, mask: ClearMask);

    /// Colour used by colour clears
    fn set_clear_color(&mut self, color: Vec4);

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport);

    /// Current viewport
    fn viewport(&self) -> Viewport;

    /// Size of the default target in pixels
    fn surface_size(&self) -> (u32, u32);

    /// Resize the default target after the host window changed size
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Select the matrix stack addressed by matrix calls
    fn matrix_mode(&mut self, mode: MatrixMode);

    /// Duplicate the top of the current stack
    fn push_matrix(&mut self);

    /// Discard the top of the current stack
    fn pop_matrix(&mut self);

    /// Replace the top of the current stack
    fn load_matrix(&mut self, matrix: &Mat4);

    /// Post-multiply the top of the current stack
    fn mult_matrix(&mut self, matrix: &Mat4);

    /// Save the state groups in `mask`
    fn push_attrib(&mut self, mask: AttribMask);

    /// Restore the groups saved by the matching push
    fn pop_attrib(&mut self);

    /// Enable capabilities
    fn enable(&mut self, caps: Capabilities);

    /// Disable capabilities
    fn disable(&mut self, caps: Capabilities);

    /// True when every capability in `caps` is enabled
    fn is_enabled(&self, caps: Capabilities) -> bool;

    /// Enable or disable colour writes
    fn color_mask(&mut self, write: bool);

    /// Shading interpolation
    fn shade_model(&mut self, model: ShadeModel);

    /// Depth test comparison
    fn depth_func(&mut self, func: CompareFunc);

    /// Alpha test comparison and reference
    fn alpha_func(&mut self, func: CompareFunc, reference: f32);

    /// Depth offset applied when `POLYGON_OFFSET_FILL` is enabled
    fn polygon_offset(&mut self, factor: f32, units: f32);

    /// Configure a light slot; the position is transformed by the current model-view
    fn set_light(&mut self, slot: LightSlot, params: &LightParams);

    /// Change only the intensities of a light slot
    fn set_light_intensity(&mut self, slot: LightSlot, ambient: f32, diffuse: f32);

    /// Switch a light slot on or off
    fn set_light_enabled(&mut self, slot: LightSlot, enabled: bool);

    /// Current colour
    fn set_color(&mut self, color: Vec3);

    /// Create an off-screen framebuffer with a depth attachment
    fn create_framebuffer(&mut self, width: u32, height: u32) -> BackendResult<FramebufferHandle>;

    /// Create a depth texture
    fn create_depth_texture(&mut self, desc: &DepthTextureDesc) -> BackendResult<TextureHandle>;

    /// Bind an off-screen framebuffer, `None` for the default target
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    /// Currently bound framebuffer
    fn bound_framebuffer(&self) -> Option<FramebufferHandle>;

    /// Select the texture unit addressed by texture calls
    fn active_texture(&mut self, unit: u32);

    /// Bind a texture to the active unit
    fn bind_texture(&mut self, texture: Option<TextureHandle>);

    /// Depth comparison of a depth texture, `None` to sample raw depth
    fn set_depth_compare(&mut self, texture: TextureHandle, func: Option<CompareFunc>);

    /// Eye-linear projective texturing for the active unit
    ///
    /// Like eye-plane texture generation, the inverse of the current
    /// model-view is captured at call time, so `matrix` maps world
    /// coordinates when called under the viewing transform.
    fn set_texture_projection(&mut self, matrix: &Mat4);

    /// Copy the depth of the bound target into `texture`
    fn copy_depth_to_texture(&mut self, texture: TextureHandle);

    /// Draw a triangle mesh with the current state
    fn draw_mesh(&mut self, mesh: &Mesh);

    /// Draw unlit line segments in the current colour
    fn draw_lines(&mut self, segments: &[[Vec3; 2]]);

    /// Enter selection mode; draws record hits instead of writing pixels
    fn begin_selection(&mut self, region: PickRegion);

    /// Name attached to subsequent draws in selection mode
    fn set_selection_name(&mut self, name: Option<u32>);

    /// Leave selection mode and return the recorded hits
    fn end_selection(&mut self) -> Vec<HitRecord>;

    /// Window depth of the default target at a bottom-left pixel
    fn read_depth(&self, x: u32, y: u32) -> Option<f32>;

    /// Colour of the default target at a bottom-left pixel
    fn read_color(&self, x: u32, y: u32) -> Option<Vec3>;

    /// Oldest queued error
    fn take_error(&mut self) -> Option<BackendError>;

    /// Debug marker in the command stream
    fn marker(&mut self, label: &str);
}
