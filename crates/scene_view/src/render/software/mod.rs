//! CPU reference implementation of [`RenderBackend`]
//!
//! `SoftwareBackend` keeps the whole fixed-function state in a plain struct,
//! rasterizes into depth and colour buffers on the CPU and records a marker
//! log. It is deterministic, which makes it the backend of choice for tests
//! and for hosts without a GPU.
//!
//! Lighting is evaluated per vertex (ambient plus Lambert diffuse per enabled
//! slot); `ShadeModel::Flat` uses the last vertex of each triangle. Normals
//! are always renormalized. Depth textures are sampled with the nearest
//! texel.

mod raster;

use std::collections::{HashMap, VecDeque};

use raster::{clip_polygon_near, ClipVertex, DepthTexture, Rasterizer, SelectionPass, Target, UNITS};

use super::backend::{
    AttribMask, BackendResult, Capabilities, ClearMask, CompareFunc, DepthTextureDesc,
    FramebufferHandle, HitRecord, LightParams, LightSlot, MatrixMode, PickRegion, RenderBackend,
    ShadeModel, TextureHandle, Viewport, MAX_LIGHTS, MAX_TEXTURE_UNITS,
};
use super::{BackendError, RenderError};
use crate::foundation::math::{Mat3, Mat4, Vec3, Vec4};
use crate::scene::Mesh;

/// Matrix stack depth limit
pub const MAX_STACK_DEPTH: usize = 32;

/// Attribute stack depth limit
pub const MAX_ATTRIB_DEPTH: usize = 16;

/// Largest off-screen target edge accepted
pub const MAX_TARGET_SIZE: u32 = 8192;

/// Material colour when `COLOR_MATERIAL` is disabled
const DEFAULT_MATERIAL: Vec3 = Vec3::new(0.8, 0.8, 0.8);

/// Capabilities tracked per texture unit
const UNIT_CAPS: Capabilities = Capabilities::TEXTURE_2D.union(Capabilities::TEXTURE_GEN);

/// State of one light slot; the position is in eye space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    /// Parameters as last set
    pub params: LightParams,
    /// Slot switched on
    pub enabled: bool,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            params: LightParams {
                position: Vec4::new(0.0, 0.0, 1.0, 0.0),
                ambient: 0.0,
                diffuse: 1.0,
            },
            enabled: false,
        }
    }
}

/// State of one texture unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureUnit {
    /// Texturing enabled
    pub texture_2d: bool,
    /// Eye-linear coordinate generation enabled
    pub texture_gen: bool,
    /// Bound texture
    pub bound: Option<TextureHandle>,
    /// Eye to texture coordinate transform
    pub projection: Mat4,
}

impl Default for TextureUnit {
    fn default() -> Self {
        Self {
            texture_2d: false,
            texture_gen: false,
            bound: None,
            projection: Mat4::identity(),
        }
    }
}

/// Complete fixed-function state
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareState {
    /// Stack addressed by matrix calls
    pub matrix_mode: MatrixMode,
    /// Global capabilities (per-unit bits live in `units`)
    pub caps: Capabilities,
    /// Light slots
    pub lights: [LightState; MAX_LIGHTS],
    /// Shading interpolation
    pub shade_model: ShadeModel,
    /// Colour writes enabled
    pub color_write: bool,
    /// Colour used by clears
    pub clear_color: Vec4,
    /// Alpha test function and reference
    pub alpha_func: (CompareFunc, f32),
    /// Depth test function
    pub depth_func: CompareFunc,
    /// Polygon offset factor and units
    pub polygon_offset: (f32, f32),
    /// Viewport
    pub viewport: Viewport,
    /// Active texture unit
    pub active_texture: u32,
    /// Texture units
    pub units: [TextureUnit; UNITS],
    /// Current colour
    pub color: Vec3,
    /// Bound framebuffer
    pub framebuffer: Option<FramebufferHandle>,
}

impl SoftwareState {
    fn new(viewport: Viewport) -> Self {
        Self {
            matrix_mode: MatrixMode::ModelView,
            caps: Capabilities::empty(),
            lights: [LightState::default(); MAX_LIGHTS],
            shade_model: ShadeModel::Smooth,
            color_write: true,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            alpha_func: (CompareFunc::Always, 0.0),
            depth_func: CompareFunc::Less,
            polygon_offset: (0.0, 0.0),
            viewport,
            active_texture: 0,
            units: [TextureUnit::default(); UNITS],
            color: Vec3::new(1.0, 1.0, 1.0),
            framebuffer: None,
        }
    }

    /// Copy the groups in `mask` from `saved`
    fn restore(&mut self, mask: AttribMask, saved: &SoftwareState) {
        let take_caps = |caps: &mut Capabilities, bits: Capabilities| {
            caps.remove(bits);
            caps.insert(saved.caps & bits);
        };

        if mask.contains(AttribMask::ENABLE) {
            self.caps = saved.caps;
            for (light, old) in self.lights.iter_mut().zip(saved.lights.iter()) {
                light.enabled = old.enabled;
            }
            for (unit, old) in self.units.iter_mut().zip(saved.units.iter()) {
                unit.texture_2d = old.texture_2d;
                unit.texture_gen = old.texture_gen;
            }
        }
        if mask.contains(AttribMask::LIGHTING) {
            self.lights = saved.lights;
            self.shade_model = saved.shade_model;
            take_caps(&mut self.caps, Capabilities::LIGHTING | Capabilities::COLOR_MATERIAL);
        }
        if mask.contains(AttribMask::COLOR_BUFFER) {
            self.color_write = saved.color_write;
            self.clear_color = saved.clear_color;
            self.alpha_func = saved.alpha_func;
            take_caps(&mut self.caps, Capabilities::ALPHA_TEST);
        }
        if mask.contains(AttribMask::VIEWPORT) {
            self.viewport = saved.viewport;
        }
        if mask.contains(AttribMask::DEPTH_BUFFER) {
            self.depth_func = saved.depth_func;
            take_caps(&mut self.caps, Capabilities::DEPTH_TEST);
        }
        if mask.contains(AttribMask::POLYGON) {
            self.polygon_offset = saved.polygon_offset;
            take_caps(&mut self.caps, Capabilities::POLYGON_OFFSET_FILL);
        }
        if mask.contains(AttribMask::TEXTURE) {
            self.active_texture = saved.active_texture;
            for (unit, old) in self.units.iter_mut().zip(saved.units.iter()) {
                unit.bound = old.bound;
                unit.projection = old.projection;
            }
        }
        if mask.contains(AttribMask::CURRENT) {
            self.color = saved.color;
        }
    }

    fn active_unit(&self) -> &TextureUnit {
        &self.units[self.active_texture as usize]
    }

    fn active_unit_mut(&mut self) -> &mut TextureUnit {
        &mut self.units[self.active_texture as usize]
    }
}

/// Everything observable about the backend apart from pixel contents
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Fixed-function state
    pub state: SoftwareState,
    /// Top of the projection stack
    pub projection: Mat4,
    /// Top of the model-view stack
    pub modelview: Mat4,
    /// Projection and model-view stack depths
    pub matrix_depths: (usize, usize),
    /// Attribute stack depth
    pub attrib_depth: usize,
}

/// CPU rasterizer implementing the backend contract
pub struct SoftwareBackend {
    state: SoftwareState,
    screen: Target,
    framebuffers: HashMap<u64, Target>,
    textures: HashMap<u64, DepthTexture>,
    next_handle: u64,
    projection_stack: Vec<Mat4>,
    modelview_stack: Vec<Mat4>,
    attrib_stack: Vec<(AttribMask, SoftwareState)>,
    selection: Option<SelectionPass>,
    errors: VecDeque<BackendError>,
    markers: Vec<String>,
}

impl SoftwareBackend {
    /// Create a backend with a `width` x `height` default target
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: SoftwareState::new(Viewport::new(width, height)),
            screen: Target::new(width, height),
            framebuffers: HashMap::new(),
            textures: HashMap::new(),
            next_handle: 1,
            projection_stack: vec![Mat4::identity()],
            modelview_stack: vec![Mat4::identity()],
            attrib_stack: Vec::new(),
            selection: None,
            errors: VecDeque::new(),
            markers: Vec::new(),
        }
    }

    /// Projection and model-view stack depths
    pub fn matrix_stack_depths(&self) -> (usize, usize) {
        (self.projection_stack.len(), self.modelview_stack.len())
    }

    /// Attribute stack depth
    pub fn attrib_stack_depth(&self) -> usize {
        self.attrib_stack.len()
    }

    /// Copy of all non-pixel state
    pub fn state_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state: self.state.clone(),
            projection: self.projection(),
            modelview: self.modelview(),
            matrix_depths: self.matrix_stack_depths(),
            attrib_depth: self.attrib_stack.len(),
        }
    }

    /// Fixed-function state
    pub fn state(&self) -> &SoftwareState {
        &self.state
    }

    /// Markers recorded so far
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Forget recorded markers
    pub fn clear_markers(&mut self) {
        self.markers.clear();
    }

    /// Stored depth of a texture texel, bottom-left origin
    pub fn texture_depth(&self, texture: TextureHandle, x: u32, y: u32) -> Option<f32> {
        let tex = self.textures.get(&texture.0)?;
        if x >= tex.width || y >= tex.height {
            return None;
        }
        tex.data.get(y as usize * tex.width as usize + x as usize).copied()
    }

    fn projection(&self) -> Mat4 {
        self.projection_stack.last().copied().unwrap_or_else(Mat4::identity)
    }

    fn modelview(&self) -> Mat4 {
        self.modelview_stack.last().copied().unwrap_or_else(Mat4::identity)
    }

    fn error(&mut self, err: BackendError) {
        log::trace!("software backend error: {}", err);
        self.errors.push_back(err);
    }

    fn alloc_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn current_stack(&mut self) -> (&'static str, &mut Vec<Mat4>) {
        match self.state.matrix_mode {
            MatrixMode::Projection => ("projection", &mut self.projection_stack),
            MatrixMode::ModelView => ("modelview", &mut self.modelview_stack),
        }
    }

    fn check_target_size(what: &str, width: u32, height: u32) -> BackendResult<()> {
        if width == 0 || height == 0 || width > MAX_TARGET_SIZE || height > MAX_TARGET_SIZE {
            return Err(RenderError::ResourceCreation(format!(
                "{} size {}x{} outside 1..={}",
                what, width, height, MAX_TARGET_SIZE
            )));
        }
        Ok(())
    }

    /// Lit colour of a vertex in eye space
    fn shade(&self, eye: Vec3, normal: Vec3) -> Vec3 {
        let state = &self.state;
        if !state.caps.contains(Capabilities::LIGHTING) {
            return state.color;
        }
        let material = if state.caps.contains(Capabilities::COLOR_MATERIAL) {
            state.color
        } else {
            DEFAULT_MATERIAL
        };

        let mut intensity = 0.0;
        for light in state.lights.iter().filter(|l| l.enabled) {
            let p = light.params.position;
            let to_light = if p.w.abs() <= f32::EPSILON {
                p.xyz()
            } else {
                p.xyz() / p.w - eye
            };
            let lambert = if to_light.norm_squared() > 0.0 {
                normal.dot(&to_light.normalize()).max(0.0)
            } else {
                0.0
            };
            intensity += light.params.ambient + light.params.diffuse * lambert;
        }
        (material * intensity).map(|c| c.clamp(0.0, 1.0))
    }

    fn rasterizer<'a>(
        state: &'a SoftwareState,
        screen: &'a mut Target,
        framebuffers: &'a mut HashMap<u64, Target>,
        textures: &'a HashMap<u64, DepthTexture>,
        selection: &'a mut Option<SelectionPass>,
    ) -> Option<Rasterizer<'a>> {
        let target = match state.framebuffer {
            Some(handle) => framebuffers.get_mut(&handle.0)?,
            None => screen,
        };
        Some(Rasterizer {
            state,
            textures,
            target,
            selection: selection.as_mut(),
        })
    }
}

impl RenderBackend for SoftwareBackend {
    fn clear(&mut self, mask: ClearMask) {
        let color = self.state.clear_color.xyz();
        let write_color = self.state.color_write && mask.contains(ClearMask::COLOR);
        let target = match self.state.framebuffer {
            Some(handle) => match self.framebuffers.get_mut(&handle.0) {
                Some(target) => target,
                None => return,
            },
            None => &mut self.screen,
        };
        if write_color {
            target.color.fill(color);
        }
        if mask.contains(ClearMask::DEPTH) {
            target.depth.fill(1.0);
        }
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.state.clear_color = color;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.state.viewport = viewport;
    }

    fn viewport(&self) -> Viewport {
        self.state.viewport
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.screen.width, self.screen.height)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || width > MAX_TARGET_SIZE || height > MAX_TARGET_SIZE {
            self.error(BackendError::InvalidValue(format!("surface size {}x{}", width, height)));
            return;
        }
        self.screen = Target::new(width, height);
    }

    fn matrix_mode(&mut self, mode: MatrixMode) {
        self.state.matrix_mode = mode;
    }

    fn push_matrix(&mut self) {
        let (name, stack) = self.current_stack();
        if stack.len() >= MAX_STACK_DEPTH {
            self.error(BackendError::StackOverflow(name));
            return;
        }
        let top = stack.last().copied().unwrap_or_else(Mat4::identity);
        stack.push(top);
    }

    fn pop_matrix(&mut self) {
        let (name, stack) = self.current_stack();
        if stack.len() <= 1 {
            self.error(BackendError::StackUnderflow(name));
            return;
        }
        stack.pop();
    }

    fn load_matrix(&mut self, matrix: &Mat4) {
        let (_, stack) = self.current_stack();
        if let Some(top) = stack.last_mut() {
            *top = *matrix;
        }
    }

    fn mult_matrix(&mut self, matrix: &Mat4) {
        let (_, stack) = self.current_stack();
        if let Some(top) = stack.last_mut() {
            *top *= matrix;
        }
    }

    fn push_attrib(&mut self, mask: AttribMask) {
        if self.attrib_stack.len() >= MAX_ATTRIB_DEPTH {
            self.error(BackendError::StackOverflow("attribute"));
            return;
        }
        self.attrib_stack.push((mask, self.state.clone()));
    }

    fn pop_attrib(&mut self) {
        match self.attrib_stack.pop() {
            Some((mask, saved)) => self.state.restore(mask, &saved),
            None => self.error(BackendError::StackUnderflow("attribute")),
        }
    }

    fn enable(&mut self, caps: Capabilities) {
        let unit = self.state.active_unit_mut();
        if caps.contains(Capabilities::TEXTURE_2D) {
            unit.texture_2d = true;
        }
        if caps.contains(Capabilities::TEXTURE_GEN) {
            unit.texture_gen = true;
        }
        self.state.caps.insert(caps - UNIT_CAPS);
    }

    fn disable(&mut self, caps: Capabilities) {
        let unit = self.state.active_unit_mut();
        if caps.contains(Capabilities::TEXTURE_2D) {
            unit.texture_2d = false;
        }
        if caps.contains(Capabilities::TEXTURE_GEN) {
            unit.texture_gen = false;
        }
        self.state.caps.remove(caps - UNIT_CAPS);
    }

    fn is_enabled(&self, caps: Capabilities) -> bool {
        let unit = self.state.active_unit();
        let unit_ok = (!caps.contains(Capabilities::TEXTURE_2D) || unit.texture_2d)
            && (!caps.contains(Capabilities::TEXTURE_GEN) || unit.texture_gen);
        unit_ok && self.state.caps.contains(caps - UNIT_CAPS)
    }

    fn color_mask(&mut self, write: bool) {
        self.state.color_write = write;
    }

    fn shade_model(&mut self, model: ShadeModel) {
        self.state.shade_model = model;
    }

    fn depth_func(&mut self, func: CompareFunc) {
        self.state.depth_func = func;
    }

    fn alpha_func(&mut self, func: CompareFunc, reference: f32) {
        self.state.alpha_func = (func, reference.clamp(0.0, 1.0));
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.state.polygon_offset = (factor, units);
    }

    fn set_light(&mut self, slot: LightSlot, params: &LightParams) {
        if slot.index() >= MAX_LIGHTS {
            self.error(BackendError::InvalidValue(format!("light slot {}", slot.0)));
            return;
        }
        let eye_position = self.modelview() * params.position;
        self.state.lights[slot.index()].params = LightParams { position: eye_position, ..*params };
    }

    fn set_light_intensity(&mut self, slot: LightSlot, ambient: f32, diffuse: f32) {
        match self.state.lights.get_mut(slot.index()) {
            Some(light) => {
                light.params.ambient = ambient;
                light.params.diffuse = diffuse;
            }
            None => self.error(BackendError::InvalidValue(format!("light slot {}", slot.0))),
        }
    }

    fn set_light_enabled(&mut self, slot: LightSlot, enabled: bool) {
        match self.state.lights.get_mut(slot.index()) {
            Some(light) => light.enabled = enabled,
            None => self.error(BackendError::InvalidValue(format!("light slot {}", slot.0))),
        }
    }

    fn set_color(&mut self, color: Vec3) {
        self.state.color = color;
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> BackendResult<FramebufferHandle> {
        Self::check_target_size("framebuffer", width, height)?;
        let handle = self.alloc_handle();
        self.framebuffers.insert(handle, Target::new(width, height));
        log::debug!("created {}x{} framebuffer {}", width, height, handle);
        Ok(FramebufferHandle(handle))
    }

    fn create_depth_texture(&mut self, desc: &DepthTextureDesc) -> BackendResult<TextureHandle> {
        Self::check_target_size("depth texture", desc.width, desc.height)?;
        let handle = self.alloc_handle();
        self.textures.insert(handle, DepthTexture::new(desc.width, desc.height, desc.border_depth));
        log::debug!("created {}x{} depth texture {}", desc.width, desc.height, handle);
        Ok(TextureHandle(handle))
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        if let Some(handle) = framebuffer {
            if !self.framebuffers.contains_key(&handle.0) {
                self.error(BackendError::InvalidHandle(handle.0));
                return;
            }
        }
        self.state.framebuffer = framebuffer;
    }

    fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.state.framebuffer
    }

    fn active_texture(&mut self, unit: u32) {
        if unit >= MAX_TEXTURE_UNITS {
            self.error(BackendError::InvalidValue(format!("texture unit {}", unit)));
            return;
        }
        self.state.active_texture = unit;
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        if let Some(handle) = texture {
            if !self.textures.contains_key(&handle.0) {
                self.error(BackendError::InvalidHandle(handle.0));
                return;
            }
        }
        self.state.active_unit_mut().bound = texture;
    }

    fn set_depth_compare(&mut self, texture: TextureHandle, func: Option<CompareFunc>) {
        match self.textures.get_mut(&texture.0) {
            Some(tex) => tex.compare = func,
            None => self.error(BackendError::InvalidHandle(texture.0)),
        }
    }

    fn set_texture_projection(&mut self, matrix: &Mat4) {
        match self.modelview().try_inverse() {
            Some(inverse) => self.state.active_unit_mut().projection = matrix * inverse,
            None => self.error(BackendError::InvalidOperation(
                "texture projection under a singular model-view".to_string(),
            )),
        }
    }

    fn copy_depth_to_texture(&mut self, texture: TextureHandle) {
        let source = match self.state.framebuffer {
            Some(handle) => self.framebuffers.get(&handle.0),
            None => Some(&self.screen),
        };
        let (Some(source), Some(tex)) = (source, self.textures.get_mut(&texture.0)) else {
            self.error(BackendError::InvalidHandle(texture.0));
            return;
        };
        let w = source.width.min(tex.width) as usize;
        let h = source.height.min(tex.height) as usize;
        for y in 0..h {
            let src = &source.depth[y * source.width as usize..][..w];
            tex.data[y * tex.width as usize..][..w].copy_from_slice(src);
        }
    }

    fn draw_mesh(&mut self, mesh: &Mesh) {
        let modelview = self.modelview();
        let mvp = self.projection() * modelview;
        let normal_matrix = modelview
            .fixed_view::<3, 3>(0, 0)
            .into_owned()
            .try_inverse()
            .map_or_else(Mat3::identity, |m| m.transpose());
        let gen_units: Vec<(usize, Mat4)> = self
            .state
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.texture_2d && u.texture_gen)
            .map(|(i, u)| (i, u.projection))
            .collect();
        let flat = self.state.shade_model == ShadeModel::Flat;

        let mut triangles = Vec::with_capacity(mesh.triangle_count());
        for tri in mesh.triangles() {
            let mut verts = tri.map(|v| {
                let object = Vec4::new(v.position[0], v.position[1], v.position[2], 1.0);
                let eye = modelview * object;
                let normal = normal_matrix * Vec3::from(v.normal);
                let normal = if normal.norm_squared() > 0.0 { normal.normalize() } else { normal };
                let mut tex = [Vec4::zeros(); UNITS];
                for (unit, projection) in &gen_units {
                    tex[*unit] = projection * eye;
                }
                let color = self.shade(eye.xyz(), normal);
                ClipVertex {
                    clip: mvp * object,
                    color: Vec4::new(color.x, color.y, color.z, 1.0),
                    tex,
                }
            });
            if flat {
                let provoking = verts[2].color;
                for v in &mut verts {
                    v.color = provoking;
                }
            }
            triangles.push(verts);
        }

        let Self { state, screen, framebuffers, textures, selection, .. } = self;
        let Some(mut raster) = Self::rasterizer(state, screen, framebuffers, textures, selection) else {
            return;
        };
        for verts in &triangles {
            let polygon = clip_polygon_near(verts);
            for i in 1..polygon.len().saturating_sub(1) {
                raster.triangle([&polygon[0], &polygon[i], &polygon[i + 1]]);
            }
        }
    }

    fn draw_lines(&mut self, segments: &[[Vec3; 2]]) {
        let mvp = self.projection() * self.modelview();
        let c = self.state.color;
        let color = Vec4::new(c.x, c.y, c.z, 1.0);
        let vertex = |p: &Vec3| ClipVertex {
            clip: mvp * Vec4::new(p.x, p.y, p.z, 1.0),
            color,
            tex: [Vec4::zeros(); UNITS],
        };

        let Self { state, screen, framebuffers, textures, selection, .. } = self;
        let Some(mut raster) = Self::rasterizer(state, screen, framebuffers, textures, selection) else {
            return;
        };
        for [a, b] in segments {
            raster.line(&vertex(a), &vertex(b));
        }
    }

    fn begin_selection(&mut self, region: PickRegion) {
        if self.selection.is_some() {
            self.error(BackendError::InvalidOperation("selection already active".to_string()));
            return;
        }
        self.selection = Some(SelectionPass::new(region));
    }

    fn set_selection_name(&mut self, name: Option<u32>) {
        if let Some(selection) = self.selection.as_mut() {
            selection.name = name;
        }
    }

    fn end_selection(&mut self) -> Vec<HitRecord> {
        match self.selection.take() {
            Some(selection) => selection.hits,
            None => {
                self.error(BackendError::InvalidOperation("end_selection without begin".to_string()));
                Vec::new()
            }
        }
    }

    fn read_depth(&self, x: u32, y: u32) -> Option<f32> {
        let index = self.screen.index(i64::from(x), i64::from(y))?;
        Some(self.screen.depth[index])
    }

    fn read_color(&self, x: u32, y: u32) -> Option<Vec3> {
        let index = self.screen.index(i64::from(x), i64::from(y))?;
        Some(self.screen.color[index])
    }

    fn take_error(&mut self) -> Option<BackendError> {
        self.errors.pop_front()
    }

    fn marker(&mut self, label: &str) {
        log::trace!("marker: {}", label);
        self.markers.push(label.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use approx::assert_relative_eq;

    fn backend_with_camera() -> SoftwareBackend {
        let mut backend = SoftwareBackend::new(64, 64);
        backend.matrix_mode(MatrixMode::Projection);
        backend.load_matrix(&Mat4::perspective(1.0, 1.0, 0.1, 100.0));
        backend.matrix_mode(MatrixMode::ModelView);
        backend.load_matrix(&Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y()));
        backend.enable(Capabilities::DEPTH_TEST);
        backend.clear(ClearMask::COLOR | ClearMask::DEPTH);
        backend
    }

    #[test]
    fn test_matrix_stack_underflow_is_queued() {
        let mut backend = SoftwareBackend::new(4, 4);
        backend.pop_matrix();
        assert_eq!(backend.take_error(), Some(BackendError::StackUnderflow("modelview")));
        assert_eq!(backend.matrix_stack_depths(), (1, 1));
    }

    #[test]
    fn test_push_pop_restores_matrix() {
        let mut backend = SoftwareBackend::new(4, 4);
        backend.load_matrix(&Mat4::new_scaling(2.0));
        backend.push_matrix();
        backend.mult_matrix(&Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)));
        backend.pop_matrix();
        assert_eq!(backend.state_snapshot().modelview, Mat4::new_scaling(2.0));
    }

    #[test]
    fn test_attrib_restores_only_masked_groups() {
        let mut backend = SoftwareBackend::new(4, 4);
        backend.push_attrib(AttribMask::VIEWPORT);
        backend.set_viewport(Viewport::new(2, 2));
        backend.color_mask(false);
        backend.pop_attrib();

        assert_eq!(backend.viewport(), Viewport::new(4, 4));
        assert!(!backend.state().color_write);
    }

    #[test]
    fn test_texture_enable_is_per_unit() {
        let mut backend = SoftwareBackend::new(4, 4);
        backend.active_texture(1);
        backend.enable(Capabilities::TEXTURE_2D);
        assert!(backend.is_enabled(Capabilities::TEXTURE_2D));
        backend.active_texture(0);
        assert!(!backend.is_enabled(Capabilities::TEXTURE_2D));

        backend.active_texture(MAX_TEXTURE_UNITS);
        assert!(matches!(backend.take_error(), Some(BackendError::InvalidValue(_))));
    }

    #[test]
    fn test_draw_mesh_writes_depth_and_color() {
        let mut backend = backend_with_camera();
        backend.set_color(Vec3::new(1.0, 0.0, 0.0));
        backend.draw_mesh(&Mesh::cube(1.0));

        let center = backend.read_color(32, 32).unwrap();
        assert_relative_eq!(center, Vec3::new(1.0, 0.0, 0.0));
        assert!(backend.read_depth(32, 32).unwrap() < 1.0);
        assert_eq!(backend.read_depth(0, 0), Some(1.0));
    }

    #[test]
    fn test_lighting_darkens_unlit_faces() {
        let mut backend = backend_with_camera();
        backend.enable(Capabilities::LIGHTING | Capabilities::COLOR_MATERIAL);
        backend.set_color(Vec3::new(1.0, 1.0, 1.0));
        backend.set_light(LightSlot::PRIMARY, &LightParams::point(Vec3::new(0.0, 0.0, 10.0), 0.1, 0.5));
        backend.set_light_enabled(LightSlot::PRIMARY, true);
        backend.draw_mesh(&Mesh::cube(1.0));

        let lit = backend.read_color(32, 32).unwrap();
        assert_relative_eq!(lit.x, 0.6, epsilon = 1e-2);
    }

    #[test]
    fn test_color_mask_blocks_color_but_not_depth() {
        let mut backend = backend_with_camera();
        backend.color_mask(false);
        backend.draw_mesh(&Mesh::cube(1.0));
        assert_eq!(backend.read_color(32, 32), Some(Vec3::zeros()));
        assert!(backend.read_depth(32, 32).unwrap() < 1.0);
    }

    #[test]
    fn test_selection_records_hits_without_writing() {
        let mut backend = backend_with_camera();
        backend.begin_selection(PickRegion::centered(32, 32, 1));
        backend.set_selection_name(Some(5));
        backend.draw_mesh(&Mesh::cube(1.0));
        let hits = backend.end_selection();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, 5);
        assert!(hits[0].min_depth <= hits[0].max_depth);
        assert_eq!(backend.read_depth(32, 32), Some(1.0));
    }

    #[test]
    fn test_depth_copy_into_texture() {
        let mut backend = backend_with_camera();
        let fb = backend.create_framebuffer(64, 64).unwrap();
        let tex = backend
            .create_depth_texture(&DepthTextureDesc { width: 64, height: 64, border_depth: 1.0 })
            .unwrap();

        backend.bind_framebuffer(Some(fb));
        backend.clear(ClearMask::DEPTH);
        backend.draw_mesh(&Mesh::cube(1.0));
        backend.copy_depth_to_texture(tex);
        backend.bind_framebuffer(None);

        assert!(backend.texture_depth(tex, 32, 32).unwrap() < 1.0);
        assert_eq!(backend.read_depth(32, 32), Some(1.0));
    }

    #[test]
    fn test_invalid_resources() {
        let mut backend = SoftwareBackend::new(4, 4);
        assert!(matches!(backend.create_framebuffer(0, 16), Err(RenderError::ResourceCreation(_))));
        backend.bind_framebuffer(Some(FramebufferHandle(99)));
        assert_eq!(backend.take_error(), Some(BackendError::InvalidHandle(99)));
        assert_eq!(backend.bound_framebuffer(), None);
    }

    #[test]
    fn test_near_plane_clipping_keeps_visible_part() {
        let mut backend = backend_with_camera();
        backend.matrix_mode(MatrixMode::ModelView);
        backend.load_matrix(&Mat4::look_at(Vec3::new(0.0, -0.5, 1.0), Vec3::new(0.0, 10.0, 1.0), Vec3::z()));
        backend.draw_mesh(&Mesh::plane(50.0, 50.0));
        // the ground extends behind the eye, the lower half of the image still sees it
        assert!(backend.read_depth(32, 5).unwrap() < 1.0);
    }
}
