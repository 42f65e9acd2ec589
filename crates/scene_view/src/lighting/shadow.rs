//! Shadow-mapped point light
//!
//! Each frame the light fits a perspective frustum around its casters,
//! captures their depth from the light into an off-screen target, copies it
//! into a depth texture, and after the main pass redraws its receivers with
//! a projective depth comparison so the fragments the light cannot see are
//! re-shaded at the steady low light level.

use crate::config::ShadowConfig;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::{
    AttribMask, Capabilities, ClearMask, CompareFunc, DepthTextureDesc, DrawMode, FramebufferHandle,
    LightParams, LightSlot, RenderContext, RenderError, ShadeModel, TextureHandle, ViewState, Viewport,
};
use crate::scene::{NodeId, NodeTree};

use super::{MAIN_AMBIENT, MAIN_DIFFUSE, STEADY_LOW};

/// Texture unit the depth comparison runs on
pub const SHADOW_TEXTURE_UNIT: u32 = 1;

/// Depth reported outside the shadow map; never darkens
const BORDER_DEPTH: f32 = 1.0;

/// Where the light is in its per-frame pass sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowStage {
    /// Between frames, or skipped this frame
    #[default]
    Idle,
    /// Fitting the light frustum to casters and receivers
    FitFrustum,
    /// Rendering caster depth from the light
    DepthCapture,
    /// Copying captured depth into the texture
    CopyDepth,
    /// Depth is ready; the main pass runs outside the light
    AwaitingMainPass,
    /// Redrawing receivers with the depth comparison
    ApplyShadow,
    /// Returning the primary slot to its steady level
    Restore,
}

/// Backend objects owned by one shadow light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowResources {
    /// Off-screen depth capture target
    pub framebuffer: FramebufferHandle,
    /// Depth texture sampled by the apply pass
    pub depth_texture: TextureHandle,
}

/// Light-space camera fitted for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowFrustum {
    /// Light-space projection and view
    pub view: ViewState,
    /// Centre of the caster bounds
    pub center: Vec3,
    /// Distance from the light to `center`
    pub distance: f32,
    /// Near plane
    pub near: f32,
    /// Far plane
    pub far: f32,
    /// Focal length in shadow texels
    pub focal: f32,
}

/// Point light casting shadows from a list of caster nodes onto receivers
///
/// Casters and receivers are node handles; handles whose node has been
/// removed are skipped.
#[derive(Debug)]
pub struct ShadowLight {
    name: String,
    position: Vec3,
    config: ShadowConfig,
    resources: Option<ShadowResources>,
    casters: Vec<NodeId>,
    receivers: Vec<NodeId>,
    frustum: Option<ShadowFrustum>,
    stage: ShadowStage,
    warned_uninitialized: bool,
}

impl ShadowLight {
    /// Create a light; call [`ShadowLight::initialize`] before rendering
    pub fn new(name: impl Into<String>, position: Vec3, config: ShadowConfig) -> Self {
        Self {
            name: name.into(),
            position,
            config,
            resources: None,
            casters: Vec::new(),
            receivers: Vec::new(),
            frustum: None,
            stage: ShadowStage::Idle,
            warned_uninitialized: false,
        }
    }

    /// Light name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the light; the frustum is refitted next frame
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Shadow parameters
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Backend objects, once initialized
    pub fn resources(&self) -> Option<ShadowResources> {
        self.resources
    }

    /// True once backend objects exist
    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Current pass stage
    pub fn stage(&self) -> ShadowStage {
        self.stage
    }

    /// Frustum used by the last successful depth capture
    pub fn frustum(&self) -> Option<&ShadowFrustum> {
        self.frustum.as_ref()
    }

    /// Caster handles
    pub fn casters(&self) -> &[NodeId] {
        &self.casters
    }

    /// Receiver handles
    pub fn receivers(&self) -> &[NodeId] {
        &self.receivers
    }

    /// Create the depth framebuffer and texture
    ///
    /// Failing here is fatal for the light; it is the only shadow error that
    /// is not absorbed inside a frame.
    pub fn initialize(&mut self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        if self.resources.is_some() {
            return Ok(());
        }
        self.config
            .validate()
            .map_err(|err| RenderError::InitializationFailed(format!("shadow light '{}': {}", self.name, err)))?;

        let (width, height) = (self.config.width, self.config.height);
        let framebuffer = ctx
            .create_framebuffer(width, height)
            .map_err(|err| RenderError::ResourceCreation(format!("shadow framebuffer for '{}': {}", self.name, err)))?;
        let depth_texture = ctx
            .create_depth_texture(&DepthTextureDesc { width, height, border_depth: BORDER_DEPTH })
            .map_err(|err| RenderError::ResourceCreation(format!("shadow depth texture for '{}': {}", self.name, err)))?;

        self.resources = Some(ShadowResources { framebuffer, depth_texture });
        log::info!("shadow light '{}' initialized with a {}x{} depth map", self.name, width, height);
        Ok(())
    }

    /// Register a node whose geometry blocks this light
    pub fn add_shadow_caster(&mut self, node: NodeId) {
        self.casters.push(node);
    }

    /// Register a node that shows this light's shadows
    pub fn add_shadow_receiver(&mut self, node: NodeId) {
        self.receivers.push(node);
    }

    /// Register a node as both caster and receiver
    pub fn add_shadow_caster_and_receiver(&mut self, node: NodeId) {
        self.casters.push(node);
        self.receivers.push(node);
    }

    /// Forget a node in both lists
    pub fn remove_shadow_node(&mut self, node: NodeId) {
        self.casters.retain(|id| *id != node);
        self.receivers.retain(|id| *id != node);
    }

    /// Fit the light-space camera to the current caster and receiver poses
    ///
    /// Returns `None` when there is nothing sensible to fit: no live casters,
    /// a caster set without extent, a light sitting on the caster centre, or
    /// an empty depth range.
    pub fn fit_frustum(&self, tree: &NodeTree) -> Option<ShadowFrustum> {
        let casters = tree.world_bounds(&self.casters);
        if casters.is_empty() {
            log::debug!("shadow light '{}' has no live casters", self.name);
            return None;
        }
        let mut both = tree.world_bounds(&self.receivers);
        both.insert(&casters);

        let center = casters.center();
        let distance = (center - self.position).norm();
        let caster_extent = casters.size().norm();
        if caster_extent <= f32::EPSILON || distance <= f32::EPSILON {
            log::debug!(
                "shadow light '{}' skipped: caster extent {} at distance {}",
                self.name,
                caster_extent,
                distance
            );
            return None;
        }

        let radius = both.size().norm() / 2.0;
        let near = (distance - radius).max(self.config.near_floor);
        let far = distance + radius;
        if !(far > near) {
            log::debug!("shadow light '{}' skipped: empty depth range", self.name);
            return None;
        }

        let (width, height) = (self.config.width as f32, self.config.height as f32);
        let focal = width * distance / (self.config.focal_divisor * caster_extent);
        let projection =
            Mat4::from_intrinsics(width, height, focal, focal, width / 2.0, height / 2.0, near, far);
        let modelview = Mat4::look_at(self.position, center, -Vec3::z());
        if !projection.all_finite() || !modelview.all_finite() {
            log::warn!("shadow light '{}' produced a non-finite frustum", self.name);
            return None;
        }

        Some(ShadowFrustum {
            view: ViewState::new(projection, modelview),
            center,
            distance,
            near,
            far,
            focal,
        })
    }

    /// Fit, capture caster depth and copy it into the depth texture
    ///
    /// Returns false when the pass was skipped; in that case no backend
    /// state has been touched.
    pub fn compute_shadows(&mut self, ctx: &mut RenderContext<'_>, tree: &NodeTree) -> bool {
        self.stage = ShadowStage::FitFrustum;
        self.frustum = None;
        let (Some(resources), Some(frustum)) = (self.resources, self.fit_frustum(tree)) else {
            self.stage = ShadowStage::Idle;
            return false;
        };

        let config = self.config;
        let casters = &self.casters;
        let stage = &mut self.stage;
        *stage = ShadowStage::DepthCapture;
        ctx.with_saved_matrices(|ctx| {
            let mask = AttribMask::ENABLE
                | AttribMask::LIGHTING
                | AttribMask::COLOR_BUFFER
                | AttribMask::VIEWPORT
                | AttribMask::DEPTH_BUFFER
                | AttribMask::POLYGON
                | AttribMask::CURRENT;
            ctx.with_attribs(mask, |ctx| {
                ctx.with_framebuffer(resources.framebuffer, |ctx| {
                    ctx.shade_model(ShadeModel::Flat);
                    ctx.disable(Capabilities::LIGHTING | Capabilities::COLOR_MATERIAL | Capabilities::NORMALIZE);
                    ctx.enable(Capabilities::DEPTH_TEST);
                    ctx.depth_func(CompareFunc::LEqual);
                    ctx.color_mask(false);
                    ctx.enable(Capabilities::POLYGON_OFFSET_FILL);
                    ctx.polygon_offset(config.bias_factor, config.bias_units);

                    ctx.set_viewport(Viewport::new(config.width, config.height));
                    ctx.clear(ClearMask::COLOR | ClearMask::DEPTH);
                    frustum.view.apply(ctx);
                    for id in casters {
                        tree.draw_subtree(ctx, *id, DrawMode::GeometryOnly);
                    }

                    *stage = ShadowStage::CopyDepth;
                    ctx.copy_depth_to_texture(resources.depth_texture);
                });
            });
        });
        ctx.check_errors("shadow depth capture");

        log::debug!(
            "shadow light '{}' captured depth: near {:.3} far {:.3} focal {:.1}",
            self.name,
            frustum.near,
            frustum.far,
            frustum.focal
        );
        self.frustum = Some(frustum);
        self.stage = ShadowStage::AwaitingMainPass;
        true
    }

    /// Redraw receivers where the comparison says the light is blocked
    ///
    /// The comparison yields 1 where the receiver is at least as far from
    /// the light as the captured depth; with the capture bias, only
    /// occluded fragments get there and pass the alpha test. They are
    /// redrawn with whatever the primary light is set to at this point.
    pub fn draw_shadows(&mut self, ctx: &mut RenderContext<'_>, tree: &NodeTree) {
        let (Some(resources), Some(frustum)) = (self.resources, self.frustum) else {
            return;
        };
        self.stage = ShadowStage::ApplyShadow;

        let threshold = self.config.alpha_threshold;
        let receivers = &self.receivers;
        let mask = AttribMask::ENABLE
            | AttribMask::LIGHTING
            | AttribMask::COLOR_BUFFER
            | AttribMask::DEPTH_BUFFER
            | AttribMask::TEXTURE
            | AttribMask::CURRENT;
        ctx.with_attribs(mask, |ctx| {
            ctx.active_texture(SHADOW_TEXTURE_UNIT);
            ctx.set_texture_projection(&frustum.view.texture_projection());
            ctx.enable(Capabilities::TEXTURE_GEN);

            ctx.enable(Capabilities::DEPTH_TEST);
            ctx.depth_func(CompareFunc::LEqual);
            ctx.bind_texture(Some(resources.depth_texture));
            ctx.set_depth_compare(resources.depth_texture, Some(CompareFunc::GEqual));

            ctx.alpha_func(CompareFunc::Greater, threshold);
            ctx.enable(Capabilities::ALPHA_TEST);
            ctx.enable(Capabilities::TEXTURE_2D);
            ctx.active_texture(0);

            for id in receivers {
                tree.draw_subtree(ctx, *id, DrawMode::GeometryOnly);
            }

            ctx.active_texture(SHADOW_TEXTURE_UNIT);
            ctx.disable(Capabilities::TEXTURE_2D | Capabilities::TEXTURE_GEN);
            ctx.active_texture(0);
        });
        ctx.check_errors("shadow application");
    }

    /// Compute shadows and switch on the primary slot at main-pass intensity
    pub(super) fn pre_render(&mut self, ctx: &mut RenderContext<'_>, tree: &NodeTree) {
        if self.resources.is_none() {
            if !self.warned_uninitialized {
                log::warn!("shadow light '{}' was never initialized; shadows disabled", self.name);
                self.warned_uninitialized = true;
            }
            self.frustum = None;
            self.stage = ShadowStage::Idle;
        } else {
            self.compute_shadows(ctx, tree);
        }

        let position = Vec4::new(self.position.x, self.position.y, self.position.z, 1.0);
        ctx.set_light(
            LightSlot::PRIMARY,
            &LightParams { position, ambient: MAIN_AMBIENT, diffuse: MAIN_DIFFUSE },
        );
        ctx.set_light_enabled(LightSlot::PRIMARY, true);
    }

    /// Drop the primary slot to its steady level, apply shadows, switch it off
    pub(super) fn post_render(&mut self, ctx: &mut RenderContext<'_>, tree: &NodeTree) {
        ctx.set_light_intensity(LightSlot::PRIMARY, STEADY_LOW, STEADY_LOW);
        if self.stage == ShadowStage::AwaitingMainPass {
            self.draw_shadows(ctx, tree);
        }
        self.stage = ShadowStage::Restore;
        ctx.set_light_enabled(LightSlot::PRIMARY, false);
        self.stage = ShadowStage::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::software::SoftwareBackend;
    use crate::render::{MatrixMode, RenderBackend};
    use crate::scene::{Mesh, SceneNode};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn scene() -> (NodeTree, NodeId, NodeId) {
        let mut tree = NodeTree::new();
        let root = tree.root();
        let cube = tree.add_child(root, SceneNode::from_mesh("cube", Arc::new(Mesh::cube(2.0)))).unwrap();
        let ground = tree
            .add_child(
                root,
                SceneNode::from_mesh("ground", Arc::new(Mesh::plane(10.0, 10.0))).at(Vec3::new(0.0, 0.0, -1.0)),
            )
            .unwrap();
        tree.update_world_poses();
        (tree, cube, ground)
    }

    fn light_over(cube: NodeId, ground: NodeId) -> ShadowLight {
        let mut light = ShadowLight::new("sun", Vec3::new(0.0, 0.0, 10.0), ShadowConfig::with_resolution(64, 64));
        light.add_shadow_caster(cube);
        light.add_shadow_receiver(ground);
        light
    }

    #[test]
    fn test_fit_frustum_follows_formula() {
        let (tree, cube, ground) = scene();
        let light = light_over(cube, ground);
        let frustum = light.fit_frustum(&tree).unwrap();

        // casters span 2^3, receivers plus casters span 10 x 10 x 2
        let caster_extent = 12.0_f32.sqrt();
        let radius = 204.0_f32.sqrt() / 2.0;
        assert_relative_eq!(frustum.center, Vec3::zeros());
        assert_relative_eq!(frustum.distance, 10.0);
        assert_relative_eq!(frustum.near, 10.0 - radius, epsilon = 1e-4);
        assert_relative_eq!(frustum.far, 10.0 + radius, epsilon = 1e-4);
        assert_relative_eq!(frustum.focal, 64.0 * 10.0 / (8.0 * caster_extent), epsilon = 1e-3);
    }

    #[test]
    fn test_fit_frustum_near_floor() {
        let (tree, cube, ground) = scene();
        let mut light = light_over(cube, ground);
        light.set_position(Vec3::new(0.0, 0.0, 3.0));
        let frustum = light.fit_frustum(&tree).unwrap();
        assert_relative_eq!(frustum.near, 0.1);
    }

    #[test]
    fn test_fit_frustum_degenerate_inputs() {
        let (mut tree, cube, ground) = scene();

        let no_casters = ShadowLight::new("a", Vec3::new(0.0, 0.0, 10.0), ShadowConfig::default());
        assert!(no_casters.fit_frustum(&tree).is_none());

        let mut on_center = light_over(cube, ground);
        on_center.set_position(Vec3::zeros());
        assert!(on_center.fit_frustum(&tree).is_none());

        let point = tree.add_child(tree.root(), SceneNode::new("empty")).unwrap();
        let mut empty_caster = ShadowLight::new("b", Vec3::new(0.0, 0.0, 10.0), ShadowConfig::default());
        empty_caster.add_shadow_caster(point);
        assert!(empty_caster.fit_frustum(&tree).is_none());
    }

    #[test]
    fn test_remove_shadow_node_drops_both_roles() {
        let (tree, cube, ground) = scene();
        let mut light = light_over(cube, ground);
        light.add_shadow_caster_and_receiver(ground);

        light.remove_shadow_node(cube);
        assert!(light.fit_frustum(&tree).is_some());
        assert_eq!(light.casters(), &[ground]);

        light.remove_shadow_node(ground);
        assert!(light.casters().is_empty());
        assert!(light.receivers().is_empty());
        assert!(light.fit_frustum(&tree).is_none());
    }

    #[test]
    fn test_stale_casters_are_skipped() {
        let (mut tree, cube, ground) = scene();
        let extra = tree.add_child(tree.root(), SceneNode::from_mesh("extra", Arc::new(Mesh::cube(1.0)))).unwrap();
        let mut light = light_over(cube, ground);
        light.add_shadow_caster(extra);
        tree.remove(extra).unwrap();
        tree.update_world_poses();

        let frustum = light.fit_frustum(&tree).unwrap();
        assert_relative_eq!(frustum.center, Vec3::zeros());

        tree.remove(cube).unwrap();
        assert!(light.fit_frustum(&tree).is_none());
    }

    #[test]
    fn test_initialize_creates_resources_once() {
        let mut backend = SoftwareBackend::new(32, 32);
        let mut ctx = RenderContext::new(&mut backend);
        let mut light = ShadowLight::new("sun", Vec3::new(0.0, 0.0, 10.0), ShadowConfig::with_resolution(16, 16));

        light.initialize(&mut ctx).unwrap();
        let first = light.resources().unwrap();
        light.initialize(&mut ctx).unwrap();
        assert_eq!(light.resources(), Some(first));
    }

    #[test]
    fn test_initialize_rejects_oversized_buffer() {
        let mut backend = SoftwareBackend::new(32, 32);
        let mut ctx = RenderContext::new(&mut backend);
        let mut light =
            ShadowLight::new("huge", Vec3::new(0.0, 0.0, 10.0), ShadowConfig::with_resolution(1 << 20, 16));
        assert!(matches!(light.initialize(&mut ctx), Err(RenderError::ResourceCreation(_))));
        assert!(!light.is_initialized());
    }

    #[test]
    fn test_degenerate_compute_leaves_state_untouched() {
        let (tree, _, _) = scene();
        let mut backend = SoftwareBackend::new(32, 32);
        let mut light = ShadowLight::new("sun", Vec3::new(0.0, 0.0, 10.0), ShadowConfig::with_resolution(16, 16));
        light.initialize(&mut RenderContext::new(&mut backend)).unwrap();

        let before = backend.state_snapshot();
        let ran = light.compute_shadows(&mut RenderContext::new(&mut backend), &tree);
        assert!(!ran);
        assert_eq!(light.stage(), ShadowStage::Idle);
        assert_eq!(backend.state_snapshot(), before);
    }

    #[test]
    fn test_capture_restores_state_and_fills_depth() {
        let (tree, cube, ground) = scene();
        let mut backend = SoftwareBackend::new(32, 32);
        let mut light = light_over(cube, ground);
        light.initialize(&mut RenderContext::new(&mut backend)).unwrap();

        backend.enable(Capabilities::LIGHTING | Capabilities::DEPTH_TEST);
        backend.matrix_mode(MatrixMode::ModelView);
        let before = backend.state_snapshot();
        assert!(light.compute_shadows(&mut RenderContext::new(&mut backend), &tree));
        assert_eq!(light.stage(), ShadowStage::AwaitingMainPass);
        assert_eq!(backend.state_snapshot(), before);

        // the cube top faces the light at the centre of the map
        let texture = light.resources().unwrap().depth_texture;
        let centre = backend.texture_depth(texture, 32, 32).unwrap();
        let corner = backend.texture_depth(texture, 0, 0).unwrap();
        assert!(centre < 1.0);
        assert_relative_eq!(corner, 1.0);
    }

    #[test]
    fn test_uninitialized_light_skips_passes() {
        let (tree, cube, ground) = scene();
        let mut backend = SoftwareBackend::new(32, 32);
        let mut light = light_over(cube, ground);

        let mut ctx = RenderContext::new(&mut backend);
        light.pre_render(&mut ctx, &tree);
        assert_eq!(light.stage(), ShadowStage::Idle);
        assert!(light.frustum().is_none());
        light.post_render(&mut ctx, &tree);
        assert!(!backend.state().lights[0].enabled);
        assert_relative_eq!(backend.state().lights[0].params.ambient, STEADY_LOW);
    }
}
