//! Window-independent viewer
//!
//! Everything a host window does apart from owning the window: it keeps the
//! scene graph, camera and selection state, turns input events into camera
//! moves and picks, and draws a frame when asked. Hosts pass in a backend
//! and forward their events; the redraw cadence comes from [`Viewer::tick`].

use std::time::Instant;

use crate::config::{ConfigError, ViewerConfig};
use crate::foundation::math::{Vec3, Vec4};
use crate::foundation::time::{FrameTimer, RedrawTimer};
use crate::input::{CameraController, GuiMode, InputEvent, KeyCode, MouseButton, MouseState};
use crate::lighting::{Light, LightId};
use crate::picking::{self, PickingError, SelectionId, SelectionMode, SelectionState};
use crate::render::{
    Camera, Capabilities, ClearMask, CompareFunc, PickRegion, RenderBackend, RenderContext, RenderError,
    ShadeModel, Viewport,
};
use crate::scene::{NodeId, SceneError, SceneGraph, SceneNode};

/// Errors raised while setting up or editing the viewer
#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend resources could not be created
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Scene edit referenced a missing node
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    /// Selection ids ran out
    #[error("picking error: {0}")]
    Picking(#[from] PickingError),
}

/// Background colour of the main view
const CLEAR_COLOR: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Interactive view over a scene graph
pub struct Viewer<B: RenderBackend> {
    backend: B,
    config: ViewerConfig,
    scene: SceneGraph,
    camera: Camera,
    controller: CameraController,
    selection: SelectionState,
    mouse: MouseState,
    mode: GuiMode,
    redraw: RedrawTimer,
    frames: FrameTimer,
    cursor_world: Option<Vec3>,
}

impl<B: RenderBackend> Viewer<B> {
    /// Create a viewer drawing through `backend`
    pub fn new(mut backend: B, config: ViewerConfig) -> Result<Self, ViewerError> {
        config.validate()?;

        let (width, height) = (config.viewport.width, config.viewport.height);
        if backend.surface_size() != (width, height) {
            backend.resize_surface(width, height);
        }
        {
            let mut ctx = RenderContext::new(&mut backend);
            init_render_state(&mut ctx, Viewport::new(width, height));
            if ctx.check_errors("viewer initialization") > 0 {
                return Err(RenderError::InitializationFailed("backend rejected the initial state".to_string()).into());
            }
        }

        log::info!("viewer initialized at {}x{}", width, height);
        Ok(Self {
            backend,
            camera: Camera::from_config(&config.camera, width as f32 / height as f32),
            controller: CameraController::new(config.camera),
            selection: SelectionState::new(config.picking.id_base),
            mouse: MouseState::new(width, height),
            mode: GuiMode::default(),
            redraw: RedrawTimer::from_hz(config.redraw_hz),
            frames: FrameTimer::new(),
            cursor_world: None,
            scene: SceneGraph::new(),
            config,
        })
    }

    /// Backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Configuration the viewer was built with
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Scene graph
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Scene graph, mutably
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// Camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera, mutably
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Current input mode
    pub fn gui_mode(&self) -> GuiMode {
        self.mode
    }

    /// Frame statistics
    pub fn frame_timer(&self) -> &FrameTimer {
        &self.frames
    }

    fn viewport(&self) -> Viewport {
        let (width, height) = self.backend.surface_size();
        Viewport::new(width, height)
    }

    /// Draw one frame
    pub fn draw(&mut self) {
        let viewport = self.viewport();
        let has_lights = self.scene.lights().next().is_some();
        let mut ctx = RenderContext::new(&mut self.backend);

        ctx.set_viewport(viewport);
        ctx.clear(ClearMask::COLOR | ClearMask::DEPTH);
        if has_lights {
            ctx.enable(Capabilities::LIGHTING);
        } else {
            ctx.disable(Capabilities::LIGHTING);
        }
        self.camera.view_state().apply(&mut ctx);
        self.scene.render(&mut ctx);
        ctx.check_errors("frame");
    }

    /// Draw if the redraw timer is due; returns true when a frame was drawn
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.redraw.poll(now) {
            return false;
        }
        self.frames.record_frame(now);
        self.draw();
        true
    }

    /// Attach a node under the root and give it a selection id if selectable
    pub fn add_child_to_root(&mut self, node: SceneNode) -> Result<NodeId, ViewerError> {
        let root = self.scene.root();
        self.add_child(root, node)
    }

    /// Attach a node under `parent` and give it a selection id if selectable
    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId, ViewerError> {
        let id = self.scene.add_child(parent, node)?;
        for node in self.scene.tree().descendants(id) {
            let selectable = self.scene.node(node).is_some_and(|n| n.selectable && n.selection_id().is_none());
            if selectable {
                self.alloc_selection_id(node)?;
            }
        }
        Ok(id)
    }

    /// Remove a node and its subtree; returns how many nodes went away
    ///
    /// Selection ids of removed nodes are never handed out again.
    pub fn remove_node(&mut self, id: NodeId) -> Result<usize, ViewerError> {
        let removed = self.scene.remove(id)?;
        self.selection.prune(self.scene.tree());
        Ok(removed.len())
    }

    /// Initialize and register a light
    pub fn add_light(&mut self, light: impl Into<Light>) -> Result<LightId, ViewerError> {
        let mut light = light.into();
        light.initialize(&mut RenderContext::new(&mut self.backend))?;
        log::info!("registered light '{}'", light.name());
        Ok(self.scene.add_light(light))
    }

    /// Give `node` its selection id, or return the one it already has
    pub fn alloc_selection_id(&mut self, node: NodeId) -> Result<SelectionId, ViewerError> {
        let existing = self.scene.node(node).ok_or(SceneError::MissingNode(node))?.selection_id();
        if let Some(id) = existing {
            return Ok(id);
        }
        let id = self.selection.alloc(node)?;
        if let Some(n) = self.scene.node_mut(node) {
            n.assign_selection_id(id);
        }
        Ok(id)
    }

    /// Live node owning `id`
    pub fn get_object(&self, id: SelectionId) -> Option<NodeId> {
        self.selection.live_object(id, self.scene.tree())
    }

    /// True when `id` is flagged selected
    pub fn is_selected(&self, id: SelectionId) -> bool {
        self.selection.is_selected(id)
    }

    /// Node of the current selection, if it still exists
    pub fn selected_object(&self) -> Option<NodeId> {
        self.selection.selected_id().and_then(|id| self.get_object(id))
    }

    /// Current selection id
    pub fn selected_id(&self) -> Option<SelectionId> {
        self.selection.selected_id()
    }

    /// Flag `id` selected and make it current
    pub fn set_selected(&mut self, id: SelectionId) {
        self.selection.set_selected(id);
        self.sync_highlights();
    }

    /// Clear the flag of `id`
    pub fn unselect(&mut self, id: SelectionId) {
        self.selection.unselect(id);
        self.sync_highlights();
    }

    /// Drop every selection flag
    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
        self.sync_highlights();
    }

    /// Selection state
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Pick at window coordinates (top-left origin), replacing the selection
    pub fn pick(&mut self, x: f64, y: f64) -> Option<SelectionId> {
        self.pick_with_mode(x, y, SelectionMode::Replace)
    }

    /// Pick at window coordinates (top-left origin) and fold the result in with `mode`
    pub fn pick_with_mode(&mut self, x: f64, y: f64, mode: SelectionMode) -> Option<SelectionId> {
        let viewport = self.viewport();
        let (px, py) = MouseState::to_window(x, y, viewport.height);
        let region = PickRegion::centered(px, py, self.config.picking.region_size);

        self.scene.tree_mut().update_world_poses();
        let view = self.camera.view_state();
        let hit = {
            let mut ctx = RenderContext::new(&mut self.backend);
            ctx.set_viewport(viewport);
            picking::pick(self.scene.tree(), &mut ctx, &view, region, &self.selection)
        };

        self.selection.apply(hit, mode);
        self.sync_highlights();
        match hit {
            Some(id) => log::info!("picked {} at ({}, {})", id, x, y),
            None => log::debug!("pick at ({}, {}) hit nothing", x, y),
        }
        hit
    }

    /// World point under window coordinates (top-left origin) from the last frame's depth
    ///
    /// `None` over background or outside the view.
    pub fn pos_under_cursor(&self, x: f64, y: f64) -> Option<Vec3> {
        let viewport = self.viewport();
        let (px, py) = MouseState::to_window(x, y, viewport.height);
        let (px, py) = (u32::try_from(px).ok()?, u32::try_from(py).ok()?);
        let depth = self.backend.read_depth(px, py)?;
        if depth >= 1.0 {
            return None;
        }
        let window = Vec3::new(px as f32 + 0.5, py as f32 + 0.5, depth);
        self.camera.view_state().unproject(window, &viewport)
    }

    /// World point under the pointer as of the last mouse move
    pub fn cursor_world(&self) -> Option<Vec3> {
        self.cursor_world
    }

    /// Handle one host event; returns true when the view should be redrawn
    pub fn handle(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::MouseMove { x, y } => {
                let (dx, dy) = self.mouse.update_position(x, y);
                self.cursor_world = self.pos_under_cursor(x, y);
                match (self.mode, self.mouse.held_button()) {
                    (GuiMode::Navigate, Some(button)) if self.mouse.is_dragging() => {
                        let height = self.viewport().height;
                        self.controller.drag(&mut self.camera, button, dx as f32, dy as f32, height);
                        true
                    }
                    _ => false,
                }
            }
            InputEvent::MousePress { button, x, y } => {
                self.mouse.update_position(x, y);
                self.mouse.press(button);
                false
            }
            InputEvent::MouseRelease { button, x, y } => {
                self.mouse.update_position(x, y);
                match self.mouse.release(button) {
                    Some(MouseButton::Left) => {
                        let mode = SelectionMode::from_modifiers(self.mouse.ctrl, self.mouse.shift);
                        self.pick_with_mode(x, y, mode);
                        true
                    }
                    _ => false,
                }
            }
            InputEvent::Scroll { delta } => {
                if self.mode == GuiMode::Navigate {
                    self.controller.scroll(&mut self.camera, delta);
                    true
                } else {
                    false
                }
            }
            InputEvent::KeyPress(KeyCode::Tab) => {
                self.mode = self.mode.toggled();
                log::debug!("input mode {:?}", self.mode);
                false
            }
            InputEvent::KeyPress(KeyCode::Escape) => {
                self.clear_selection();
                true
            }
            InputEvent::KeyPress(key) => self.controller.key(&mut self.camera, key),
            InputEvent::KeyRelease(_) => false,
            InputEvent::Resize { width, height } => {
                self.resize(width, height);
                true
            }
            InputEvent::ModifiersChanged { ctrl, shift } => {
                self.mouse.ctrl = ctrl;
                self.mouse.shift = shift;
                false
            }
        }
    }

    /// Resize the drawing surface
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize to {}x{}", width, height);
            return;
        }
        self.backend.resize_surface(width, height);
        RenderContext::new(&mut self.backend).check_errors("resize");
        self.camera.set_aspect_ratio(width as f32 / height as f32);
        self.mouse.update_window_size(width, height);
    }

    /// Camera back to its configured placement
    pub fn reset_camera(&mut self) {
        self.camera.reset(&self.config.camera);
    }

    /// Look straight down on the camera target
    pub fn camera_top_down(&mut self) {
        self.camera.top_down();
    }

    /// Aim the camera so the whole scene is in view
    pub fn frame_scene(&mut self) -> bool {
        self.scene.tree_mut().update_world_poses();
        let bounds = self.scene.scene_bounds();
        self.camera.frame_bounds(&bounds)
    }

    /// Remove every node and light and clear the selection
    ///
    /// The selection id counter keeps counting; ids are never reused.
    pub fn reset(&mut self) {
        self.scene.clear();
        self.selection.reset();
        self.cursor_world = None;
        log::info!("viewer reset");
    }

    /// Mirror selection flags into node highlight flags
    fn sync_highlights(&mut self) {
        let tree = self.scene.tree_mut();
        let ids: Vec<(NodeId, bool)> = tree
            .iter()
            .filter_map(|(node, n)| n.selection_id().map(|id| (node, self.selection.is_selected(id))))
            .collect();
        for (node, selected) in ids {
            if let Some(n) = tree.node_mut(node) {
                n.highlighted = selected;
            }
        }
    }
}

/// Fixed state every frame starts from
fn init_render_state(ctx: &mut RenderContext<'_>, viewport: Viewport) {
    ctx.set_viewport(viewport);
    ctx.set_clear_color(CLEAR_COLOR);
    ctx.enable(Capabilities::DEPTH_TEST | Capabilities::COLOR_MATERIAL | Capabilities::NORMALIZE);
    ctx.depth_func(CompareFunc::LEqual);
    ctx.shade_model(ShadeModel::Smooth);
}
