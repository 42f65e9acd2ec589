//! Node arena, traversal and the per-frame render sequence

use slotmap::SlotMap;

use super::aabb::Aabb;
use super::node::{Geometry, NodeId, SceneNode};
use super::SceneError;
use crate::foundation::math::{Mat4, Vec3};
use crate::lighting::{Light, LightId};
use crate::render::{DrawMode, RenderContext};

/// Arena of scene nodes under a single root
///
/// Parent/child links are handles. The cached world pose of every node is
/// written only by [`NodeTree::update_world_poses`].
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    /// Create a tree holding only a non-selectable root
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("root").with_selectable(false));
        Self { nodes, root }
    }

    /// Root handle
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when `id` resolves to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Look up a node mutably
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Iterate all live nodes
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Attach `node` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::MissingParent(parent));
        }
        Ok(self.attach(parent, node))
    }

    /// Insert under the root, which always exists
    pub fn add_child_to_root(&mut self, node: SceneNode) -> NodeId {
        self.attach(self.root, node)
    }

    /// Insert under a parent known to be live
    fn attach(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        node.parent = Some(parent);
        node.children.clear();
        let id = self.nodes.insert(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        self.refresh_subtree(id);
        log::trace!("added node {:?} under {:?}", id, parent);
        id
    }

    /// Remove a node and its whole subtree; returns the removed handles
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        if id == self.root {
            return Err(SceneError::CannotRemoveRoot);
        }
        let parent = self.nodes.get(id).ok_or(SceneError::MissingNode(id))?.parent;
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.retain(|c| *c != id);
        }
        let removed = self.descendants(id);
        for r in &removed {
            self.nodes.remove(*r);
        }
        log::debug!("removed {} node(s) starting at {:?}", removed.len(), id);
        Ok(removed)
    }

    /// Remove every node except the root
    pub fn clear(&mut self) {
        let root = self.root;
        self.nodes.retain(|id, _| id == root);
        if let Some(r) = self.nodes.get_mut(root) {
            r.children.clear();
        }
    }

    /// Ordered children, empty for a stale handle
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Parent handle
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Cached world pose
    pub fn world_pose(&self, id: NodeId) -> Option<&Mat4> {
        self.nodes.get(id).map(|n| &n.world)
    }

    /// World position (translation of the world pose)
    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_pose(id).map(|m| Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]))
    }

    /// `id` and every node below it, pre-order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else { continue };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Recompute cached world poses top-down from the root
    pub fn update_world_poses(&mut self) {
        self.update_from(self.root, Mat4::identity());
    }

    /// Recompute the world poses of `id`'s subtree from its parent's cached pose
    fn refresh_subtree(&mut self, id: NodeId) {
        let parent_world = self
            .parent(id)
            .and_then(|p| self.world_pose(p).copied())
            .unwrap_or_else(Mat4::identity);
        self.update_from(id, parent_world);
    }

    fn update_from(&mut self, start: NodeId, parent_world: Mat4) {
        let mut stack = vec![(start, parent_world)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else { continue };
            node.world = parent_world * local_matrix(node);
            let world = node.world;
            stack.extend(node.children.iter().map(|c| (*c, world)));
        }
    }

    /// Bounds of a node's geometry and all descendants, in the node's frame
    ///
    /// Empty for a stale handle.
    pub fn subtree_bounds(&self, id: NodeId) -> Aabb {
        let Some(node) = self.nodes.get(id) else { return Aabb::empty() };
        let mut bounds = node.local_bounds();
        for child in &node.children {
            if let Some(c) = self.nodes.get(*child) {
                bounds.insert_transformed(&local_matrix(c), &self.subtree_bounds(*child));
            }
        }
        bounds
    }

    /// Union over live handles of world pose applied to subtree bounds
    ///
    /// Stale handles are skipped.
    pub fn world_bounds<'a, I>(&self, ids: I) -> Aabb
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let mut bounds = Aabb::empty();
        for id in ids {
            match self.world_pose(*id) {
                Some(world) => bounds.insert_transformed(world, &self.subtree_bounds(*id)),
                None => log::trace!("skipping stale node {:?} in bounds", id),
            }
        }
        bounds
    }

    /// World bounds of everything in the tree
    pub fn scene_bounds(&self) -> Aabb {
        self.world_bounds(&[self.root])
    }

    /// Draw a subtree in `mode`, composing onto the current model-view
    ///
    /// The parent's cached world pose is applied first, so any node can be
    /// drawn on its own (shadow casters and receivers are drawn this way).
    /// Never invokes light hooks.
    pub fn draw_subtree(&self, ctx: &mut RenderContext<'_>, id: NodeId, mode: DrawMode) {
        let Some(node) = self.nodes.get(id) else {
            log::trace!("skipping stale node {:?} in draw", id);
            return;
        };
        let parent_world = node
            .parent
            .and_then(|p| self.world_pose(p).copied())
            .unwrap_or_else(Mat4::identity);
        ctx.with_modelview(|ctx| {
            ctx.mult_matrix(&parent_world);
            self.draw_node(ctx, id, mode);
        });
    }

    fn draw_node(&self, ctx: &mut RenderContext<'_>, id: NodeId, mode: DrawMode) {
        let Some(node) = self.nodes.get(id) else { return };
        if !node.visible {
            return;
        }
        ctx.with_modelview(|ctx| {
            ctx.mult_matrix(&local_matrix(node));
            draw_geometry(ctx, node, mode);
            for child in &node.children {
                self.draw_node(ctx, *child, mode);
            }
        });
    }
}

/// Local pose as a matrix; non-finite poses draw as identity
fn local_matrix(node: &SceneNode) -> Mat4 {
    if node.transform.is_finite() {
        node.transform.to_matrix()
    } else {
        log::warn!("node '{}' has a non-finite transform, using identity", node.name);
        Mat4::identity()
    }
}

fn draw_geometry(ctx: &mut RenderContext<'_>, node: &SceneNode, mode: DrawMode) {
    match (&node.geometry, mode) {
        (Geometry::Empty, _) => {}
        (Geometry::Mesh(mesh), DrawMode::Full) => {
            ctx.set_color(node.display_color());
            ctx.draw_mesh(mesh);
        }
        (Geometry::Mesh(mesh), DrawMode::GeometryOnly) => {
            ctx.set_color(node.color);
            ctx.draw_mesh(mesh);
        }
        (Geometry::Mesh(mesh), DrawMode::Selection) => {
            if let (true, Some(sid)) = (node.selectable, node.selection_id()) {
                ctx.set_selection_name(Some(sid.0));
                ctx.draw_mesh(mesh);
                ctx.set_selection_name(None);
            }
        }
        (Geometry::Grid(grid), DrawMode::Full) => {
            ctx.set_color(node.display_color());
            ctx.draw_lines(&grid.segments());
        }
        (Geometry::Grid(_), _) => {}
    }
}

/// Scene graph with its registered lights
///
/// [`SceneGraph::render`] is the only caller of light hooks.
#[derive(Debug, Default)]
pub struct SceneGraph {
    tree: NodeTree,
    lights: SlotMap<LightId, Light>,
    light_order: Vec<LightId>,
}

impl SceneGraph {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one frame
    ///
    /// 1. refresh world poses,
    /// 2. every light's `pre_render` in registration order,
    /// 3. draw the tree in [`DrawMode::Full`],
    /// 4. every light's `post_render` in registration order.
    pub fn render(&mut self, ctx: &mut RenderContext<'_>) {
        self.tree.update_world_poses();

        for id in &self.light_order {
            if let Some(light) = self.lights.get_mut(*id) {
                light.pre_render(ctx, &self.tree);
            }
        }

        ctx.marker("geometry");
        self.tree.draw_subtree(ctx, self.tree.root(), DrawMode::Full);
        ctx.check_errors("geometry pass");

        for id in &self.light_order {
            if let Some(light) = self.lights.get_mut(*id) {
                light.post_render(ctx, &self.tree);
            }
        }
    }

    /// Node tree
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Node tree, mutably
    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.tree
    }

    /// Root handle
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Attach a node directly under the root
    pub fn add_child_to_root(&mut self, node: SceneNode) -> NodeId {
        self.tree.add_child_to_root(node)
    }

    /// Attach a node under `parent`
    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId, SceneError> {
        self.tree.add_child(parent, node)
    }

    /// Remove a node and its subtree
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.tree.remove(id)
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.tree.node(id)
    }

    /// Look up a node mutably
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.tree.node_mut(id)
    }

    /// True when `id` resolves to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.tree.contains(id)
    }

    /// Ordered children
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.tree.children(id)
    }

    /// Parent handle
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.parent(id)
    }

    /// Cached world pose
    pub fn world_pose(&self, id: NodeId) -> Option<&Mat4> {
        self.tree.world_pose(id)
    }

    /// Subtree bounds in the node frame
    pub fn subtree_bounds(&self, id: NodeId) -> Aabb {
        self.tree.subtree_bounds(id)
    }

    /// World bounds over live handles
    pub fn world_bounds<'a, I>(&self, ids: I) -> Aabb
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        self.tree.world_bounds(ids)
    }

    /// World bounds of the whole scene
    pub fn scene_bounds(&self) -> Aabb {
        self.tree.scene_bounds()
    }

    /// Register a light; hooks run in registration order
    pub fn add_light(&mut self, light: Light) -> LightId {
        let id = self.lights.insert(light);
        self.light_order.push(id);
        id
    }

    /// Unregister a light
    pub fn remove_light(&mut self, id: LightId) -> Option<Light> {
        self.light_order.retain(|l| *l != id);
        self.lights.remove(id)
    }

    /// Look up a light
    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id)
    }

    /// Look up a light mutably
    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id)
    }

    /// Lights in registration order
    pub fn lights(&self) -> impl Iterator<Item = (LightId, &Light)> {
        self.light_order
            .iter()
            .filter_map(|id| self.lights.get(*id).map(|l| (*id, l)))
    }

    /// Remove every node except the root, and every light
    pub fn clear(&mut self) {
        self.tree.clear();
        self.lights.clear();
        self.light_order.clear();
    }
}
