//! Scene nodes
//!
//! A node carries a local pose, an optional piece of geometry and the flags
//! the viewer toggles. Parent/child links and the world pose are maintained
//! by [`NodeTree`](super::NodeTree); the public fields are free to edit.

use std::sync::Arc;

use slotmap::new_key_type;

use super::aabb::Aabb;
use super::mesh::Mesh;
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::picking::SelectionId;

new_key_type! {
    /// Stable handle to a node in the scene arena
    pub struct NodeId;
}

/// Colour drawn for highlighted (selected) nodes
pub const HIGHLIGHT_COLOR: Vec3 = Vec3::new(1.0, 0.8, 0.2);

/// Default base colour
pub const DEFAULT_COLOR: Vec3 = Vec3::new(0.8, 0.8, 0.8);

/// Reference grid in the node's z = 0 plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Number of cells along each side of the origin
    pub half_cells: u32,
    /// Cell edge length
    pub spacing: f32,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self { half_cells: 20, spacing: 1.0 }
    }
}

impl GridSpec {
    /// Line segments making up the grid
    pub fn segments(&self) -> Vec<[Vec3; 2]> {
        let n = self.half_cells as i32;
        let extent = n as f32 * self.spacing;
        let mut lines = Vec::with_capacity(4 * self.half_cells as usize + 2);
        for i in -n..=n {
            let o = i as f32 * self.spacing;
            lines.push([Vec3::new(o, -extent, 0.0), Vec3::new(o, extent, 0.0)]);
            lines.push([Vec3::new(-extent, o, 0.0), Vec3::new(extent, o, 0.0)]);
        }
        lines
    }

    /// Bounds of the grid in the node frame
    pub fn bounds(&self) -> Aabb {
        let extent = self.half_cells as f32 * self.spacing;
        Aabb::new(Vec3::new(-extent, -extent, 0.0), Vec3::new(extent, extent, 0.0))
    }
}

/// What a node draws
#[derive(Debug, Clone, Default)]
pub enum Geometry {
    /// Pure grouping node
    #[default]
    Empty,
    /// Shared triangle mesh
    Mesh(Arc<Mesh>),
    /// Line grid decoration, drawn only in the full pass
    Grid(GridSpec),
}

impl Geometry {
    /// Bounds in the node frame, empty for grouping nodes
    pub fn bounds(&self) -> Aabb {
        match self {
            Geometry::Empty => Aabb::empty(),
            Geometry::Mesh(mesh) => mesh.bounds(),
            Geometry::Grid(grid) => grid.bounds(),
        }
    }

    /// The mesh, if this is mesh geometry
    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// A node of the scene graph
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Display name, used in logs
    pub name: String,
    /// Pose relative to the parent
    pub transform: Transform,
    /// Drawable content
    pub geometry: Geometry,
    /// Base RGB colour
    pub color: Vec3,
    /// Hidden nodes and their subtrees are not drawn
    pub visible: bool,
    /// Whether the node takes part in picking
    pub selectable: bool,
    /// Drawn in the highlight colour during the full pass
    pub highlighted: bool,

    pub(super) world: Mat4,
    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
    selection_id: Option<SelectionId>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new("node")
    }
}

impl SceneNode {
    /// Create an empty grouping node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            geometry: Geometry::Empty,
            color: DEFAULT_COLOR,
            visible: true,
            selectable: true,
            highlighted: false,
            world: Mat4::identity(),
            parent: None,
            children: Vec::new(),
            selection_id: None,
        }
    }

    /// Create a node drawing `mesh`
    pub fn from_mesh(name: impl Into<String>, mesh: Arc<Mesh>) -> Self {
        Self::new(name).with_geometry(Geometry::Mesh(mesh))
    }

    /// Create a grid decoration node; grids never take part in picking
    pub fn grid(name: impl Into<String>, grid: GridSpec) -> Self {
        Self::new(name).with_geometry(Geometry::Grid(grid)).with_selectable(false)
    }

    /// Builder-style geometry
    #[must_use]
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Builder-style local pose
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder-style translation-only local pose
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.transform = Transform::from_position(position);
        self
    }

    /// Builder-style base colour
    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Builder-style selectability
    #[must_use]
    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    /// Builder-style visibility
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// World pose as of the last traversal
    pub fn world_pose(&self) -> &Mat4 {
        &self.world
    }

    /// Parent handle, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered child handles
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Selection id, once assigned
    pub fn selection_id(&self) -> Option<SelectionId> {
        self.selection_id
    }

    /// Assign the selection id; a node keeps its first id forever
    pub(crate) fn assign_selection_id(&mut self, id: SelectionId) -> bool {
        if self.selection_id.is_some() {
            return false;
        }
        self.selection_id = Some(id);
        true
    }

    /// Bounds of this node's own geometry in the node frame
    pub fn local_bounds(&self) -> Aabb {
        self.geometry.bounds()
    }

    /// Colour used by the full pass
    pub fn display_color(&self) -> Vec3 {
        if self.highlighted { HIGHLIGHT_COLOR } else { self.color }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_id_assigned_once() {
        let mut node = SceneNode::new("a");
        assert!(node.assign_selection_id(SelectionId(3)));
        assert!(!node.assign_selection_id(SelectionId(4)));
        assert_eq!(node.selection_id(), Some(SelectionId(3)));
    }

    #[test]
    fn test_grid_defaults() {
        let grid = SceneNode::grid("grid", GridSpec { half_cells: 2, spacing: 0.5 });
        assert!(!grid.selectable);
        assert_eq!(grid.local_bounds().size(), Vec3::new(2.0, 2.0, 0.0));
        if let Geometry::Grid(spec) = &grid.geometry {
            assert_eq!(spec.segments().len(), 10);
        } else {
            panic!("expected grid geometry");
        }
    }

    #[test]
    fn test_display_color_follows_highlight() {
        let mut node = SceneNode::new("a").with_color(Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(node.display_color(), Vec3::new(0.0, 0.0, 1.0));
        node.highlighted = true;
        assert_eq!(node.display_color(), HIGHLIGHT_COLOR);
    }

    #[test]
    fn test_empty_node_bounds() {
        assert!(SceneNode::new("group").local_bounds().is_empty());
    }
}
