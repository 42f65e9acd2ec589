//! Scene graph
//!
//! Nodes live in an arena and are addressed by [`NodeId`] handles. The scene
//! graph owns them; lights and the selection state only keep handles, and
//! every lookup through a handle may come back empty once the node is gone.

pub mod aabb;
pub mod graph;
pub mod mesh;
pub mod node;

pub use aabb::{Aabb, AxisAlignedBoundingBox};
pub use graph::{NodeTree, SceneGraph};
pub use mesh::{Mesh, Vertex};
pub use node::{Geometry, GridSpec, NodeId, SceneNode};

/// Scene graph errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Parent handle does not resolve to a live node
    #[error("parent node {0:?} does not exist")]
    MissingParent(NodeId),

    /// Node handle does not resolve to a live node
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),

    /// The root node is owned by the graph
    #[error("the root node cannot be removed")]
    CannotRemoveRoot,
}

/// Mesh validation errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// Index count is not a multiple of three
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    /// An index points past the vertex buffer
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Number of vertices
        vertex_count: usize,
    },

    /// Position and normal buffers differ in length
    #[error("{positions} positions but {normals} normals")]
    AttributeMismatch {
        /// Number of positions
        positions: usize,
        /// Number of normals
        normals: usize,
    },

    /// A vertex position is NaN or infinite
    #[error("vertex position is not finite")]
    NonFinitePosition,
}
