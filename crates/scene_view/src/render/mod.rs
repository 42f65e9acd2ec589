//! Immediate-mode rendering layer
//!
//! The core talks to graphics through the [`RenderBackend`] contract: an
//! immediate-mode, fixed-function-style command set with matrix and
//! attribute stacks. All drawing goes through a [`RenderContext`], whose
//! scoped helpers guarantee that every push has a matching pop.
//!
//! [`software::SoftwareBackend`] is a CPU implementation of the contract used
//! by the tests and by headless hosts.

pub mod backend;
pub mod camera;
pub mod context;
pub mod software;

pub use backend::{
    AttribMask, BackendResult, Capabilities, ClearMask, CompareFunc, DepthTextureDesc,
    FramebufferHandle, HitRecord, LightParams, LightSlot, MatrixMode, PickRegion, RenderBackend,
    ShadeModel, TextureHandle, Viewport,
};
pub use camera::{Camera, ViewState};
pub use context::RenderContext;

/// How a traversal draws the nodes it visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// Normal frame: meshes, grids and highlight colours
    Full,
    /// Meshes only in their base colour, no decorations
    ///
    /// Used by the shadow depth capture and the shadow application passes.
    GeometryOnly,
    /// Selectable meshes only, each announced by its selection id
    Selection,
}

/// Errors that abort an initialization step
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// An off-screen framebuffer or texture could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Errors recorded by a backend after a state-changing call
///
/// These are queued rather than returned; the render context polls and logs
/// them after each state-mutating sequence.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Pop on an empty matrix or attribute stack
    #[error("{0} stack underflow")]
    StackUnderflow(&'static str),

    /// Push on a full matrix or attribute stack
    #[error("{0} stack overflow")]
    StackOverflow(&'static str),

    /// A handle that was never created
    #[error("invalid handle {0}")]
    InvalidHandle(u64),

    /// An argument out of range, such as a texture unit
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A call that is not allowed in the current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
