//! # Scene View
//!
//! Core of an embeddable 3D viewer for robotics and vision debugging: a
//! scene graph drawn each frame through an immediate-mode pipeline with
//! shadow-mapped point lights and ID-pass object picking.
//!
//! ## Features
//!
//! - **Scene graph**: arena of nodes with local poses, cached world poses and bounds
//! - **Light hooks**: every light runs a pass before and after the main geometry pass
//! - **Shadow mapping**: light frustum fitted to casters and receivers each frame
//! - **Picking**: monotonic selection ids decoded from a selection render
//! - **Software backend**: CPU implementation of the render contract for headless use
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_view::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ViewerConfig::default();
//!     let backend = SoftwareBackend::new(config.viewport.width, config.viewport.height);
//!     let mut viewer = Viewer::new(backend, config.clone())?;
//!
//!     let cube = viewer.add_child_to_root(SceneNode::from_mesh("cube", Arc::new(Mesh::cube(1.0))))?;
//!     let mut sun = ShadowLight::new("sun", Vec3::new(5.0, 0.0, -10.0), config.shadow);
//!     sun.add_shadow_caster_and_receiver(cube);
//!     viewer.add_light(sun)?;
//!
//!     viewer.draw();
//!     let picked = viewer.pick(512.0, 384.0);
//!     println!("picked {:?}", picked);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod input;
pub mod lighting;
pub mod picking;
pub mod render;
pub mod scene;

mod viewer;

pub use viewer::{Viewer, ViewerError};

#[cfg(test)]
mod pipeline_tests;

/// Common imports for viewer users
pub mod prelude {
    pub use crate::{
        config::{Config, ViewerConfig, ShadowConfig},
        foundation::math::{Vec3, Mat4, Transform},
        input::{InputEvent, KeyCode, MouseButton},
        lighting::{Light, LightId, PointLight, ShadowLight},
        picking::{SelectionId, SelectionMode},
        render::{software::SoftwareBackend, Camera, RenderBackend, RenderContext},
        scene::{Geometry, GridSpec, Mesh, NodeId, SceneGraph, SceneNode},
        Viewer, ViewerError,
    };
}
