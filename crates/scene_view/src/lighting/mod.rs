//! Lights and their render hooks
//!
//! Lights are a closed set of kinds. Each one contributes a `pre_render`
//! pass before the main geometry pass and a `post_render` pass after it;
//! [`crate::scene::SceneGraph::render`] is the only caller of both.

mod point;
mod shadow;

pub use point::PointLight;
pub use shadow::{ShadowFrustum, ShadowLight, ShadowResources, ShadowStage};

use slotmap::new_key_type;

use crate::foundation::math::Vec3;
use crate::render::{RenderContext, RenderError};
use crate::scene::NodeTree;

new_key_type! {
    /// Handle of a light registered with a scene graph
    pub struct LightId;
}

/// Ambient intensity of the primary light during the main pass
pub const MAIN_AMBIENT: f32 = 0.2;

/// Diffuse intensity of the primary light during the main pass
pub const MAIN_DIFFUSE: f32 = 0.4;

/// Steady low intensity the primary light returns to after shadowing
pub const STEADY_LOW: f32 = 0.01;

/// A registered light
#[derive(Debug)]
pub enum Light {
    /// Plain point light
    Point(PointLight),
    /// Point light with a shadow map
    Shadow(ShadowLight),
}

impl Light {
    /// Light name, used in debug markers
    pub fn name(&self) -> &str {
        match self {
            Light::Point(light) => &light.name,
            Light::Shadow(light) => light.name(),
        }
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        match self {
            Light::Point(light) => light.position,
            Light::Shadow(light) => light.position(),
        }
    }

    /// Move the light
    pub fn set_position(&mut self, position: Vec3) {
        match self {
            Light::Point(light) => light.position = position,
            Light::Shadow(light) => light.set_position(position),
        }
    }

    /// Acquire backend resources; a no-op for lights without any
    pub fn initialize(&mut self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        match self {
            Light::Point(_) => Ok(()),
            Light::Shadow(light) => light.initialize(ctx),
        }
    }

    /// Hook run before the main geometry pass
    pub fn pre_render(&mut self, ctx: &mut RenderContext<'_>, tree: &NodeTree) {
        ctx.marker(&format!("{}.pre_render", self.name()));
        match self {
            Light::Point(light) => light.pre_render(ctx),
            Light::Shadow(light) => light.pre_render(ctx, tree),
        }
        ctx.check_errors("light pre-render");
    }

    /// Hook run after the main geometry pass
    pub fn post_render(&mut self, ctx: &mut RenderContext<'_>, tree: &NodeTree) {
        ctx.marker(&format!("{}.post_render", self.name()));
        match self {
            Light::Point(light) => light.post_render(ctx),
            Light::Shadow(light) => light.post_render(ctx, tree),
        }
        ctx.check_errors("light post-render");
    }

    /// Shadow light, if this is one
    pub fn as_shadow(&self) -> Option<&ShadowLight> {
        match self {
            Light::Shadow(light) => Some(light),
            Light::Point(_) => None,
        }
    }

    /// Shadow light, mutably
    pub fn as_shadow_mut(&mut self) -> Option<&mut ShadowLight> {
        match self {
            Light::Shadow(light) => Some(light),
            Light::Point(_) => None,
        }
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Light::Point(light)
    }
}

impl From<ShadowLight> for Light {
    fn from(light: ShadowLight) -> Self {
        Light::Shadow(light)
    }
}
