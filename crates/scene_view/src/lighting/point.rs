//! Plain point light

use crate::foundation::math::{Vec3, Vec4};
use crate::render::{LightParams, LightSlot, RenderContext};

/// Point light bound to one fixed-function slot
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    /// Name used in debug markers
    pub name: String,
    /// World position
    pub position: Vec3,
    /// Slot the light occupies while drawing
    pub slot: LightSlot,
    /// Ambient intensity
    pub ambient: f32,
    /// Diffuse intensity
    pub diffuse: f32,
}

impl PointLight {
    /// Create a point light in the primary slot
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            slot: LightSlot::PRIMARY,
            ambient: super::MAIN_AMBIENT,
            diffuse: super::MAIN_DIFFUSE,
        }
    }

    /// Use another slot
    pub fn with_slot(mut self, slot: LightSlot) -> Self {
        self.slot = slot;
        self
    }

    /// Set ambient and diffuse intensities
    pub fn with_intensity(mut self, ambient: f32, diffuse: f32) -> Self {
        self.ambient = ambient;
        self.diffuse = diffuse;
        self
    }

    /// Slot parameters; the position is transformed by the model-view current at upload
    pub fn params(&self) -> LightParams {
        LightParams {
            position: Vec4::new(self.position.x, self.position.y, self.position.z, 1.0),
            ambient: self.ambient,
            diffuse: self.diffuse,
        }
    }

    /// Upload and switch on the slot
    pub(super) fn pre_render(&self, ctx: &mut RenderContext<'_>) {
        ctx.set_light(self.slot, &self.params());
        ctx.set_light_enabled(self.slot, true);
    }

    /// Switch the slot off again
    pub(super) fn post_render(&self, ctx: &mut RenderContext<'_>) {
        ctx.set_light_enabled(self.slot, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::software::SoftwareBackend;
    use approx::assert_relative_eq;

    #[test]
    fn test_pre_render_enables_slot_in_eye_space() {
        let mut backend = SoftwareBackend::new(8, 8);
        let light = PointLight::new("key", Vec3::new(1.0, 2.0, 3.0)).with_slot(LightSlot(2));
        {
            let mut ctx = RenderContext::new(&mut backend);
            ctx.mult_matrix(&crate::foundation::math::Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0)));
            light.pre_render(&mut ctx);
        }
        let state = backend.state().lights[2];
        assert!(state.enabled);
        assert_relative_eq!(state.params.position, Vec4::new(1.0, 2.0, -2.0, 1.0));
        assert_relative_eq!(state.params.ambient, 0.2);

        let mut ctx = RenderContext::new(&mut backend);
        light.post_render(&mut ctx);
        assert!(!backend.state().lights[2].enabled);
    }
}
