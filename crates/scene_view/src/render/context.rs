//! Render context with scoped state helpers
//!
//! Every save/restore pair in the core goes through a closure helper here,
//! so the restore runs on every exit path of the closure, early returns
//! included.

use std::ops::{Deref, DerefMut};

use super::backend::{AttribMask, FramebufferHandle, MatrixMode, RenderBackend};

/// Explicit render state handle passed to every drawing operation
pub struct RenderContext<'a> {
    backend: &'a mut dyn RenderBackend,
}

impl<'a> RenderContext<'a> {
    /// Wrap a backend
    pub fn new(backend: &'a mut dyn RenderBackend) -> Self {
        Self { backend }
    }

    /// Run `f` with both matrix stacks saved; restores model-view mode on exit
    pub fn with_saved_matrices<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.backend.matrix_mode(MatrixMode::ModelView);
        self.backend.push_matrix();
        self.backend.matrix_mode(MatrixMode::Projection);
        self.backend.push_matrix();
        self.backend.matrix_mode(MatrixMode::ModelView);

        let result = f(self);

        self.backend.matrix_mode(MatrixMode::ModelView);
        self.backend.pop_matrix();
        self.backend.matrix_mode(MatrixMode::Projection);
        self.backend.pop_matrix();
        self.backend.matrix_mode(MatrixMode::ModelView);
        result
    }

    /// Run `f` with the model-view top saved
    pub fn with_modelview<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.backend.matrix_mode(MatrixMode::ModelView);
        self.backend.push_matrix();
        let result = f(self);
        self.backend.matrix_mode(MatrixMode::ModelView);
        self.backend.pop_matrix();
        result
    }

    /// Run `f` with the attribute groups in `mask` saved
    pub fn with_attribs<R>(&mut self, mask: AttribMask, f: impl FnOnce(&mut Self) -> R) -> R {
        self.backend.push_attrib(mask);
        let result = f(self);
        self.backend.pop_attrib();
        result
    }

    /// Run `f` with `framebuffer` bound, then rebind whatever was bound before
    pub fn with_framebuffer<R>(&mut self, framebuffer: FramebufferHandle, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.backend.bound_framebuffer();
        self.backend.bind_framebuffer(Some(framebuffer));
        let result = f(self);
        self.backend.bind_framebuffer(previous);
        result
    }

    /// Drain and log queued backend errors; returns how many there were
    pub fn check_errors(&mut self, label: &str) -> usize {
        let mut count = 0;
        while let Some(err) = self.backend.take_error() {
            log::error!("render error after {}: {}", label, err);
            count += 1;
        }
        count
    }
}

impl<'a> Deref for RenderContext<'a> {
    type Target = dyn RenderBackend + 'a;

    fn deref(&self) -> &Self::Target {
        self.backend
    }
}

impl<'a> DerefMut for RenderContext<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend
    }
}
