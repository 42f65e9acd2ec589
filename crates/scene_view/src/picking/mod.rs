//! Object picking
//!
//! Selectable nodes get a numeric id once, from a counter that never goes
//! backwards. A pick renders the tree in [`crate::render::DrawMode::Selection`]
//! over a small window region, and the backend's hit records are decoded back
//! into the nearest id that still belongs to a live node.

mod picker;
mod selection;

pub use picker::{decode_hits, pick};
pub use selection::{SelectionMode, SelectionState};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric id a node announces during a selection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectionId(pub u32);

impl fmt::Display for SelectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Picking errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PickingError {
    /// Every id up to `u32::MAX` has been handed out
    #[error("selection id space exhausted")]
    Exhausted,
}
