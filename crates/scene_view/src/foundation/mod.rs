//! Foundation module - core utilities and types
//!
//! - Math types and operations
//! - Frame and redraw timing
//! - Logging setup

pub mod math;
pub mod time;
pub mod logging;
