//! Logging utilities
//!
//! The core only talks to the `log` facade. Hosts call one of the init
//! functions once at startup to route records through `env_logger`.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    let _ = env_logger::try_init();
}

/// Initialize logging with a default filter (e.g. `"info"` or
/// `"scene_view=debug"`) that `RUST_LOG` still overrides
pub fn init_with_level(default_filter: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}
