//! Shared utilities for michat: wire types and logging setup.
//!
//! This crate provides common infrastructure used across all michat components.

#![forbid(unsafe_code)]

pub mod protocol;

pub use protocol::*;

/// Initialize tracing with a specific default level.
///
/// `RUST_LOG` takes precedence over `default_level` when set.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
