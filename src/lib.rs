//! Inkwell
//!
//! Client-side authentication and a recent-post feed for a small blog
//! site, backed by a hosted identity service and a hosted document store.
//!
//! The workspace is split the same way the site is layered:
//!
//! - [`backend_client`] - configuration, service traits, REST and in-memory backends
//! - [`storage`] - device-local key-value storage
//! - [`app_state`] - session hint and submission guards
//! - [`app_core`] - workflows
//! - [`app_ui`] - headless pages and feed markup

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use app_core;
pub use app_state;
pub use app_ui;
pub use backend_client;
pub use storage;

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber honouring `RUST_LOG`, defaulting to `info`
///
/// Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
