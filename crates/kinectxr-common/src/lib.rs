//! Shared infrastructure for KinectXR: frame geometry, the latest-only frame
//! cache, and the bridge wire protocol.
//!
//! Both the XR runtime and the websocket bridge consume this crate.

#![forbid(unsafe_code)]

pub mod frame;
pub mod protocol;

pub use frame::{FrameCache, FrameSnapshot};

/// Initialize tracing with sensible defaults.
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Defaults to `info` if not set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
