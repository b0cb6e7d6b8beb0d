//! OpenXR-style runtime exposing the Kinect as a head-mounted display.
//!
//! The loader discovers this library through its runtime manifest (the
//! `XR_RUNTIME_JSON` environment variable, read by the loader, not by us)
//! and negotiates via the two exported symbols in [`entry`]. Applications
//! then drive the instance / session / swapchain / frame-loop state
//! machines, receiving per-frame color and depth images uploaded from the
//! sensor's frame cache.

pub mod abi;
pub mod entry;
pub mod gpu;
mod handle;
mod runtime;
mod session;
mod swapchain;
mod upload;

pub use gpu::{GpuBackend, GpuPtr, NullBackend};
pub use runtime::{DriverFactory, Runtime};
pub use upload::rgb_to_bgra;
