//! Websocket bridge server.
//!
//! Streams the sensor's RGB and depth frames to browser-style clients over
//! a small JSON + binary protocol (see `kinectxr_common::protocol`) and
//! mediates motor/LED commands. One broadcaster thread paces frames at
//! 30 Hz; websocket handling rides on the async runtime.

#![forbid(unsafe_code)]

mod broadcast;
mod motor;
pub mod mock;
mod server;

pub use server::{BridgeConfig, BridgeServer};
