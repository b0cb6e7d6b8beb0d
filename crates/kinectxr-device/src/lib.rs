//! Kinect device facade.
//!
//! Wraps the native USB driver behind a small capability trait so the rest
//! of the system never touches foreign symbols directly. Two drivers exist:
//! [`FreenectDriver`] over libfreenect (feature `freenect`) and
//! [`MockDriver`] for tests and deviceless development.

use std::sync::Arc;

use thiserror::Error;

mod mock;
mod throttle;

#[cfg(feature = "freenect")]
mod ffi;
#[cfg(feature = "freenect")]
mod freenect;

pub use mock::{MockCounters, MockDriver};
pub use throttle::ErrorThrottle;

#[cfg(feature = "freenect")]
pub use freenect::FreenectDriver;

/// Errors from the device facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device not found")]
    DeviceNotFound,
    #[error("initialization failed")]
    InitializationFailed,
    #[error("device not initialized")]
    NotInitialized,
    #[error("streams already active")]
    AlreadyStreaming,
    #[error("streams not active")]
    NotStreaming,
    #[error("motor control failed")]
    MotorControlFailed,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("unknown error")]
    Unknown,
}

/// Kinect LED states. Discriminants match the native command codes
/// (note the gap: 5 is unassigned by the hardware).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    Off = 0,
    Green = 1,
    Red = 2,
    Yellow = 3,
    BlinkGreen = 4,
    BlinkRedYellow = 6,
}

impl LedState {
    pub const ALL: [LedState; 6] = [
        LedState::Off,
        LedState::Green,
        LedState::Red,
        LedState::Yellow,
        LedState::BlinkGreen,
        LedState::BlinkRedYellow,
    ];

    /// Parse the lowercase wire name used by the bridge protocol.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "off" => Some(LedState::Off),
            "green" => Some(LedState::Green),
            "red" => Some(LedState::Red),
            "yellow" => Some(LedState::Yellow),
            "blink_green" => Some(LedState::BlinkGreen),
            "blink_red_yellow" => Some(LedState::BlinkRedYellow),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            LedState::Off => "off",
            LedState::Green => "green",
            LedState::Red => "red",
            LedState::Yellow => "yellow",
            LedState::BlinkGreen => "blink_green",
            LedState::BlinkRedYellow => "blink_red_yellow",
        }
    }
}

/// Motor movement state as reported by the tilt hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltStatus {
    Stopped,
    Moving,
    AtLimit,
}

impl TiltStatus {
    pub fn wire_name(self) -> &'static str {
        match self {
            TiltStatus::Stopped => "STOPPED",
            TiltStatus::Moving => "MOVING",
            TiltStatus::AtLimit => "LIMIT",
        }
    }
}

/// Complete motor status: tilt angle plus the accelerometer in m/s^2.
#[derive(Debug, Clone, Copy)]
pub struct MotorStatus {
    pub tilt_angle: f64,
    pub status: TiltStatus,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
}

/// Which subdevices to claim when opening.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub enable_rgb: bool,
    pub enable_depth: bool,
    pub enable_motor: bool,
    pub device_index: i32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            enable_rgb: true,
            enable_depth: true,
            enable_motor: true,
            device_index: 0,
        }
    }
}

/// Motorized tilt range of the sensor head, in degrees.
pub const TILT_MIN_DEGREES: f64 = -27.0;
pub const TILT_MAX_DEGREES: f64 = 27.0;

/// Clamp a requested tilt angle into the mechanical range.
pub fn clamp_tilt(degrees: f64) -> f64 {
    degrees.clamp(TILT_MIN_DEGREES, TILT_MAX_DEGREES)
}

/// Frame callbacks run on the USB event pump thread and receive a borrowed
/// view of the frame bytes plus the driver-supplied 32-bit timestamp. They
/// must copy (or swap) and return promptly; blocking here stalls the pump.
pub type FrameCallback = Arc<dyn Fn(&[u8], u32) + Send + Sync>;

/// Capability interface over one Kinect.
///
/// Motor, LED, and status calls are serialized by a per-device mutex inside
/// each implementation. The event pump intentionally runs outside that
/// mutex: the native library only guarantees USB-event vs. control-transfer
/// serialization for this exact pattern.
pub trait KinectDriver: Send {
    /// Open the device. Idempotent if already open. Fails with
    /// [`DeviceError::DeviceNotFound`] when the USB enumerator reports zero
    /// devices and [`DeviceError::InitializationFailed`] for other errors.
    fn open(&mut self, config: &DriverConfig) -> Result<(), DeviceError>;

    fn is_open(&self) -> bool;

    /// Configure depth (millimeters) and video (RGB888 640x480) modes, then
    /// enable both streams and spawn the event pump thread.
    fn start_streams(&mut self) -> Result<(), DeviceError>;

    /// Disable streams and join the event pump.
    fn stop_streams(&mut self) -> Result<(), DeviceError>;

    fn is_streaming(&self) -> bool;

    fn set_depth_callback(&mut self, callback: FrameCallback);
    fn set_video_callback(&mut self, callback: FrameCallback);

    /// Command the tilt motor. Input is clamped to [-27, +27]. Blocking;
    /// the motor may still be moving when this returns.
    fn set_tilt(&mut self, degrees: f64) -> Result<(), DeviceError>;

    fn get_tilt(&mut self) -> Result<f64, DeviceError>;

    fn set_led(&mut self, state: LedState) -> Result<(), DeviceError>;

    fn motor_status(&mut self) -> Result<MotorStatus, DeviceError>;
}

/// Number of Kinects visible to the USB enumerator. Zero when built without
/// the `freenect` feature.
pub fn device_count() -> usize {
    #[cfg(feature = "freenect")]
    {
        freenect::device_count()
    }
    #[cfg(not(feature = "freenect"))]
    {
        0
    }
}

/// Construct the default (unopened) driver for this build: the libfreenect
/// driver when compiled in, otherwise a stand-in whose `open` always
/// reports [`DeviceError::DeviceNotFound`].
pub fn default_driver() -> Box<dyn KinectDriver> {
    #[cfg(feature = "freenect")]
    {
        Box::new(FreenectDriver::new())
    }
    #[cfg(not(feature = "freenect"))]
    {
        Box::new(NoDeviceDriver)
    }
}

/// Driver used when the native library is not compiled in. Every operation
/// behaves like an absent device.
#[cfg(not(feature = "freenect"))]
struct NoDeviceDriver;

#[cfg(not(feature = "freenect"))]
impl KinectDriver for NoDeviceDriver {
    fn open(&mut self, _config: &DriverConfig) -> Result<(), DeviceError> {
        Err(DeviceError::DeviceNotFound)
    }

    fn is_open(&self) -> bool {
        false
    }

    fn start_streams(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::NotInitialized)
    }

    fn stop_streams(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::NotInitialized)
    }

    fn is_streaming(&self) -> bool {
        false
    }

    fn set_depth_callback(&mut self, _callback: FrameCallback) {}

    fn set_video_callback(&mut self, _callback: FrameCallback) {}

    fn set_tilt(&mut self, _degrees: f64) -> Result<(), DeviceError> {
        Err(DeviceError::NotInitialized)
    }

    fn get_tilt(&mut self) -> Result<f64, DeviceError> {
        Err(DeviceError::NotInitialized)
    }

    fn set_led(&mut self, _state: LedState) -> Result<(), DeviceError> {
        Err(DeviceError::NotInitialized)
    }

    fn motor_status(&mut self) -> Result<MotorStatus, DeviceError> {
        Err(DeviceError::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilt_clamps_to_mechanical_range() {
        assert_eq!(clamp_tilt(0.0), 0.0);
        assert_eq!(clamp_tilt(-27.0), -27.0);
        assert_eq!(clamp_tilt(27.0), 27.0);
        assert_eq!(clamp_tilt(-90.0), -27.0);
        assert_eq!(clamp_tilt(45.0), 27.0);
    }

    #[test]
    fn led_wire_names_round_trip() {
        for state in LedState::ALL {
            assert_eq!(LedState::from_wire(state.wire_name()), Some(state));
        }
        assert_eq!(LedState::from_wire("disco"), None);
        // wire names are lowercase only
        assert_eq!(LedState::from_wire("GREEN"), None);
    }

    #[test]
    fn tilt_status_wire_names() {
        assert_eq!(TiltStatus::Stopped.wire_name(), "STOPPED");
        assert_eq!(TiltStatus::Moving.wire_name(), "MOVING");
        assert_eq!(TiltStatus::AtLimit.wire_name(), "LIMIT");
    }
}
