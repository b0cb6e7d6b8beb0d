//! Bridge wire protocol: JSON text messages and binary frame framing.
//!
//! Text frames are UTF-8 JSON objects tagged by a `type` field. Binary
//! frames carry pixel payloads behind a fixed 8-byte little-endian header
//! and are never JSON.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::frame::{DEPTH_FRAME_SIZE, FRAME_HEIGHT, FRAME_RATE_HZ, FRAME_WIDTH, RGB_FRAME_SIZE};

pub const PROTOCOL_VERSION: &str = "1.0";
pub const SERVER_NAME: &str = "kinect-xr-bridge";

/// Stream type codes carried in the binary frame header.
pub const STREAM_TYPE_RGB: u16 = 0x0001;
pub const STREAM_TYPE_DEPTH: u16 = 0x0002;

/// Binary frame header length: frame_id u32 + stream_type u16 + reserved u16.
pub const BINARY_HEADER_SIZE: usize = 8;

/// Minimum interval between accepted motor commands.
pub const MOTOR_RATE_LIMIT_MS: u64 = 500;

/// Messages a browser client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(default)]
        streams: Vec<String>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe,
    #[serde(rename = "motor.setTilt")]
    MotorSetTilt {
        #[serde(default)]
        angle: f64,
    },
    #[serde(rename = "motor.setLed")]
    MotorSetLed {
        #[serde(default)]
        state: String,
    },
    #[serde(rename = "motor.reset")]
    MotorReset,
    #[serde(rename = "motor.getStatus")]
    MotorGetStatus,
}

/// Messages the server sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "hello")]
    Hello {
        protocol_version: &'static str,
        server: &'static str,
        capabilities: Capabilities,
    },
    #[serde(rename = "status")]
    Status {
        kinect_connected: bool,
        frame_id: u32,
        dropped_frames: u32,
        clients_connected: usize,
    },
    #[serde(rename = "error")]
    Error {
        code: ErrorCode,
        message: String,
        recoverable: bool,
    },
    #[serde(rename = "motor.status")]
    MotorStatus {
        angle: f64,
        status: String,
        accelerometer: Accelerometer,
    },
    #[serde(rename = "motor.error")]
    MotorError { code: ErrorCode, message: String },
}

/// Wire error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ProtocolError,
    DeviceNotConnected,
    RateLimited,
    InvalidLedState,
    MotorControlFailed,
    LedControlFailed,
    MotorStatusFailed,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Accelerometer {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub streams: [&'static str; 2],
    pub rgb: RgbCapabilities,
    pub depth: DepthCapabilities,
    pub frame_rate_hz: u32,
    pub motor: MotorCapabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct RgbCapabilities {
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
    pub bytes_per_frame: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepthCapabilities {
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
    pub bits_per_pixel: u32,
    pub bytes_per_frame: u32,
    pub min_depth_mm: u32,
    pub max_depth_mm: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MotorCapabilities {
    pub tilt_range_degrees: [i32; 2],
    pub rate_limit_ms: u64,
    pub led_states: [&'static str; 6],
}

impl Capabilities {
    /// The capability descriptor sent in every `hello`.
    pub fn current() -> Self {
        Self {
            streams: ["rgb", "depth"],
            rgb: RgbCapabilities {
                width: FRAME_WIDTH as u32,
                height: FRAME_HEIGHT as u32,
                format: "RGB888",
                bytes_per_frame: RGB_FRAME_SIZE as u32,
            },
            depth: DepthCapabilities {
                width: FRAME_WIDTH as u32,
                height: FRAME_HEIGHT as u32,
                format: "UINT16",
                bits_per_pixel: 16,
                bytes_per_frame: DEPTH_FRAME_SIZE as u32,
                min_depth_mm: 800,
                max_depth_mm: 4000,
            },
            frame_rate_hz: FRAME_RATE_HZ,
            motor: MotorCapabilities {
                tilt_range_degrees: [-27, 27],
                rate_limit_ms: MOTOR_RATE_LIMIT_MS,
                led_states: [
                    "off",
                    "green",
                    "red",
                    "yellow",
                    "blink_green",
                    "blink_red_yellow",
                ],
            },
        }
    }
}

impl ServerMessage {
    pub fn hello() -> Self {
        ServerMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            server: SERVER_NAME,
            capabilities: Capabilities::current(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>, recoverable: bool) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
            recoverable,
        }
    }

    pub fn motor_error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::MotorError {
            code,
            message: message.into(),
        }
    }
}

/// Build a binary frame message: `frame_id u32 LE | stream_type u16 LE |
/// reserved u16 = 0 | pixel bytes`.
pub fn encode_binary_frame(frame_id: u32, stream_type: u16, pixels: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(BINARY_HEADER_SIZE + pixels.len());
    buf.put_u32_le(frame_id);
    buf.put_u16_le(stream_type);
    buf.put_u16_le(0);
    buf.put_slice(pixels);
    buf.freeze()
}

/// Parse a binary frame header. Returns `(frame_id, stream_type)` or `None`
/// if the message is too short or the reserved bytes are non-zero.
pub fn decode_binary_header(mut message: &[u8]) -> Option<(u32, u16)> {
    if message.len() < BINARY_HEADER_SIZE {
        return None;
    }
    let frame_id = message.get_u32_le();
    let stream_type = message.get_u16_le();
    if message.get_u16_le() != 0 {
        return None;
    }
    Some((frame_id, stream_type))
}
