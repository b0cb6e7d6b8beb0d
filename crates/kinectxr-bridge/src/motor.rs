//! Motor gateway: rate limiting, serialization, and translation between
//! wire messages and driver calls.
//!
//! The mutating commands (setTilt, setLed, reset) share one 500 ms window
//! keyed on the last accepted command. getStatus is read-only: it takes the
//! same device serialization but is never rate limited, since browser UIs
//! poll it continuously.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use kinectxr_common::protocol::{Accelerometer, ErrorCode, ServerMessage, MOTOR_RATE_LIMIT_MS};
use kinectxr_device::{KinectDriver, LedState, TiltStatus};

use crate::server::BridgeState;

pub(crate) struct MotorGateway {
    last_command: Mutex<Option<Instant>>,
    // Set after an accepted tilt command, cleared once a status poll sees
    // the motor stopped.
    motor_moving: AtomicBool,
}

impl MotorGateway {
    pub fn new() -> Self {
        Self {
            last_command: Mutex::new(None),
            motor_moving: AtomicBool::new(false),
        }
    }

    /// Accept a mutating command, recording `now`, or refuse it inside the
    /// rate-limit window.
    pub fn try_accept(&self, now: Instant) -> bool {
        let mut last = self.last_command.lock().expect("motor gateway poisoned");
        if let Some(previous) = *last {
            if now.duration_since(previous) < Duration::from_millis(MOTOR_RATE_LIMIT_MS) {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    pub fn is_moving(&self) -> bool {
        self.motor_moving.load(Ordering::SeqCst)
    }
}

fn rate_limited() -> ServerMessage {
    ServerMessage::motor_error(
        ErrorCode::RateLimited,
        format!("Minimum {MOTOR_RATE_LIMIT_MS}ms between motor commands"),
    )
}

fn not_connected() -> ServerMessage {
    ServerMessage::motor_error(ErrorCode::DeviceNotConnected, "Kinect device not connected")
}

/// Fetch the motor status and build the `motor.status` reply.
fn status_reply(state: &BridgeState, device: &mut dyn KinectDriver) -> ServerMessage {
    match device.motor_status() {
        Ok(status) => {
            if status.status == TiltStatus::Stopped {
                state.motor.motor_moving.store(false, Ordering::SeqCst);
            }
            ServerMessage::MotorStatus {
                angle: status.tilt_angle,
                status: status.status.wire_name().to_string(),
                accelerometer: Accelerometer {
                    x: status.accel_x,
                    y: status.accel_y,
                    z: status.accel_z,
                },
            }
        }
        Err(error) => {
            ServerMessage::motor_error(ErrorCode::MotorStatusFailed, error.to_string())
        }
    }
}

pub(crate) fn set_tilt(state: &BridgeState, angle: f64) -> ServerMessage {
    let Some(device) = &state.device else {
        return not_connected();
    };
    if !state.motor.try_accept(Instant::now()) {
        return rate_limited();
    }

    let mut device = device.lock().expect("device mutex poisoned");
    if let Err(error) = device.set_tilt(angle) {
        return ServerMessage::motor_error(ErrorCode::MotorControlFailed, error.to_string());
    }
    state.motor.motor_moving.store(true, Ordering::SeqCst);
    status_reply(state, device.as_mut())
}

pub(crate) fn set_led(state: &BridgeState, name: &str) -> ServerMessage {
    let Some(device) = &state.device else {
        return not_connected();
    };

    let Some(led) = LedState::from_wire(name) else {
        return ServerMessage::motor_error(
            ErrorCode::InvalidLedState,
            "Valid states: off, green, red, yellow, blink_green, blink_red_yellow",
        );
    };

    if !state.motor.try_accept(Instant::now()) {
        return rate_limited();
    }

    let mut device = device.lock().expect("device mutex poisoned");
    if let Err(error) = device.set_led(led) {
        return ServerMessage::motor_error(ErrorCode::LedControlFailed, error.to_string());
    }
    status_reply(state, device.as_mut())
}

/// Return the head to level. Shares the tilt path, including its window.
pub(crate) fn reset(state: &BridgeState) -> ServerMessage {
    set_tilt(state, 0.0)
}

pub(crate) fn get_status(state: &BridgeState) -> ServerMessage {
    let Some(device) = &state.device else {
        return not_connected();
    };
    let mut device = device.lock().expect("device mutex poisoned");
    status_reply(state, device.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_refuses_commands_within_500ms() {
        let gateway = MotorGateway::new();
        let start = Instant::now();

        assert!(gateway.try_accept(start));
        assert!(!gateway.try_accept(start + Duration::from_millis(100)));
        assert!(!gateway.try_accept(start + Duration::from_millis(499)));
        assert!(gateway.try_accept(start + Duration::from_millis(500)));
    }

    #[test]
    fn refused_command_does_not_extend_the_window() {
        let gateway = MotorGateway::new();
        let start = Instant::now();

        assert!(gateway.try_accept(start));
        assert!(!gateway.try_accept(start + Duration::from_millis(400)));
        // The refused attempt at t=400 must not push the next window out.
        assert!(gateway.try_accept(start + Duration::from_millis(600)));
    }
}
