//! In-process stand-in for the Kinect, used by tests and deviceless
//! development. Accepts the full capability surface, records motor/LED
//! commands, and delivers deterministic synthetic frames.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kinectxr_common::frame::{DEPTH_FRAME_SIZE, FRAME_HEIGHT, FRAME_WIDTH, RGB_FRAME_SIZE};

use crate::{
    clamp_tilt, DeviceError, DriverConfig, FrameCallback, KinectDriver, LedState, MotorStatus,
    TiltStatus,
};

/// Shared command counters, cloneable before the driver is boxed so tests
/// can observe how many native calls a code path issued.
#[derive(Clone, Default)]
pub struct MockCounters {
    inner: Arc<CounterInner>,
}

#[derive(Default)]
struct CounterInner {
    tilt_commands: AtomicUsize,
    led_commands: AtomicUsize,
    status_queries: AtomicUsize,
}

impl MockCounters {
    pub fn tilt_commands(&self) -> usize {
        self.inner.tilt_commands.load(Ordering::SeqCst)
    }

    pub fn led_commands(&self) -> usize {
        self.inner.led_commands.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> usize {
        self.inner.status_queries.load(Ordering::SeqCst)
    }
}

/// Deterministic RGB888 test frame: a gradient that moves with `seq`.
pub fn synthetic_rgb_frame(seq: u32) -> Vec<u8> {
    let mut data = vec![0u8; RGB_FRAME_SIZE];
    for y in 0..FRAME_HEIGHT {
        for x in 0..FRAME_WIDTH {
            let idx = (y * FRAME_WIDTH + x) * 3;
            data[idx] = ((x as u32 + seq * 2) % 256) as u8;
            data[idx + 1] = ((y as u32 + seq) % 256) as u8;
            data[idx + 2] = ((x as u32 + y as u32 + seq * 3) % 256) as u8;
        }
    }
    data
}

/// Deterministic depth test frame: a flat plane at 1000 mm plus a seq-keyed
/// offset, stored little-endian.
pub fn synthetic_depth_frame(seq: u32) -> Vec<u8> {
    let depth_mm = 1000u16 + (seq % 64) as u16;
    let mut data = vec![0u8; DEPTH_FRAME_SIZE];
    for chunk in data.chunks_exact_mut(2) {
        chunk.copy_from_slice(&depth_mm.to_le_bytes());
    }
    data
}

pub struct MockDriver {
    open: bool,
    streaming: bool,
    fail_open: Option<DeviceError>,
    fail_start: Option<DeviceError>,
    config: DriverConfig,
    tilt_angle: f64,
    led: LedState,
    depth_callback: Option<FrameCallback>,
    video_callback: Option<FrameCallback>,
    counters: MockCounters,
    frames_on_start: u32,
    seq: u32,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            open: false,
            streaming: false,
            fail_open: None,
            fail_start: None,
            config: DriverConfig::default(),
            tilt_angle: 0.0,
            led: LedState::Off,
            depth_callback: None,
            video_callback: None,
            counters: MockCounters::default(),
            frames_on_start: 1,
            seq: 0,
        }
    }

    /// Make `open` fail with the given error.
    pub fn failing_open(error: DeviceError) -> Self {
        Self {
            fail_open: Some(error),
            ..Self::new()
        }
    }

    /// Make `start_streams` fail with the given error.
    pub fn failing_start(error: DeviceError) -> Self {
        Self {
            fail_start: Some(error),
            ..Self::new()
        }
    }

    /// How many synthetic frame pairs to deliver synchronously when streams
    /// start (default 1, so consumers immediately see valid cache content).
    pub fn with_frames_on_start(mut self, frames: u32) -> Self {
        self.frames_on_start = frames;
        self
    }

    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }

    pub fn led(&self) -> LedState {
        self.led
    }

    fn deliver_frame_pair(&mut self) {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);

        if self.config.enable_depth {
            if let Some(cb) = &self.depth_callback {
                cb(&synthetic_depth_frame(seq), seq);
            }
        }
        if self.config.enable_rgb {
            if let Some(cb) = &self.video_callback {
                cb(&synthetic_rgb_frame(seq), seq);
            }
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl KinectDriver for MockDriver {
    fn open(&mut self, config: &DriverConfig) -> Result<(), DeviceError> {
        if self.open {
            return Ok(());
        }
        if let Some(error) = self.fail_open {
            return Err(error);
        }
        self.config = *config;
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn start_streams(&mut self) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::NotInitialized);
        }
        if self.streaming {
            return Err(DeviceError::AlreadyStreaming);
        }
        if let Some(error) = self.fail_start {
            return Err(error);
        }
        self.streaming = true;
        for _ in 0..self.frames_on_start {
            self.deliver_frame_pair();
        }
        Ok(())
    }

    fn stop_streams(&mut self) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::NotInitialized);
        }
        if !self.streaming {
            return Err(DeviceError::NotStreaming);
        }
        self.streaming = false;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn set_depth_callback(&mut self, callback: FrameCallback) {
        self.depth_callback = Some(callback);
    }

    fn set_video_callback(&mut self, callback: FrameCallback) {
        self.video_callback = Some(callback);
    }

    fn set_tilt(&mut self, degrees: f64) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::NotInitialized);
        }
        self.tilt_angle = clamp_tilt(degrees);
        self.counters.inner.tilt_commands.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_tilt(&mut self) -> Result<f64, DeviceError> {
        if !self.open {
            return Err(DeviceError::NotInitialized);
        }
        Ok(self.tilt_angle)
    }

    fn set_led(&mut self, state: LedState) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::NotInitialized);
        }
        self.led = state;
        self.counters.inner.led_commands.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn motor_status(&mut self) -> Result<MotorStatus, DeviceError> {
        if !self.open {
            return Err(DeviceError::NotInitialized);
        }
        self.counters.inner.status_queries.fetch_add(1, Ordering::SeqCst);
        Ok(MotorStatus {
            tilt_angle: self.tilt_angle,
            status: TiltStatus::Stopped,
            accel_x: 0.0,
            accel_y: 9.80665,
            accel_z: 0.0,
        })
    }
}
