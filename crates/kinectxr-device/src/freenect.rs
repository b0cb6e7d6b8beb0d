//! Kinect driver over the native libfreenect USB library.
//!
//! Threading: the event pump runs on its own thread and invokes the native
//! data callbacks synchronously. Motor, LED, and status calls are serialized
//! by the per-device control mutex; the pump deliberately runs outside it
//! (libfreenect serializes USB events vs. control transfers internally only
//! for this pattern).

use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use libc::{c_int, c_void, timeval};
use tracing::warn;

use kinectxr_common::frame::{DEPTH_FRAME_SIZE, RGB_FRAME_SIZE};

use crate::ffi;
use crate::throttle::ErrorThrottle;
use crate::{
    clamp_tilt, DeviceError, DriverConfig, FrameCallback, KinectDriver, LedState, MotorStatus,
    TiltStatus,
};

const PUMP_TIMEOUT: Duration = Duration::from_millis(100);
const ERROR_SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

/// Callback slots shared with the native layer through the user pointer.
/// The pump thread reads them; the owner replaces them.
struct CallbackSlots {
    depth: Mutex<Option<FrameCallback>>,
    video: Mutex<Option<FrameCallback>>,
}

// Raw context pointer handed to the pump thread. libfreenect permits event
// processing from a thread other than the opener as long as control
// transfers stay serialized, which the control mutex guarantees.
struct PumpContext(*mut ffi::freenect_context);
unsafe impl Send for PumpContext {}

struct EventPump {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Number of Kinects visible to the USB enumerator.
pub(crate) fn device_count() -> usize {
    let mut ctx: *mut ffi::freenect_context = ptr::null_mut();
    unsafe {
        if ffi::freenect_init(&mut ctx, ptr::null_mut()) < 0 {
            return 0;
        }
        let count = ffi::freenect_num_devices(ctx);
        ffi::freenect_shutdown(ctx);
        count.max(0) as usize
    }
}

pub struct FreenectDriver {
    ctx: *mut ffi::freenect_context,
    dev: *mut ffi::freenect_device,
    config: DriverConfig,
    streaming: bool,
    callbacks: Arc<CallbackSlots>,
    pump: Option<EventPump>,
    // Serializes every motor/LED/status control transfer.
    control: Mutex<()>,
}

// The wrapped pointers are only used from methods taking &mut self plus the
// pump thread, whose lifetime is bracketed by start/stop on the same owner.
unsafe impl Send for FreenectDriver {}

impl FreenectDriver {
    pub fn new() -> Self {
        Self {
            ctx: ptr::null_mut(),
            dev: ptr::null_mut(),
            config: DriverConfig::default(),
            streaming: false,
            callbacks: Arc::new(CallbackSlots {
                depth: Mutex::new(None),
                video: Mutex::new(None),
            }),
            pump: None,
            control: Mutex::new(()),
        }
    }

    fn require_open(&self) -> Result<(), DeviceError> {
        if self.dev.is_null() {
            Err(DeviceError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn spawn_pump(&mut self) {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let ctx = PumpContext(self.ctx);

        let handle = std::thread::Builder::new()
            .name("kinect-usb-pump".into())
            .spawn(move || {
                // Bind the wrapper itself so the closure captures the Send
                // newtype, not the raw pointer field.
                let ctx = ctx;
                let mut throttle = ErrorThrottle::new(ERROR_SUMMARY_INTERVAL);
                while flag.load(Ordering::SeqCst) {
                    let mut timeout = timeval {
                        tv_sec: 0,
                        tv_usec: PUMP_TIMEOUT.as_micros() as _,
                    };
                    let ret = unsafe { ffi::freenect_process_events_timeout(ctx.0, &mut timeout) };
                    if ret < 0 {
                        // Malformed USB packets are routine with this
                        // hardware; summarize instead of flooding.
                        if let Some(count) = throttle.record(Instant::now()) {
                            warn!(
                                "{count} USB event errors in last {}s",
                                throttle.interval().as_secs()
                            );
                        }
                    }
                }
            })
            .expect("failed to spawn USB event pump");

        self.pump = Some(EventPump { running, handle });
    }

    fn join_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.running.store(false, Ordering::SeqCst);
            let _ = pump.handle.join();
        }
    }
}

impl Default for FreenectDriver {
    fn default() -> Self {
        Self::new()
    }
}

unsafe extern "C" fn depth_trampoline(
    dev: *mut ffi::freenect_device,
    depth: *mut c_void,
    timestamp: u32,
) {
    let slots = ffi::freenect_get_user(dev) as *const CallbackSlots;
    if slots.is_null() {
        return;
    }
    if let Some(cb) = &*(*slots).depth.lock().expect("depth slot poisoned") {
        let bytes = std::slice::from_raw_parts(depth as *const u8, DEPTH_FRAME_SIZE);
        cb(bytes, timestamp);
    }
}

unsafe extern "C" fn video_trampoline(
    dev: *mut ffi::freenect_device,
    video: *mut c_void,
    timestamp: u32,
) {
    let slots = ffi::freenect_get_user(dev) as *const CallbackSlots;
    if slots.is_null() {
        return;
    }
    if let Some(cb) = &*(*slots).video.lock().expect("video slot poisoned") {
        let bytes = std::slice::from_raw_parts(video as *const u8, RGB_FRAME_SIZE);
        cb(bytes, timestamp);
    }
}

impl KinectDriver for FreenectDriver {
    fn open(&mut self, config: &DriverConfig) -> Result<(), DeviceError> {
        if !self.dev.is_null() {
            return Ok(());
        }

        if device_count() == 0 {
            return Err(DeviceError::DeviceNotFound);
        }

        self.config = *config;

        unsafe {
            if ffi::freenect_init(&mut self.ctx, ptr::null_mut()) < 0 {
                return Err(DeviceError::InitializationFailed);
            }

            let mut subdevs: c_int = 0;
            if config.enable_motor {
                subdevs |= ffi::FREENECT_DEVICE_MOTOR;
            }
            if config.enable_rgb || config.enable_depth {
                subdevs |= ffi::FREENECT_DEVICE_CAMERA;
            }
            ffi::freenect_select_subdevices(self.ctx, subdevs);

            if ffi::freenect_num_devices(self.ctx) <= 0 {
                ffi::freenect_shutdown(self.ctx);
                self.ctx = ptr::null_mut();
                return Err(DeviceError::DeviceNotFound);
            }

            if ffi::freenect_open_device(self.ctx, &mut self.dev, config.device_index) < 0 {
                ffi::freenect_shutdown(self.ctx);
                self.ctx = ptr::null_mut();
                return Err(DeviceError::InitializationFailed);
            }
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.dev.is_null()
    }

    fn start_streams(&mut self) -> Result<(), DeviceError> {
        self.require_open()?;
        if self.streaming {
            return Err(DeviceError::AlreadyStreaming);
        }

        unsafe {
            // Depth in millimeters (not raw 11-bit disparity) and RGB888 at
            // 640x480, both configured before the streams are enabled.
            let depth_mode =
                ffi::freenect_find_depth_mode(ffi::FREENECT_RESOLUTION_MEDIUM, ffi::FREENECT_DEPTH_MM);
            let video_mode =
                ffi::freenect_find_video_mode(ffi::FREENECT_RESOLUTION_MEDIUM, ffi::FREENECT_VIDEO_RGB);
            if depth_mode.is_valid == 0 || video_mode.is_valid == 0 {
                return Err(DeviceError::InitializationFailed);
            }
            if ffi::freenect_set_depth_mode(self.dev, depth_mode) < 0
                || ffi::freenect_set_video_mode(self.dev, video_mode) < 0
            {
                return Err(DeviceError::InitializationFailed);
            }

            ffi::freenect_set_user(self.dev, Arc::as_ptr(&self.callbacks) as *mut c_void);
            ffi::freenect_set_depth_callback(self.dev, Some(depth_trampoline));
            ffi::freenect_set_video_callback(self.dev, Some(video_trampoline));

            if self.config.enable_depth && ffi::freenect_start_depth(self.dev) < 0 {
                return Err(DeviceError::InitializationFailed);
            }
            if self.config.enable_rgb && ffi::freenect_start_video(self.dev) < 0 {
                if self.config.enable_depth {
                    ffi::freenect_stop_depth(self.dev);
                }
                return Err(DeviceError::InitializationFailed);
            }
        }

        self.spawn_pump();
        self.streaming = true;
        Ok(())
    }

    fn stop_streams(&mut self) -> Result<(), DeviceError> {
        self.require_open()?;
        if !self.streaming {
            return Err(DeviceError::NotStreaming);
        }

        unsafe {
            if self.config.enable_depth {
                ffi::freenect_stop_depth(self.dev);
            }
            if self.config.enable_rgb {
                ffi::freenect_stop_video(self.dev);
            }
        }

        self.join_pump();
        self.streaming = false;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn set_depth_callback(&mut self, callback: FrameCallback) {
        *self.callbacks.depth.lock().expect("depth slot poisoned") = Some(callback);
    }

    fn set_video_callback(&mut self, callback: FrameCallback) {
        *self.callbacks.video.lock().expect("video slot poisoned") = Some(callback);
    }

    fn set_tilt(&mut self, degrees: f64) -> Result<(), DeviceError> {
        self.require_open()?;
        let _guard = self.control.lock().expect("control mutex poisoned");
        let clamped = clamp_tilt(degrees);
        if unsafe { ffi::freenect_set_tilt_degs(self.dev, clamped) } < 0 {
            return Err(DeviceError::MotorControlFailed);
        }
        Ok(())
    }

    fn get_tilt(&mut self) -> Result<f64, DeviceError> {
        Ok(self.motor_status()?.tilt_angle)
    }

    fn set_led(&mut self, state: LedState) -> Result<(), DeviceError> {
        self.require_open()?;
        let _guard = self.control.lock().expect("control mutex poisoned");
        let option = match state {
            LedState::Off => ffi::FREENECT_LED_OFF,
            LedState::Green => ffi::FREENECT_LED_GREEN,
            LedState::Red => ffi::FREENECT_LED_RED,
            LedState::Yellow => ffi::FREENECT_LED_YELLOW,
            LedState::BlinkGreen => ffi::FREENECT_LED_BLINK_GREEN,
            LedState::BlinkRedYellow => ffi::FREENECT_LED_BLINK_RED_YELLOW,
        };
        if unsafe { ffi::freenect_set_led(self.dev, option) } < 0 {
            return Err(DeviceError::MotorControlFailed);
        }
        Ok(())
    }

    fn motor_status(&mut self) -> Result<MotorStatus, DeviceError> {
        self.require_open()?;
        let _guard = self.control.lock().expect("control mutex poisoned");

        unsafe {
            if ffi::freenect_update_tilt_state(self.dev) < 0 {
                return Err(DeviceError::MotorControlFailed);
            }
            let state = ffi::freenect_get_tilt_state(self.dev);
            if state.is_null() {
                return Err(DeviceError::MotorControlFailed);
            }

            let tilt_angle = ffi::freenect_get_tilt_degs(state);
            let status = match ffi::freenect_get_tilt_status(state) {
                ffi::TILT_STATUS_MOVING => TiltStatus::Moving,
                ffi::TILT_STATUS_LIMIT => TiltStatus::AtLimit,
                _ => TiltStatus::Stopped,
            };

            let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
            ffi::freenect_get_mks_accel(state, &mut x, &mut y, &mut z);

            Ok(MotorStatus {
                tilt_angle,
                status,
                accel_x: x,
                accel_y: y,
                accel_z: z,
            })
        }
    }
}

impl Drop for FreenectDriver {
    fn drop(&mut self) {
        if self.streaming {
            let _ = self.stop_streams();
        }
        unsafe {
            if !self.dev.is_null() {
                ffi::freenect_close_device(self.dev);
                self.dev = ptr::null_mut();
            }
            if !self.ctx.is_null() {
                ffi::freenect_shutdown(self.ctx);
                self.ctx = ptr::null_mut();
            }
        }
    }
}
