//! Raw libfreenect declarations.
//!
//! This is the only foreign surface the workspace links against. Constants
//! mirror the native headers; keep them in sync with the libfreenect the
//! target links.

#![allow(non_camel_case_types)]
#![allow(dead_code)]

use libc::{c_int, c_void, timeval};

pub enum freenect_context {}
pub enum freenect_device {}

// freenect_device_flags
pub const FREENECT_DEVICE_MOTOR: c_int = 0x01;
pub const FREENECT_DEVICE_CAMERA: c_int = 0x02;

// freenect_resolution
pub const FREENECT_RESOLUTION_MEDIUM: c_int = 1;

// freenect_video_format / freenect_depth_format
pub const FREENECT_VIDEO_RGB: c_int = 0;
pub const FREENECT_DEPTH_MM: c_int = 5;

// freenect_led_options
pub const FREENECT_LED_OFF: c_int = 0;
pub const FREENECT_LED_GREEN: c_int = 1;
pub const FREENECT_LED_RED: c_int = 2;
pub const FREENECT_LED_YELLOW: c_int = 3;
pub const FREENECT_LED_BLINK_GREEN: c_int = 4;
pub const FREENECT_LED_BLINK_RED_YELLOW: c_int = 6;

// freenect_tilt_status_code
pub const TILT_STATUS_STOPPED: c_int = 0x00;
pub const TILT_STATUS_LIMIT: c_int = 0x01;
pub const TILT_STATUS_MOVING: c_int = 0x04;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct freenect_raw_tilt_state {
    pub accelerometer_x: i16,
    pub accelerometer_y: i16,
    pub accelerometer_z: i16,
    pub tilt_angle: i8,
    pub tilt_status: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct freenect_frame_mode {
    pub reserved: u32,
    pub resolution: c_int,
    pub format: c_int,
    pub bytes: i32,
    pub width: i16,
    pub height: i16,
    pub data_bits_per_pixel: i8,
    pub padding_bits_per_pixel: i8,
    pub framerate: i8,
    pub is_valid: i8,
}

pub type freenect_depth_cb =
    Option<unsafe extern "C" fn(dev: *mut freenect_device, depth: *mut c_void, timestamp: u32)>;
pub type freenect_video_cb =
    Option<unsafe extern "C" fn(dev: *mut freenect_device, video: *mut c_void, timestamp: u32)>;

#[link(name = "freenect")]
extern "C" {
    pub fn freenect_init(ctx: *mut *mut freenect_context, usb_ctx: *mut c_void) -> c_int;
    pub fn freenect_shutdown(ctx: *mut freenect_context) -> c_int;
    pub fn freenect_num_devices(ctx: *mut freenect_context) -> c_int;
    pub fn freenect_select_subdevices(ctx: *mut freenect_context, subdevs: c_int);
    pub fn freenect_open_device(
        ctx: *mut freenect_context,
        dev: *mut *mut freenect_device,
        index: c_int,
    ) -> c_int;
    pub fn freenect_close_device(dev: *mut freenect_device) -> c_int;

    pub fn freenect_set_user(dev: *mut freenect_device, user: *mut c_void);
    pub fn freenect_get_user(dev: *mut freenect_device) -> *mut c_void;

    pub fn freenect_set_depth_callback(dev: *mut freenect_device, cb: freenect_depth_cb);
    pub fn freenect_set_video_callback(dev: *mut freenect_device, cb: freenect_video_cb);

    pub fn freenect_find_depth_mode(res: c_int, fmt: c_int) -> freenect_frame_mode;
    pub fn freenect_find_video_mode(res: c_int, fmt: c_int) -> freenect_frame_mode;
    pub fn freenect_set_depth_mode(dev: *mut freenect_device, mode: freenect_frame_mode) -> c_int;
    pub fn freenect_set_video_mode(dev: *mut freenect_device, mode: freenect_frame_mode) -> c_int;

    pub fn freenect_start_depth(dev: *mut freenect_device) -> c_int;
    pub fn freenect_start_video(dev: *mut freenect_device) -> c_int;
    pub fn freenect_stop_depth(dev: *mut freenect_device) -> c_int;
    pub fn freenect_stop_video(dev: *mut freenect_device) -> c_int;

    pub fn freenect_process_events(ctx: *mut freenect_context) -> c_int;
    pub fn freenect_process_events_timeout(
        ctx: *mut freenect_context,
        timeout: *mut timeval,
    ) -> c_int;

    pub fn freenect_set_tilt_degs(dev: *mut freenect_device, angle: f64) -> c_int;
    pub fn freenect_update_tilt_state(dev: *mut freenect_device) -> c_int;
    pub fn freenect_get_tilt_state(dev: *mut freenect_device) -> *mut freenect_raw_tilt_state;
    pub fn freenect_get_tilt_degs(state: *mut freenect_raw_tilt_state) -> f64;
    pub fn freenect_get_tilt_status(state: *mut freenect_raw_tilt_state) -> c_int;
    pub fn freenect_get_mks_accel(
        state: *mut freenect_raw_tilt_state,
        x: *mut f64,
        y: *mut f64,
        z: *mut f64,
    );
    pub fn freenect_set_led(dev: *mut freenect_device, option: c_int) -> c_int;
}
