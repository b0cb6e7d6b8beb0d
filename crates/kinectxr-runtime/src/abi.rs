//! C ABI surface shared with the XR loader and applications.
//!
//! Every input and output structure carries a 32-bit type tag as its first
//! field and a `next` pointer forming a singly-linked extension chain.
//! Consumers must walk chains by type tag, never by position.

#![allow(dead_code)]

use std::ffi::c_void;
use std::os::raw::c_char;

/// Pack an XR version: 16-bit major, 16-bit minor, 32-bit patch.
pub const fn make_version(major: u16, minor: u16, patch: u32) -> u64 {
    ((major as u64) << 48) | ((minor as u64) << 32) | patch as u64
}

pub const fn version_major(version: u64) -> u16 {
    (version >> 48) as u16
}

/// API version this runtime implements.
pub const CURRENT_API_VERSION: u64 = make_version(1, 0, 34);
/// Version of the runtime itself, reported in instance properties.
pub const RUNTIME_VERSION: u64 = make_version(0, 1, 0);
pub const RUNTIME_NAME: &str = "Kinect XR Runtime";

pub const MAX_APPLICATION_NAME_SIZE: usize = 128;
pub const MAX_ENGINE_NAME_SIZE: usize = 128;
pub const MAX_RUNTIME_NAME_SIZE: usize = 128;
pub const MAX_SYSTEM_NAME_SIZE: usize = 256;
pub const MAX_EXTENSION_NAME_SIZE: usize = 128;
pub const MAX_API_LAYER_NAME_SIZE: usize = 256;
pub const MAX_API_LAYER_DESCRIPTION_SIZE: usize = 256;

macro_rules! xr_handle {
    ($name:ident) => {
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);

        impl $name {
            pub const NULL: Self = Self(0);

            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

xr_handle!(XrInstance);
xr_handle!(XrSession);
xr_handle!(XrSpace);
xr_handle!(XrSwapchain);

/// Numeric system id scoped to an instance. Not a handle; 0 is reserved.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XrSystemId(pub u64);

impl XrSystemId {
    pub const NULL: Self = Self(0);
}

pub type XrTime = i64;
pub type XrDuration = i64;
pub type XrBool32 = u32;

pub const TRUE: XrBool32 = 1;
pub const FALSE: XrBool32 = 0;

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrResult(pub i32);

impl XrResult {
    pub const SUCCESS: Self = Self(0);
    pub const EVENT_UNAVAILABLE: Self = Self(4);
    pub const ERROR_VALIDATION_FAILURE: Self = Self(-1);
    pub const ERROR_RUNTIME_FAILURE: Self = Self(-2);
    pub const ERROR_API_VERSION_UNSUPPORTED: Self = Self(-4);
    pub const ERROR_INITIALIZATION_FAILED: Self = Self(-6);
    pub const ERROR_FUNCTION_UNSUPPORTED: Self = Self(-7);
    pub const ERROR_FEATURE_UNSUPPORTED: Self = Self(-8);
    pub const ERROR_EXTENSION_NOT_PRESENT: Self = Self(-9);
    pub const ERROR_LIMIT_REACHED: Self = Self(-10);
    pub const ERROR_SIZE_INSUFFICIENT: Self = Self(-11);
    pub const ERROR_HANDLE_INVALID: Self = Self(-12);
    pub const ERROR_SESSION_RUNNING: Self = Self(-14);
    pub const ERROR_SESSION_NOT_RUNNING: Self = Self(-16);
    pub const ERROR_SYSTEM_INVALID: Self = Self(-18);
    pub const ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED: Self = Self(-26);
    pub const ERROR_SESSION_NOT_READY: Self = Self(-28);
    pub const ERROR_REFERENCE_SPACE_UNSUPPORTED: Self = Self(-31);
    pub const ERROR_FORM_FACTOR_UNSUPPORTED: Self = Self(-34);
    pub const ERROR_FORM_FACTOR_UNAVAILABLE: Self = Self(-35);
    pub const ERROR_API_LAYER_NOT_PRESENT: Self = Self(-36);
    pub const ERROR_CALL_ORDER_INVALID: Self = Self(-37);
    pub const ERROR_GRAPHICS_DEVICE_INVALID: Self = Self(-38);
    pub const ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED: Self = Self(-41);
    pub const ERROR_ENVIRONMENT_BLEND_MODE_UNSUPPORTED: Self = Self(-42);

    pub fn is_success(self) -> bool {
        self.0 >= 0
    }
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrStructureType(pub i32);

impl XrStructureType {
    pub const UNKNOWN: Self = Self(0);
    pub const API_LAYER_PROPERTIES: Self = Self(1);
    pub const EXTENSION_PROPERTIES: Self = Self(2);
    pub const INSTANCE_CREATE_INFO: Self = Self(3);
    pub const SYSTEM_GET_INFO: Self = Self(4);
    pub const SYSTEM_PROPERTIES: Self = Self(5);
    pub const VIEW_LOCATE_INFO: Self = Self(6);
    pub const VIEW: Self = Self(7);
    pub const SESSION_CREATE_INFO: Self = Self(8);
    pub const SWAPCHAIN_CREATE_INFO: Self = Self(9);
    pub const SESSION_BEGIN_INFO: Self = Self(10);
    pub const VIEW_STATE: Self = Self(11);
    pub const FRAME_END_INFO: Self = Self(12);
    pub const EVENT_DATA_BUFFER: Self = Self(16);
    pub const EVENT_DATA_SESSION_STATE_CHANGED: Self = Self(18);
    pub const INSTANCE_PROPERTIES: Self = Self(32);
    pub const FRAME_WAIT_INFO: Self = Self(33);
    pub const COMPOSITION_LAYER_PROJECTION: Self = Self(35);
    pub const REFERENCE_SPACE_CREATE_INFO: Self = Self(37);
    pub const FRAME_STATE: Self = Self(44);
    pub const FRAME_BEGIN_INFO: Self = Self(46);
    pub const COMPOSITION_LAYER_PROJECTION_VIEW: Self = Self(48);
    pub const SWAPCHAIN_IMAGE_ACQUIRE_INFO: Self = Self(55);
    pub const SWAPCHAIN_IMAGE_WAIT_INFO: Self = Self(56);
    pub const SWAPCHAIN_IMAGE_RELEASE_INFO: Self = Self(57);
    pub const COMPOSITION_LAYER_DEPTH_INFO_KHR: Self = Self(1_000_010_000);
    pub const GRAPHICS_BINDING_METAL_KHR: Self = Self(1_000_321_000);
    pub const SWAPCHAIN_IMAGE_METAL_KHR: Self = Self(1_000_321_001);
    pub const GRAPHICS_REQUIREMENTS_METAL_KHR: Self = Self(1_000_321_002);
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrFormFactor(pub i32);

impl XrFormFactor {
    pub const HEAD_MOUNTED_DISPLAY: Self = Self(1);
    pub const HANDHELD_DISPLAY: Self = Self(2);
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrViewConfigurationType(pub i32);

impl XrViewConfigurationType {
    pub const PRIMARY_MONO: Self = Self(1);
    pub const PRIMARY_STEREO: Self = Self(2);
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrReferenceSpaceType(pub i32);

impl XrReferenceSpaceType {
    pub const VIEW: Self = Self(1);
    pub const LOCAL: Self = Self(2);
    pub const STAGE: Self = Self(3);
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrSessionState(pub i32);

impl XrSessionState {
    pub const UNKNOWN: Self = Self(0);
    pub const IDLE: Self = Self(1);
    pub const READY: Self = Self(2);
    pub const SYNCHRONIZED: Self = Self(3);
    pub const VISIBLE: Self = Self(4);
    pub const FOCUSED: Self = Self(5);
    pub const STOPPING: Self = Self(6);
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrEnvironmentBlendMode(pub i32);

impl XrEnvironmentBlendMode {
    pub const OPAQUE: Self = Self(1);
    pub const ADDITIVE: Self = Self(2);
    pub const ALPHA_BLEND: Self = Self(3);
}

pub type XrSwapchainUsageFlags = u64;
pub const SWAPCHAIN_USAGE_COLOR_ATTACHMENT_BIT: XrSwapchainUsageFlags = 0x01;
pub const SWAPCHAIN_USAGE_DEPTH_STENCIL_ATTACHMENT_BIT: XrSwapchainUsageFlags = 0x02;

pub type XrViewStateFlags = u64;
pub const VIEW_STATE_ORIENTATION_VALID_BIT: XrViewStateFlags = 0x01;
pub const VIEW_STATE_POSITION_VALID_BIT: XrViewStateFlags = 0x02;
pub const VIEW_STATE_ORIENTATION_TRACKED_BIT: XrViewStateFlags = 0x04;
pub const VIEW_STATE_POSITION_TRACKED_BIT: XrViewStateFlags = 0x08;

/// Swapchain texture formats, as the underlying graphics API numbers them.
pub const SWAPCHAIN_FORMAT_BGRA8_UNORM: i64 = 80;
pub const SWAPCHAIN_FORMAT_R16_UINT: i64 = 13;

// ---------------------------------------------------------------------------
// Structures

#[repr(C)]
pub struct XrBaseInStructure {
    pub ty: XrStructureType,
    pub next: *const XrBaseInStructure,
}

#[repr(C)]
pub struct XrBaseOutStructure {
    pub ty: XrStructureType,
    pub next: *mut XrBaseOutStructure,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrApplicationInfo {
    pub application_name: [c_char; MAX_APPLICATION_NAME_SIZE],
    pub application_version: u32,
    pub engine_name: [c_char; MAX_ENGINE_NAME_SIZE],
    pub engine_version: u32,
    pub api_version: u64,
}

#[repr(C)]
pub struct XrInstanceCreateInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub create_flags: u64,
    pub application_info: XrApplicationInfo,
    pub enabled_api_layer_count: u32,
    pub enabled_api_layer_names: *const *const c_char,
    pub enabled_extension_count: u32,
    pub enabled_extension_names: *const *const c_char,
}

#[repr(C)]
pub struct XrInstanceProperties {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub runtime_version: u64,
    pub runtime_name: [c_char; MAX_RUNTIME_NAME_SIZE],
}

#[repr(C)]
pub struct XrExtensionProperties {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub extension_name: [c_char; MAX_EXTENSION_NAME_SIZE],
    pub extension_version: u32,
}

#[repr(C)]
pub struct XrApiLayerProperties {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub layer_name: [c_char; MAX_API_LAYER_NAME_SIZE],
    pub spec_version: u64,
    pub layer_version: u32,
    pub description: [c_char; MAX_API_LAYER_DESCRIPTION_SIZE],
}

#[repr(C)]
pub struct XrSystemGetInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub form_factor: XrFormFactor,
}

#[repr(C)]
pub struct XrSystemGraphicsProperties {
    pub max_swapchain_image_height: u32,
    pub max_swapchain_image_width: u32,
    pub max_layer_count: u32,
}

#[repr(C)]
pub struct XrSystemTrackingProperties {
    pub orientation_tracking: XrBool32,
    pub position_tracking: XrBool32,
}

#[repr(C)]
pub struct XrSystemProperties {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub system_id: XrSystemId,
    pub vendor_id: u32,
    pub system_name: [c_char; MAX_SYSTEM_NAME_SIZE],
    pub graphics_properties: XrSystemGraphicsProperties,
    pub tracking_properties: XrSystemTrackingProperties,
}

#[repr(C)]
pub struct XrSessionCreateInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub create_flags: u64,
    pub system_id: XrSystemId,
}

#[repr(C)]
pub struct XrSessionBeginInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub primary_view_configuration_type: XrViewConfigurationType,
}

/// Graphics binding supplied in the session create chain: the application's
/// GPU command queue, from which the runtime derives the device.
#[repr(C)]
pub struct XrGraphicsBindingMetalKHR {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub command_queue: *mut c_void,
}

#[repr(C)]
pub struct XrGraphicsRequirementsMetalKHR {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub metal_device: *mut c_void,
}

#[repr(C)]
pub struct XrSwapchainCreateInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub create_flags: u64,
    pub usage_flags: XrSwapchainUsageFlags,
    pub format: i64,
    pub sample_count: u32,
    pub width: u32,
    pub height: u32,
    pub face_count: u32,
    pub array_size: u32,
    pub mip_count: u32,
}

#[repr(C)]
pub struct XrSwapchainImageBaseHeader {
    pub ty: XrStructureType,
    pub next: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrSwapchainImageMetalKHR {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub texture: *mut c_void,
}

#[repr(C)]
pub struct XrSwapchainImageAcquireInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
}

#[repr(C)]
pub struct XrSwapchainImageWaitInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub timeout: XrDuration,
}

#[repr(C)]
pub struct XrSwapchainImageReleaseInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
}

#[repr(C)]
pub struct XrReferenceSpaceCreateInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub reference_space_type: XrReferenceSpaceType,
    pub pose_in_reference_space: XrPosef,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct XrVector3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrQuaternionf {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for XrQuaternionf {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct XrPosef {
    pub orientation: XrQuaternionf,
    pub position: XrVector3f,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct XrFovf {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

#[repr(C)]
pub struct XrFrameWaitInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrFrameState {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub predicted_display_time: XrTime,
    pub predicted_display_period: XrDuration,
    pub should_render: XrBool32,
}

#[repr(C)]
pub struct XrFrameBeginInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
}

#[repr(C)]
pub struct XrFrameEndInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub display_time: XrTime,
    pub environment_blend_mode: XrEnvironmentBlendMode,
    pub layer_count: u32,
    pub layers: *const *const XrCompositionLayerBaseHeader,
}

#[repr(C)]
pub struct XrCompositionLayerBaseHeader {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub layer_flags: u64,
    pub space: XrSpace,
}

#[repr(C)]
pub struct XrRect2Di {
    pub offset_x: i32,
    pub offset_y: i32,
    pub extent_width: i32,
    pub extent_height: i32,
}

#[repr(C)]
pub struct XrSwapchainSubImage {
    pub swapchain: XrSwapchain,
    pub image_rect: XrRect2Di,
    pub image_array_index: u32,
}

#[repr(C)]
pub struct XrCompositionLayerProjectionView {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub pose: XrPosef,
    pub fov: XrFovf,
    pub sub_image: XrSwapchainSubImage,
}

#[repr(C)]
pub struct XrCompositionLayerProjection {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub layer_flags: u64,
    pub space: XrSpace,
    pub view_count: u32,
    pub views: *const XrCompositionLayerProjectionView,
}

/// Auxiliary depth structure chained off a projection layer
/// (`XR_KHR_composition_layer_depth`).
#[repr(C)]
pub struct XrCompositionLayerDepthInfoKHR {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub sub_image: XrSwapchainSubImage,
    pub min_depth: f32,
    pub max_depth: f32,
    pub near_z: f32,
    pub far_z: f32,
}

#[repr(C)]
pub struct XrViewLocateInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub view_configuration_type: XrViewConfigurationType,
    pub display_time: XrTime,
    pub space: XrSpace,
}

#[repr(C)]
pub struct XrViewState {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub view_state_flags: XrViewStateFlags,
}

#[repr(C)]
pub struct XrView {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub pose: XrPosef,
    pub fov: XrFovf,
}

pub const EVENT_DATA_BUFFER_VARYING_SIZE: usize = 4000;

#[repr(C)]
pub struct XrEventDataBuffer {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub varying: [u8; EVENT_DATA_BUFFER_VARYING_SIZE],
}

#[repr(C)]
pub struct XrEventDataSessionStateChanged {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub session: XrSession,
    pub state: XrSessionState,
    pub time: XrTime,
}

// ---------------------------------------------------------------------------
// Loader negotiation

pub const LOADER_INTERFACE_STRUCT_LOADER_INFO: u32 = 1;
pub const LOADER_INTERFACE_STRUCT_RUNTIME_REQUEST: u32 = 3;
pub const LOADER_INFO_STRUCT_VERSION: u32 = 1;
pub const RUNTIME_INFO_STRUCT_VERSION: u32 = 1;
pub const CURRENT_LOADER_RUNTIME_VERSION: u32 = 1;

pub type PfnVoidFunction = unsafe extern "C" fn();
pub type PfnGetInstanceProcAddr = unsafe extern "C" fn(
    instance: XrInstance,
    name: *const c_char,
    function: *mut Option<PfnVoidFunction>,
) -> XrResult;

#[repr(C)]
pub struct XrNegotiateLoaderInfo {
    pub struct_type: u32,
    pub struct_version: u32,
    pub struct_size: usize,
    pub min_interface_version: u32,
    pub max_interface_version: u32,
    pub min_api_version: u64,
    pub max_api_version: u64,
}

#[repr(C)]
pub struct XrNegotiateRuntimeRequest {
    pub struct_type: u32,
    pub struct_version: u32,
    pub struct_size: usize,
    pub runtime_interface_version: u32,
    pub runtime_api_version: u64,
    pub get_instance_proc_addr: Option<PfnGetInstanceProcAddr>,
}

// ---------------------------------------------------------------------------
// Helpers

/// Walk an extension chain looking for a structure with the given type tag.
/// Unknown structures are skipped.
///
/// # Safety
/// Every pointer in the chain must be null or point to a structure that
/// begins with `XrBaseInStructure`.
pub unsafe fn find_in_chain(
    mut next: *const c_void,
    ty: XrStructureType,
) -> *const XrBaseInStructure {
    while !next.is_null() {
        let base = next as *const XrBaseInStructure;
        if (*base).ty == ty {
            return base;
        }
        next = (*base).next as *const c_void;
    }
    std::ptr::null()
}

/// Copy a Rust string into a fixed-size NUL-terminated C char array.
pub fn write_cstr(dst: &mut [c_char], src: &str) {
    let max = dst.len().saturating_sub(1);
    let bytes = src.as_bytes();
    let len = bytes.len().min(max);
    for (slot, &byte) in dst.iter_mut().zip(bytes[..len].iter()) {
        *slot = byte as c_char;
    }
    dst[len] = 0;
}

/// Read a NUL-terminated C char array into a Rust string, stopping at the
/// terminator or the end of the buffer.
pub fn read_cstr(src: &[c_char]) -> String {
    src.iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8 as char)
        .collect()
}

/// Fill the caller's buffer using the two-call idiom: with zero capacity,
/// report the required count; with insufficient capacity, report the count
/// and fail; otherwise copy everything. A null buffer with non-zero
/// capacity is a validation failure.
///
/// # Safety
/// `count_out` must be a valid pointer; `buf` must be valid for `capacity`
/// writes when non-null.
pub unsafe fn two_call<T: Copy>(
    items: &[T],
    capacity: u32,
    count_out: *mut u32,
    buf: *mut T,
) -> XrResult {
    if count_out.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    let required = items.len() as u32;

    if capacity == 0 {
        *count_out = required;
        return XrResult::SUCCESS;
    }

    if capacity < required {
        *count_out = required;
        return XrResult::ERROR_SIZE_INSUFFICIENT;
    }

    if buf.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    for (i, item) in items.iter().enumerate() {
        *buf.add(i) = *item;
    }
    *count_out = required;
    XrResult::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_packing() {
        let version = make_version(1, 2, 34);
        assert_eq!(version_major(version), 1);
        assert_eq!((version >> 32) & 0xFFFF, 2);
        assert_eq!(version & 0xFFFF_FFFF, 34);
    }

    #[test]
    fn cstr_round_trip_truncates() {
        let mut buf = [0 as c_char; 8];
        write_cstr(&mut buf, "KinectXR runtime");
        let s = read_cstr(&buf);
        assert_eq!(s, "KinectX");
        assert_eq!(buf[7], 0);
    }

    #[test]
    fn chain_walk_finds_by_type_not_position() {
        let depth = XrBaseInStructure {
            ty: XrStructureType::COMPOSITION_LAYER_DEPTH_INFO_KHR,
            next: std::ptr::null(),
        };
        let unknown = XrBaseInStructure {
            ty: XrStructureType(0x7FFF_0000),
            next: &depth,
        };

        let found = unsafe {
            find_in_chain(
                &unknown as *const _ as *const c_void,
                XrStructureType::COMPOSITION_LAYER_DEPTH_INFO_KHR,
            )
        };
        assert_eq!(found, &depth as *const _);

        let missing = unsafe {
            find_in_chain(
                &unknown as *const _ as *const c_void,
                XrStructureType::GRAPHICS_BINDING_METAL_KHR,
            )
        };
        assert!(missing.is_null());
    }

    #[test]
    fn two_call_reports_count_then_fills() {
        let items = [10i64, 20, 30];
        let mut count = 0u32;

        let result = unsafe { two_call(&items, 0, &mut count, std::ptr::null_mut()) };
        assert_eq!(result, XrResult::SUCCESS);
        assert_eq!(count, 3);

        let mut small = [0i64; 2];
        let result = unsafe { two_call(&items, 2, &mut count, small.as_mut_ptr()) };
        assert_eq!(result, XrResult::ERROR_SIZE_INSUFFICIENT);
        assert_eq!(count, 3);

        let mut full = [0i64; 3];
        let result = unsafe { two_call(&items, 3, &mut count, full.as_mut_ptr()) };
        assert_eq!(result, XrResult::SUCCESS);
        assert_eq!(full, items);

        let result = unsafe { two_call(&items, 3, &mut count, std::ptr::null_mut()) };
        assert_eq!(result, XrResult::ERROR_VALIDATION_FAILURE);
    }
}
