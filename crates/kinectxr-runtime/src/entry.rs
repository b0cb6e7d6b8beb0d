//! Exported loader contract.
//!
//! Two symbols cross the library boundary with C linkage:
//! `xrNegotiateLoaderRuntimeInterface` for version negotiation and
//! `xrGetInstanceProcAddr` for function resolution. Everything else is
//! reached through the proc-address dispatch table.
//!
//! The process-wide runtime singleton lives here and only here; it is
//! constructed on the first loader call with the build's default driver
//! and GPU backend.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::OnceLock;

use crate::abi::*;
use crate::gpu::NullBackend;
use crate::runtime::{Runtime, ADVERTISED_EXTENSIONS};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        Runtime::new(
            Box::new(kinectxr_device::default_driver),
            Box::new(NullBackend),
        )
    })
}

macro_rules! resolve {
    ($out:expr, $f:path) => {{
        *$out = Some(std::mem::transmute::<usize, PfnVoidFunction>($f as usize));
        XrResult::SUCCESS
    }};
}

/// # Safety
/// Called by the XR loader with valid negotiation structures.
#[no_mangle]
pub unsafe extern "C" fn xrNegotiateLoaderRuntimeInterface(
    loader_info: *const XrNegotiateLoaderInfo,
    runtime_request: *mut XrNegotiateRuntimeRequest,
) -> XrResult {
    if loader_info.is_null() || runtime_request.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    let info = &*loader_info;
    if info.struct_type != LOADER_INTERFACE_STRUCT_LOADER_INFO
        || info.struct_version != LOADER_INFO_STRUCT_VERSION
        || info.struct_size != std::mem::size_of::<XrNegotiateLoaderInfo>()
    {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    let request = &mut *runtime_request;
    if request.struct_type != LOADER_INTERFACE_STRUCT_RUNTIME_REQUEST
        || request.struct_version != RUNTIME_INFO_STRUCT_VERSION
        || request.struct_size != std::mem::size_of::<XrNegotiateRuntimeRequest>()
    {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    if info.min_interface_version > CURRENT_LOADER_RUNTIME_VERSION
        || info.max_interface_version < CURRENT_LOADER_RUNTIME_VERSION
    {
        return XrResult::ERROR_INITIALIZATION_FAILED;
    }

    request.runtime_interface_version = CURRENT_LOADER_RUNTIME_VERSION;
    request.runtime_api_version = CURRENT_API_VERSION;
    request.get_instance_proc_addr = Some(xrGetInstanceProcAddr);

    XrResult::SUCCESS
}

/// # Safety
/// `name` must be a NUL-terminated string; `function` must be valid for
/// writes.
#[no_mangle]
pub unsafe extern "C" fn xrGetInstanceProcAddr(
    instance: XrInstance,
    name: *const c_char,
    function: *mut Option<PfnVoidFunction>,
) -> XrResult {
    if name.is_null() || function.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    let name = CStr::from_ptr(name);
    let name = match name.to_str() {
        Ok(name) => name,
        Err(_) => {
            *function = None;
            return XrResult::ERROR_FUNCTION_UNSUPPORTED;
        }
    };

    // Bootstrap names resolvable with a null instance.
    match name {
        "xrEnumerateInstanceExtensionProperties" => {
            return resolve!(function, xrEnumerateInstanceExtensionProperties)
        }
        "xrEnumerateApiLayerProperties" => {
            return resolve!(function, xrEnumerateApiLayerProperties)
        }
        "xrCreateInstance" => return resolve!(function, xrCreateInstance),
        _ => {}
    }

    // Everything else needs a live instance.
    if instance.is_null() || !runtime().is_valid_instance(instance) {
        *function = None;
        return XrResult::ERROR_HANDLE_INVALID;
    }

    match name {
        "xrGetInstanceProcAddr" => resolve!(function, xrGetInstanceProcAddr),
        "xrDestroyInstance" => resolve!(function, xrDestroyInstance),
        "xrGetInstanceProperties" => resolve!(function, xrGetInstanceProperties),
        "xrPollEvent" => resolve!(function, xrPollEvent),
        "xrGetSystem" => resolve!(function, xrGetSystem),
        "xrGetSystemProperties" => resolve!(function, xrGetSystemProperties),
        "xrCreateSession" => resolve!(function, xrCreateSession),
        "xrDestroySession" => resolve!(function, xrDestroySession),
        "xrBeginSession" => resolve!(function, xrBeginSession),
        "xrEndSession" => resolve!(function, xrEndSession),
        "xrEnumerateReferenceSpaces" => resolve!(function, xrEnumerateReferenceSpaces),
        "xrCreateReferenceSpace" => resolve!(function, xrCreateReferenceSpace),
        "xrDestroySpace" => resolve!(function, xrDestroySpace),
        "xrEnumerateSwapchainFormats" => resolve!(function, xrEnumerateSwapchainFormats),
        "xrCreateSwapchain" => resolve!(function, xrCreateSwapchain),
        "xrDestroySwapchain" => resolve!(function, xrDestroySwapchain),
        "xrEnumerateSwapchainImages" => resolve!(function, xrEnumerateSwapchainImages),
        "xrAcquireSwapchainImage" => resolve!(function, xrAcquireSwapchainImage),
        "xrWaitSwapchainImage" => resolve!(function, xrWaitSwapchainImage),
        "xrReleaseSwapchainImage" => resolve!(function, xrReleaseSwapchainImage),
        "xrWaitFrame" => resolve!(function, xrWaitFrame),
        "xrBeginFrame" => resolve!(function, xrBeginFrame),
        "xrEndFrame" => resolve!(function, xrEndFrame),
        "xrLocateViews" => resolve!(function, xrLocateViews),
        "xrGetMetalGraphicsRequirementsKHR" => {
            resolve!(function, xrGetMetalGraphicsRequirementsKHR)
        }
        _ => {
            *function = None;
            XrResult::ERROR_FUNCTION_UNSUPPORTED
        }
    }
}

// ---------------------------------------------------------------------------
// Instance-agnostic enumeration

/// # Safety
/// ABI contract; pointers must be null or valid.
#[no_mangle]
pub unsafe extern "C" fn xrEnumerateInstanceExtensionProperties(
    layer_name: *const c_char,
    capacity: u32,
    count_out: *mut u32,
    properties: *mut XrExtensionProperties,
) -> XrResult {
    if count_out.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    // No API layers exist, so a named layer can never be present.
    if !layer_name.is_null() {
        return XrResult::ERROR_API_LAYER_NOT_PRESENT;
    }

    let count = ADVERTISED_EXTENSIONS.len() as u32;

    if capacity == 0 {
        *count_out = count;
        return XrResult::SUCCESS;
    }
    if capacity < count {
        *count_out = count;
        return XrResult::ERROR_SIZE_INSUFFICIENT;
    }
    if properties.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    for (i, name) in ADVERTISED_EXTENSIONS.iter().enumerate() {
        let prop = &mut *properties.add(i);
        if prop.ty != XrStructureType::EXTENSION_PROPERTIES {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        write_cstr(&mut prop.extension_name, name);
        prop.extension_version = 1;
    }

    *count_out = count;
    XrResult::SUCCESS
}

/// # Safety
/// ABI contract; pointers must be null or valid.
#[no_mangle]
pub unsafe extern "C" fn xrEnumerateApiLayerProperties(
    _capacity: u32,
    count_out: *mut u32,
    _properties: *mut XrApiLayerProperties,
) -> XrResult {
    if count_out.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }
    *count_out = 0;
    XrResult::SUCCESS
}

// ---------------------------------------------------------------------------
// Thin wrappers over the runtime singleton

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrCreateInstance(
    create_info: *const XrInstanceCreateInfo,
    instance: *mut XrInstance,
) -> XrResult {
    runtime().create_instance(create_info, instance)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrDestroyInstance(instance: XrInstance) -> XrResult {
    runtime().destroy_instance(instance)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrGetInstanceProperties(
    instance: XrInstance,
    properties: *mut XrInstanceProperties,
) -> XrResult {
    runtime().get_instance_properties(instance, properties)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrPollEvent(
    instance: XrInstance,
    event_data: *mut XrEventDataBuffer,
) -> XrResult {
    runtime().poll_event(instance, event_data)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrGetSystem(
    instance: XrInstance,
    get_info: *const XrSystemGetInfo,
    system_id: *mut XrSystemId,
) -> XrResult {
    runtime().get_system(instance, get_info, system_id)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrGetSystemProperties(
    instance: XrInstance,
    system_id: XrSystemId,
    properties: *mut XrSystemProperties,
) -> XrResult {
    runtime().get_system_properties(instance, system_id, properties)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrCreateSession(
    instance: XrInstance,
    create_info: *const XrSessionCreateInfo,
    session: *mut XrSession,
) -> XrResult {
    runtime().create_session(instance, create_info, session)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrDestroySession(session: XrSession) -> XrResult {
    runtime().destroy_session(session)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrBeginSession(
    session: XrSession,
    begin_info: *const XrSessionBeginInfo,
) -> XrResult {
    runtime().begin_session(session, begin_info)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrEndSession(session: XrSession) -> XrResult {
    runtime().end_session(session)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrEnumerateReferenceSpaces(
    session: XrSession,
    capacity: u32,
    count_out: *mut u32,
    spaces: *mut XrReferenceSpaceType,
) -> XrResult {
    runtime().enumerate_reference_spaces(session, capacity, count_out, spaces)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrCreateReferenceSpace(
    session: XrSession,
    create_info: *const XrReferenceSpaceCreateInfo,
    space: *mut XrSpace,
) -> XrResult {
    runtime().create_reference_space(session, create_info, space)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrDestroySpace(space: XrSpace) -> XrResult {
    runtime().destroy_space(space)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrEnumerateSwapchainFormats(
    session: XrSession,
    capacity: u32,
    count_out: *mut u32,
    formats: *mut i64,
) -> XrResult {
    runtime().enumerate_swapchain_formats(session, capacity, count_out, formats)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrCreateSwapchain(
    session: XrSession,
    create_info: *const XrSwapchainCreateInfo,
    swapchain: *mut XrSwapchain,
) -> XrResult {
    runtime().create_swapchain(session, create_info, swapchain)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrDestroySwapchain(swapchain: XrSwapchain) -> XrResult {
    runtime().destroy_swapchain(swapchain)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrEnumerateSwapchainImages(
    swapchain: XrSwapchain,
    capacity: u32,
    count_out: *mut u32,
    images: *mut XrSwapchainImageBaseHeader,
) -> XrResult {
    runtime().enumerate_swapchain_images(swapchain, capacity, count_out, images)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrAcquireSwapchainImage(
    swapchain: XrSwapchain,
    acquire_info: *const XrSwapchainImageAcquireInfo,
    index: *mut u32,
) -> XrResult {
    runtime().acquire_swapchain_image(swapchain, acquire_info, index)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrWaitSwapchainImage(
    swapchain: XrSwapchain,
    wait_info: *const XrSwapchainImageWaitInfo,
) -> XrResult {
    runtime().wait_swapchain_image(swapchain, wait_info)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrReleaseSwapchainImage(
    swapchain: XrSwapchain,
    release_info: *const XrSwapchainImageReleaseInfo,
) -> XrResult {
    runtime().release_swapchain_image(swapchain, release_info)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrWaitFrame(
    session: XrSession,
    frame_wait_info: *const XrFrameWaitInfo,
    frame_state: *mut XrFrameState,
) -> XrResult {
    runtime().wait_frame(session, frame_wait_info, frame_state)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrBeginFrame(
    session: XrSession,
    frame_begin_info: *const XrFrameBeginInfo,
) -> XrResult {
    runtime().begin_frame(session, frame_begin_info)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrEndFrame(
    session: XrSession,
    frame_end_info: *const XrFrameEndInfo,
) -> XrResult {
    runtime().end_frame(session, frame_end_info)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrLocateViews(
    session: XrSession,
    view_locate_info: *const XrViewLocateInfo,
    view_state: *mut XrViewState,
    capacity: u32,
    count_out: *mut u32,
    views: *mut XrView,
) -> XrResult {
    runtime().locate_views(session, view_locate_info, view_state, capacity, count_out, views)
}

/// # Safety
/// ABI contract.
#[no_mangle]
pub unsafe extern "C" fn xrGetMetalGraphicsRequirementsKHR(
    instance: XrInstance,
    system_id: XrSystemId,
    requirements: *mut XrGraphicsRequirementsMetalKHR,
) -> XrResult {
    runtime().get_graphics_requirements(instance, system_id, requirements)
}
