//! Loader negotiation and proc-address dispatch through the exported C
//! symbols. These run against the process-wide runtime singleton, which in
//! a deviceless build carries a sensor that can never be opened.

mod common;

use std::ffi::{c_void, CString};
use std::mem;
use std::ptr;

use common::{instance_create_info, FAKE_QUEUE};
use kinectxr_runtime::abi::*;
use kinectxr_runtime::entry::*;

fn loader_info() -> XrNegotiateLoaderInfo {
    XrNegotiateLoaderInfo {
        struct_type: LOADER_INTERFACE_STRUCT_LOADER_INFO,
        struct_version: LOADER_INFO_STRUCT_VERSION,
        struct_size: mem::size_of::<XrNegotiateLoaderInfo>(),
        min_interface_version: 1,
        max_interface_version: 1,
        min_api_version: make_version(1, 0, 0),
        max_api_version: make_version(1, 0, u32::MAX),
    }
}

fn runtime_request() -> XrNegotiateRuntimeRequest {
    XrNegotiateRuntimeRequest {
        struct_type: LOADER_INTERFACE_STRUCT_RUNTIME_REQUEST,
        struct_version: RUNTIME_INFO_STRUCT_VERSION,
        struct_size: mem::size_of::<XrNegotiateRuntimeRequest>(),
        runtime_interface_version: 0,
        runtime_api_version: 0,
        get_instance_proc_addr: None,
    }
}

fn proc_addr(instance: XrInstance, name: &str) -> Result<PfnVoidFunction, XrResult> {
    let name = CString::new(name).unwrap();
    let mut function: Option<PfnVoidFunction> = None;
    let result = unsafe { xrGetInstanceProcAddr(instance, name.as_ptr(), &mut function) };
    if result == XrResult::SUCCESS {
        Ok(function.expect("resolved function was null"))
    } else {
        assert!(function.is_none(), "failed resolution must null the out pointer");
        Err(result)
    }
}

fn create_instance_via_abi() -> XrInstance {
    let info = instance_create_info("T");
    let mut instance = XrInstance::NULL;
    let result = unsafe { xrCreateInstance(&info, &mut instance) };
    assert_eq!(result, XrResult::SUCCESS);
    instance
}

#[test]
fn negotiation_fills_runtime_request() {
    let info = loader_info();
    let mut request = runtime_request();
    let result = unsafe { xrNegotiateLoaderRuntimeInterface(&info, &mut request) };
    assert_eq!(result, XrResult::SUCCESS);
    assert_eq!(request.runtime_interface_version, CURRENT_LOADER_RUNTIME_VERSION);
    assert_eq!(request.runtime_api_version, CURRENT_API_VERSION);
    assert!(request.get_instance_proc_addr.is_some());
}

#[test]
fn negotiation_validates_struct_tags() {
    let mut info = loader_info();
    info.struct_type = 99;
    let mut request = runtime_request();
    assert_eq!(
        unsafe { xrNegotiateLoaderRuntimeInterface(&info, &mut request) },
        XrResult::ERROR_VALIDATION_FAILURE
    );

    let info = loader_info();
    let mut request = runtime_request();
    request.struct_version = 77;
    assert_eq!(
        unsafe { xrNegotiateLoaderRuntimeInterface(&info, &mut request) },
        XrResult::ERROR_VALIDATION_FAILURE
    );

    assert_eq!(
        unsafe { xrNegotiateLoaderRuntimeInterface(ptr::null(), &mut runtime_request()) },
        XrResult::ERROR_VALIDATION_FAILURE
    );
}

#[test]
fn negotiation_rejects_disjoint_version_ranges() {
    let mut info = loader_info();
    info.min_interface_version = 2;
    info.max_interface_version = 3;
    let mut request = runtime_request();
    assert_eq!(
        unsafe { xrNegotiateLoaderRuntimeInterface(&info, &mut request) },
        XrResult::ERROR_INITIALIZATION_FAILED
    );
}

#[test]
fn bootstrap_names_resolve_with_null_instance() {
    for name in [
        "xrEnumerateInstanceExtensionProperties",
        "xrEnumerateApiLayerProperties",
        "xrCreateInstance",
    ] {
        proc_addr(XrInstance::NULL, name).unwrap_or_else(|result| {
            panic!("{name} failed to resolve with null instance: {result:?}")
        });
    }
}

#[test]
fn instance_scoped_names_need_a_live_instance() {
    assert_eq!(
        proc_addr(XrInstance::NULL, "xrGetSystem"),
        Err(XrResult::ERROR_HANDLE_INVALID)
    );
    assert_eq!(
        proc_addr(XrInstance(0xdead_beef), "xrGetSystem"),
        Err(XrResult::ERROR_HANDLE_INVALID)
    );

    let instance = create_instance_via_abi();
    proc_addr(instance, "xrGetSystem").expect("xrGetSystem should resolve");
    proc_addr(instance, "xrWaitFrame").expect("xrWaitFrame should resolve");
    proc_addr(instance, "xrGetMetalGraphicsRequirementsKHR")
        .expect("graphics requirements should resolve");
    unsafe { xrDestroyInstance(instance) };
}

#[test]
fn unknown_names_are_unsupported() {
    let instance = create_instance_via_abi();
    assert_eq!(
        proc_addr(instance, "xrPerfSettingsSetPerformanceLevelEXT"),
        Err(XrResult::ERROR_FUNCTION_UNSUPPORTED)
    );
    unsafe { xrDestroyInstance(instance) };
}

#[test]
fn extension_enumeration_two_call_via_abi() {
    let mut count = 0u32;
    let result = unsafe {
        xrEnumerateInstanceExtensionProperties(ptr::null(), 0, &mut count, ptr::null_mut())
    };
    assert_eq!(result, XrResult::SUCCESS);
    assert_eq!(count, 1);

    let mut props = [XrExtensionProperties {
        ty: XrStructureType::EXTENSION_PROPERTIES,
        next: ptr::null_mut(),
        extension_name: [0; MAX_EXTENSION_NAME_SIZE],
        extension_version: 0,
    }];
    let result = unsafe {
        xrEnumerateInstanceExtensionProperties(ptr::null(), 1, &mut count, props.as_mut_ptr())
    };
    assert_eq!(result, XrResult::SUCCESS);
    assert_eq!(
        read_cstr(&props[0].extension_name),
        "XR_KHR_composition_layer_depth"
    );
    assert_eq!(props[0].extension_version, 1);

    // Asking on behalf of a named layer fails: there are no layers.
    let layer = CString::new("XR_APILAYER_validation").unwrap();
    let result = unsafe {
        xrEnumerateInstanceExtensionProperties(layer.as_ptr(), 0, &mut count, ptr::null_mut())
    };
    assert_eq!(result, XrResult::ERROR_API_LAYER_NOT_PRESENT);
}

#[test]
fn layer_enumeration_is_always_empty() {
    let mut count = 42u32;
    let result = unsafe { xrEnumerateApiLayerProperties(0, &mut count, ptr::null_mut()) };
    assert_eq!(result, XrResult::SUCCESS);
    assert_eq!(count, 0);
}

#[test]
fn deviceless_begin_session_reports_form_factor_unavailable() {
    let instance = create_instance_via_abi();

    let get_info = XrSystemGetInfo {
        ty: XrStructureType::SYSTEM_GET_INFO,
        next: ptr::null(),
        form_factor: XrFormFactor::HEAD_MOUNTED_DISPLAY,
    };
    let mut system = XrSystemId::NULL;
    assert_eq!(
        unsafe { xrGetSystem(instance, &get_info, &mut system) },
        XrResult::SUCCESS
    );

    let binding = XrGraphicsBindingMetalKHR {
        ty: XrStructureType::GRAPHICS_BINDING_METAL_KHR,
        next: ptr::null(),
        command_queue: FAKE_QUEUE,
    };
    let create = XrSessionCreateInfo {
        ty: XrStructureType::SESSION_CREATE_INFO,
        next: &binding as *const _ as *const c_void,
        create_flags: 0,
        system_id: system,
    };
    let mut session = XrSession::NULL;
    assert_eq!(
        unsafe { xrCreateSession(instance, &create, &mut session) },
        XrResult::SUCCESS
    );

    // No sensor behind the singleton's default driver.
    let begin = XrSessionBeginInfo {
        ty: XrStructureType::SESSION_BEGIN_INFO,
        next: ptr::null(),
        primary_view_configuration_type: XrViewConfigurationType::PRIMARY_MONO,
    };
    assert_eq!(
        unsafe { xrBeginSession(session, &begin) },
        XrResult::ERROR_FORM_FACTOR_UNAVAILABLE
    );

    unsafe {
        xrDestroySession(session);
        xrDestroyInstance(instance);
    }
}
