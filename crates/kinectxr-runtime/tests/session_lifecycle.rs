//! Session state machine: create, begin, end, destroy, and the event
//! sequence observed on the parent instance's queue.

mod common;

use std::ffi::c_void;
use std::ptr;

use common::*;
use kinectxr_runtime::abi::*;

#[test]
fn full_lifecycle_emits_six_events_in_order() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);

    assert_eq!(begin_session(&runtime, session), XrResult::SUCCESS);
    assert_eq!(runtime.end_session(session), XrResult::SUCCESS);
    assert_eq!(runtime.destroy_session(session), XrResult::SUCCESS);

    let events = drain_events(&runtime, instance);
    let states: Vec<XrSessionState> = events.iter().map(|(_, state)| *state).collect();
    assert_eq!(
        states,
        vec![
            XrSessionState::READY,
            XrSessionState::SYNCHRONIZED,
            XrSessionState::VISIBLE,
            XrSessionState::FOCUSED,
            XrSessionState::STOPPING,
            XrSessionState::IDLE,
        ]
    );
    assert!(events.iter().all(|(s, _)| *s == session));
}

#[test]
fn create_session_requires_graphics_binding_in_chain() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let system = get_system(&runtime, instance);

    // No binding chained at all.
    let info = XrSessionCreateInfo {
        ty: XrStructureType::SESSION_CREATE_INFO,
        next: ptr::null(),
        create_flags: 0,
        system_id: system,
    };
    let mut session = XrSession::NULL;
    assert_eq!(
        unsafe { runtime.create_session(instance, &info, &mut session) },
        XrResult::ERROR_GRAPHICS_DEVICE_INVALID
    );

    // Binding present but with a null command queue.
    let binding = XrGraphicsBindingMetalKHR {
        ty: XrStructureType::GRAPHICS_BINDING_METAL_KHR,
        next: ptr::null(),
        command_queue: ptr::null_mut(),
    };
    let info = XrSessionCreateInfo {
        ty: XrStructureType::SESSION_CREATE_INFO,
        next: &binding as *const _ as *const c_void,
        create_flags: 0,
        system_id: system,
    };
    assert_eq!(
        unsafe { runtime.create_session(instance, &info, &mut session) },
        XrResult::ERROR_GRAPHICS_DEVICE_INVALID
    );
}

#[test]
fn graphics_binding_is_found_behind_unknown_chain_entries() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let system = get_system(&runtime, instance);

    let binding = XrGraphicsBindingMetalKHR {
        ty: XrStructureType::GRAPHICS_BINDING_METAL_KHR,
        next: ptr::null(),
        command_queue: FAKE_QUEUE,
    };
    // An unrecognized structure sits in front of the binding.
    let unknown = XrBaseInStructure {
        ty: XrStructureType(0x7000_0001),
        next: &binding as *const _ as *const XrBaseInStructure,
    };
    let info = XrSessionCreateInfo {
        ty: XrStructureType::SESSION_CREATE_INFO,
        next: &unknown as *const _ as *const c_void,
        create_flags: 0,
        system_id: system,
    };
    let mut session = XrSession::NULL;
    assert_eq!(
        unsafe { runtime.create_session(instance, &info, &mut session) },
        XrResult::SUCCESS
    );
}

#[test]
fn create_session_rejects_mismatched_system() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    get_system(&runtime, instance);

    let binding = XrGraphicsBindingMetalKHR {
        ty: XrStructureType::GRAPHICS_BINDING_METAL_KHR,
        next: ptr::null(),
        command_queue: FAKE_QUEUE,
    };
    let info = XrSessionCreateInfo {
        ty: XrStructureType::SESSION_CREATE_INFO,
        next: &binding as *const _ as *const c_void,
        create_flags: 0,
        system_id: XrSystemId(0x4242),
    };
    let mut session = XrSession::NULL;
    assert_eq!(
        unsafe { runtime.create_session(instance, &info, &mut session) },
        XrResult::ERROR_SYSTEM_INVALID
    );
}

#[test]
fn one_session_per_instance() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let _session = create_session(&runtime, instance);

    let system = get_system(&runtime, instance);
    let binding = XrGraphicsBindingMetalKHR {
        ty: XrStructureType::GRAPHICS_BINDING_METAL_KHR,
        next: ptr::null(),
        command_queue: FAKE_QUEUE,
    };
    let info = XrSessionCreateInfo {
        ty: XrStructureType::SESSION_CREATE_INFO,
        next: &binding as *const _ as *const c_void,
        create_flags: 0,
        system_id: system,
    };
    let mut second = XrSession::NULL;
    assert_eq!(
        unsafe { runtime.create_session(instance, &info, &mut second) },
        XrResult::ERROR_LIMIT_REACHED
    );
}

#[test]
fn sessions_on_distinct_instances_coexist() {
    let runtime = mock_runtime();
    let a = create_instance(&runtime);
    let b = create_instance(&runtime);
    let session_a = create_session(&runtime, a);
    let session_b = create_session(&runtime, b);
    assert_ne!(session_a, session_b);
}

#[test]
fn begin_requires_ready_state() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);

    assert_eq!(begin_session(&runtime, session), XrResult::SUCCESS);
    // Already running.
    assert_eq!(
        begin_session(&runtime, session),
        XrResult::ERROR_SESSION_NOT_READY
    );

    runtime.end_session(session);
    // Idle after end, still not Ready.
    assert_eq!(
        begin_session(&runtime, session),
        XrResult::ERROR_SESSION_NOT_READY
    );
}

#[test]
fn begin_rejects_stereo_view_configuration() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);

    let info = XrSessionBeginInfo {
        ty: XrStructureType::SESSION_BEGIN_INFO,
        next: ptr::null(),
        primary_view_configuration_type: XrViewConfigurationType::PRIMARY_STEREO,
    };
    assert_eq!(
        unsafe { runtime.begin_session(session, &info) },
        XrResult::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED
    );
}

#[test]
fn begin_without_sensor_reports_form_factor_unavailable() {
    let runtime = deviceless_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);

    assert_eq!(
        begin_session(&runtime, session),
        XrResult::ERROR_FORM_FACTOR_UNAVAILABLE
    );
    // The session stays Ready; only the create event was queued.
    let events = drain_events(&runtime, instance);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, XrSessionState::READY);
}

#[test]
fn end_requires_running_state() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);

    // Ready is not in the running set.
    assert_eq!(
        runtime.end_session(session),
        XrResult::ERROR_SESSION_NOT_RUNNING
    );

    begin_session(&runtime, session);
    assert_eq!(runtime.end_session(session), XrResult::SUCCESS);
    assert_eq!(
        runtime.end_session(session),
        XrResult::ERROR_SESSION_NOT_RUNNING
    );
}

#[test]
fn destroy_refused_while_running() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);

    begin_session(&runtime, session);
    assert_eq!(
        runtime.destroy_session(session),
        XrResult::ERROR_SESSION_RUNNING
    );

    runtime.end_session(session);
    assert_eq!(runtime.destroy_session(session), XrResult::SUCCESS);
    assert!(!runtime.is_valid_session(session));
}

#[test]
fn destroyed_session_handle_stays_invalid() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);
    runtime.destroy_session(session);

    assert_eq!(
        runtime.destroy_session(session),
        XrResult::ERROR_HANDLE_INVALID
    );
    assert_eq!(
        runtime.end_session(session),
        XrResult::ERROR_HANDLE_INVALID
    );

    // A new session gets a fresh handle value.
    let next = create_session(&runtime, instance);
    assert_ne!(next, session);
}

#[test]
fn poll_event_validates_buffer_type() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);

    let mut buffer = XrEventDataBuffer {
        ty: XrStructureType::FRAME_STATE,
        next: ptr::null(),
        varying: [0; EVENT_DATA_BUFFER_VARYING_SIZE],
    };
    assert_eq!(
        unsafe { runtime.poll_event(instance, &mut buffer) },
        XrResult::ERROR_VALIDATION_FAILURE
    );
}

#[test]
fn poll_event_on_empty_queue_is_nonfatal() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);

    let mut buffer = XrEventDataBuffer {
        ty: XrStructureType::EVENT_DATA_BUFFER,
        next: ptr::null(),
        varying: [0; EVENT_DATA_BUFFER_VARYING_SIZE],
    };
    assert_eq!(
        unsafe { runtime.poll_event(instance, &mut buffer) },
        XrResult::EVENT_UNAVAILABLE
    );
    assert_eq!(buffer.ty, XrStructureType::EVENT_DATA_BUFFER);
}

#[test]
fn locate_views_returns_single_identity_mono_view() {
    let runtime = mock_runtime();
    let instance = create_instance(&runtime);
    let session = create_session(&runtime, instance);

    let space_info = XrReferenceSpaceCreateInfo {
        ty: XrStructureType::REFERENCE_SPACE_CREATE_INFO,
        next: ptr::null(),
        reference_space_type: XrReferenceSpaceType::VIEW,
        pose_in_reference_space: XrPosef::default(),
    };
    let mut space = XrSpace::NULL;
    unsafe { runtime.create_reference_space(session, &space_info, &mut space) };

    let locate = XrViewLocateInfo {
        ty: XrStructureType::VIEW_LOCATE_INFO,
        next: ptr::null(),
        view_configuration_type: XrViewConfigurationType::PRIMARY_MONO,
        display_time: 0,
        space,
    };
    let mut view_state = XrViewState {
        ty: XrStructureType::VIEW_STATE,
        next: ptr::null_mut(),
        view_state_flags: 0,
    };
    let mut count = 0u32;

    let result = unsafe {
        runtime.locate_views(session, &locate, &mut view_state, 0, &mut count, ptr::null_mut())
    };
    assert_eq!(result, XrResult::SUCCESS);
    assert_eq!(count, 1);

    let mut view = XrView {
        ty: XrStructureType::UNKNOWN,
        next: ptr::null_mut(),
        pose: XrPosef::default(),
        fov: XrFovf::default(),
    };
    let result = unsafe {
        runtime.locate_views(session, &locate, &mut view_state, 1, &mut count, &mut view)
    };
    assert_eq!(result, XrResult::SUCCESS);

    // Identity pose from a stationary sensor.
    assert_eq!(view.pose.position.x, 0.0);
    assert_eq!(view.pose.position.y, 0.0);
    assert_eq!(view.pose.position.z, 0.0);
    assert_eq!(view.pose.orientation.w, 1.0);
    // 57 degree horizontal field of view, split symmetrically.
    assert!((view.fov.angle_right - 57.0f32.to_radians() / 2.0).abs() < 1e-5);
    assert_eq!(view.fov.angle_left, -view.fov.angle_right);
    assert_ne!(view_state.view_state_flags, 0);
}
