//! Session and frame-loop state machines.
//!
//! Session states follow the XR lifecycle: Idle -> Ready on create, Ready ->
//! Synchronized -> Visible -> Focused on begin, running -> Stopping -> Idle
//! on end. Every transition is surfaced as one event on the parent
//! instance's queue, in transition order.
//!
//! Quirk kept from the reference behavior: `end_session` does not clear the
//! frame-in-progress flag, so a session ended mid-frame and begun again
//! rejects the next `begin_frame`.

use std::sync::Arc;
use std::time::Duration;

use kinectxr_common::FrameCache;
use kinectxr_device::{DriverConfig, KinectDriver};
use tracing::debug;

use crate::abi::*;
use crate::gpu::GpuPtr;
use crate::runtime::Runtime;

/// Reported and enforced frame period: 30 Hz.
pub(crate) const FRAME_PERIOD_NS: i64 = 33_333_333;

// Kinect optics: 57 degrees horizontal, 43 vertical.
const HORIZONTAL_FOV_RAD: f32 = 57.0 * std::f32::consts::PI / 180.0;
const VERTICAL_FOV_RAD: f32 = 43.0 * std::f32::consts::PI / 180.0;

pub(crate) struct FrameLoopState {
    pub in_progress: bool,
    pub last_display_time: i64,
    pub frame_count: u64,
}

pub(crate) struct SessionData {
    pub instance: XrInstance,
    pub system_id: XrSystemId,
    pub command_queue: GpuPtr,
    pub gpu_device: GpuPtr,
    pub view_configuration: XrViewConfigurationType,
    pub state: XrSessionState,
    pub frame_loop: FrameLoopState,
    pub frame_cache: Arc<FrameCache>,
    pub driver: Option<Box<dyn KinectDriver>>,
}

pub(crate) fn is_running(state: XrSessionState) -> bool {
    matches!(
        state,
        XrSessionState::SYNCHRONIZED | XrSessionState::VISIBLE | XrSessionState::FOCUSED
    )
}

impl Runtime {
    // -----------------------------------------------------------------
    // Session lifecycle

    /// # Safety
    /// Pointers must be null or valid per the ABI; the `next` chain of
    /// `create_info` must be well-formed.
    pub unsafe fn create_session(
        &self,
        instance: XrInstance,
        create_info: *const XrSessionCreateInfo,
        session_out: *mut XrSession,
    ) -> XrResult {
        if create_info.is_null() || session_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*create_info;
        if info.ty != XrStructureType::SESSION_CREATE_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        if !self.instances.contains(instance.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        if !self.is_valid_system(instance, info.system_id) {
            return XrResult::ERROR_SYSTEM_INVALID;
        }

        // The graphics binding arrives in the extension chain; walk by type.
        let binding =
            find_in_chain(info.next, XrStructureType::GRAPHICS_BINDING_METAL_KHR)
                as *const XrGraphicsBindingMetalKHR;
        if binding.is_null() {
            return XrResult::ERROR_GRAPHICS_DEVICE_INVALID;
        }
        let command_queue = GpuPtr((*binding).command_queue);
        if command_queue.is_null() {
            return XrResult::ERROR_GRAPHICS_DEVICE_INVALID;
        }

        // One live session per instance.
        if self.sessions.any(|s| s.instance == instance) {
            return XrResult::ERROR_LIMIT_REACHED;
        }

        let gpu_device = self.gpu.device_from_queue(command_queue);

        let handle = self.sessions.insert(SessionData {
            instance,
            system_id: info.system_id,
            command_queue,
            gpu_device,
            view_configuration: XrViewConfigurationType::PRIMARY_MONO,
            state: XrSessionState::READY,
            frame_loop: FrameLoopState {
                in_progress: false,
                last_display_time: 0,
                frame_count: 0,
            },
            frame_cache: Arc::new(FrameCache::new()),
            driver: None,
        });
        let session = XrSession(handle);
        *session_out = session;

        self.enqueue_session_event(instance, session, XrSessionState::READY);
        XrResult::SUCCESS
    }

    pub fn destroy_session(&self, session: XrSession) -> XrResult {
        let state = match self.sessions.with(session.0, |s| s.state) {
            Some(state) => state,
            None => return XrResult::ERROR_HANDLE_INVALID,
        };
        if is_running(state) {
            return XrResult::ERROR_SESSION_RUNNING;
        }
        match self.sessions.remove(session.0) {
            Some(data) => {
                debug!(
                    "destroyed session for system {:?} (queue {:?})",
                    data.system_id, data.command_queue
                );
                XrResult::SUCCESS
            }
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }

    pub fn is_valid_session(&self, session: XrSession) -> bool {
        self.sessions.contains(session.0)
    }

    /// Begin the session: bring up the sensor, wire its callbacks into the
    /// session's frame cache, and walk Ready through Focused.
    ///
    /// # Safety
    /// `begin_info` must be null or valid per the ABI.
    pub unsafe fn begin_session(
        &self,
        session: XrSession,
        begin_info: *const XrSessionBeginInfo,
    ) -> XrResult {
        if begin_info.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*begin_info;
        if info.ty != XrStructureType::SESSION_BEGIN_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let view_configuration = info.primary_view_configuration_type;

        let result = self.sessions.with(session.0, |data| {
            if view_configuration != XrViewConfigurationType::PRIMARY_MONO {
                return XrResult::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED;
            }
            if data.state != XrSessionState::READY {
                return XrResult::ERROR_SESSION_NOT_READY;
            }

            let mut driver = (self.driver_factory)();
            let config = DriverConfig {
                enable_rgb: true,
                enable_depth: true,
                // The runtime never drives the motor; the bridge does.
                enable_motor: false,
                device_index: 0,
            };
            if let Err(error) = driver.open(&config) {
                debug!("sensor open failed in begin_session: {error}");
                return XrResult::ERROR_FORM_FACTOR_UNAVAILABLE;
            }

            let cache = Arc::clone(&data.frame_cache);
            driver.set_depth_callback(Arc::new(move |bytes, timestamp| {
                cache.store_depth(bytes, timestamp);
            }));
            let cache = Arc::clone(&data.frame_cache);
            driver.set_video_callback(Arc::new(move |bytes, timestamp| {
                cache.store_rgb(bytes, timestamp);
            }));

            if let Err(error) = driver.start_streams() {
                debug!("stream start failed in begin_session: {error}");
                return XrResult::ERROR_RUNTIME_FAILURE;
            }

            data.view_configuration = view_configuration;
            data.state = XrSessionState::FOCUSED;
            data.driver = Some(driver);
            XrResult::SUCCESS
        });

        let result = match result {
            Some(result) => result,
            None => return XrResult::ERROR_HANDLE_INVALID,
        };
        if result != XrResult::SUCCESS {
            return result;
        }

        let instance = self
            .sessions
            .with(session.0, |data| data.instance)
            .unwrap_or(XrInstance::NULL);
        for state in [
            XrSessionState::SYNCHRONIZED,
            XrSessionState::VISIBLE,
            XrSessionState::FOCUSED,
        ] {
            self.enqueue_session_event(instance, session, state);
        }
        XrResult::SUCCESS
    }

    /// End the session: stop streams, release the sensor, and walk Stopping
    /// back to Idle.
    pub fn end_session(&self, session: XrSession) -> XrResult {
        let result = self.sessions.with(session.0, |data| {
            if !is_running(data.state) {
                return XrResult::ERROR_SESSION_NOT_RUNNING;
            }

            if let Some(mut driver) = data.driver.take() {
                let _ = driver.stop_streams();
            }
            data.state = XrSessionState::IDLE;
            XrResult::SUCCESS
        });

        let result = match result {
            Some(result) => result,
            None => return XrResult::ERROR_HANDLE_INVALID,
        };
        if result != XrResult::SUCCESS {
            return result;
        }

        let instance = self
            .sessions
            .with(session.0, |data| data.instance)
            .unwrap_or(XrInstance::NULL);
        self.enqueue_session_event(instance, session, XrSessionState::STOPPING);
        self.enqueue_session_event(instance, session, XrSessionState::IDLE);
        XrResult::SUCCESS
    }

    // -----------------------------------------------------------------
    // Frame loop

    /// Pace the caller to 30 Hz and return the predicted display time.
    ///
    /// # Safety
    /// Pointers must be null or valid per the ABI.
    pub unsafe fn wait_frame(
        &self,
        session: XrSession,
        frame_wait_info: *const XrFrameWaitInfo,
        frame_state: *mut XrFrameState,
    ) -> XrResult {
        if frame_wait_info.is_null() || frame_state.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*frame_wait_info).ty != XrStructureType::FRAME_WAIT_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*frame_state).ty != XrStructureType::FRAME_STATE {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        let last = match self.sessions.with(session.0, |data| {
            if !is_running(data.state) {
                None
            } else {
                Some(data.frame_loop.last_display_time)
            }
        }) {
            None => return XrResult::ERROR_HANDLE_INVALID,
            Some(None) => return XrResult::ERROR_SESSION_NOT_RUNNING,
            Some(Some(last)) => last,
        };

        // Sleep outside the table lock so other sessions keep running.
        if last != 0 {
            let target = last + FRAME_PERIOD_NS;
            let now = self.now_ns();
            if now < target {
                std::thread::sleep(Duration::from_nanos((target - now) as u64));
            }
        }

        let now = self.now_ns();
        match self.sessions.with(session.0, |data| {
            data.frame_loop.last_display_time = now;
            data.frame_loop.frame_count += 1;
        }) {
            Some(()) => {}
            None => return XrResult::ERROR_HANDLE_INVALID,
        }

        let state = &mut *frame_state;
        state.predicted_display_time = now;
        state.predicted_display_period = FRAME_PERIOD_NS;
        state.should_render = TRUE;
        XrResult::SUCCESS
    }

    /// # Safety
    /// `frame_begin_info` must be null or valid per the ABI.
    pub unsafe fn begin_frame(
        &self,
        session: XrSession,
        frame_begin_info: *const XrFrameBeginInfo,
    ) -> XrResult {
        if frame_begin_info.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*frame_begin_info).ty != XrStructureType::FRAME_BEGIN_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        // No ordering is enforced against wait_frame; only a double begin
        // is rejected.
        match self.sessions.with(session.0, |data| {
            if !is_running(data.state) {
                XrResult::ERROR_SESSION_NOT_RUNNING
            } else if data.frame_loop.in_progress {
                XrResult::ERROR_CALL_ORDER_INVALID
            } else {
                data.frame_loop.in_progress = true;
                XrResult::SUCCESS
            }
        }) {
            Some(result) => result,
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }

    /// # Safety
    /// `frame_end_info` and every structure reachable from its layer list
    /// must be null or valid per the ABI.
    pub unsafe fn end_frame(
        &self,
        session: XrSession,
        frame_end_info: *const XrFrameEndInfo,
    ) -> XrResult {
        if frame_end_info.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*frame_end_info;
        if info.ty != XrStructureType::FRAME_END_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        let precheck = self.sessions.with(session.0, |data| {
            if !is_running(data.state) {
                XrResult::ERROR_SESSION_NOT_RUNNING
            } else if !data.frame_loop.in_progress {
                XrResult::ERROR_CALL_ORDER_INVALID
            } else {
                XrResult::SUCCESS
            }
        });
        match precheck {
            Some(XrResult::SUCCESS) => {}
            Some(result) => return result,
            None => return XrResult::ERROR_HANDLE_INVALID,
        }

        if info.environment_blend_mode != XrEnvironmentBlendMode::OPAQUE {
            return XrResult::ERROR_ENVIRONMENT_BLEND_MODE_UNSUPPORTED;
        }

        if info.layer_count > 0 && info.layers.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        for i in 0..info.layer_count as usize {
            let layer = *info.layers.add(i);
            if layer.is_null() {
                continue;
            }
            // Projection is the only layer type processed; others are
            // skipped.
            if (*layer).ty != XrStructureType::COMPOSITION_LAYER_PROJECTION {
                continue;
            }

            let depth_info = find_in_chain(
                (*layer).next,
                XrStructureType::COMPOSITION_LAYER_DEPTH_INFO_KHR,
            ) as *const XrCompositionLayerDepthInfoKHR;
            if depth_info.is_null() {
                continue;
            }

            let depth_swapchain = (*depth_info).sub_image.swapchain;
            let checked = self.swapchains.with(depth_swapchain.0, |chain| {
                if chain.format != SWAPCHAIN_FORMAT_R16_UINT {
                    XrResult::ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED
                } else if chain.width != 640 || chain.height != 480 {
                    XrResult::ERROR_VALIDATION_FAILURE
                } else {
                    XrResult::SUCCESS
                }
            });
            match checked {
                Some(XrResult::SUCCESS) => {}
                Some(result) => return result,
                None => return XrResult::ERROR_HANDLE_INVALID,
            }
        }

        match self
            .sessions
            .with(session.0, |data| data.frame_loop.in_progress = false)
        {
            Some(()) => XrResult::SUCCESS,
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }

    // -----------------------------------------------------------------
    // Views

    /// Single mono view with identity pose and the sensor's fixed optics.
    ///
    /// # Safety
    /// Pointers must be null or valid per the two-call contract.
    pub unsafe fn locate_views(
        &self,
        session: XrSession,
        view_locate_info: *const XrViewLocateInfo,
        view_state: *mut XrViewState,
        capacity: u32,
        count_out: *mut u32,
        views: *mut XrView,
    ) -> XrResult {
        if view_locate_info.is_null() || view_state.is_null() || count_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*view_locate_info;
        if info.ty != XrStructureType::VIEW_LOCATE_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*view_state).ty != XrStructureType::VIEW_STATE {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        let view_configuration = match self.sessions.with(session.0, |data| data.view_configuration)
        {
            Some(config) => config,
            None => return XrResult::ERROR_HANDLE_INVALID,
        };
        if info.view_configuration_type != view_configuration {
            return XrResult::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED;
        }
        if !self.spaces.contains(info.space.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }

        const VIEW_COUNT: u32 = 1;
        if capacity == 0 {
            *count_out = VIEW_COUNT;
            return XrResult::SUCCESS;
        }
        if capacity < VIEW_COUNT {
            *count_out = VIEW_COUNT;
            return XrResult::ERROR_SIZE_INSUFFICIENT;
        }
        if views.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        // Stationary sensor: the pose is always valid and "tracked".
        (*view_state).view_state_flags = VIEW_STATE_POSITION_VALID_BIT
            | VIEW_STATE_ORIENTATION_VALID_BIT
            | VIEW_STATE_POSITION_TRACKED_BIT
            | VIEW_STATE_ORIENTATION_TRACKED_BIT;

        let view = &mut *views;
        view.ty = XrStructureType::VIEW;
        view.next = std::ptr::null_mut();
        view.pose = XrPosef::default();
        view.fov = XrFovf {
            angle_left: -HORIZONTAL_FOV_RAD / 2.0,
            angle_right: HORIZONTAL_FOV_RAD / 2.0,
            angle_up: VERTICAL_FOV_RAD / 2.0,
            angle_down: -VERTICAL_FOV_RAD / 2.0,
        };

        *count_out = VIEW_COUNT;
        XrResult::SUCCESS
    }
}
