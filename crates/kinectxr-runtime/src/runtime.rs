//! Runtime core: instance and system lifecycles, reference spaces, and the
//! per-instance event queue.
//!
//! The runtime is a single owned value; the process-wide singleton exists
//! only at the ABI boundary (see `entry`). The driver factory and GPU
//! backend are injected so tests can substitute mocks at the same seams the
//! production build wires differently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use kinectxr_device::KinectDriver;
use tracing::debug;

use crate::abi::*;
use crate::gpu::GpuBackend;
use crate::handle::HandleTable;
use crate::session::SessionData;
use crate::swapchain::SwapchainData;

/// Extensions an application may enable.
pub(crate) const SUPPORTED_EXTENSIONS: [&str; 2] =
    ["XR_KHR_composition_layer_depth", "XR_KHR_metal_enable"];

/// Extensions reported by the enumeration entry point.
pub(crate) const ADVERTISED_EXTENSIONS: [&str; 1] = ["XR_KHR_composition_layer_depth"];

pub type DriverFactory = Box<dyn Fn() -> Box<dyn KinectDriver> + Send + Sync>;

pub(crate) struct SessionStateEvent {
    pub session: XrSession,
    pub state: XrSessionState,
}

pub(crate) struct InstanceData {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    pub api_version: u64,
    pub enabled_extensions: Vec<String>,
    pub system: Option<XrSystemId>,
    pub events: VecDeque<SessionStateEvent>,
}

pub(crate) struct SpaceData {
    pub session: XrSession,
    pub space_type: XrReferenceSpaceType,
}

pub struct Runtime {
    pub(crate) instances: HandleTable<InstanceData>,
    pub(crate) sessions: HandleTable<SessionData>,
    pub(crate) spaces: HandleTable<SpaceData>,
    pub(crate) swapchains: HandleTable<SwapchainData>,
    next_system_id: AtomicU64,
    pub(crate) driver_factory: DriverFactory,
    pub(crate) gpu: Box<dyn GpuBackend>,
    clock_origin: Instant,
}

impl Runtime {
    pub fn new(driver_factory: DriverFactory, gpu: Box<dyn GpuBackend>) -> Self {
        Self {
            instances: HandleTable::new(),
            sessions: HandleTable::new(),
            spaces: HandleTable::new(),
            swapchains: HandleTable::new(),
            next_system_id: AtomicU64::new(1),
            driver_factory,
            gpu,
            clock_origin: Instant::now(),
        }
    }

    /// Monotonic clock reading used for predicted display times.
    pub(crate) fn now_ns(&self) -> i64 {
        self.clock_origin.elapsed().as_nanos() as i64
    }

    pub(crate) fn enqueue_session_event(
        &self,
        instance: XrInstance,
        session: XrSession,
        state: XrSessionState,
    ) {
        self.instances.with(instance.0, |data| {
            data.events.push_back(SessionStateEvent { session, state });
        });
    }

    // -----------------------------------------------------------------
    // Instance

    /// # Safety
    /// Pointers must be null or valid for the access implied by the ABI.
    pub unsafe fn create_instance(
        &self,
        create_info: *const XrInstanceCreateInfo,
        instance_out: *mut XrInstance,
    ) -> XrResult {
        if create_info.is_null() || instance_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*create_info;
        if info.ty != XrStructureType::INSTANCE_CREATE_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        if version_major(info.application_info.api_version) > version_major(CURRENT_API_VERSION) {
            return XrResult::ERROR_API_VERSION_UNSUPPORTED;
        }

        let mut enabled = Vec::with_capacity(info.enabled_extension_count as usize);
        for i in 0..info.enabled_extension_count as usize {
            if info.enabled_extension_names.is_null() {
                return XrResult::ERROR_VALIDATION_FAILURE;
            }
            let name_ptr = *info.enabled_extension_names.add(i);
            if name_ptr.is_null() {
                return XrResult::ERROR_VALIDATION_FAILURE;
            }
            let name = std::ffi::CStr::from_ptr(name_ptr).to_string_lossy().into_owned();
            if !SUPPORTED_EXTENSIONS.contains(&name.as_str()) {
                return XrResult::ERROR_EXTENSION_NOT_PRESENT;
            }
            enabled.push(name);
        }

        let handle = self.instances.insert(InstanceData {
            application_name: read_cstr(&info.application_info.application_name),
            application_version: info.application_info.application_version,
            engine_name: read_cstr(&info.application_info.engine_name),
            engine_version: info.application_info.engine_version,
            api_version: info.application_info.api_version,
            enabled_extensions: enabled,
            system: None,
            events: VecDeque::new(),
        });

        *instance_out = XrInstance(handle);
        XrResult::SUCCESS
    }

    /// Destroys the instance. Sessions, spaces, and swapchains rooted at it
    /// are orphaned, not transitively destroyed.
    pub fn destroy_instance(&self, instance: XrInstance) -> XrResult {
        match self.instances.remove(instance.0) {
            Some(data) => {
                debug!(
                    "destroyed instance (app {:?} v{}, engine {:?} v{}, api {:#x}, {} extensions)",
                    data.application_name,
                    data.application_version,
                    data.engine_name,
                    data.engine_version,
                    data.api_version,
                    data.enabled_extensions.len(),
                );
                XrResult::SUCCESS
            }
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }

    pub fn is_valid_instance(&self, instance: XrInstance) -> bool {
        self.instances.contains(instance.0)
    }

    /// # Safety
    /// `properties` must be null or valid for writes.
    pub unsafe fn get_instance_properties(
        &self,
        instance: XrInstance,
        properties: *mut XrInstanceProperties,
    ) -> XrResult {
        if properties.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*properties).ty != XrStructureType::INSTANCE_PROPERTIES {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if !self.instances.contains(instance.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }

        let props = &mut *properties;
        props.runtime_version = RUNTIME_VERSION;
        write_cstr(&mut props.runtime_name, RUNTIME_NAME);
        XrResult::SUCCESS
    }

    // -----------------------------------------------------------------
    // System

    /// First query with the HMD form factor mints the instance's system id;
    /// repeats return the same id.
    ///
    /// # Safety
    /// Pointers must be null or valid per the ABI.
    pub unsafe fn get_system(
        &self,
        instance: XrInstance,
        get_info: *const XrSystemGetInfo,
        system_id_out: *mut XrSystemId,
    ) -> XrResult {
        if get_info.is_null() || system_id_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*get_info;
        if info.ty != XrStructureType::SYSTEM_GET_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        if !self.instances.contains(instance.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }

        if info.form_factor != XrFormFactor::HEAD_MOUNTED_DISPLAY {
            return XrResult::ERROR_FORM_FACTOR_UNSUPPORTED;
        }

        let system_id = self
            .instances
            .with(instance.0, |data| match data.system {
                Some(id) => id,
                None => {
                    let id = XrSystemId(self.next_system_id.fetch_add(1, Ordering::SeqCst));
                    data.system = Some(id);
                    id
                }
            })
            .unwrap_or(XrSystemId::NULL);

        if system_id == XrSystemId::NULL {
            return XrResult::ERROR_HANDLE_INVALID;
        }

        *system_id_out = system_id;
        XrResult::SUCCESS
    }

    pub fn is_valid_system(&self, instance: XrInstance, system_id: XrSystemId) -> bool {
        self.instances
            .with(instance.0, |data| data.system == Some(system_id))
            .unwrap_or(false)
    }

    /// # Safety
    /// `properties` must be null or valid for writes.
    pub unsafe fn get_system_properties(
        &self,
        instance: XrInstance,
        system_id: XrSystemId,
        properties: *mut XrSystemProperties,
    ) -> XrResult {
        if properties.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*properties).ty != XrStructureType::SYSTEM_PROPERTIES {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        if !self.instances.contains(instance.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        if !self.is_valid_system(instance, system_id) {
            return XrResult::ERROR_SYSTEM_INVALID;
        }

        let props = &mut *properties;
        props.system_id = system_id;
        props.vendor_id = 0x045e;
        write_cstr(&mut props.system_name, "Kinect XR System");
        props.graphics_properties = XrSystemGraphicsProperties {
            max_swapchain_image_width: 640,
            max_swapchain_image_height: 480,
            max_layer_count: 1,
        };
        // Stationary sensor: no tracking of either kind.
        props.tracking_properties = XrSystemTrackingProperties {
            orientation_tracking: FALSE,
            position_tracking: FALSE,
        };
        XrResult::SUCCESS
    }

    /// # Safety
    /// `requirements` must be null or valid for writes.
    pub unsafe fn get_graphics_requirements(
        &self,
        instance: XrInstance,
        system_id: XrSystemId,
        requirements: *mut XrGraphicsRequirementsMetalKHR,
    ) -> XrResult {
        if requirements.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*requirements).ty != XrStructureType::GRAPHICS_REQUIREMENTS_METAL_KHR {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if !self.instances.contains(instance.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        if !self.is_valid_system(instance, system_id) {
            return XrResult::ERROR_SYSTEM_INVALID;
        }

        // Any device is acceptable.
        (*requirements).metal_device = std::ptr::null_mut();
        XrResult::SUCCESS
    }

    // -----------------------------------------------------------------
    // Events

    /// # Safety
    /// `event_data` must be null or a valid event buffer.
    pub unsafe fn poll_event(
        &self,
        instance: XrInstance,
        event_data: *mut XrEventDataBuffer,
    ) -> XrResult {
        if event_data.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*event_data).ty != XrStructureType::EVENT_DATA_BUFFER {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        let event = match self.instances.with(instance.0, |data| data.events.pop_front()) {
            None => return XrResult::ERROR_HANDLE_INVALID,
            Some(None) => {
                (*event_data).ty = XrStructureType::EVENT_DATA_BUFFER;
                return XrResult::EVENT_UNAVAILABLE;
            }
            Some(Some(event)) => event,
        };

        let state_changed = event_data as *mut XrEventDataSessionStateChanged;
        (*state_changed) = XrEventDataSessionStateChanged {
            ty: XrStructureType::EVENT_DATA_SESSION_STATE_CHANGED,
            next: std::ptr::null(),
            session: event.session,
            state: event.state,
            time: 0,
        };
        XrResult::SUCCESS
    }

    // -----------------------------------------------------------------
    // Reference spaces

    /// # Safety
    /// Pointers must be null or valid per the two-call contract.
    pub unsafe fn enumerate_reference_spaces(
        &self,
        session: XrSession,
        capacity: u32,
        count_out: *mut u32,
        spaces: *mut XrReferenceSpaceType,
    ) -> XrResult {
        if !self.sessions.contains(session.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }

        const SUPPORTED: [XrReferenceSpaceType; 3] = [
            XrReferenceSpaceType::VIEW,
            XrReferenceSpaceType::LOCAL,
            XrReferenceSpaceType::STAGE,
        ];
        two_call(&SUPPORTED, capacity, count_out, spaces)
    }

    /// # Safety
    /// Pointers must be null or valid per the ABI.
    pub unsafe fn create_reference_space(
        &self,
        session: XrSession,
        create_info: *const XrReferenceSpaceCreateInfo,
        space_out: *mut XrSpace,
    ) -> XrResult {
        if create_info.is_null() || space_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*create_info;
        if info.ty != XrStructureType::REFERENCE_SPACE_CREATE_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        if !self.sessions.contains(session.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }

        match info.reference_space_type {
            XrReferenceSpaceType::VIEW
            | XrReferenceSpaceType::LOCAL
            | XrReferenceSpaceType::STAGE => {}
            _ => return XrResult::ERROR_REFERENCE_SPACE_UNSUPPORTED,
        }

        let handle = self.spaces.insert(SpaceData {
            session,
            space_type: info.reference_space_type,
        });
        *space_out = XrSpace(handle);
        XrResult::SUCCESS
    }

    pub fn destroy_space(&self, space: XrSpace) -> XrResult {
        match self.spaces.remove(space.0) {
            Some(data) => {
                debug!(
                    "destroyed {:?} space of session {:?}",
                    data.space_type, data.session
                );
                XrResult::SUCCESS
            }
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }

    pub fn is_valid_space(&self, space: XrSpace) -> bool {
        self.spaces.contains(space.0)
    }
}
