//! Shared fixtures for runtime tests: a runtime wired to the mock sensor
//! and a recording GPU backend, plus ABI struct builders.

#![allow(dead_code)]

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kinectxr_device::{DeviceError, KinectDriver, MockDriver};
use kinectxr_runtime::abi::*;
use kinectxr_runtime::{GpuBackend, GpuPtr, NullBackend, Runtime};

/// GPU backend that mints fake texture pointers and records uploads.
pub struct FakeGpu {
    next_texture: AtomicUsize,
    pub uploads: Mutex<Vec<(usize, usize)>>,
    pub released: Mutex<Vec<GpuPtr>>,
}

impl FakeGpu {
    pub fn new() -> Self {
        Self {
            next_texture: AtomicUsize::new(0x1000),
            uploads: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }
}

impl GpuBackend for FakeGpu {
    fn device_from_queue(&self, queue: GpuPtr) -> GpuPtr {
        queue
    }

    fn create_texture(&self, _device: GpuPtr, _width: u32, _height: u32, _format: i64) -> GpuPtr {
        let addr = self.next_texture.fetch_add(0x10, Ordering::SeqCst);
        GpuPtr(addr as *mut c_void)
    }

    fn release_texture(&self, texture: GpuPtr) {
        self.released.lock().unwrap().push(texture);
    }

    fn upload(
        &self,
        _texture: GpuPtr,
        bytes: &[u8],
        bytes_per_row: usize,
        _width: u32,
        _height: u32,
    ) -> bool {
        self.uploads.lock().unwrap().push((bytes.len(), bytes_per_row));
        true
    }
}

/// Runtime backed by the mock sensor and a null GPU.
pub fn mock_runtime() -> Runtime {
    Runtime::new(
        Box::new(|| Box::new(MockDriver::new()) as Box<dyn KinectDriver>),
        Box::new(NullBackend),
    )
}

/// Runtime backed by the mock sensor and a recording GPU backend.
pub fn mock_runtime_with_gpu() -> (Runtime, Arc<FakeGpu>) {
    let gpu = Arc::new(FakeGpu::new());
    let backend = Arc::clone(&gpu);
    let runtime = Runtime::new(
        Box::new(|| Box::new(MockDriver::new()) as Box<dyn KinectDriver>),
        Box::new(SharedGpu(backend)),
    );
    (runtime, gpu)
}

/// Runtime whose sensor cannot be opened at all.
pub fn deviceless_runtime() -> Runtime {
    Runtime::new(
        Box::new(|| {
            Box::new(MockDriver::failing_open(DeviceError::DeviceNotFound))
                as Box<dyn KinectDriver>
        }),
        Box::new(NullBackend),
    )
}

struct SharedGpu(Arc<FakeGpu>);

impl GpuBackend for SharedGpu {
    fn device_from_queue(&self, queue: GpuPtr) -> GpuPtr {
        self.0.device_from_queue(queue)
    }

    fn create_texture(&self, device: GpuPtr, width: u32, height: u32, format: i64) -> GpuPtr {
        self.0.create_texture(device, width, height, format)
    }

    fn release_texture(&self, texture: GpuPtr) {
        self.0.release_texture(texture)
    }

    fn upload(
        &self,
        texture: GpuPtr,
        bytes: &[u8],
        bytes_per_row: usize,
        width: u32,
        height: u32,
    ) -> bool {
        self.0.upload(texture, bytes, bytes_per_row, width, height)
    }
}

pub fn app_info(name: &str) -> XrApplicationInfo {
    let mut info = XrApplicationInfo {
        application_name: [0; MAX_APPLICATION_NAME_SIZE],
        application_version: 1,
        engine_name: [0; MAX_ENGINE_NAME_SIZE],
        engine_version: 0,
        api_version: CURRENT_API_VERSION,
    };
    write_cstr(&mut info.application_name, name);
    info
}

pub fn instance_create_info(name: &str) -> XrInstanceCreateInfo {
    XrInstanceCreateInfo {
        ty: XrStructureType::INSTANCE_CREATE_INFO,
        next: ptr::null(),
        create_flags: 0,
        application_info: app_info(name),
        enabled_api_layer_count: 0,
        enabled_api_layer_names: ptr::null(),
        enabled_extension_count: 0,
        enabled_extension_names: ptr::null(),
    }
}

pub fn create_instance(runtime: &Runtime) -> XrInstance {
    let info = instance_create_info("T");
    let mut instance = XrInstance::NULL;
    let result = unsafe { runtime.create_instance(&info, &mut instance) };
    assert_eq!(result, XrResult::SUCCESS);
    instance
}

pub fn get_system(runtime: &Runtime, instance: XrInstance) -> XrSystemId {
    let info = XrSystemGetInfo {
        ty: XrStructureType::SYSTEM_GET_INFO,
        next: ptr::null(),
        form_factor: XrFormFactor::HEAD_MOUNTED_DISPLAY,
    };
    let mut system = XrSystemId::NULL;
    let result = unsafe { runtime.get_system(instance, &info, &mut system) };
    assert_eq!(result, XrResult::SUCCESS);
    system
}

pub const FAKE_QUEUE: *mut c_void = 0x1 as *mut c_void;

pub fn create_session(runtime: &Runtime, instance: XrInstance) -> XrSession {
    let system = get_system(runtime, instance);
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
    let mut session = XrSession::NULL;
    let result = unsafe { runtime.create_session(instance, &info, &mut session) };
    assert_eq!(result, XrResult::SUCCESS);
    session
}

pub fn begin_session(runtime: &Runtime, session: XrSession) -> XrResult {
    let info = XrSessionBeginInfo {
        ty: XrStructureType::SESSION_BEGIN_INFO,
        next: ptr::null(),
        primary_view_configuration_type: XrViewConfigurationType::PRIMARY_MONO,
    };
    unsafe { runtime.begin_session(session, &info) }
}

/// Drain the instance's event queue into (session, state) pairs.
pub fn drain_events(runtime: &Runtime, instance: XrInstance) -> Vec<(XrSession, XrSessionState)> {
    let mut events = Vec::new();
    loop {
        let mut buffer = XrEventDataBuffer {
            ty: XrStructureType::EVENT_DATA_BUFFER,
            next: ptr::null(),
            varying: [0; EVENT_DATA_BUFFER_VARYING_SIZE],
        };
        let result = unsafe { runtime.poll_event(instance, &mut buffer) };
        if result == XrResult::EVENT_UNAVAILABLE {
            break;
        }
        assert_eq!(result, XrResult::SUCCESS);
        assert_eq!(buffer.ty, XrStructureType::EVENT_DATA_SESSION_STATE_CHANGED);
        let changed =
            unsafe { &*(&buffer as *const XrEventDataBuffer as *const XrEventDataSessionStateChanged) };
        events.push((changed.session, changed.state));
    }
    events
}

pub fn swapchain_create_info(format: i64, width: u32, height: u32) -> XrSwapchainCreateInfo {
    let usage = if format == SWAPCHAIN_FORMAT_R16_UINT {
        SWAPCHAIN_USAGE_DEPTH_STENCIL_ATTACHMENT_BIT
    } else {
        SWAPCHAIN_USAGE_COLOR_ATTACHMENT_BIT
    };
    XrSwapchainCreateInfo {
        ty: XrStructureType::SWAPCHAIN_CREATE_INFO,
        next: ptr::null(),
        create_flags: 0,
        usage_flags: usage,
        format,
        sample_count: 1,
        width,
        height,
        face_count: 1,
        array_size: 1,
        mip_count: 1,
    }
}

pub fn create_swapchain(
    runtime: &Runtime,
    session: XrSession,
    format: i64,
    width: u32,
    height: u32,
) -> XrSwapchain {
    let info = swapchain_create_info(format, width, height);
    let mut swapchain = XrSwapchain::NULL;
    let result = unsafe { runtime.create_swapchain(session, &info, &mut swapchain) };
    assert_eq!(result, XrResult::SUCCESS);
    swapchain
}

pub fn acquire(runtime: &Runtime, swapchain: XrSwapchain) -> Result<u32, XrResult> {
    let info = XrSwapchainImageAcquireInfo {
        ty: XrStructureType::SWAPCHAIN_IMAGE_ACQUIRE_INFO,
        next: ptr::null(),
    };
    let mut index = u32::MAX;
    let result = unsafe { runtime.acquire_swapchain_image(swapchain, &info, &mut index) };
    if result == XrResult::SUCCESS {
        Ok(index)
    } else {
        Err(result)
    }
}

pub fn wait_image(runtime: &Runtime, swapchain: XrSwapchain) -> XrResult {
    let info = XrSwapchainImageWaitInfo {
        ty: XrStructureType::SWAPCHAIN_IMAGE_WAIT_INFO,
        next: ptr::null(),
        timeout: 0,
    };
    unsafe { runtime.wait_swapchain_image(swapchain, &info) }
}

pub fn release_image(runtime: &Runtime, swapchain: XrSwapchain) -> XrResult {
    let info = XrSwapchainImageReleaseInfo {
        ty: XrStructureType::SWAPCHAIN_IMAGE_RELEASE_INFO,
        next: ptr::null(),
    };
    unsafe { runtime.release_swapchain_image(swapchain, &info) }
}

pub fn wait_frame(runtime: &Runtime, session: XrSession) -> Result<XrFrameState, XrResult> {
    let wait_info = XrFrameWaitInfo {
        ty: XrStructureType::FRAME_WAIT_INFO,
        next: ptr::null(),
    };
    let mut state = XrFrameState {
        ty: XrStructureType::FRAME_STATE,
        next: ptr::null_mut(),
        predicted_display_time: 0,
        predicted_display_period: 0,
        should_render: FALSE,
    };
    let result = unsafe { runtime.wait_frame(session, &wait_info, &mut state) };
    if result == XrResult::SUCCESS {
        Ok(state)
    } else {
        Err(result)
    }
}

pub fn begin_frame(runtime: &Runtime, session: XrSession) -> XrResult {
    let info = XrFrameBeginInfo {
        ty: XrStructureType::FRAME_BEGIN_INFO,
        next: ptr::null(),
    };
    unsafe { runtime.begin_frame(session, &info) }
}

pub fn end_frame_simple(runtime: &Runtime, session: XrSession) -> XrResult {
    let info = XrFrameEndInfo {
        ty: XrStructureType::FRAME_END_INFO,
        next: ptr::null(),
        display_time: 0,
        environment_blend_mode: XrEnvironmentBlendMode::OPAQUE,
        layer_count: 0,
        layers: ptr::null(),
    };
    unsafe { runtime.end_frame(session, &info) }
}
