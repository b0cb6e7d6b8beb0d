//! Swapchain lifecycle and the acquire/wait/release protocol.
//!
//! Each swapchain rings over three images. The acquired flag is a one-bit
//! mutex: at most one image may be outstanding. Acquire hands out the
//! current index and advances it; wait uploads the latest sensor frame into
//! the acquired slot; release clears the flag.

use std::sync::Arc;

use kinectxr_common::FrameCache;

use crate::abi::*;
use crate::gpu::GpuPtr;
use crate::runtime::Runtime;
use crate::upload;

pub(crate) const IMAGE_COUNT: u32 = 3;

const SUPPORTED_FORMATS: [i64; 2] = [SWAPCHAIN_FORMAT_BGRA8_UNORM, SWAPCHAIN_FORMAT_R16_UINT];

pub(crate) struct SwapchainData {
    pub session: XrSession,
    pub width: u32,
    pub height: u32,
    pub format: i64,
    pub current_index: u32,
    pub acquired: bool,
    pub textures: [GpuPtr; IMAGE_COUNT as usize],
}

impl SwapchainData {
    /// Slot handed out by the most recent acquire. Only meaningful while
    /// the acquired flag is set (the index has already advanced past it).
    pub fn acquired_index(&self) -> u32 {
        (self.current_index + IMAGE_COUNT - 1) % IMAGE_COUNT
    }
}

impl Runtime {
    /// # Safety
    /// Pointers must be null or valid per the two-call contract.
    pub unsafe fn enumerate_swapchain_formats(
        &self,
        session: XrSession,
        capacity: u32,
        count_out: *mut u32,
        formats: *mut i64,
    ) -> XrResult {
        if !self.sessions.contains(session.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }
        two_call(&SUPPORTED_FORMATS, capacity, count_out, formats)
    }

    /// # Safety
    /// Pointers must be null or valid per the ABI.
    pub unsafe fn create_swapchain(
        &self,
        session: XrSession,
        create_info: *const XrSwapchainCreateInfo,
        swapchain_out: *mut XrSwapchain,
    ) -> XrResult {
        if create_info.is_null() || swapchain_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        let info = &*create_info;
        if info.ty != XrStructureType::SWAPCHAIN_CREATE_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        if !self.sessions.contains(session.0) {
            return XrResult::ERROR_HANDLE_INVALID;
        }

        if !SUPPORTED_FORMATS.contains(&info.format) {
            return XrResult::ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED;
        }

        // The sensor is 640x480; larger images can never be filled.
        if info.width > 640 || info.height > 480 {
            return XrResult::ERROR_SIZE_INSUFFICIENT;
        }

        if info.sample_count != 1 {
            return XrResult::ERROR_FEATURE_UNSUPPORTED;
        }
        if info.array_size != 1 {
            return XrResult::ERROR_FEATURE_UNSUPPORTED;
        }

        let has_color_usage = info.usage_flags & SWAPCHAIN_USAGE_COLOR_ATTACHMENT_BIT != 0;
        let has_depth_usage = info.usage_flags & SWAPCHAIN_USAGE_DEPTH_STENCIL_ATTACHMENT_BIT != 0;
        if !has_color_usage && !has_depth_usage {
            return XrResult::ERROR_FEATURE_UNSUPPORTED;
        }
        let is_depth_format = info.format == SWAPCHAIN_FORMAT_R16_UINT;
        if is_depth_format && !has_depth_usage {
            return XrResult::ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED;
        }
        if !is_depth_format && !has_color_usage {
            return XrResult::ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED;
        }

        let gpu_device = match self.sessions.with(session.0, |data| data.gpu_device) {
            Some(device) => device,
            None => return XrResult::ERROR_HANDLE_INVALID,
        };

        // Null texture slots are tolerated (synthetic bindings in tests);
        // uploads into them simply skip.
        let mut textures = [GpuPtr::NULL; IMAGE_COUNT as usize];
        if !gpu_device.is_null() {
            for slot in textures.iter_mut() {
                *slot = self
                    .gpu
                    .create_texture(gpu_device, info.width, info.height, info.format);
            }
        }

        let handle = self.swapchains.insert(SwapchainData {
            session,
            width: info.width,
            height: info.height,
            format: info.format,
            current_index: 0,
            acquired: false,
            textures,
        });
        *swapchain_out = XrSwapchain(handle);
        XrResult::SUCCESS
    }

    pub fn destroy_swapchain(&self, swapchain: XrSwapchain) -> XrResult {
        match self.swapchains.remove(swapchain.0) {
            Some(data) => {
                for texture in data.textures {
                    if !texture.is_null() {
                        self.gpu.release_texture(texture);
                    }
                }
                XrResult::SUCCESS
            }
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }

    pub fn is_valid_swapchain(&self, swapchain: XrSwapchain) -> bool {
        self.swapchains.contains(swapchain.0)
    }

    /// # Safety
    /// Pointers must be null or valid per the two-call contract; `images`
    /// must point to `capacity` Metal-style image structures.
    pub unsafe fn enumerate_swapchain_images(
        &self,
        swapchain: XrSwapchain,
        capacity: u32,
        count_out: *mut u32,
        images: *mut XrSwapchainImageBaseHeader,
    ) -> XrResult {
        if count_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        let textures = match self.swapchains.with(swapchain.0, |data| data.textures) {
            Some(textures) => textures,
            None => return XrResult::ERROR_HANDLE_INVALID,
        };

        if capacity == 0 {
            *count_out = IMAGE_COUNT;
            return XrResult::SUCCESS;
        }
        if capacity < IMAGE_COUNT {
            *count_out = IMAGE_COUNT;
            return XrResult::ERROR_SIZE_INSUFFICIENT;
        }
        if images.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        let images = images as *mut XrSwapchainImageMetalKHR;
        if (*images).ty != XrStructureType::SWAPCHAIN_IMAGE_METAL_KHR {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        for (i, texture) in textures.iter().enumerate() {
            let image = &mut *images.add(i);
            image.ty = XrStructureType::SWAPCHAIN_IMAGE_METAL_KHR;
            image.next = std::ptr::null_mut();
            image.texture = texture.0;
        }

        *count_out = IMAGE_COUNT;
        XrResult::SUCCESS
    }

    /// # Safety
    /// Pointers must be null or valid per the ABI.
    pub unsafe fn acquire_swapchain_image(
        &self,
        swapchain: XrSwapchain,
        acquire_info: *const XrSwapchainImageAcquireInfo,
        index_out: *mut u32,
    ) -> XrResult {
        if acquire_info.is_null() || index_out.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*acquire_info).ty != XrStructureType::SWAPCHAIN_IMAGE_ACQUIRE_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        let acquired_index = self.swapchains.with(swapchain.0, |data| {
            if data.acquired {
                None
            } else {
                let index = data.current_index;
                data.acquired = true;
                data.current_index = (data.current_index + 1) % IMAGE_COUNT;
                Some(index)
            }
        });

        match acquired_index {
            None => XrResult::ERROR_HANDLE_INVALID,
            Some(None) => XrResult::ERROR_CALL_ORDER_INVALID,
            Some(Some(index)) => {
                *index_out = index;
                XrResult::SUCCESS
            }
        }
    }

    /// Waits are immediate (there is no GPU fence); the timeout argument is
    /// ignored. The latest cached sensor frame is uploaded into the
    /// acquired slot before returning.
    ///
    /// # Safety
    /// `wait_info` must be null or valid per the ABI.
    pub unsafe fn wait_swapchain_image(
        &self,
        swapchain: XrSwapchain,
        wait_info: *const XrSwapchainImageWaitInfo,
    ) -> XrResult {
        if wait_info.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*wait_info).ty != XrStructureType::SWAPCHAIN_IMAGE_WAIT_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        struct UploadTarget {
            texture: GpuPtr,
            format: i64,
            session: XrSession,
        }

        let target = self.swapchains.with(swapchain.0, |data| {
            if !data.acquired {
                None
            } else {
                Some(UploadTarget {
                    texture: data.textures[data.acquired_index() as usize],
                    format: data.format,
                    session: data.session,
                })
            }
        });

        let target = match target {
            None => return XrResult::ERROR_HANDLE_INVALID,
            Some(None) => return XrResult::ERROR_CALL_ORDER_INVALID,
            Some(Some(target)) => target,
        };

        // Copy the cache handle out so the upload runs without any table
        // lock held; the acquired flag keeps the slot stable meanwhile.
        let cache: Option<Arc<FrameCache>> = self
            .sessions
            .with(target.session.0, |data| Arc::clone(&data.frame_cache));

        if let Some(cache) = cache {
            upload::upload_frame(self.gpu.as_ref(), target.texture, target.format, &cache);
        }

        XrResult::SUCCESS
    }

    /// # Safety
    /// `release_info` must be null or valid per the ABI.
    pub unsafe fn release_swapchain_image(
        &self,
        swapchain: XrSwapchain,
        release_info: *const XrSwapchainImageReleaseInfo,
    ) -> XrResult {
        if release_info.is_null() {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }
        if (*release_info).ty != XrStructureType::SWAPCHAIN_IMAGE_RELEASE_INFO {
            return XrResult::ERROR_VALIDATION_FAILURE;
        }

        match self.swapchains.with(swapchain.0, |data| {
            if !data.acquired {
                XrResult::ERROR_CALL_ORDER_INVALID
            } else {
                data.acquired = false;
                XrResult::SUCCESS
            }
        }) {
            Some(result) => result,
            None => XrResult::ERROR_HANDLE_INVALID,
        }
    }
}
