//! Sensor frame to GPU texture upload.
//!
//! Color swapchains receive the RGB888 frame converted to BGRA8888; depth
//! swapchains receive the u16 depth frame as-is (little-endian, as the
//! driver produces it). A missing frame or a null texture makes the upload
//! a no-op -- the previous texture contents remain and no error reaches the
//! application.

use kinectxr_common::frame::{FRAME_HEIGHT, FRAME_WIDTH};
use kinectxr_common::FrameCache;

use crate::abi::{SWAPCHAIN_FORMAT_BGRA8_UNORM, SWAPCHAIN_FORMAT_R16_UINT};
use crate::gpu::{GpuBackend, GpuPtr};

/// Convert RGB888 to BGRA8888: swap bytes 0 and 2 of each triple and append
/// an opaque alpha.
pub fn rgb_to_bgra(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut bgra = vec![0u8; width * height * 4];
    for (src, dst) in rgb.chunks_exact(3).zip(bgra.chunks_exact_mut(4)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
        dst[3] = 255;
    }
    bgra
}

/// Upload the latest cached frame matching `format` into `texture`.
/// Returns whether a texture write actually happened.
pub(crate) fn upload_frame(
    gpu: &dyn GpuBackend,
    texture: GpuPtr,
    format: i64,
    cache: &FrameCache,
) -> bool {
    if texture.is_null() {
        return false;
    }

    match format {
        SWAPCHAIN_FORMAT_BGRA8_UNORM => {
            // Snapshot under the cache lock, convert outside it.
            let Some(rgb) = cache.snapshot_rgb() else {
                return false;
            };
            let bgra = rgb_to_bgra(&rgb, FRAME_WIDTH, FRAME_HEIGHT);
            gpu.upload(
                texture,
                &bgra,
                FRAME_WIDTH * 4,
                FRAME_WIDTH as u32,
                FRAME_HEIGHT as u32,
            )
        }
        SWAPCHAIN_FORMAT_R16_UINT => {
            let Some(depth) = cache.snapshot_depth() else {
                return false;
            };
            gpu.upload(
                texture,
                &depth,
                FRAME_WIDTH * 2,
                FRAME_WIDTH as u32,
                FRAME_HEIGHT as u32,
            )
        }
        _ => false,
    }
}
