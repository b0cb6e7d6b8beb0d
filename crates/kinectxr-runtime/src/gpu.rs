//! GPU texture backend seam.
//!
//! The runtime only needs four operations from the graphics layer; the
//! format argument passes through as whatever integer the underlying API
//! uses. The default build carries [`NullBackend`], which satisfies the
//! contract with null textures -- swapchains tolerate null slots and
//! uploads become no-ops.

use std::ffi::c_void;

/// Opaque pointer crossing the GPU boundary. The runtime never dereferences
/// it; only the backend gives it meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuPtr(pub *mut c_void);

impl GpuPtr {
    pub const NULL: Self = Self(std::ptr::null_mut());

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

// Carried across threads only as an opaque token.
unsafe impl Send for GpuPtr {}
unsafe impl Sync for GpuPtr {}

pub trait GpuBackend: Send + Sync {
    /// Derive the device owning a command queue. Null if unknown.
    fn device_from_queue(&self, queue: GpuPtr) -> GpuPtr;

    /// Create a `width` x `height` texture of the given API format.
    /// Returning null is tolerated (synthetic bindings in tests).
    fn create_texture(&self, device: GpuPtr, width: u32, height: u32, format: i64) -> GpuPtr;

    fn release_texture(&self, texture: GpuPtr);

    /// Copy `bytes` into the texture. Returns false on failure; the caller
    /// treats failure as a skipped upload, never as an application error.
    fn upload(
        &self,
        texture: GpuPtr,
        bytes: &[u8],
        bytes_per_row: usize,
        width: u32,
        height: u32,
    ) -> bool;
}

/// Backend with no graphics device behind it.
pub struct NullBackend;

impl GpuBackend for NullBackend {
    fn device_from_queue(&self, _queue: GpuPtr) -> GpuPtr {
        GpuPtr::NULL
    }

    fn create_texture(&self, _device: GpuPtr, _width: u32, _height: u32, _format: i64) -> GpuPtr {
        GpuPtr::NULL
    }

    fn release_texture(&self, _texture: GpuPtr) {}

    fn upload(
        &self,
        _texture: GpuPtr,
        _bytes: &[u8],
        _bytes_per_row: usize,
        _width: u32,
        _height: u32,
    ) -> bool {
        false
    }
}
