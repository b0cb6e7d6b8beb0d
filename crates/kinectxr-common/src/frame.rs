//! Frame geometry constants and the latest-only frame cache.
//!
//! The Kinect delivers fixed-size 640x480 frames: RGB888 for video and
//! little-endian u16 millimeters for depth. Producers overwrite the cache in
//! place; consumers copy out under the same lock. There is no queue and no
//! backpressure -- a slow consumer sees dropped intermediate frames, which is
//! the right behavior for a 30 Hz sensor.

use std::sync::Mutex;
use std::time::Duration;

/// Sensor frame width in pixels.
pub const FRAME_WIDTH: usize = 640;
/// Sensor frame height in pixels.
pub const FRAME_HEIGHT: usize = 480;
/// RGB888 frame payload size (921,600 bytes).
pub const RGB_FRAME_SIZE: usize = FRAME_WIDTH * FRAME_HEIGHT * 3;
/// Depth u16-LE frame payload size (614,400 bytes).
pub const DEPTH_FRAME_SIZE: usize = FRAME_WIDTH * FRAME_HEIGHT * 2;
/// Native sensor frame rate.
pub const FRAME_RATE_HZ: u32 = 30;
/// Pacing interval used by frame producers and the broadcaster.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);

struct StreamSlot {
    data: Vec<u8>,
    timestamp: u32,
    valid: bool,
}

impl StreamSlot {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            timestamp: 0,
            valid: false,
        }
    }

    fn store(&mut self, data: &[u8], timestamp: u32) {
        let len = data.len().min(self.data.len());
        self.data[..len].copy_from_slice(&data[..len]);
        self.timestamp = timestamp;
        self.valid = true;
    }
}

struct CacheInner {
    rgb: StreamSlot,
    depth: StreamSlot,
    frame_id: u32,
}

/// Copy of whatever the cache held at one instant, taken under the lock.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame_id: u32,
    pub rgb: Option<Vec<u8>>,
    pub depth: Option<Vec<u8>>,
}

/// Single-producer, multi-consumer latest-frame store.
///
/// One mutex guards both stream slots and the shared `frame_id` counter.
/// Depth writes advance `frame_id`; video writes do not, so RGB-only
/// intervals reuse the id of the last depth frame.
pub struct FrameCache {
    inner: Mutex<CacheInner>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                rgb: StreamSlot::new(RGB_FRAME_SIZE),
                depth: StreamSlot::new(DEPTH_FRAME_SIZE),
                frame_id: 0,
            }),
        }
    }

    /// Store an RGB888 frame. Does not advance `frame_id`.
    pub fn store_rgb(&self, data: &[u8], timestamp: u32) {
        let mut inner = self.inner.lock().expect("frame cache poisoned");
        inner.rgb.store(data, timestamp);
    }

    /// Store a depth frame (u16 LE bytes) and advance `frame_id`.
    pub fn store_depth(&self, data: &[u8], timestamp: u32) {
        let mut inner = self.inner.lock().expect("frame cache poisoned");
        inner.depth.store(data, timestamp);
        inner.frame_id = inner.frame_id.wrapping_add(1);
    }

    /// Store a synthesized RGB + depth pair in one critical section,
    /// advancing `frame_id` once. Returns the new id. Used by mock mode.
    pub fn store_synthetic(&self, rgb: &[u8], depth: &[u8]) -> u32 {
        let mut inner = self.inner.lock().expect("frame cache poisoned");
        inner.frame_id = inner.frame_id.wrapping_add(1);
        let id = inner.frame_id;
        inner.rgb.store(rgb, id);
        inner.depth.store(depth, id);
        id
    }

    /// Copy out both streams (where valid) and the shared frame id.
    pub fn snapshot(&self) -> FrameSnapshot {
        let inner = self.inner.lock().expect("frame cache poisoned");
        FrameSnapshot {
            frame_id: inner.frame_id,
            rgb: inner.rgb.valid.then(|| inner.rgb.data.clone()),
            depth: inner.depth.valid.then(|| inner.depth.data.clone()),
        }
    }

    /// Copy out the RGB frame if one has been stored.
    pub fn snapshot_rgb(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("frame cache poisoned");
        inner.rgb.valid.then(|| inner.rgb.data.clone())
    }

    /// Copy out the depth frame if one has been stored.
    pub fn snapshot_depth(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("frame cache poisoned");
        inner.depth.valid.then(|| inner.depth.data.clone())
    }

    pub fn frame_id(&self) -> u32 {
        self.inner.lock().expect("frame cache poisoned").frame_id
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}
