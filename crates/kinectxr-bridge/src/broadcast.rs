//! 30 Hz broadcaster.
//!
//! Absolute-schedule pacing: `next_frame += 33ms` each tick; falling behind
//! drops whole frame intervals (counted) and snaps the schedule back to
//! now. A one-line stats summary goes out every 10 seconds.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use kinectxr_common::frame::{DEPTH_FRAME_SIZE, FRAME_INTERVAL, RGB_FRAME_SIZE};
use kinectxr_common::protocol::{encode_binary_frame, STREAM_TYPE_DEPTH, STREAM_TYPE_RGB};
use tracing::{debug, info};

use crate::mock;
use crate::server::BridgeState;

const STATS_INTERVAL: Duration = Duration::from_secs(10);

pub(crate) fn spawn(state: Arc<BridgeState>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("bridge-broadcast".into())
        .spawn(move || run(state))
        .expect("failed to spawn broadcast thread")
}

/// Whole frame intervals between a stale schedule point and now.
pub(crate) fn whole_frames_behind(next_frame: Instant, now: Instant) -> u32 {
    (now.duration_since(next_frame).as_millis() / FRAME_INTERVAL.as_millis()) as u32
}

fn run(state: Arc<BridgeState>) {
    let mut next_frame = Instant::now();
    let mut last_stats = Instant::now();
    let mut next_stats = last_stats + STATS_INTERVAL;

    let mut mock_rgb = vec![0u8; RGB_FRAME_SIZE];
    let mut mock_depth = vec![0u8; DEPTH_FRAME_SIZE];

    while state.broadcast_running.load(Ordering::SeqCst) {
        let now = Instant::now();

        if now >= next_stats {
            let elapsed = now.duration_since(last_stats).as_secs_f64();
            if elapsed > 0.0 {
                let rgb = state.stats.rgb_frames.swap(0, Ordering::Relaxed);
                let depth = state.stats.depth_frames.swap(0, Ordering::Relaxed);
                info!(
                    "stats: clients={} rgb={:.1}fps depth={:.1}fps sent={} dropped={}",
                    state.client_count(),
                    rgb as f64 / elapsed,
                    depth as f64 / elapsed,
                    state.stats.frames_sent.load(Ordering::Relaxed),
                    state.stats.dropped_frames.load(Ordering::Relaxed),
                );
                last_stats = now;
            }
            if state.motor.is_moving() {
                debug!("motor command still in flight");
            }
            next_stats = now + STATS_INTERVAL;
        }

        if now >= next_frame {
            if state.mock {
                let frame_id = state.frame_cache.frame_id().wrapping_add(1);
                mock::fill_mock_rgb(&mut mock_rgb, frame_id);
                mock::fill_mock_depth(&mut mock_depth, frame_id);
                state.frame_cache.store_synthetic(&mock_rgb, &mock_depth);
                state.stats.rgb_frames.fetch_add(1, Ordering::Relaxed);
                state.stats.depth_frames.fetch_add(1, Ordering::Relaxed);
            }

            let snapshot = state.frame_cache.snapshot();
            if let Some(rgb) = &snapshot.rgb {
                broadcast_frame(&state, STREAM_TYPE_RGB, rgb, snapshot.frame_id);
            }
            if let Some(depth) = &snapshot.depth {
                broadcast_frame(&state, STREAM_TYPE_DEPTH, depth, snapshot.frame_id);
            }

            next_frame += FRAME_INTERVAL;
            if next_frame < now {
                let skipped = whole_frames_behind(next_frame, now);
                state
                    .stats
                    .dropped_frames
                    .fetch_add(skipped, Ordering::Relaxed);
                next_frame = now + FRAME_INTERVAL;
            }
        } else {
            std::thread::sleep(next_frame.duration_since(now));
        }
    }
}

fn broadcast_frame(state: &BridgeState, stream_type: u16, pixels: &[u8], frame_id: u32) {
    let message = encode_binary_frame(frame_id, stream_type, pixels);

    let clients = state.clients.lock().expect("client map poisoned");
    for entry in clients.values() {
        let subscribed = (stream_type == STREAM_TYPE_RGB && entry.rgb)
            || (stream_type == STREAM_TYPE_DEPTH && entry.depth);
        if subscribed && entry.tx.send(Message::Binary(message.to_vec())).is_ok() {
            state.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_is_counted_in_whole_frames() {
        let base = Instant::now();
        assert_eq!(whole_frames_behind(base, base + Duration::from_millis(32)), 0);
        assert_eq!(whole_frames_behind(base, base + Duration::from_millis(33)), 1);
        assert_eq!(whole_frames_behind(base, base + Duration::from_millis(99)), 3);
        assert_eq!(whole_frames_behind(base, base + Duration::from_millis(330)), 10);
    }
}
