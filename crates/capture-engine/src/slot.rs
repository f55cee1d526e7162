//! Live Frame Slot: the only state a worker shares with the compositor.
//!
//! One writer (the channel's worker), any number of readers. Every publish
//! replaces the previous value wholesale; readers always see the newest one.
//! Frames that are overwritten before a reader looks are simply never seen.

use std::sync::Arc;
use std::time::Instant;

use dvrgrid_render_engine::VideoFrame;
use tokio::sync::watch;

use crate::worker::WorkerState;

/// One published value.
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    /// Most recent decoded frame; `None` while disconnected.
    pub frame: Option<Arc<VideoFrame>>,
    /// When this value was published.
    pub updated_at: Option<Instant>,
    pub connected: bool,
    pub state: WorkerState,
    /// Frames published since the worker started.
    pub frames: u64,
}

impl Default for SlotSnapshot {
    fn default() -> Self {
        Self {
            frame: None,
            updated_at: None,
            connected: false,
            state: WorkerState::Connecting,
            frames: 0,
        }
    }
}

/// Create a connected writer/reader pair holding the initial empty value.
pub fn frame_slot() -> (SlotWriter, SlotReader) {
    let (tx, rx) = watch::channel(SlotSnapshot::default());
    (SlotWriter { tx, frames: 0 }, SlotReader { rx })
}

/// Write half, owned by exactly one worker.
#[derive(Debug)]
pub struct SlotWriter {
    tx: watch::Sender<SlotSnapshot>,
    frames: u64,
}

impl SlotWriter {
    /// Publish a fresh frame; marks the channel connected.
    pub fn publish_frame(&mut self, frame: VideoFrame, state: WorkerState) {
        self.frames += 1;
        self.tx.send_replace(SlotSnapshot {
            frame: Some(Arc::new(frame)),
            updated_at: Some(Instant::now()),
            connected: true,
            state,
            frames: self.frames,
        });
    }

    /// Clear the frame and mark the channel disconnected.
    pub fn publish_absent(&mut self, state: WorkerState) {
        self.tx.send_replace(SlotSnapshot {
            frame: None,
            updated_at: Some(Instant::now()),
            connected: false,
            state,
            frames: self.frames,
        });
    }

    /// Record a state change without touching the frame.
    pub fn publish_state(&mut self, state: WorkerState) {
        self.tx.send_modify(|snapshot| snapshot.state = state);
    }

    /// Another read half for the same slot.
    pub fn subscribe(&self) -> SlotReader {
        SlotReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read half. Cheap to clone; reading never blocks the writer for longer than
/// a clone of the current value.
#[derive(Debug, Clone)]
pub struct SlotReader {
    rx: watch::Receiver<SlotSnapshot>,
}

impl SlotReader {
    pub fn snapshot(&self) -> SlotSnapshot {
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn frame(value: u8) -> VideoFrame {
        RgbImage::from_pixel(2, 2, Rgb([value, value, value]))
    }

    #[test]
    fn test_initial_snapshot_is_empty() {
        let (_writer, reader) = frame_slot();
        let snap = reader.snapshot();
        assert!(snap.frame.is_none());
        assert!(!snap.connected);
        assert_eq!(snap.state, WorkerState::Connecting);
        assert!(snap.updated_at.is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let (mut writer, reader) = frame_slot();
        for value in 1..=5 {
            writer.publish_frame(frame(value), WorkerState::Streaming);
        }
        let snap = reader.snapshot();
        assert_eq!(snap.frame.unwrap().get_pixel(0, 0), &Rgb([5, 5, 5]));
        assert_eq!(snap.frames, 5);
        assert!(snap.connected);
    }

    #[test]
    fn test_absent_clears_frame_and_keeps_count() {
        let (mut writer, reader) = frame_slot();
        writer.publish_frame(frame(7), WorkerState::Streaming);
        writer.publish_absent(WorkerState::Degraded);
        let snap = reader.snapshot();
        assert!(snap.frame.is_none());
        assert!(!snap.connected);
        assert_eq!(snap.state, WorkerState::Degraded);
        assert_eq!(snap.frames, 1);
    }

    #[test]
    fn test_state_update_keeps_frame() {
        let (mut writer, reader) = frame_slot();
        writer.publish_frame(frame(3), WorkerState::Streaming);
        writer.publish_state(WorkerState::Stopped);
        let snap = reader.snapshot();
        assert!(snap.frame.is_some());
        assert_eq!(snap.state, WorkerState::Stopped);
    }

    #[test]
    fn test_publish_survives_dropped_readers() {
        let (mut writer, reader) = frame_slot();
        drop(reader);
        writer.publish_frame(frame(1), WorkerState::Streaming);
        assert_eq!(writer.subscribe().snapshot().frames, 1);
    }
}
