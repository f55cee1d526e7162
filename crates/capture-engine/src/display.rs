//! Presentation sinks for composed frames.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dvrgrid_common::clock::{RateController, SessionClock};
use dvrgrid_common::error::{GridError, GridResult};
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::{ImageFormat, RgbImage};

use crate::pipeline::init_gstreamer;

/// Where composed frames go.
pub trait FrameSink {
    /// Present one composed frame.
    fn show(&mut self, frame: &RgbImage) -> GridResult<()>;

    /// Whether the operator asked to stop (window closed, frame budget
    /// reached). Polled once per tick.
    fn poll_stop_requested(&mut self) -> bool;

    /// Release presentation resources. Called once, after the last `show`.
    fn close(&mut self) -> GridResult<()>;
}

/// On-screen window: `appsrc ! videoconvert ! autovideosink`.
///
/// The pipeline is built on the first frame, since the canvas size is only
/// known then.
pub struct GstDisplaySink {
    title: String,
    fps: u32,
    running: Option<DisplayPipeline>,
    stop_requested: bool,
}

struct DisplayPipeline {
    pipeline: gst::Pipeline,
    src: gst_app::AppSrc,
    info: gst_video::VideoInfo,
}

impl GstDisplaySink {
    pub fn new(title: impl Into<String>, fps: u32) -> GridResult<Self> {
        init_gstreamer()?;
        Ok(Self {
            title: title.into(),
            fps: fps.max(1),
            running: None,
            stop_requested: false,
        })
    }

    fn build(&self, width: u32, height: u32) -> GridResult<DisplayPipeline> {
        let launch = "appsrc name=src is-live=true format=time do-timestamp=true ! videoconvert ! autovideosink sync=false";
        let element = gst::parse::launch(launch).map_err(|e| {
            GridError::presentation(format!("Failed to build display pipeline: {e}"))
        })?;
        let pipeline = element.dynamic_cast::<gst::Pipeline>().map_err(|_| {
            GridError::presentation("Launch string did not produce a pipeline")
        })?;
        let src = pipeline
            .by_name("src")
            .and_then(|e| e.dynamic_cast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| GridError::presentation("Display pipeline has no appsrc"))?;

        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height)
            .fps(gst::Fraction::new(self.fps as i32, 1))
            .build()
            .map_err(|e| GridError::presentation(format!("Invalid video info: {e}")))?;
        let caps = info
            .to_caps()
            .map_err(|e| GridError::presentation(format!("Invalid caps: {e}")))?;
        src.set_caps(Some(&caps));

        pipeline.set_state(gst::State::Playing).map_err(|e| {
            GridError::presentation(format!("Failed to start display pipeline: {e:?}"))
        })?;
        tracing::info!(title = %self.title, width, height, "Display window opened");

        Ok(DisplayPipeline {
            pipeline,
            src,
            info,
        })
    }
}

impl FrameSink for GstDisplaySink {
    fn show(&mut self, frame: &RgbImage) -> GridResult<()> {
        let (width, height) = frame.dimensions();
        let size_changed = self
            .running
            .as_ref()
            .is_some_and(|r| (r.info.width(), r.info.height()) != (width, height));
        if size_changed {
            self.close()?;
        }
        if self.running.is_none() {
            self.running = Some(self.build(width, height)?);
        }
        let Some(running) = self.running.as_ref() else {
            return Ok(());
        };

        let stride = running.info.stride()[0] as usize;
        let buffer = gst::Buffer::from_mut_slice(pad_rows(frame, stride));
        if let Err(flow) = running.src.push_buffer(buffer) {
            // Flushing/EOS means the window went away.
            tracing::debug!(?flow, "Display refused frame");
            self.stop_requested = true;
        }
        Ok(())
    }

    fn poll_stop_requested(&mut self) -> bool {
        if self.stop_requested {
            return true;
        }
        let Some(bus) = self.running.as_ref().and_then(|r| r.pipeline.bus()) else {
            return false;
        };
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Eos, gst::MessageType::Error]) {
            match msg.view() {
                gst::MessageView::Error(err) => {
                    tracing::info!(error = %err.error(), "Display window closed");
                    self.stop_requested = true;
                }
                gst::MessageView::Eos(_) => self.stop_requested = true,
                _ => {}
            }
        }
        self.stop_requested
    }

    fn close(&mut self) -> GridResult<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.src.end_of_stream();
        running
            .pipeline
            .set_state(gst::State::Null)
            .map_err(|e| GridError::presentation(format!("Failed to stop display: {e:?}")))?;
        tracing::info!(title = %self.title, "Display window closed");
        Ok(())
    }
}

impl Drop for GstDisplaySink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Display teardown failed");
        }
    }
}

/// Copy `frame` into rows of `stride` bytes.
fn pad_rows(frame: &RgbImage, stride: usize) -> Vec<u8> {
    let row = frame.width() as usize * 3;
    if stride <= row {
        return frame.as_raw().clone();
    }
    let mut out = vec![0u8; stride * frame.height() as usize];
    for (y, chunk) in frame.as_raw().chunks_exact(row).enumerate() {
        out[y * stride..y * stride + row].copy_from_slice(chunk);
    }
    out
}

/// Headless sink that keeps a PNG of the wall up to date on disk.
pub struct SnapshotSink {
    path: PathBuf,
    clock: SessionClock,
    rate: RateController,
    limit: Option<u64>,
    written: u64,
}

impl SnapshotSink {
    /// Write at most once per `interval`.
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            clock: SessionClock::start(),
            rate: RateController::every(interval),
            limit: None,
            written: 0,
        }
    }

    /// Request a stop after `count` snapshots.
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn write(&self, frame: &RgbImage) -> GridResult<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        frame
            .save_with_format(&tmp, ImageFormat::Png)
            .map_err(|e| GridError::presentation(format!("Failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl FrameSink for SnapshotSink {
    fn show(&mut self, frame: &RgbImage) -> GridResult<()> {
        if !self.rate.should_tick(self.clock.elapsed().as_nanos() as u64) {
            return Ok(());
        }
        self.write(frame)?;
        self.written += 1;
        tracing::debug!(path = %self.path.display(), written = self.written, "Snapshot written");
        Ok(())
    }

    fn poll_stop_requested(&mut self) -> bool {
        self.limit.is_some_and(|limit| self.written >= limit)
    }

    fn close(&mut self) -> GridResult<()> {
        tracing::info!(path = %self.path.display(), written = self.written, "Snapshot sink closed");
        Ok(())
    }
}

/// Discards frames. Optionally requests a stop after a number of frames.
#[derive(Debug, Default)]
pub struct NullSink {
    shown: u64,
    limit: Option<u64>,
    last_size: Option<(u32, u32)>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(count: u64) -> Self {
        Self {
            limit: Some(count),
            ..Self::default()
        }
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    /// Dimensions of the last frame shown.
    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.last_size
    }
}

impl FrameSink for NullSink {
    fn show(&mut self, frame: &RgbImage) -> GridResult<()> {
        self.shown += 1;
        self.last_size = Some(frame.dimensions());
        Ok(())
    }

    fn poll_stop_requested(&mut self) -> bool {
        self.limit.is_some_and(|limit| self.shown >= limit)
    }

    fn close(&mut self) -> GridResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn test_pad_rows_aligns_stride() {
        let frame = RgbImage::from_pixel(1, 2, Rgb([9, 8, 7]));
        assert_eq!(pad_rows(&frame, 4), vec![9, 8, 7, 0, 9, 8, 7, 0]);
        assert_eq!(pad_rows(&frame, 3), vec![9, 8, 7, 9, 8, 7]);
    }

    #[test]
    fn test_null_sink_limit() {
        let mut sink = NullSink::with_limit(2);
        let frame = RgbImage::new(4, 2);
        assert!(!sink.poll_stop_requested());
        sink.show(&frame).unwrap();
        sink.show(&frame).unwrap();
        assert!(sink.poll_stop_requested());
        assert_eq!(sink.last_size(), Some((4, 2)));
    }

    #[test]
    fn test_snapshot_sink_writes_png() {
        let path = std::env::temp_dir().join(format!("dvrgrid-snapshot-{}.png", std::process::id()));
        let mut sink = SnapshotSink::new(&path, Duration::from_secs(3600)).with_limit(1);
        let frame = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
        sink.show(&frame).unwrap();
        // Rate-limited: the second frame inside the interval is skipped.
        sink.show(&RgbImage::new(8, 4)).unwrap();
        assert_eq!(sink.written(), 1);
        assert!(sink.poll_stop_requested());

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.get_pixel(3, 2), &Rgb([10, 20, 30]));
        std::fs::remove_file(&path).ok();
    }
}
