//! GStreamer-backed stream transport.
//!
//! Each open stream is one pipeline ending in an `appsink` that keeps only
//! the newest decoded RGB frame:
//!
//! ```text
//! rtspsrc ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink
//! ```

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use dvrgrid_common::error::{GridError, GridResult};
use dvrgrid_device_model::redact;
use dvrgrid_render_engine::VideoFrame;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use url::Url;

use crate::stop::StopSignal;
use crate::transport::{ReadOutcome, StreamHandle, StreamTransport, TransportError};

/// Bus polling slice while waiting for a pipeline to start.
const OPEN_POLL: Duration = Duration::from_millis(100);
/// RTSP jitter buffer, in milliseconds.
const RTSP_LATENCY_MS: u32 = 200;

/// How an address scheme is fed into a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Rtsp,
    Uri,
}

fn source_kind(address: &str) -> Result<SourceKind, TransportError> {
    let url = Url::parse(address)
        .map_err(|e| TransportError::InvalidAddress(format!("unparsable address: {e}")))?;
    let kind = match url.scheme() {
        "rtsp" | "rtsps" | "rtspt" | "rtspu" => SourceKind::Rtsp,
        "http" | "https" => SourceKind::Uri,
        "file" => return Ok(SourceKind::Uri),
        other => {
            return Err(TransportError::InvalidAddress(format!(
                "unsupported scheme '{other}'"
            )))
        }
    };
    if url.host_str().map_or(true, str::is_empty) {
        return Err(TransportError::InvalidAddress(format!(
            "missing host after {}://",
            url.scheme()
        )));
    }
    Ok(kind)
}

/// Launch description for `address`.
fn launch_description(address: &str) -> Result<String, TransportError> {
    let location = escape(address);
    let source = match source_kind(address)? {
        SourceKind::Rtsp => format!(
            "rtspsrc location=\"{location}\" protocols=tcp latency={RTSP_LATENCY_MS} ! decodebin"
        ),
        SourceKind::Uri => format!("uridecodebin uri=\"{location}\""),
    };
    Ok(format!(
        "{source} ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink max-buffers=1 drop=true sync=false"
    ))
}

/// Opens addresses as GStreamer decode pipelines.
#[derive(Debug, Clone, Copy)]
pub struct GstTransport {
    _private: (),
}

impl GstTransport {
    pub fn new() -> GridResult<Self> {
        init_gstreamer()?;
        Ok(Self { _private: () })
    }
}

impl StreamTransport for GstTransport {
    fn open(
        &self,
        address: &str,
        timeout: Duration,
        cancel: &StopSignal,
    ) -> Result<Box<dyn StreamHandle>, TransportError> {
        let launch = launch_description(address)?;
        let stream = GstStream::launch(&launch)?;
        stream.wait_playing(timeout, cancel)?;
        tracing::debug!(address = %redact(address), "Pipeline playing");
        Ok(Box::new(stream))
    }
}

/// One running decode pipeline.
pub struct GstStream {
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
    closed: bool,
}

impl GstStream {
    fn launch(launch: &str) -> Result<Self, TransportError> {
        let element = gst::parse::launch(launch)
            .map_err(|e| TransportError::Unavailable(format!("Failed to build pipeline: {e}")))?;
        let pipeline = element.dynamic_cast::<gst::Pipeline>().map_err(|_| {
            TransportError::Unavailable("Launch string did not produce a pipeline".into())
        })?;
        let sink = pipeline
            .by_name("sink")
            .and_then(|e| e.dynamic_cast::<gst_app::AppSink>().ok())
            .ok_or_else(|| TransportError::Unavailable("Pipeline has no appsink".into()))?;

        Ok(Self {
            pipeline,
            sink,
            closed: false,
        })
    }

    fn wait_playing(&self, timeout: Duration, cancel: &StopSignal) -> Result<(), TransportError> {
        if self.pipeline.set_state(gst::State::Playing).is_err() {
            return Err(self
                .pending_error()
                .unwrap_or_else(|| TransportError::Unavailable("Failed to start pipeline".into())));
        }

        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| TransportError::Unavailable("Pipeline has no bus".into()))?;
        let deadline = Instant::now() + timeout;

        loop {
            if cancel.is_stopped() {
                return Err(TransportError::Cancelled);
            }
            if self.pipeline.current_state() == gst::State::Playing {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Unavailable(format!(
                    "Pipeline did not start within {}ms",
                    timeout.as_millis()
                )));
            }

            let slice = (deadline - now).min(OPEN_POLL);
            let Some(msg) = bus.timed_pop(gst::ClockTime::from_nseconds(slice.as_nanos() as u64))
            else {
                continue;
            };
            match msg.view() {
                gst::MessageView::Error(err) => return Err(classify(err)),
                gst::MessageView::Eos(_) => {
                    return Err(TransportError::Unavailable(
                        "Stream ended before playing".into(),
                    ))
                }
                _ => {}
            }
        }
    }

    /// First queued error on the bus, if any.
    fn pending_error(&self) -> Option<TransportError> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => Some(classify(err)),
            _ => None,
        }
    }
}

impl StreamHandle for GstStream {
    fn read_frame(&mut self, timeout: Duration) -> Result<ReadOutcome, TransportError> {
        if self.closed {
            return Err(TransportError::Read("Stream already closed".into()));
        }

        let timeout = gst::ClockTime::from_nseconds(timeout.as_nanos() as u64);
        let Some(sample) = self.sink.try_pull_sample(timeout) else {
            if self.sink.is_eos() {
                return Ok(ReadOutcome::EndOfStream);
            }
            return match self.pending_error() {
                Some(err) => Err(TransportError::Read(err.to_string())),
                None => Ok(ReadOutcome::Pending),
            };
        };

        sample_to_frame(&sample).map(ReadOutcome::Frame)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to stop stream pipeline");
        }
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Copy an RGB sample into a tightly packed frame, dropping row padding.
fn sample_to_frame(sample: &gst::Sample) -> Result<VideoFrame, TransportError> {
    let caps = sample
        .caps()
        .ok_or_else(|| TransportError::Read("Sample has no caps".into()))?;
    let info = gst_video::VideoInfo::from_caps(caps)
        .map_err(|e| TransportError::Read(format!("Unreadable caps: {e}")))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| TransportError::Read("Sample has no buffer".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|e| TransportError::Read(format!("Failed to map buffer: {e}")))?;

    let width = info.width();
    let height = info.height();
    let stride = info.stride()[0] as usize;
    pack_rows(map.as_slice(), width, height, stride)
}

fn pack_rows(
    data: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> Result<VideoFrame, TransportError> {
    let row = width as usize * 3;
    if stride < row || data.len() < stride * (height as usize).saturating_sub(1) + row {
        return Err(TransportError::Read(format!(
            "Short buffer for {width}x{height} frame ({} bytes, stride {stride})",
            data.len()
        )));
    }

    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        pixels.extend_from_slice(&data[start..start + row]);
    }
    VideoFrame::from_raw(width, height, pixels)
        .ok_or_else(|| TransportError::Read("Frame size mismatch".into()))
}

/// Map a pipeline error onto the retry classification.
fn classify(err: &gst::message::Error) -> TransportError {
    let error = err.error();
    let detail = match err.debug() {
        Some(debug) => format!("{error} ({debug})"),
        None => error.to_string(),
    };
    match error.kind::<gst::ResourceError>() {
        Some(gst::ResourceError::NotAuthorized) | Some(gst::ResourceError::NotFound) => {
            TransportError::Refused(detail)
        }
        _ => TransportError::Unavailable(detail),
    }
}

pub(crate) fn init_gstreamer() -> GridResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(GridError::transport(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtsp_launch_description() {
        let launch = launch_description("rtsp://admin:pw@10.0.0.5:554/Streaming/Channels/102").unwrap();
        assert!(launch.starts_with(
            "rtspsrc location=\"rtsp://admin:pw@10.0.0.5:554/Streaming/Channels/102\" protocols=tcp"
        ));
        assert!(launch.contains("decodebin ! videoconvert ! video/x-raw,format=RGB"));
        assert!(launch.ends_with("appsink name=sink max-buffers=1 drop=true sync=false"));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(source_kind("RTSP://h/x").unwrap(), SourceKind::Rtsp);
        assert_eq!(source_kind("https://h/clip.mp4").unwrap(), SourceKind::Uri);
    }

    #[test]
    fn test_file_uses_uridecodebin() {
        let launch = launch_description("file:///tmp/clip.mp4").unwrap();
        assert!(launch.starts_with("uridecodebin uri=\"file:///tmp/clip.mp4\""));
    }

    #[test]
    fn test_rejects_bad_addresses() {
        for address in ["10.0.0.5/stream", "ftp://h/x", "rtsp://", "rtsp:/h/x"] {
            let err = launch_description(address).unwrap_err();
            assert!(matches!(err, TransportError::InvalidAddress(_)), "{address}");
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_invalid_address_does_not_leak_password() {
        let err = source_kind("rtsp:/admin:secret@h").unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape(r#"rtsp://h/a"b"#), r#"rtsp://h/a\"b"#);
    }

    #[test]
    fn test_pack_rows_drops_padding() {
        // 2x2 RGB with 8-byte stride (2 bytes of padding per row).
        let data = [
            1, 1, 1, 2, 2, 2, 0, 0, //
            3, 3, 3, 4, 4, 4, 0, 0,
        ];
        let frame = pack_rows(&data, 2, 2, 8).unwrap();
        assert_eq!(frame.as_raw(), &vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn test_pack_rows_rejects_short_buffer() {
        assert!(pack_rows(&[0; 10], 2, 2, 6).is_err());
    }
}
