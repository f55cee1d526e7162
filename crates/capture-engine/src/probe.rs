//! Connectivity probe: open each channel briefly and try to decode a few
//! frames. Nothing is displayed.

use std::time::{Duration, Instant};

use dvrgrid_common::config::ViewerConfig;
use dvrgrid_device_model::redact;

use crate::pool::ChannelSpec;
use crate::stop::StopSignal;
use crate::transport::{ReadOutcome, StreamTransport, TransportError};

/// Bounds for one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub open_timeout: Duration,
    pub read_timeout: Duration,
    /// Total time allowed for reading after the stream opened.
    pub read_budget: Duration,
    /// Stop after this many frames.
    pub frames: u32,
}

impl ProbeSettings {
    pub fn from_viewer(viewer: &ViewerConfig) -> Self {
        Self {
            open_timeout: viewer.open_timeout(),
            read_timeout: viewer.read_timeout(),
            read_budget: viewer.open_timeout(),
            frames: viewer.probe_frames.max(1),
        }
    }
}

/// What a probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// At least one frame decoded.
    Frames { received: u32, width: u32, height: u32 },
    /// Opened, but no frame arrived within the budget.
    NoFrames,
    /// Could not open or read.
    Failed(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub name: String,
    pub address: String,
    pub outcome: ProbeOutcome,
    pub elapsed: Duration,
}

impl ProbeResult {
    pub fn is_reachable(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Frames { .. })
    }
}

/// Probe every channel concurrently; results keep the input order.
pub fn probe_channels(
    channels: &[ChannelSpec],
    transport: &dyn StreamTransport,
    settings: ProbeSettings,
    stop: &StopSignal,
) -> Vec<ProbeResult> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = channels
            .iter()
            .map(|channel| scope.spawn(move || probe_one(channel, transport, settings, stop)))
            .collect();

        handles
            .into_iter()
            .zip(channels)
            .map(|(handle, channel)| {
                handle.join().unwrap_or_else(|_| ProbeResult {
                    name: channel.name.clone(),
                    address: channel.address.clone(),
                    outcome: ProbeOutcome::Failed(TransportError::Read("probe panicked".into())),
                    elapsed: Duration::ZERO,
                })
            })
            .collect()
    })
}

/// Probe one channel.
pub fn probe_one(
    channel: &ChannelSpec,
    transport: &dyn StreamTransport,
    settings: ProbeSettings,
    stop: &StopSignal,
) -> ProbeResult {
    let started = Instant::now();
    let outcome = run_probe(&channel.address, transport, settings, stop);
    let elapsed = started.elapsed();

    match &outcome {
        ProbeOutcome::Frames { received, .. } => {
            tracing::debug!(channel = %channel.name, received, "Probe succeeded")
        }
        ProbeOutcome::NoFrames => {
            tracing::debug!(channel = %channel.name, "Probe opened stream but saw no frames")
        }
        ProbeOutcome::Failed(e) => tracing::debug!(
            channel = %channel.name,
            address = %redact(&channel.address),
            error = %e,
            "Probe failed"
        ),
    }

    ProbeResult {
        name: channel.name.clone(),
        address: channel.address.clone(),
        outcome,
        elapsed,
    }
}

fn run_probe(
    address: &str,
    transport: &dyn StreamTransport,
    settings: ProbeSettings,
    stop: &StopSignal,
) -> ProbeOutcome {
    let mut handle = match transport.open(address, settings.open_timeout, stop) {
        Ok(handle) => handle,
        Err(e) => return ProbeOutcome::Failed(e),
    };

    let deadline = Instant::now() + settings.read_budget;
    let mut received = 0u32;
    let mut size = (0, 0);
    let mut failure = None;

    while received < settings.frames && Instant::now() < deadline && !stop.is_stopped() {
        match handle.read_frame(settings.read_timeout) {
            Ok(ReadOutcome::Frame(frame)) => {
                received += 1;
                size = frame.dimensions();
            }
            Ok(ReadOutcome::Pending) => {}
            Ok(ReadOutcome::EndOfStream) => break,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    handle.close();

    match (received, failure) {
        (0, Some(e)) => ProbeOutcome::Failed(e),
        (0, None) => ProbeOutcome::NoFrames,
        (received, _) => ProbeOutcome::Frames {
            received,
            width: size.0,
            height: size.1,
        },
    }
}
