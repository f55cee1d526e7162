//! Per-channel stream worker.
//!
//! ```text
//!   Connecting ──ok──▶ Streaming ──read failure / stall──▶ Degraded
//!       │                  ▲                                   │
//!  fatal│                  └──────ok────── Reconnecting ◀──────┘
//!       ▼                                   │  ▲   │
//!    Stopped ◀──── stop signal (any state) ─┘  └───┘ open failed
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dvrgrid_common::config::ViewerConfig;
use dvrgrid_device_model::redact;

use crate::slot::SlotWriter;
use crate::stop::StopSignal;
use crate::transport::{ReadOutcome, StreamHandle, StreamTransport, TransportError};

/// Lifecycle of one channel worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// First open attempt in progress.
    Connecting,
    /// Reading frames.
    Streaming,
    /// Stream lost; the slot has been cleared.
    Degraded,
    /// Waiting out the backoff or re-opening.
    Reconnecting,
    /// Terminal.
    Stopped,
}

impl WorkerState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Streaming => "STREAMING",
            Self::Degraded => "DEGRADED",
            Self::Reconnecting => "RECONNECTING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Timing knobs for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub open_timeout: Duration,
    /// Upper bound on one blocking frame read; also bounds stop latency.
    pub read_timeout: Duration,
    pub reconnect_backoff: Duration,
    /// How long Streaming may go without a frame before it counts as a
    /// read failure.
    pub stall_timeout: Duration,
    /// Live addresses treat end-of-stream as a failure; playback addresses
    /// treat it as the end of the recorded window.
    pub live: bool,
}

impl WorkerSettings {
    pub fn from_viewer(viewer: &ViewerConfig, live: bool) -> Self {
        Self {
            open_timeout: viewer.open_timeout(),
            read_timeout: viewer.read_timeout(),
            reconnect_backoff: viewer.reconnect_backoff(),
            stall_timeout: viewer.stall_timeout(),
            live,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_viewer(&ViewerConfig::default(), true)
    }
}

/// Counters updated by a running worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    frames: AtomicU64,
    reconnects: AtomicU64,
    read_failures: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub reconnects: u64,
    pub read_failures: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
        }
    }
}

/// Drives one channel through the state machine until stopped.
pub struct StreamWorker {
    channel: String,
    address: String,
    transport: Arc<dyn StreamTransport>,
    settings: WorkerSettings,
    slot: SlotWriter,
    stop: StopSignal,
    stats: Arc<WorkerStats>,
    handle: Option<Box<dyn StreamHandle>>,
    last_frame: Instant,
}

impl StreamWorker {
    pub fn new(
        channel: impl Into<String>,
        address: impl Into<String>,
        transport: Arc<dyn StreamTransport>,
        settings: WorkerSettings,
        slot: SlotWriter,
        stop: StopSignal,
    ) -> Self {
        Self {
            channel: channel.into(),
            address: address.into(),
            transport,
            settings,
            slot,
            stop,
            stats: Arc::new(WorkerStats::default()),
            handle: None,
            last_frame: Instant::now(),
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Run until the stop signal is raised or a terminal condition is hit.
    /// Always returns [`WorkerState::Stopped`].
    pub fn run(mut self) -> WorkerState {
        tracing::info!(
            channel = %self.channel,
            address = %redact(&self.address),
            live = self.settings.live,
            "Worker started"
        );

        let mut state = WorkerState::Connecting;
        while state != WorkerState::Stopped {
            let next = if self.stop.is_stopped() {
                WorkerState::Stopped
            } else {
                self.step(state)
            };
            if next != state {
                tracing::debug!(channel = %self.channel, from = %state, to = %next, "Worker transition");
                self.slot.publish_state(next);
            }
            state = next;
        }

        self.release();
        self.slot.publish_state(WorkerState::Stopped);
        let stats = self.stats.snapshot();
        tracing::info!(
            channel = %self.channel,
            frames = stats.frames,
            reconnects = stats.reconnects,
            read_failures = stats.read_failures,
            "Worker stopped"
        );
        WorkerState::Stopped
    }

    fn step(&mut self, state: WorkerState) -> WorkerState {
        match state {
            WorkerState::Connecting => self.connect(),
            WorkerState::Streaming => self.stream(),
            WorkerState::Degraded => {
                self.slot.publish_absent(WorkerState::Degraded);
                self.release();
                WorkerState::Reconnecting
            }
            WorkerState::Reconnecting => self.reconnect(),
            WorkerState::Stopped => WorkerState::Stopped,
        }
    }

    fn connect(&mut self) -> WorkerState {
        match self.open() {
            Ok(()) => WorkerState::Streaming,
            Err(TransportError::Cancelled) => WorkerState::Stopped,
            Err(e) if e.is_fatal() => {
                tracing::error!(channel = %self.channel, error = %e, "Channel rejected; giving up");
                self.slot.publish_absent(WorkerState::Stopped);
                WorkerState::Stopped
            }
            Err(e) => {
                tracing::warn!(channel = %self.channel, error = %e, "Initial connect failed");
                WorkerState::Reconnecting
            }
        }
    }

    fn reconnect(&mut self) -> WorkerState {
        if self.stop.wait_timeout(self.settings.reconnect_backoff) {
            return WorkerState::Stopped;
        }
        let attempt = self.stats.reconnects.fetch_add(1, Ordering::Relaxed) + 1;
        match self.open() {
            Ok(()) => {
                tracing::info!(channel = %self.channel, attempt, "Reconnected");
                WorkerState::Streaming
            }
            Err(TransportError::Cancelled) => WorkerState::Stopped,
            Err(e) => {
                tracing::debug!(channel = %self.channel, attempt, error = %e, "Reconnect failed");
                WorkerState::Reconnecting
            }
        }
    }

    fn stream(&mut self) -> WorkerState {
        let Some(handle) = self.handle.as_mut() else {
            return WorkerState::Degraded;
        };

        match handle.read_frame(self.settings.read_timeout) {
            Ok(ReadOutcome::Frame(frame)) => {
                self.last_frame = Instant::now();
                self.stats.frames.fetch_add(1, Ordering::Relaxed);
                self.slot.publish_frame(frame, WorkerState::Streaming);
                WorkerState::Streaming
            }
            Ok(ReadOutcome::Pending) => {
                if self.last_frame.elapsed() >= self.settings.stall_timeout {
                    tracing::warn!(
                        channel = %self.channel,
                        stalled_ms = self.last_frame.elapsed().as_millis() as u64,
                        "Stream stalled"
                    );
                    self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                    WorkerState::Degraded
                } else {
                    WorkerState::Streaming
                }
            }
            Ok(ReadOutcome::EndOfStream) if self.settings.live => {
                tracing::warn!(channel = %self.channel, "Live stream ended");
                self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                WorkerState::Degraded
            }
            Ok(ReadOutcome::EndOfStream) => {
                tracing::info!(channel = %self.channel, "Recorded window finished");
                self.slot.publish_absent(WorkerState::Stopped);
                WorkerState::Stopped
            }
            Err(e) => {
                tracing::warn!(channel = %self.channel, error = %e, "Frame read failed");
                self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                WorkerState::Degraded
            }
        }
    }

    fn open(&mut self) -> Result<(), TransportError> {
        self.release();
        let handle =
            self.transport
                .open(&self.address, self.settings.open_timeout, &self.stop)?;
        self.handle = Some(handle);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }
}
