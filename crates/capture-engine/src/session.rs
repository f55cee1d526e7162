//! Viewing session management.

use std::sync::Arc;

use dvrgrid_common::clock::SessionClock;
use dvrgrid_common::config::ViewerConfig;
use dvrgrid_common::error::{GridError, GridResult};
use dvrgrid_device_model::{
    build_address, expand_all_with_hint, redact, ChannelCountHint, DeviceDescriptor, PlaybackMode,
};
use dvrgrid_render_engine::compositor::GridCompositor;
use image::RgbImage;
use tokio::time::MissedTickBehavior;

use crate::display::FrameSink;
use crate::pool::{ChannelSpec, ShutdownReport, WorkerPool};
use crate::stop::StopSignal;
use crate::transport::StreamTransport;
use crate::worker::WorkerSettings;

/// Channels selected for a session, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPlan {
    /// Channels that get a worker.
    pub channels: Vec<ChannelSpec>,
    /// Channels beyond the tile cap; never started.
    pub skipped: Vec<String>,
}

/// Expand `devices`, build one address per channel for `mode`, and cap the
/// result at `viewer.max_tiles`.
pub fn plan_channels(
    devices: &[DeviceDescriptor],
    mode: &PlaybackMode,
    viewer: &ViewerConfig,
    hint: &dyn ChannelCountHint,
) -> SessionPlan {
    let expanded =
        expand_all_with_hint(devices, viewer.use_substream, viewer.max_channels, hint);

    let mut plan = SessionPlan::default();
    for channel in expanded {
        if plan.channels.len() >= viewer.max_tiles {
            plan.skipped.push(channel.name().to_string());
            continue;
        }
        let address = build_address(&channel, mode);
        tracing::debug!(channel = %channel.name(), address = %redact(&address), "Planned channel");
        plan.channels.push(ChannelSpec::new(channel.name(), address));
    }

    if !plan.skipped.is_empty() {
        tracing::warn!(
            max_tiles = viewer.max_tiles,
            skipped = plan.skipped.len(),
            first_skipped = %plan.skipped[0],
            "Channel count exceeds tile cap; extra channels not started"
        );
    }
    plan
}

/// State of a viewing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no workers yet.
    Idle,
    /// Workers running, compositor ticking.
    Running,
    /// Workers stopped and joined (or detached).
    Stopped,
}

/// Why the tick loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The presentation sink asked to stop.
    SinkRequested,
    /// The shared stop signal was raised (Ctrl+C or another caller).
    Signalled,
    /// Every worker reached its terminal state.
    AllChannelsStopped,
}

/// Summary of one [`ViewerSession::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub reason: StopReason,
    pub shutdown: ShutdownReport,
}

/// A viewing session: one worker per channel plus the compositor loop.
pub struct ViewerSession {
    viewer: ViewerConfig,
    mode: PlaybackMode,
    transport: Arc<dyn StreamTransport>,
    compositor: GridCompositor,
    state: SessionState,
    clock: Option<SessionClock>,
    pool: Option<WorkerPool>,
    stop: StopSignal,
}

impl ViewerSession {
    pub fn new(
        viewer: ViewerConfig,
        mode: PlaybackMode,
        transport: Arc<dyn StreamTransport>,
    ) -> GridResult<Self> {
        viewer.validate()?;
        let compositor = GridCompositor::new(viewer.cell_width, viewer.cell_height, viewer.max_tiles);
        Ok(Self {
            viewer,
            mode,
            transport,
            compositor,
            state: SessionState::Idle,
            clock: None,
            pool: None,
            stop: StopSignal::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> &PlaybackMode {
        &self.mode
    }

    /// Shared stop signal. Raising it stops every worker and ends
    /// [`ViewerSession::run`] at the next tick.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Plan against this session's mode and viewer settings.
    pub fn plan(&self, devices: &[DeviceDescriptor], hint: &dyn ChannelCountHint) -> SessionPlan {
        plan_channels(devices, &self.mode, &self.viewer, hint)
    }

    /// Start one worker per planned channel.
    pub fn start(&mut self, plan: SessionPlan) -> GridResult<()> {
        if self.state != SessionState::Idle {
            return Err(GridError::session("Session already started"));
        }
        if plan.channels.is_empty() {
            return Err(GridError::session("No channels to view"));
        }

        let clock = SessionClock::start();
        tracing::info!(
            channels = plan.channels.len(),
            live = self.mode.is_live(),
            epoch_wall = %clock.epoch_wall(),
            "Starting viewer session"
        );

        let settings = WorkerSettings::from_viewer(&self.viewer, self.mode.is_live());
        let pool = WorkerPool::start_with_stop(
            plan.channels,
            self.transport.clone(),
            settings,
            self.stop.clone(),
        )?;

        self.pool = Some(pool);
        self.clock = Some(clock);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Compose one wall from the current slot values.
    pub fn compose_tick(&self) -> GridResult<RgbImage> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| GridError::session("Session not running"))?;
        Ok(self.compositor.compose(&pool.tiles()))
    }

    /// [`ViewerSession::compose_tick`] on the blocking pool, so scaling
    /// frames never stalls other tasks on the runtime.
    async fn compose_off_runtime(&self) -> GridResult<RgbImage> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| GridError::session("Session not running"))?;
        let tiles = pool.tiles();
        let compositor = self.compositor.clone();
        tokio::task::spawn_blocking(move || compositor.compose(&tiles))
            .await
            .map_err(|e| GridError::session(format!("Compositor task failed: {e}")))
    }

    /// Tick the compositor at `tick_hz` until the sink asks to stop, the stop
    /// signal is raised, or every channel has stopped. Then shut the workers
    /// down and close the sink.
    pub async fn run(&mut self, sink: &mut dyn FrameSink) -> GridResult<RunSummary> {
        if self.state != SessionState::Running {
            return Err(GridError::session("Session not running"));
        }

        let outcome = self.tick_loop(sink).await;
        let shutdown = self.stop_async().await?;
        let closed = sink.close();

        let (ticks, reason) = outcome?;
        closed?;
        tracing::info!(ticks, ?reason, elapsed_secs = self.elapsed_secs(), "Viewer session ended");
        Ok(RunSummary {
            ticks,
            reason,
            shutdown,
        })
    }

    async fn tick_loop(&self, sink: &mut dyn FrameSink) -> GridResult<(u64, StopReason)> {
        let mut interval = tokio::time::interval(self.viewer.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0u64;

        loop {
            interval.tick().await;
            let wall = self.compose_off_runtime().await?;
            sink.show(&wall)?;
            ticks += 1;

            if sink.poll_stop_requested() {
                return Ok((ticks, StopReason::SinkRequested));
            }
            if self.stop.is_stopped() {
                return Ok((ticks, StopReason::Signalled));
            }
            if self.pool.as_ref().is_some_and(WorkerPool::all_stopped) {
                return Ok((ticks, StopReason::AllChannelsStopped));
            }
        }
    }

    /// Stop every worker, waiting at most `shutdown_deadline` in total.
    ///
    /// Blocks the calling thread; async callers use
    /// [`ViewerSession::stop_async`].
    pub fn stop(&mut self) -> GridResult<ShutdownReport> {
        self.begin_stop()?;
        let report = match self.pool.as_mut() {
            Some(pool) => pool.shutdown(self.viewer.shutdown_deadline()),
            None => ShutdownReport::default(),
        };
        Ok(self.finish_stop(report))
    }

    /// [`ViewerSession::stop`] without blocking the runtime thread.
    pub async fn stop_async(&mut self) -> GridResult<ShutdownReport> {
        self.begin_stop()?;
        let deadline = self.viewer.shutdown_deadline();
        let report = match self.pool.as_mut() {
            Some(pool) => pool.shutdown_async(deadline).await,
            None => ShutdownReport::default(),
        };
        Ok(self.finish_stop(report))
    }

    fn begin_stop(&self) -> GridResult<()> {
        if self.state != SessionState::Running {
            return Err(GridError::session("Session not running"));
        }
        tracing::info!("Stopping viewer session");
        Ok(())
    }

    fn finish_stop(&mut self, report: ShutdownReport) -> ShutdownReport {
        if !report.is_clean() {
            tracing::warn!(stragglers = ?report.stragglers, "Proceeding past unresponsive workers");
        }
        self.state = SessionState::Stopped;
        report
    }

    /// Seconds since [`ViewerSession::start`].
    pub fn elapsed_secs(&self) -> f64 {
        self.clock.as_ref().map(|c| c.elapsed_secs()).unwrap_or(0.0)
    }
}
