//! Worker pool: one OS thread per channel, one slot per worker.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dvrgrid_common::error::{GridError, GridResult};
use dvrgrid_render_engine::compositor::Tile;

use crate::slot::{frame_slot, SlotReader, SlotSnapshot};
use crate::stop::StopSignal;
use crate::transport::StreamTransport;
use crate::worker::{StatsSnapshot, StreamWorker, WorkerSettings, WorkerState, WorkerStats};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// A channel ready to be streamed: display name plus resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub address: String,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Latest slot value of one channel.
#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub name: String,
    pub slot: SlotSnapshot,
}

impl ChannelSnapshot {
    /// Compositor input for this channel. Channels without a frame carry
    /// their worker state as placeholder detail.
    pub fn to_tile(&self) -> Tile {
        let tile = Tile::new(self.name.clone(), self.slot.frame.clone());
        if tile.frame.is_some() {
            tile
        } else {
            tile.with_detail(self.slot.state.label())
        }
    }
}

/// Outcome of [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Channels whose worker exited within the deadline.
    pub stopped: Vec<String>,
    /// Channels whose worker was still running at the deadline and was
    /// detached.
    pub stragglers: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.stragglers.is_empty()
    }
}

struct WorkerEntry {
    name: String,
    reader: SlotReader,
    stats: Arc<WorkerStats>,
    join: Option<JoinHandle<WorkerState>>,
}

/// Running workers sharing one stop signal.
pub struct WorkerPool {
    workers: Vec<WorkerEntry>,
    stop: StopSignal,
}

impl WorkerPool {
    /// Spawn one worker per channel, in order.
    pub fn start(
        channels: Vec<ChannelSpec>,
        transport: Arc<dyn StreamTransport>,
        settings: WorkerSettings,
    ) -> GridResult<Self> {
        Self::start_with_stop(channels, transport, settings, StopSignal::new())
    }

    /// [`WorkerPool::start`] with a caller-owned stop signal.
    pub fn start_with_stop(
        channels: Vec<ChannelSpec>,
        transport: Arc<dyn StreamTransport>,
        settings: WorkerSettings,
        stop: StopSignal,
    ) -> GridResult<Self> {
        let mut pool = Self {
            workers: Vec::with_capacity(channels.len()),
            stop,
        };

        for (index, channel) in channels.into_iter().enumerate() {
            let (writer, reader) = frame_slot();
            let worker = StreamWorker::new(
                channel.name.clone(),
                channel.address,
                transport.clone(),
                settings,
                writer,
                pool.stop.clone(),
            );
            let stats = worker.stats();
            // On error `pool` is dropped, which stops the workers already spawned.
            let join = std::thread::Builder::new()
                .name(format!("dvr-worker-{index}"))
                .spawn(move || worker.run())
                .map_err(|e| {
                    GridError::session(format!("Failed to spawn worker for {}: {e}", channel.name))
                })?;

            pool.workers.push(WorkerEntry {
                name: channel.name,
                reader,
                stats,
                join: Some(join),
            });
        }

        tracing::info!(workers = pool.workers.len(), "Worker pool started");
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Read every slot, in channel order.
    pub fn snapshot(&self) -> Vec<ChannelSnapshot> {
        self.workers
            .iter()
            .map(|w| ChannelSnapshot {
                name: w.name.clone(),
                slot: w.reader.snapshot(),
            })
            .collect()
    }

    /// Compositor input for the current tick.
    pub fn tiles(&self) -> Vec<Tile> {
        self.snapshot().iter().map(ChannelSnapshot::to_tile).collect()
    }

    /// True once every worker has reached [`WorkerState::Stopped`].
    pub fn all_stopped(&self) -> bool {
        self.workers
            .iter()
            .all(|w| w.reader.snapshot().state == WorkerState::Stopped)
    }

    pub fn stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.workers
            .iter()
            .map(|w| (w.name.clone(), w.stats.snapshot()))
            .collect()
    }

    /// Raise the stop signal and join workers until `deadline` has elapsed.
    /// Workers still running at the deadline are logged and detached.
    pub fn shutdown(&mut self, deadline: Duration) -> ShutdownReport {
        self.stop.stop();
        let deadline_at = Instant::now() + deadline;
        while Instant::now() < deadline_at && self.any_running() {
            std::thread::sleep(JOIN_POLL);
        }
        self.reap(deadline)
    }

    /// [`WorkerPool::shutdown`] for async callers: waits on the runtime timer
    /// instead of parking the executor thread.
    pub async fn shutdown_async(&mut self, deadline: Duration) -> ShutdownReport {
        self.stop.stop();
        let deadline_at = tokio::time::Instant::now() + deadline;
        while tokio::time::Instant::now() < deadline_at && self.any_running() {
            tokio::time::sleep(JOIN_POLL).await;
        }
        self.reap(deadline)
    }

    fn any_running(&self) -> bool {
        self.workers
            .iter()
            .any(|w| w.join.as_ref().is_some_and(|j| !j.is_finished()))
    }

    /// Join finished workers and detach the rest.
    fn reap(&mut self, deadline: Duration) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for worker in &mut self.workers {
            let Some(join) = worker.join.take() else {
                continue;
            };
            if !join.is_finished() {
                tracing::warn!(
                    channel = %worker.name,
                    deadline_ms = deadline.as_millis() as u64,
                    "Worker missed shutdown deadline; detaching"
                );
                report.stragglers.push(worker.name.clone());
                continue;
            }
            if join.join().is_err() {
                tracing::error!(channel = %worker.name, "Worker panicked");
            }
            let stats = worker.stats.snapshot();
            tracing::debug!(
                channel = %worker.name,
                frames = stats.frames,
                reconnects = stats.reconnects,
                read_failures = stats.read_failures,
                "Worker joined"
            );
            report.stopped.push(worker.name.clone());
        }

        tracing::info!(
            stopped = report.stopped.len(),
            stragglers = report.stragglers.len(),
            "Worker pool shut down"
        );
        report
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop.stop();
    }
}
