//! Worker pool and session behaviour against an in-memory transport.
//!
//! Addresses select a scripted behaviour:
//! - `mem://ok`          opens, then yields a frame every couple of ms
//! - `mem://down`        never opens
//! - `mem://refused`     rejected on open
//! - `mem://flaky`       first connection breaks after three frames
//! - `mem://recorded`    three frames, then end of stream
//! - `mem://idle`        opens, then never delivers a frame
//! - `mem://hang`        open ignores cancellation and blocks for seconds

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dvrgrid_capture_engine::{
    probe_channels, ChannelSpec, FrameSink, NullSink, ProbeOutcome, ProbeSettings, ReadOutcome,
    SessionPlan, SessionState, StopReason, StopSignal, StreamHandle, StreamTransport,
    TransportError, ViewerSession, WorkerPool, WorkerSettings, WorkerState,
};
use dvrgrid_common::config::ViewerConfig;
use dvrgrid_common::error::GridResult;
use dvrgrid_device_model::{PlaybackMode, TimeWindow};
use dvrgrid_render_engine::compositor::NO_FRAME_COLOR;
use image::{Rgb, RgbImage};

const CELL: (u32, u32) = (64, 36);
const LIVE_COLOR: Rgb<u8> = Rgb([0, 0, 200]);

#[derive(Default)]
struct MemTransport {
    flaky_opens: AtomicU32,
    down_opens: AtomicU32,
}

#[derive(Default)]
struct MemStream {
    remaining: Option<u32>,
    fail_after: Option<u32>,
    idle: bool,
}

impl StreamHandle for MemStream {
    fn read_frame(&mut self, _timeout: Duration) -> Result<ReadOutcome, TransportError> {
        std::thread::sleep(Duration::from_millis(2));
        if self.idle {
            return Ok(ReadOutcome::Pending);
        }
        if let Some(left) = self.fail_after.as_mut() {
            if *left == 0 {
                return Err(TransportError::Read("connection reset by peer".into()));
            }
            *left -= 1;
        }
        if let Some(left) = self.remaining.as_mut() {
            if *left == 0 {
                return Ok(ReadOutcome::EndOfStream);
            }
            *left -= 1;
        }
        Ok(ReadOutcome::Frame(RgbImage::from_pixel(CELL.0, CELL.1, LIVE_COLOR)))
    }

    fn close(&mut self) {}
}

impl StreamTransport for MemTransport {
    fn open(
        &self,
        address: &str,
        _timeout: Duration,
        cancel: &StopSignal,
    ) -> Result<Box<dyn StreamHandle>, TransportError> {
        if cancel.is_stopped() {
            return Err(TransportError::Cancelled);
        }
        let stream = match address {
            "mem://ok" => MemStream::default(),
            "mem://recorded" => MemStream {
                remaining: Some(3),
                ..MemStream::default()
            },
            "mem://idle" => MemStream {
                idle: true,
                ..MemStream::default()
            },
            "mem://flaky" => {
                let first = self.flaky_opens.fetch_add(1, Ordering::SeqCst) == 0;
                MemStream {
                    fail_after: first.then_some(3),
                    ..MemStream::default()
                }
            }
            "mem://down" => {
                self.down_opens.fetch_add(1, Ordering::SeqCst);
                return Err(TransportError::Unavailable("connection timed out".into()));
            }
            "mem://refused" => return Err(TransportError::Refused("401 Unauthorized".into())),
            "mem://hang" => {
                std::thread::sleep(Duration::from_secs(3));
                return Err(TransportError::Unavailable("gave up".into()));
            }
            other => return Err(TransportError::InvalidAddress(other.to_string())),
        };
        Ok(Box::new(stream))
    }
}

fn fast_viewer() -> ViewerConfig {
    ViewerConfig {
        cell_width: CELL.0,
        cell_height: CELL.1,
        max_tiles: 4,
        tick_hz: 50,
        reconnect_backoff_ms: 10,
        read_timeout_ms: 10,
        open_timeout_ms: 200,
        shutdown_deadline_ms: 1_000,
        ..ViewerConfig::default()
    }
}

fn plan(addresses: &[(&str, &str)]) -> SessionPlan {
    SessionPlan {
        channels: addresses
            .iter()
            .map(|(name, address)| ChannelSpec::new(*name, *address))
            .collect(),
        skipped: Vec::new(),
    }
}

/// Keeps every wall and stops after `limit` ticks.
struct RecordingSink {
    walls: Vec<RgbImage>,
    limit: usize,
    closed: bool,
}

impl RecordingSink {
    fn new(limit: usize) -> Self {
        Self {
            walls: Vec::new(),
            limit,
            closed: false,
        }
    }
}

impl FrameSink for RecordingSink {
    fn show(&mut self, frame: &RgbImage) -> GridResult<()> {
        self.walls.push(frame.clone());
        Ok(())
    }

    fn poll_stop_requested(&mut self) -> bool {
        self.walls.len() >= self.limit
    }

    fn close(&mut self) -> GridResult<()> {
        self.closed = true;
        Ok(())
    }
}

fn cell_has(wall: &RgbImage, index: u32, color: Rgb<u8>) -> bool {
    let x0 = index * CELL.0;
    (x0..x0 + CELL.0).any(|x| (0..CELL.1).any(|y| *wall.get_pixel(x, y) == color))
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[tokio::test]
async fn failing_channel_renders_placeholder_every_tick() {
    let transport = Arc::new(MemTransport::default());
    let mut session =
        ViewerSession::new(fast_viewer(), PlaybackMode::Live, transport.clone()).unwrap();
    session
        .start(plan(&[("Gate-CH1", "mem://ok"), ("Gate-CH2", "mem://down")]))
        .unwrap();
    assert_eq!(
        session.compose_tick().unwrap().dimensions(),
        (CELL.0 * 2, CELL.1)
    );

    let mut sink = RecordingSink::new(15);
    let summary = session.run(&mut sink).await.unwrap();

    assert_eq!(summary.reason, StopReason::SinkRequested);
    assert_eq!(summary.ticks, 15);
    assert!(summary.shutdown.is_clean());
    assert!(sink.closed);
    assert_eq!(session.state(), SessionState::Stopped);

    for wall in &sink.walls {
        assert_eq!(wall.dimensions(), (CELL.0 * 2, CELL.1));
        assert!(cell_has(wall, 1, NO_FRAME_COLOR));
    }
    // The healthy channel shows up regardless of its neighbour.
    assert!(sink.walls.iter().any(|wall| cell_has(wall, 0, LIVE_COLOR)));
    assert!(transport.down_opens.load(Ordering::SeqCst) >= 2);
}

#[test]
fn read_failure_reconnects_and_resumes() {
    let transport = Arc::new(MemTransport::default());
    let mut settings = WorkerSettings::from_viewer(&fast_viewer(), true);
    settings.reconnect_backoff = Duration::from_millis(5);
    let mut pool = WorkerPool::start(
        vec![ChannelSpec::new("Yard-CH1", "mem://flaky")],
        transport.clone(),
        settings,
    )
    .unwrap();

    let resumed = wait_until(Duration::from_secs(5), || {
        let stats = pool.stats()[0].1;
        stats.reconnects >= 1 && stats.frames > 3
    });
    assert!(resumed, "worker did not resume after a read failure");

    let stats = pool.stats()[0].1;
    assert_eq!(stats.read_failures, 1);
    assert_eq!(transport.flaky_opens.load(Ordering::SeqCst), 2);
    assert!(pool.snapshot()[0].slot.connected);

    let report = pool.shutdown(Duration::from_secs(2));
    assert_eq!(report.stopped, ["Yard-CH1"]);
}

#[tokio::test]
async fn refused_channel_stops_and_ends_session() {
    let mut session = ViewerSession::new(
        fast_viewer(),
        PlaybackMode::Live,
        Arc::new(MemTransport::default()),
    )
    .unwrap();
    session.start(plan(&[("Lobby", "mem://refused")])).unwrap();

    let mut sink = NullSink::with_limit(500);
    let summary = session.run(&mut sink).await.unwrap();

    assert_eq!(summary.reason, StopReason::AllChannelsStopped);
    assert!(summary.ticks < 500);
    assert_eq!(summary.shutdown.stopped, ["Lobby"]);
}

#[tokio::test]
async fn playback_ends_when_recordings_finish() {
    let window = TimeWindow::parse("2025-01-11T10:15:00Z", Duration::from_secs(60)).unwrap();
    let mut session = ViewerSession::new(
        fast_viewer(),
        PlaybackMode::Playback(window),
        Arc::new(MemTransport::default()),
    )
    .unwrap();
    session
        .start(plan(&[("A-CH1", "mem://recorded"), ("A-CH2", "mem://recorded")]))
        .unwrap();

    let mut sink = NullSink::with_limit(1_000);
    let summary = session.run(&mut sink).await.unwrap();

    assert_eq!(summary.reason, StopReason::AllChannelsStopped);
    assert_eq!(summary.shutdown.stopped.len(), 2);
    assert_eq!(sink.last_size(), Some((CELL.0 * 2, CELL.1)));
}

#[tokio::test]
async fn stop_signal_ends_run() {
    let mut session = ViewerSession::new(
        fast_viewer(),
        PlaybackMode::Live,
        Arc::new(MemTransport::default()),
    )
    .unwrap();
    session.start(plan(&[("A", "mem://ok"), ("B", "mem://down")])).unwrap();

    let stop = session.stop_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.stop();
    });

    let mut sink = NullSink::new();
    let summary = session.run(&mut sink).await.unwrap();
    assert_eq!(summary.reason, StopReason::Signalled);
    assert!(summary.shutdown.is_clean());
}

#[test]
fn shutdown_is_bounded_by_deadline() {
    let mut pool = WorkerPool::start(
        vec![
            ChannelSpec::new("ok", "mem://ok"),
            ChannelSpec::new("hang", "mem://hang"),
        ],
        Arc::new(MemTransport::default()),
        WorkerSettings::from_viewer(&fast_viewer(), true),
    )
    .unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let report = pool.shutdown(Duration::from_millis(200));
    let took = started.elapsed();

    assert!(took < Duration::from_secs(2), "shutdown took {took:?}");
    assert_eq!(report.stopped, ["ok"]);
    assert_eq!(report.stragglers, ["hang"]);
    assert!(!report.is_clean());
}

#[test]
fn channels_never_see_each_others_failures() {
    let mut pool = WorkerPool::start(
        vec![
            ChannelSpec::new("good", "mem://ok"),
            ChannelSpec::new("bad", "mem://refused"),
            ChannelSpec::new("worse", "not-a-url"),
        ],
        Arc::new(MemTransport::default()),
        WorkerSettings::from_viewer(&fast_viewer(), true),
    )
    .unwrap();

    let settled = wait_until(Duration::from_secs(5), || {
        let snap = pool.snapshot();
        snap[0].slot.frames > 0
            && snap[1].slot.state == WorkerState::Stopped
            && snap[2].slot.state == WorkerState::Stopped
    });
    assert!(settled);
    assert!(!pool.all_stopped());

    let tiles = pool.tiles();
    assert!(tiles[0].frame.is_some());
    assert_eq!(tiles[1].detail.as_deref(), Some("STOPPED"));

    pool.shutdown(Duration::from_secs(2));
}

#[tokio::test]
async fn shutdown_leaves_runtime_responsive() {
    let mut session = ViewerSession::new(
        fast_viewer(),
        PlaybackMode::Live,
        Arc::new(MemTransport::default()),
    )
    .unwrap();
    session
        .start(plan(&[("ok", "mem://ok"), ("hang", "mem://hang")]))
        .unwrap();

    let beats = Arc::new(AtomicU32::new(0));
    let counter = beats.clone();
    let heartbeat = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let mut sink = NullSink::with_limit(3);
    let summary = session.run(&mut sink).await.unwrap();
    heartbeat.abort();

    // The straggler holds shutdown for the full 1s deadline; the heartbeat
    // must keep running on this single-threaded runtime meanwhile.
    assert_eq!(summary.shutdown.stragglers, ["hang"]);
    let beats = beats.load(Ordering::SeqCst);
    assert!(beats >= 40, "runtime starved during shutdown: {beats} beats");
}

fn check_settings(read_budget: Duration) -> ProbeSettings {
    ProbeSettings {
        open_timeout: Duration::from_millis(200),
        read_timeout: Duration::from_millis(10),
        read_budget,
        frames: 3,
    }
}

#[test]
fn connectivity_check_keeps_channel_order() {
    let channels = vec![
        ChannelSpec::new("Gate-CH1", "mem://ok"),
        ChannelSpec::new("Gate-CH2", "mem://refused"),
        ChannelSpec::new("Gate-CH3", "mem://idle"),
        ChannelSpec::new("Gate-CH4", "mem://recorded"),
    ];
    let results = probe_channels(
        &channels,
        &MemTransport::default(),
        check_settings(Duration::from_millis(300)),
        &StopSignal::new(),
    );

    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Gate-CH1", "Gate-CH2", "Gate-CH3", "Gate-CH4"]);

    assert_eq!(
        results[0].outcome,
        ProbeOutcome::Frames {
            received: 3,
            width: CELL.0,
            height: CELL.1
        }
    );
    assert!(results[0].is_reachable());
    assert_eq!(
        results[1].outcome,
        ProbeOutcome::Failed(TransportError::Refused("401 Unauthorized".into()))
    );
    assert_eq!(results[2].outcome, ProbeOutcome::NoFrames);
    assert!(!results[2].is_reachable());
    assert!(matches!(
        results[3].outcome,
        ProbeOutcome::Frames { received, .. } if (1..=3).contains(&received)
    ));
}

#[test]
fn connectivity_check_stops_when_signalled() {
    let stop = StopSignal::new();
    let remote = stop.clone();
    let raiser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        remote.stop();
    });

    let started = Instant::now();
    let results = probe_channels(
        &[ChannelSpec::new("Yard-CH1", "mem://idle")],
        &MemTransport::default(),
        check_settings(Duration::from_secs(30)),
        &stop,
    );
    raiser.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results[0].outcome, ProbeOutcome::NoFrames);
}
