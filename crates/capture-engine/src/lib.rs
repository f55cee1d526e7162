//! DvrGrid Capture Engine
//!
//! Runs a viewing session: one stream worker per channel pulling decoded
//! frames into its own slot, and a fixed-cadence compositor loop that reads
//! every slot and pushes one wall image per tick to a presentation sink.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  ViewerSession                    │
//! │  ┌──────────┐ ┌──────────┐        ┌──────────┐    │
//! │  │ Worker 1 │ │ Worker 2 │  ...   │ Worker N │    │
//! │  └────┬─────┘ └────┬─────┘        └────┬─────┘    │
//! │       ▼            ▼                   ▼          │
//! │  ┌──────────┐ ┌──────────┐        ┌──────────┐    │
//! │  │  Slot 1  │ │  Slot 2  │  ...   │  Slot N  │    │
//! │  └────┬─────┘ └────┬─────┘        └────┬─────┘    │
//! │       └────────────┼───────────────────┘          │
//! │                    ▼                              │
//! │           GridCompositor (tick)                   │
//! │                    ▼                              │
//! │               FrameSink                           │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Workers share nothing but their own slot and one stop signal. Every
//! blocking call they make is bounded, so the stop signal is observed within
//! one read timeout.

pub mod display;
pub mod pipeline;
pub mod pool;
pub mod probe;
pub mod session;
pub mod slot;
pub mod stop;
pub mod transport;
pub mod worker;

pub use display::{FrameSink, GstDisplaySink, NullSink, SnapshotSink};
pub use pipeline::GstTransport;
pub use pool::{ChannelSnapshot, ChannelSpec, ShutdownReport, WorkerPool};
pub use probe::{probe_channels, ProbeOutcome, ProbeResult, ProbeSettings};
pub use session::*;
pub use slot::{frame_slot, SlotReader, SlotSnapshot, SlotWriter};
pub use stop::StopSignal;
pub use transport::{ReadOutcome, StreamHandle, StreamTransport, TransportError};
pub use worker::{StatsSnapshot, StreamWorker, WorkerSettings, WorkerState};
