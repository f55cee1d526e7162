//! Shared wall runner for `live`, `timestamp`, `highlights` and `camera`.

use std::sync::Arc;
use std::time::Duration;

use dvrgrid_capture_engine::{
    FrameSink, GstDisplaySink, GstTransport, NullSink, SessionPlan, SnapshotSink, StopReason,
    ViewerSession,
};
use dvrgrid_device_model::PlaybackMode;

use super::Context;

pub async fn run(ctx: &Context, mode: PlaybackMode, plan: SessionPlan) -> anyhow::Result<()> {
    play(ctx, mode, plan).await.map(|_| ())
}

/// Run one wall to completion and report why it ended.
pub async fn play(
    ctx: &Context,
    mode: PlaybackMode,
    plan: SessionPlan,
) -> anyhow::Result<StopReason> {
    if plan.channels.is_empty() {
        anyhow::bail!("No channels to view");
    }

    let transport = Arc::new(GstTransport::new()?);
    let mut session = ViewerSession::new(ctx.viewer.clone(), mode, transport)?;

    println!("Viewing {} channel(s):", plan.channels.len());
    for channel in &plan.channels {
        println!("  {}", channel.name);
    }
    if !plan.skipped.is_empty() {
        println!(
            "  ({} more not shown; raise --max-tiles to include them)",
            plan.skipped.len()
        );
    }
    println!("Press Ctrl+C to stop...");
    println!();

    let mut sink = open_sink(ctx)?;
    session.start(plan)?;

    let stop = session.stop_signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let summary = session.run(sink.as_mut()).await;
    interrupt.abort();
    let summary = summary?;

    println!();
    match summary.reason {
        StopReason::AllChannelsStopped => println!("All channels finished."),
        StopReason::SinkRequested => println!("Display closed."),
        StopReason::Signalled => println!("Stopped."),
    }
    if !summary.shutdown.stragglers.is_empty() {
        println!(
            "Warning: {} channel(s) did not stop in time: {}",
            summary.shutdown.stragglers.len(),
            summary.shutdown.stragglers.join(", ")
        );
    }
    Ok(summary.reason)
}

fn open_sink(ctx: &Context) -> anyhow::Result<Box<dyn FrameSink>> {
    if let Some(path) = &ctx.output.snapshot {
        println!("Writing wall snapshots to {}", path.display());
        return Ok(Box::new(SnapshotSink::new(path, Duration::from_secs(1))));
    }
    if ctx.output.headless {
        return Ok(Box::new(NullSink::new()));
    }
    Ok(Box::new(GstDisplaySink::new("DvrGrid", ctx.viewer.tick_hz)?))
}
