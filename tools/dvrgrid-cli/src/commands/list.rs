//! Probe every channel and list the ones that deliver frames.

use dvrgrid_capture_engine::{
    plan_channels, probe_channels, GstTransport, ProbeOutcome, ProbeSettings, StopSignal,
};
use dvrgrid_device_model::PlaybackMode;

use super::Context;

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let transport = GstTransport::new()?;

    // Probe every expanded channel, not only those that fit on the wall.
    let mut viewer = ctx.viewer.clone();
    viewer.max_tiles = usize::MAX;
    let plan = plan_channels(&ctx.devices, &PlaybackMode::Live, &viewer, &ctx.hint);

    println!("Probing {} channel(s)...", plan.channels.len());
    let results = probe_channels(
        &plan.channels,
        &transport,
        ProbeSettings::from_viewer(&ctx.viewer),
        &StopSignal::new(),
    );

    let mut reachable = 0;
    for result in &results {
        match &result.outcome {
            ProbeOutcome::Frames {
                received,
                width,
                height,
            } => {
                reachable += 1;
                println!(
                    "[OK]   {:<24} {width}x{height}, {received} frame(s) in {}ms",
                    result.name,
                    result.elapsed.as_millis()
                );
            }
            ProbeOutcome::NoFrames => {
                tracing::info!(channel = %result.name, "Opened but no frames");
            }
            ProbeOutcome::Failed(e) => {
                tracing::info!(channel = %result.name, error = %e, "Unreachable");
            }
        }
    }

    println!();
    println!("{reachable} of {} channel(s) delivering frames.", results.len());
    Ok(())
}
