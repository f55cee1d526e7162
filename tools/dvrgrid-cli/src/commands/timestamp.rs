//! Recorded wall: every channel plays back the same window.

use dvrgrid_capture_engine::plan_channels;
use dvrgrid_device_model::{format_compact, PlaybackMode};

use super::{view, Context};

pub async fn run(
    ctx: &Context,
    timestamp: &str,
    duration_minutes: Option<u32>,
) -> anyhow::Result<()> {
    // Rejected here, before any worker starts.
    let window = ctx.window(timestamp, duration_minutes)?;
    println!(
        "Playback window: {} .. {}",
        format_compact(&window.start()),
        format_compact(&window.end())
    );

    let mode = PlaybackMode::Playback(window);
    let plan = plan_channels(&ctx.devices, &mode, &ctx.viewer, &ctx.hint);
    view::run(ctx, mode, plan).await
}
