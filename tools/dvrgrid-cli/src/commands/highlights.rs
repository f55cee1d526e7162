//! Day highlights: every channel played back at fixed times of one day.

use anyhow::Context as _;
use dvrgrid_capture_engine::{plan_channels, StopReason};
use dvrgrid_device_model::{highlight_windows, PlaybackMode, TimeWindow};

use super::{view, Context};

pub async fn run(
    ctx: &Context,
    date: &str,
    slot: Option<usize>,
    duration_minutes: Option<u32>,
) -> anyhow::Result<()> {
    // Date and slot are checked before any worker starts.
    let windows = highlight_windows(date, ctx.playback_duration(duration_minutes))
        .with_context(|| format!("bad highlight date '{date}'"))?;
    let selected = select(&windows, slot)?;

    println!("Day highlights for {date}:");
    for (i, window) in windows.iter().enumerate() {
        println!("  {}. {}", i + 1, window.start().format("%H:%M"));
    }

    for window in selected {
        println!();
        println!("Playing highlights at {}...", window.start().format("%H:%M"));
        let mode = PlaybackMode::Playback(window);
        let plan = plan_channels(&ctx.devices, &mode, &ctx.viewer, &ctx.hint);
        if view::play(ctx, mode, plan).await? == StopReason::Signalled {
            break;
        }
    }
    Ok(())
}

/// The 1-based `slot`, or every window in order.
fn select(windows: &[TimeWindow], slot: Option<usize>) -> anyhow::Result<Vec<TimeWindow>> {
    match slot {
        None => Ok(windows.to_vec()),
        Some(n) => match n.checked_sub(1).and_then(|i| windows.get(i)) {
            Some(window) => Ok(vec![*window]),
            None => anyhow::bail!("highlight slot must be between 1 and {}, got {n}", windows.len()),
        },
    }
}
