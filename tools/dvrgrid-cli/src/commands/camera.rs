//! View one channel.

use dvrgrid_capture_engine::{ChannelSpec, SessionPlan};
use dvrgrid_device_model::{build_address, expand_all_with_hint, find_channel};

use super::{view, Context};

pub async fn run(
    ctx: &Context,
    name: &str,
    at: Option<&str>,
    duration_minutes: Option<u32>,
) -> anyhow::Result<()> {
    let mode = ctx.mode(at, duration_minutes)?;
    let channels = expand_all_with_hint(
        &ctx.devices,
        ctx.viewer.use_substream,
        ctx.viewer.max_channels,
        &ctx.hint,
    );

    let Some(channel) = find_channel(&channels, name) else {
        let available: Vec<_> = channels.iter().map(|c| c.name()).collect();
        anyhow::bail!(
            "Unknown channel '{name}'. Available: {}",
            available.join(", ")
        );
    };

    let plan = SessionPlan {
        channels: vec![ChannelSpec::new(channel.name(), build_address(channel, &mode))],
        skipped: Vec::new(),
    };
    view::run(ctx, mode, plan).await
}
