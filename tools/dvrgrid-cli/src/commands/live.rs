//! Live wall of every configured channel.

use dvrgrid_capture_engine::plan_channels;
use dvrgrid_device_model::PlaybackMode;

use super::{view, Context};

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    let mode = PlaybackMode::Live;
    let plan = plan_channels(&ctx.devices, &mode, &ctx.viewer, &ctx.hint);
    view::run(ctx, mode, plan).await
}
