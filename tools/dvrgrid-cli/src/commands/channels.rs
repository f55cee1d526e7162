//! Print the expanded channel table.

use dvrgrid_device_model::{expand_all_with_hint, live_address, playback_address, redact, Brand};

use super::Context;

pub fn run(ctx: &Context, at: Option<&str>, duration_minutes: Option<u32>) -> anyhow::Result<()> {
    let window = at
        .map(|start| ctx.window(start, duration_minutes))
        .transpose()?;

    let mut total = 0;
    for device in &ctx.devices {
        let brand = Brand::resolve(device.name());
        let channels = expand_all_with_hint(
            std::slice::from_ref(device),
            ctx.viewer.use_substream,
            ctx.viewer.max_channels,
            &ctx.hint,
        );
        total += channels.len();
        println!("{} [{brand}] {} channel(s)", device.name(), channels.len());
        for channel in &channels {
            println!("  {:<24} {}", channel.name(), redact(&live_address(channel)));
            if let Some(window) = &window {
                println!("  {:<24} {}", "", redact(&playback_address(channel, window)));
            }
        }
    }

    println!();
    println!(
        "{total} channel(s); the wall shows at most {}.",
        ctx.viewer.max_tiles
    );
    Ok(())
}
