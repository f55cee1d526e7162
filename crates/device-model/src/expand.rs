//! Channel expansion: one configured DVR → one descriptor per channel.

use std::collections::HashMap;

use dvrgrid_common::config::DvrConfig;

use crate::brand::Brand;
use crate::device::{ChannelDescriptor, DeviceDescriptor};

/// Best-effort source of a device's channel count.
///
/// Implementations may consult configuration or query the device; either way
/// the answer is only a hint. `None` means "unknown".
pub trait ChannelCountHint {
    fn channel_count(&self, device: &DeviceDescriptor) -> Option<i64>;
}

/// No channel-count information; expansion uses `max_channels`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHint;

impl ChannelCountHint for NoHint {
    fn channel_count(&self, _device: &DeviceDescriptor) -> Option<i64> {
        None
    }
}

/// Channel counts declared in the DVR list, keyed by device name.
#[derive(Debug, Clone, Default)]
pub struct StaticHint {
    counts: HashMap<String, i64>,
}

impl StaticHint {
    pub fn from_config(config: &DvrConfig) -> Self {
        let counts = config
            .dvrs
            .iter()
            .filter_map(|r| r.channels.map(|c| (r.name.clone(), c)))
            .collect();
        Self { counts }
    }
}

impl ChannelCountHint for StaticHint {
    fn channel_count(&self, device: &DeviceDescriptor) -> Option<i64> {
        self.counts.get(device.name()).copied()
    }
}

/// Number of channels to derive: a positive hint clamped to `max_channels`,
/// otherwise `max_channels`.
pub fn effective_channel_count(hint: Option<i64>, max_channels: usize) -> usize {
    match hint {
        Some(n) if n > 0 => (n as u64).min(max_channels as u64) as usize,
        _ => max_channels,
    }
}

/// Expand every device in order and concatenate the results.
pub fn expand_all(
    devices: &[DeviceDescriptor],
    use_substream: bool,
    max_channels: usize,
) -> Vec<ChannelDescriptor> {
    expand_all_with_hint(devices, use_substream, max_channels, &NoHint)
}

/// [`expand_all`] with a channel-count hint per device.
pub fn expand_all_with_hint(
    devices: &[DeviceDescriptor],
    use_substream: bool,
    max_channels: usize,
    hint: &dyn ChannelCountHint,
) -> Vec<ChannelDescriptor> {
    let mut out = Vec::new();
    for device in devices {
        let brand = Brand::resolve(device.name());
        let count = effective_channel_count(hint.channel_count(device), max_channels);
        let channels = brand.expand(device, count, use_substream);
        tracing::debug!(
            device = %device.name(),
            %brand,
            channels = channels.len(),
            "Expanded device"
        );
        out.extend(channels);
    }
    out
}

/// Find a channel by name, ignoring case.
pub fn find_channel<'a>(
    channels: &'a [ChannelDescriptor],
    name: &str,
) -> Option<&'a ChannelDescriptor> {
    channels
        .iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
}
