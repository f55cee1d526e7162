//! CP Plus (Dahua OEM) addressing.
//!
//! Live: `.../cam/realmonitor?channel={n}&subtype={s}` with `s = 0` for the
//! main stream and `1` for the substream.
//! Playback: `.../cam/playback?channel={n}&subtype={s}&starttime=...&endtime=...`.
//!
//! Some CP Plus recorders are rebadged Hikvision units and publish the
//! `Streaming/Channels` grammar instead; those addresses are handled by the
//! Hikvision rules.

use std::sync::OnceLock;

use regex::Regex;

use super::{channel_numbers, hikvision, splice_query, StreamKind};
use crate::device::{ChannelDescriptor, DeviceDescriptor};
use crate::window::{format_compact, TimeWindow};

fn realmonitor_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"cam/realmonitor\?channel=(\d+)(?:&subtype=(\d+))?").unwrap()
    })
}

pub fn subtype(kind: StreamKind) -> u32 {
    match kind {
        StreamKind::Main => 0,
        StreamKind::Sub => 1,
    }
}

pub fn expand(
    device: &DeviceDescriptor,
    max_channels: usize,
    kind: StreamKind,
) -> Vec<ChannelDescriptor> {
    let base = device.base_address();
    let Some(token) = realmonitor_token().find(base) else {
        return hikvision::expand(device, max_channels, kind);
    };

    channel_numbers(max_channels)
        .map(|n| {
            let address = format!(
                "{}cam/realmonitor?channel={n}&subtype={}{}",
                &base[..token.start()],
                subtype(kind),
                &base[token.end()..]
            );
            device.for_channel(n, address)
        })
        .collect()
}

pub fn live_address(device: &DeviceDescriptor) -> String {
    device.base_address().to_string()
}

pub fn playback_address(device: &DeviceDescriptor, window: &TimeWindow) -> String {
    let base = device.base_address();
    let Some(caps) = realmonitor_token().captures(base) else {
        return hikvision::playback_address(device, window);
    };
    let (Some(token), Some(channel)) = (caps.get(0), caps.get(1)) else {
        return live_address(device);
    };
    let subtype = caps.get(2).map(|m| m.as_str()).unwrap_or("0");

    let segment = format!(
        "cam/playback?channel={}&subtype={subtype}&starttime={}&endtime={}",
        channel.as_str(),
        format_compact(&window.start()),
        format_compact(&window.end())
    );
    splice_query(&base[..token.start()], &segment, &base[token.end()..])
}
