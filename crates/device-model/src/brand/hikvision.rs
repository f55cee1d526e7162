//! Hikvision-style addressing.
//!
//! Live: `.../Streaming/Channels/{id}` where `id = n * 100 + code`, `code` being
//! `1` for the main stream and `2` for the substream (101, 102, 201, ...).
//! Playback: `.../Streaming/tracks/{id}?starttime=...&endtime=...`.

use std::sync::OnceLock;

use regex::Regex;

use super::{channel_numbers, splice_query, StreamKind};
use crate::device::{ChannelDescriptor, DeviceDescriptor};
use crate::window::{format_compact, TimeWindow};

fn channel_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"Streaming/Channels/(\d+)").unwrap())
}

/// Protocol channel id for 1-indexed channel `n`.
pub fn channel_id(n: u32, kind: StreamKind) -> u32 {
    let code = match kind {
        StreamKind::Main => 1,
        StreamKind::Sub => 2,
    };
    n.saturating_mul(100).saturating_add(code)
}

/// Whether `address` carries a `Streaming/Channels/{id}` token.
pub fn has_channel_token(address: &str) -> bool {
    channel_token().is_match(address)
}

/// The channel id embedded in `address`, if any.
pub fn embedded_channel_id(address: &str) -> Option<u32> {
    channel_token()
        .captures(address)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn expand(
    device: &DeviceDescriptor,
    max_channels: usize,
    kind: StreamKind,
) -> Vec<ChannelDescriptor> {
    let base = device.base_address();
    let Some(token) = channel_token().find(base) else {
        return vec![device.clone()];
    };

    channel_numbers(max_channels)
        .map(|n| {
            let address = format!(
                "{}Streaming/Channels/{}{}",
                &base[..token.start()],
                channel_id(n, kind),
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
    let Some(caps) = channel_token().captures(base) else {
        return live_address(device);
    };
    let (Some(token), Some(id)) = (caps.get(0), caps.get(1)) else {
        return live_address(device);
    };

    let segment = format!(
        "Streaming/tracks/{}?starttime={}&endtime={}",
        id.as_str(),
        format_compact(&window.start()),
        format_compact(&window.end())
    );
    splice_query(&base[..token.start()], &segment, &base[token.end()..])
}
