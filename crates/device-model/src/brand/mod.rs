//! Vendor address strategies.
//!
//! Each recorder family has its own grammar for channel addresses and for
//! time-ranged playback. [`Brand`] is the closed set of supported families;
//! [`Brand::resolve`] picks one from a free-text hint (usually the device
//! name). Adding a vendor means one new variant, one submodule and one rule in
//! [`Brand::resolve`].

use std::ops::RangeInclusive;

use dvrgrid_common::config::MAX_CHANNELS_PER_DEVICE;
use serde::{Deserialize, Serialize};

use crate::device::{ChannelDescriptor, DeviceDescriptor};
use crate::window::TimeWindow;

pub mod cpplus;
pub mod hikvision;

/// Substream selector shared by all families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Full-resolution main stream.
    Main,
    /// Reduced-bandwidth substream.
    Sub,
}

impl StreamKind {
    pub fn from_substream_flag(use_substream: bool) -> Self {
        if use_substream {
            Self::Sub
        } else {
            Self::Main
        }
    }
}

/// Channel numbers `1..=max_channels`, capped at [`MAX_CHANNELS_PER_DEVICE`].
pub(crate) fn channel_numbers(max_channels: usize) -> RangeInclusive<u32> {
    let last = u32::try_from(max_channels.min(MAX_CHANNELS_PER_DEVICE)).unwrap_or(0);
    1..=last
}

/// Supported recorder families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    /// `Streaming/Channels/{n}0{s}` live, `Streaming/tracks/...` playback.
    #[default]
    Hikvision,
    /// `cam/realmonitor?channel=n&subtype=s` live, `cam/playback?...` playback.
    CpPlus,
}

impl Brand {
    /// Resolve a strategy from a free-text hint.
    ///
    /// Matching is a case-insensitive substring search for known vendor
    /// tokens. Hints without a token fall back to [`Brand::Hikvision`], the
    /// most widely deployed family.
    pub fn resolve(hint: &str) -> Self {
        let key = hint.trim().to_lowercase();
        if key.contains("hik") {
            return Self::Hikvision;
        }
        if ["cpplus", "cp+", "cp plus", "cp-plus", "dahua"]
            .iter()
            .any(|token| key.contains(token))
        {
            return Self::CpPlus;
        }
        Self::default()
    }

    /// Short display name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hikvision => "Hikvision",
            Self::CpPlus => "CP Plus",
        }
    }

    /// Derive up to `max_channels` per-channel descriptors.
    ///
    /// A base address without a recognisable channel identifier yields the
    /// device itself as the only element.
    pub fn expand(
        &self,
        device: &DeviceDescriptor,
        max_channels: usize,
        use_substream: bool,
    ) -> Vec<ChannelDescriptor> {
        let kind = StreamKind::from_substream_flag(use_substream);
        match self {
            Self::Hikvision => hikvision::expand(device, max_channels, kind),
            Self::CpPlus => cpplus::expand(device, max_channels, kind),
        }
    }

    /// Live address for a descriptor, before credential substitution.
    pub fn live_address(&self, device: &DeviceDescriptor) -> String {
        match self {
            Self::Hikvision => hikvision::live_address(device),
            Self::CpPlus => cpplus::live_address(device),
        }
    }

    /// Playback address for `window`, before credential substitution.
    ///
    /// Falls back to the live address when the channel identifier cannot be
    /// located.
    pub fn playback_address(&self, device: &DeviceDescriptor, window: &TimeWindow) -> String {
        match self {
            Self::Hikvision => hikvision::playback_address(device, window),
            Self::CpPlus => cpplus::playback_address(device, window),
        }
    }
}

impl std::fmt::Display for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Join a rewritten segment that carries its own query string with the text
/// that followed the original token. A query already present there is folded
/// in with `&` so the address keeps a single `?`.
pub(crate) fn splice_query(before: &str, segment: &str, after: &str) -> String {
    match after.strip_prefix('?') {
        Some(rest) => format!("{before}{segment}&{rest}"),
        None => format!("{before}{segment}{after}"),
    }
}
