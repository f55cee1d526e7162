pub mod camera;
pub mod channels;
pub mod highlights;
pub mod list;
pub mod live;
pub mod timestamp;
mod view;

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use dvrgrid_common::config::{DvrConfig, ViewerConfig};
use dvrgrid_device_model::{DeviceDescriptor, PlaybackMode, StaticHint, TimeWindow};

use crate::ViewerArgs;

/// Everything a command needs, resolved once at startup.
pub struct Context {
    pub devices: Vec<DeviceDescriptor>,
    pub hint: StaticHint,
    pub viewer: ViewerConfig,
    pub output: ViewerArgs,
}

impl Context {
    pub fn load(path: &Path, mut viewer: ViewerConfig, args: &ViewerArgs) -> anyhow::Result<Self> {
        let dvr = DvrConfig::load(path)?;
        apply_overrides(&mut viewer, args);
        viewer.validate().context("invalid viewer settings")?;

        let devices: Vec<_> = dvr.dvrs.iter().map(DeviceDescriptor::from_record).collect();
        tracing::debug!(
            config = %path.display(),
            devices = devices.len(),
            "Loaded DVR configuration"
        );

        Ok(Self {
            devices,
            hint: StaticHint::from_config(&dvr),
            viewer,
            output: args.clone(),
        })
    }

    /// Playback length: the override, or the configured default.
    pub fn playback_duration(&self, duration_minutes: Option<u32>) -> Duration {
        match duration_minutes {
            Some(minutes) => Duration::from_secs(minutes as u64 * 60),
            None => self.viewer.playback_duration(),
        }
    }

    /// Playback window from a user-supplied start time.
    pub fn window(&self, start: &str, duration_minutes: Option<u32>) -> anyhow::Result<TimeWindow> {
        TimeWindow::parse(start, self.playback_duration(duration_minutes))
            .with_context(|| format!("bad start time '{start}'"))
    }

    /// Live mode, or playback when `at` is given.
    pub fn mode(&self, at: Option<&str>, duration_minutes: Option<u32>) -> anyhow::Result<PlaybackMode> {
        Ok(match at {
            Some(start) => PlaybackMode::Playback(self.window(start, duration_minutes)?),
            None => PlaybackMode::Live,
        })
    }
}

fn apply_overrides(viewer: &mut ViewerConfig, args: &ViewerArgs) {
    if let Some(width) = args.cell_width {
        viewer.cell_width = width;
    }
    if let Some(height) = args.cell_height {
        viewer.cell_height = height;
    }
    if let Some(max_tiles) = args.max_tiles {
        viewer.max_tiles = max_tiles;
    }
    if let Some(max_channels) = args.max_channels {
        viewer.max_channels = max_channels;
    }
    if let Some(tick_hz) = args.tick_hz {
        viewer.tick_hz = tick_hz;
    }
    if args.main_stream {
        viewer.use_substream = false;
    }
}
