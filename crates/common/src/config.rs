//! Application configuration and the DVR list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// Upper bound on channels derived per device; keeps vendor channel ids in range.
pub const MAX_CHANNELS_PER_DEVICE: usize = 256;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Grid viewer settings.
    pub viewer: ViewerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Tunables for channel expansion, stream workers and the grid compositor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    /// Width of one grid cell in pixels.
    pub cell_width: u32,

    /// Height of one grid cell in pixels.
    pub cell_height: u32,

    /// Maximum number of channels composited (and started) at once.
    pub max_tiles: usize,

    /// Upper bound on channels derived from one DVR.
    pub max_channels: usize,

    /// Request the reduced-bandwidth substream instead of the main stream.
    pub use_substream: bool,

    /// Compositor cadence.
    pub tick_hz: u32,

    /// Default playback window length for `timestamp` mode.
    pub playback_minutes: u32,

    /// Wait between reconnect attempts.
    pub reconnect_backoff_ms: u64,

    /// Bounded wait for one frame read.
    pub read_timeout_ms: u64,

    /// Bounded wait for the transport to open an address.
    pub open_timeout_ms: u64,

    /// A streaming channel without frames for this long is treated as failed.
    pub stall_timeout_ms: u64,

    /// How long teardown waits for each worker before moving on.
    pub shutdown_deadline_ms: u64,

    /// Frames to attempt per channel when probing connectivity.
    pub probe_frames: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dvrgrid_capture_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cell_width: 640,
            cell_height: 360,
            max_tiles: 4,
            max_channels: 16,
            use_substream: true,
            tick_hz: 25,
            playback_minutes: 60,
            reconnect_backoff_ms: 2_000,
            read_timeout_ms: 500,
            open_timeout_ms: 5_000,
            stall_timeout_ms: 10_000,
            shutdown_deadline_ms: 3_000,
            probe_frames: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ViewerConfig {
    /// Reject settings that would make the session meaningless.
    pub fn validate(&self) -> GridResult<()> {
        if self.cell_width == 0 || self.cell_height == 0 {
            return Err(GridError::config(format!(
                "cell size must be non-zero, got {}x{}",
                self.cell_width, self.cell_height
            )));
        }
        if self.tick_hz == 0 {
            return Err(GridError::config("tick_hz must be at least 1"));
        }
        if self.max_tiles == 0 {
            return Err(GridError::config("max_tiles must be at least 1"));
        }
        if self.max_channels == 0 {
            return Err(GridError::config("max_channels must be at least 1"));
        }
        if self.max_channels > MAX_CHANNELS_PER_DEVICE {
            return Err(GridError::config(format!(
                "max_channels must be at most {MAX_CHANNELS_PER_DEVICE}, got {}",
                self.max_channels
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.tick_hz.max(1) as u64)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms)
    }

    pub fn playback_duration(&self) -> Duration {
        Duration::from_secs(self.playback_minutes as u64 * 60)
    }
}

impl AppConfig {
    /// Read config from the standard location.
    ///
    /// `Ok(None)` when no file exists. Callers usually fall back to
    /// [`AppConfig::default`] on both `None` and `Err`.
    pub fn try_load() -> GridResult<Option<Self>> {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config = serde_json::from_str(&content).map_err(|e| {
            GridError::config(format!("{}: {e}", config_path.display()))
        })?;
        Ok(Some(config))
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("dvrgrid").join("config.json")
}

/// One DVR entry of the `dvrs` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvrRecord {
    pub name: String,
    pub ip: String,
    pub username: String,
    pub password: String,
    pub rtsp_url: String,

    /// Optional channel-count hint for this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<i64>,
}

/// The DVR list file (`dvr_config.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvrConfig {
    pub dvrs: Vec<DvrRecord>,
}

impl DvrConfig {
    /// Read and validate a DVR list file.
    pub fn load(path: impl AsRef<Path>) -> GridResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GridError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| GridError::config(format!("{}: {}", path.display(), message_of(&e))))
    }

    /// Parse and validate DVR list JSON.
    ///
    /// Every record is decoded individually so the error names the index of
    /// the offending entry.
    pub fn parse(json: &str) -> GridResult<Self> {
        let root: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| GridError::config(format!("malformed JSON: {e}")))?;

        let entries = root
            .get("dvrs")
            .ok_or_else(|| GridError::config("missing key `dvrs`"))?
            .as_array()
            .ok_or_else(|| GridError::config("`dvrs` must be a list"))?;

        if entries.is_empty() {
            return Err(GridError::config("`dvrs` list is empty"));
        }

        let mut dvrs = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let record: DvrRecord = serde_json::from_value(entry.clone())
                .map_err(|e| GridError::config(format!("dvrs[{idx}]: {e}")))?;
            if record.name.trim().is_empty() {
                return Err(GridError::config(format!("dvrs[{idx}]: `name` is empty")));
            }
            if record.rtsp_url.trim().is_empty() {
                return Err(GridError::config(format!(
                    "dvrs[{idx}] ({}): `rtsp_url` is empty",
                    record.name
                )));
            }
            dvrs.push(record);
        }

        Ok(Self { dvrs })
    }
}

fn message_of(err: &GridError) -> String {
    match err {
        GridError::Config { message } => message.clone(),
        other => other.to_string(),
    }
}
