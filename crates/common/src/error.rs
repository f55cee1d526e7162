//! Error types shared across DvrGrid crates.

use std::path::PathBuf;

/// Top-level error type for DvrGrid operations.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid time window: {message}")]
    TimeWindow { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Presentation error: {message}")]
    Presentation { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GridError.
pub type GridResult<T> = Result<T, GridError>;

impl GridError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn time_window(msg: impl Into<String>) -> Self {
        Self::TimeWindow {
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    pub fn presentation(msg: impl Into<String>) -> Self {
        Self::Presentation {
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_category() {
        assert_eq!(
            GridError::config("dvrs[0]: missing field `ip`").to_string(),
            "Configuration error: dvrs[0]: missing field `ip`"
        );
        assert!(GridError::time_window("bad")
            .to_string()
            .starts_with("Invalid time window"));
    }
}
