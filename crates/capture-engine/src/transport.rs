//! Stream transport capability.
//!
//! The core never decodes video itself. It opens an address through a
//! [`StreamTransport`] and pulls decoded frames from the returned
//! [`StreamHandle`]. Every blocking call takes a bound so that workers can
//! observe the session stop signal with bounded latency.

use std::time::Duration;

use dvrgrid_common::error::GridError;
use dvrgrid_render_engine::VideoFrame;

use crate::stop::StopSignal;

/// Transport failures, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("endpoint refused the stream: {0}")]
    Refused(String),

    #[error("stream unavailable: {0}")]
    Unavailable(String),

    #[error("frame read failed: {0}")]
    Read(String),

    #[error("cancelled by stop signal")]
    Cancelled,
}

impl TransportError {
    /// Failures that will not heal on retry (bad address, rejected request).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidAddress(_) | Self::Refused(_))
    }
}

impl From<TransportError> for GridError {
    fn from(err: TransportError) -> Self {
        GridError::transport(err.to_string())
    }
}

/// Result of one bounded frame read.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A newly decoded frame.
    Frame(VideoFrame),
    /// No frame arrived within the timeout; the stream is still open.
    Pending,
    /// The source finished (end of a recorded range, or the server hung up
    /// cleanly).
    EndOfStream,
}

/// An open stream. Dropping the handle releases the transport resources.
pub trait StreamHandle: Send {
    /// Wait up to `timeout` for the next decoded frame.
    fn read_frame(&mut self, timeout: Duration) -> Result<ReadOutcome, TransportError>;

    /// Release the stream explicitly.
    fn close(&mut self);
}

/// Factory for stream handles.
pub trait StreamTransport: Send + Sync {
    /// Open `address`, giving up after `timeout` or once `cancel` is raised.
    fn open(
        &self,
        address: &str,
        timeout: Duration,
        cancel: &StopSignal,
    ) -> Result<Box<dyn StreamHandle>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(TransportError::InvalidAddress("x".into()).is_fatal());
        assert!(TransportError::Refused("401".into()).is_fatal());
        assert!(!TransportError::Unavailable("timeout".into()).is_fatal());
        assert!(!TransportError::Read("eof".into()).is_fatal());
        assert!(!TransportError::Cancelled.is_fatal());
    }

    #[test]
    fn test_converts_into_grid_error() {
        let err: GridError = TransportError::Refused("401 Unauthorized".into()).into();
        assert!(matches!(err, GridError::Transport { .. }));
        assert!(err.to_string().contains("401 Unauthorized"));
    }
}
