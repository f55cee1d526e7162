//! DvrGrid Common Utilities
//!
//! Shared infrastructure for all DvrGrid crates:
//! - Error types and result aliases
//! - Tick pacing for the compositor loop
//! - Tracing/logging initialization
//! - Configuration loading (application settings and the DVR list)

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
