//! DvrGrid Render Engine
//!
//! Builds one fixed-size video wall image per compositor tick from the latest
//! frame of every channel.
//!
//! # Composition
//!
//! ```text
//! slot CH1 ──► fit (scale + letterbox) ──► label ──┐
//! slot CH2 ──► fit (scale + letterbox) ──► label ──┤
//! slot CH3 ──► (no frame) placeholder ─────────────┼──► row-major grid ──► wall
//!   ...                                            │    cols = ceil(sqrt(n))
//! (padding) ──► blank cell ────────────────────────┘    rows = ceil(n / cols)
//! ```

pub mod compositor;
pub mod label;
pub mod layout;

pub use compositor::*;
pub use layout::*;

/// Decoded raster frame, 8-bit RGB.
pub type VideoFrame = image::RgbImage;
