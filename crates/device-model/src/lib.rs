//! DvrGrid Device Model
//!
//! Defines how one configured DVR turns into playable stream addresses:
//! - **Devices:** Immutable descriptors for one addressable stream endpoint
//! - **Brands:** Vendor address grammars, resolved from a free-text hint
//! - **Expansion:** One base descriptor → one descriptor per channel
//! - **Addresses:** Live and time-windowed playback addresses per channel
//!
//! Nothing here touches the network. Address derivation is pure so it can be
//! checked against the exact layouts real recorders expect.

pub mod address;
pub mod brand;
pub mod device;
pub mod expand;
pub mod window;

pub use address::*;
pub use brand::*;
pub use device::*;
pub use expand::*;
pub use window::*;
