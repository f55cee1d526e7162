//! Device descriptors.

use serde::{Deserialize, Serialize};

use dvrgrid_common::config::DvrRecord;

/// One addressable stream endpoint.
///
/// `base_address` is an RTSP address template. It normally embeds a vendor
/// channel identifier (for example `Streaming/Channels/101`) and may carry
/// `{username}`, `{password}` and `{ip}` placeholders that are filled in when
/// the final connection address is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    name: String,
    host: String,
    username: String,
    password: String,
    base_address: String,
}

/// A descriptor derived for a single channel of a DVR.
///
/// Its name is `{base_name}-CH{n}` and its address carries exactly one channel
/// identifier for channel `n`.
pub type ChannelDescriptor = DeviceDescriptor;

impl DeviceDescriptor {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        base_address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            username: username.into(),
            password: password.into(),
            base_address: base_address.into(),
        }
    }

    /// Map one configuration record 1:1 onto a descriptor.
    pub fn from_record(record: &DvrRecord) -> Self {
        Self::new(
            &record.name,
            &record.ip,
            &record.username,
            &record.password,
            &record.rtsp_url,
        )
    }

    /// Derive the descriptor for one channel of this device.
    pub fn for_channel(&self, channel: u32, base_address: impl Into<String>) -> ChannelDescriptor {
        Self {
            name: format!("{}-CH{channel}", self.name),
            host: self.host.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            base_address: base_address.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }
}
