use std::collections::HashSet;

use serde::Deserialize;

use chanwire_core::context::MAX_CHANNEL_NAME_LEN;
use chanwire_core::error::{ChanwireError, Result};
use chanwire_core::Side;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub version: u32,

    #[serde(default)]
    pub endpoint: EndpointSection,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl HostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ChanwireError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if self.channels.is_empty() {
            return Err(ChanwireError::Config("channels must not be empty".into()));
        }

        self.endpoint.validate()?;

        let mut seen = HashSet::new();
        for ch in &self.channels {
            ch.validate()?;
            if !seen.insert(ch.name.as_str()) {
                return Err(ChanwireError::Config(format!(
                    "channel {} declared twice",
                    ch.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideConfig {
    Client,
    Server,
}

impl From<SideConfig> for Side {
    fn from(s: SideConfig) -> Self {
        match s {
            SideConfig::Client => Side::Client,
            SideConfig::Server => Side::Server,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    #[serde(default = "default_side")]
    pub side: SideConfig,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            side: default_side(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl EndpointSection {
    pub fn validate(&self) -> Result<()> {
        if !(16..=65536).contains(&self.queue_capacity) {
            return Err(ChanwireError::Config(
                "endpoint.queue_capacity must be between 16 and 65536".into(),
            ));
        }
        Ok(())
    }
}

fn default_side() -> SideConfig {
    SideConfig::Server
}
fn default_queue_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default)]
    pub limits: ChannelLimits,
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<()> {
        let len = self.name.chars().count();
        if len == 0 || len > MAX_CHANNEL_NAME_LEN {
            return Err(ChanwireError::Config(format!(
                "channel name `{}` must be 1..={MAX_CHANNEL_NAME_LEN} characters",
                self.name
            )));
        }
        self.limits.validate(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelLimits {
    #[serde(default = "default_max_packet_bytes")]
    pub max_packet_bytes: usize,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            max_packet_bytes: default_max_packet_bytes(),
        }
    }
}

impl ChannelLimits {
    fn validate(&self, channel: &str) -> Result<()> {
        if !(1..=1_048_576).contains(&self.max_packet_bytes) {
            return Err(ChanwireError::Config(format!(
                "channels[{channel}].limits.max_packet_bytes must be between 1 and 1048576"
            )));
        }
        Ok(())
    }
}

fn default_max_packet_bytes() -> usize {
    32767
}
