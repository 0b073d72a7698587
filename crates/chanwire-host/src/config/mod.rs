//! Host config loader (strict parsing).

pub mod schema;

use std::fs;

use chanwire_core::error::{ChanwireError, Result};

pub use schema::{ChannelConfig, ChannelLimits, EndpointSection, HostConfig, SideConfig};

pub fn load_from_file(path: &str) -> Result<HostConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ChanwireError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HostConfig> {
    let cfg: HostConfig = serde_yaml::from_str(s)
        .map_err(|e| ChanwireError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
