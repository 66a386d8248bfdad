//! `fermlink.toml` loading
//!
//! ```toml
//! [controller]
//! timeout_ms = 2000
//!
//! [device]
//! system_id = 255
//! ticks = 0
//! max_profiles = 4
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fermlink_connector::ControllerConfig;
use fermlink_device_mock::DeviceConfig;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub controller: ControllerConfig,
    pub device: DeviceConfig,
}

impl CliConfig {
    /// Read `path`, or fall back to defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
