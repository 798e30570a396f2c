// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Controller-wide settings of the mapping engine

use derive_builder::Builder;
use net::Mac;
use net::mac::HostMacError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use thiserror::Error;

/// Sender address of the ARP probes
pub const DEFAULT_CONTROLLER_MAC: Mac = Mac([0x00, 0x00, 0x00, 0xff, 0xff, 0xfd]);
/// Seconds between two MAC table aging passes
pub const DEFAULT_AGE_INTERVAL: u32 = 600;
pub const MIN_AGE_INTERVAL: u32 = 10;
pub const MAX_AGE_INTERVAL: u32 = 1_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Bad controller MAC address {0}: {1}")]
    BadControllerMac(Mac, HostMacError),
    #[error("Aging interval out of range [{MIN_AGE_INTERVAL}, {MAX_AGE_INTERVAL}]: {0}")]
    BadAgeInterval(u32),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
    #[error("Failed to read configuration from {0}: {1}")]
    Io(String, #[source] std::io::Error),
}

/// Settings of the mapping engine. `VtnConfigBuilder` provides defaults for every field.
#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VtnConfig {
    #[builder(default = DEFAULT_CONTROLLER_MAC)]
    pub controller_mac: Mac,

    /// Probe the addresses of the hosts found active by the aging sweep
    #[builder(default = true)]
    pub host_tracking: bool,

    #[builder(default = DEFAULT_AGE_INTERVAL)]
    pub age_interval: u32,
}

impl Default for VtnConfig {
    fn default() -> Self {
        Self {
            controller_mac: DEFAULT_CONTROLLER_MAC,
            host_tracking: true,
            age_interval: DEFAULT_AGE_INTERVAL,
        }
    }
}

impl VtnConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller_mac
            .valid_host()
            .map_err(|e| ConfigError::BadControllerMac(self.controller_mac, e))?;
        if !(MIN_AGE_INTERVAL..=MAX_AGE_INTERVAL).contains(&self.age_interval) {
            return Err(ConfigError::BadAgeInterval(self.age_interval));
        }
        Ok(())
    }

    /// Parse and validate a YAML configuration. Missing fields take their default value.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: VtnConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        Self::from_yaml(&yaml)
    }
}

impl Display for VtnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(f, "VTN config")?;
        writeln!(f, "  controller mac: {}", self.controller_mac)?;
        writeln!(f, "  host tracking : {}", self.host_tracking)?;
        write!(f, "  aging interval: {}s", self.age_interval)
    }
}
