//! Engine configuration loaded from TOML

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FEE_BPS, DEFAULT_MAX_BIN_WALK, DEFAULT_MAX_DISTRIBUTION_ENTRIES,
    DEFAULT_MAX_REMOVAL_ENTRIES, MAX_BIN_WALK, MAX_DISTRIBUTION_ENTRIES, MAX_FEE_BPS,
    MAX_REMOVAL_ENTRIES,
};
use crate::error::{DlmmError, DlmmResult};

/// Runtime limits of the engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Swap fee applied to pools created without an explicit fee (basis points)
    pub default_fee_bps: u16,

    /// Maximum number of bins one swap may visit
    pub max_bin_walk: u32,

    /// Maximum entries in one deposit distribution
    pub max_distribution_entries: usize,

    /// Maximum entries in one removal batch
    pub max_removal_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_fee_bps: DEFAULT_FEE_BPS,
            max_bin_walk: DEFAULT_MAX_BIN_WALK,
            max_distribution_entries: DEFAULT_MAX_DISTRIBUTION_ENTRIES,
            max_removal_entries: DEFAULT_MAX_REMOVAL_ENTRIES,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> DlmmResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DlmmError::ConfigLoad(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            DlmmError::ConfigLoad(msg) => {
                DlmmError::ConfigLoad(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> DlmmResult<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| DlmmError::ConfigLoad(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> DlmmResult<()> {
        if self.default_fee_bps > MAX_FEE_BPS {
            return Err(DlmmError::InvalidFee(self.default_fee_bps));
        }

        if self.max_bin_walk == 0 || self.max_bin_walk > MAX_BIN_WALK {
            return Err(DlmmError::InvalidConfig("max_bin_walk must be in 1..=512"));
        }

        if self.max_distribution_entries == 0
            || self.max_distribution_entries > MAX_DISTRIBUTION_ENTRIES
        {
            return Err(DlmmError::InvalidConfig(
                "max_distribution_entries must be in 1..=140",
            ));
        }

        if self.max_removal_entries == 0 || self.max_removal_entries > MAX_REMOVAL_ENTRIES {
            return Err(DlmmError::InvalidConfig("max_removal_entries must be in 1..=140"));
        }

        Ok(())
    }

    /// Effective walk bound for a caller-supplied limit
    pub fn walk_limit(&self, requested: Option<u32>) -> u32 {
        requested.map_or(self.max_bin_walk, |n| n.min(self.max_bin_walk))
    }
}
