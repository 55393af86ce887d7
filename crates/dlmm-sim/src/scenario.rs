//! Scenario files: a token pair, opening balances and a list of engine steps

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dlmm_core::BinLiquidityDistribution;
use serde::{Deserialize, Deserializer, Serialize};

/// Scenario loaded from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Scenario name for logging
    #[serde(default)]
    pub name: String,

    pub tokens: TokenPair,

    /// Opening balances
    #[serde(default)]
    pub fund: Vec<Funding>,

    pub steps: Vec<Step>,
}

/// Token labels; addresses are derived from the labels
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokenPair {
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Funding {
    pub owner: String,
    #[serde(default)]
    pub amount_x: u64,
    #[serde(default)]
    pub amount_y: u64,
}

/// One engine call and the error kind it is expected to fail with, if any
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,

    /// `ErrorKind` name, e.g. `"SlippageExceeded"`
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    InitPool {
        bin_step: u16,
        #[serde(default)]
        active_bin_id: i32,
        #[serde(default)]
        base_fee_bps: Option<u16>,
    },
    InitBinArray {
        index: i32,
    },
    AddLiquidity {
        owner: String,
        amount_x: u64,
        amount_y: u64,
        distribution: Vec<BinLiquidityDistribution>,
    },
    RemoveLiquidity {
        owner: String,
        /// Principal submitting the removal; the owner when absent
        #[serde(default)]
        caller: Option<String>,
        reductions: Vec<Reduction>,
    },
    Swap {
        trader: String,
        amount_in: u64,
        #[serde(default)]
        min_amount_out: u64,
        swap_for_y: bool,
        #[serde(default)]
        max_bins: Option<u32>,
    },
    Quote {
        amount_in: u64,
        swap_for_y: bool,
        #[serde(default)]
        max_bins: Option<u32>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitPool { .. } => "init_pool",
            Self::InitBinArray { .. } => "init_bin_array",
            Self::AddLiquidity { .. } => "add_liquidity",
            Self::RemoveLiquidity { .. } => "remove_liquidity",
            Self::Swap { .. } => "swap",
            Self::Quote { .. } => "quote",
        }
    }
}

/// Shares to burn from one bin, either absolute or as a percentage of the
/// owner's holding at the time the step runs
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Reduction {
    pub bin_id: i32,
    #[serde(default, deserialize_with = "widen_shares")]
    pub shares: Option<u128>,
    #[serde(default)]
    pub percent: Option<u8>,
}

/// TOML integers are 64-bit; share counts are u128
fn widen_shares<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(u128::from))
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        Ok(scenario)
    }
}
