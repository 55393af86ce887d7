//! # DLMM Core - Bin Ledger and Exchange Engine
//!
//! Settlement engine for a discretized liquidity market maker: a two-token
//! pool whose liquidity sits in discrete price bins. This crate provides:
//!
//! - Bin, BinArray, Pool and Position records with pure key derivation
//! - Q64.64 bin pricing and share mint/burn math
//! - Deposit distribution and withdrawal (LiquidityManager)
//! - The multi-bin swap walk with slippage protection (SwapEngine)
//! - Atomic application through an injected [`AccountStore`] and
//!   [`TokenTransfer`]
//!
//! The engine holds no state between calls. Every operation loads the
//! records it needs from the store and writes them back on success.

pub mod config;
pub mod constants;
pub mod error;
pub mod logic;
pub mod math;
pub mod state;
pub mod store;
pub mod transfer;

// Re-export commonly used items
pub use config::EngineConfig;
pub use constants::*;
pub use error::{DlmmError, DlmmResult, ErrorKind};
pub use logic::{
    AddLiquidityParams, AddLiquidityResult, BinDeposit, BinLiquidityDistribution,
    BinLiquidityReduction, BinWithdrawal, DlmmEngine, InitializePoolParams, RemoveLiquidityParams,
    RemoveLiquidityResult, SwapParams, SwapQuote, SwapResult,
};
pub use state::{Address, Bin, BinArray, Pool, PoolKey, Position};
pub use store::{AccountStore, MemoryStore};
pub use transfer::{MemoryLedger, Settlement, SettlementJournal, TokenTransfer, TransferError};
