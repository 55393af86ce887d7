//! # Engine Constants
//!
//! Fixed bounds of the bin ledger. Runtime-tunable limits live in
//! [`EngineConfig`](crate::config::EngineConfig) and are validated against
//! the hard caps defined here.

// ============================================================================
// Fixed-Point Constants
// ============================================================================

/// Number of fractional bits in a Q64.64 price
pub const SCALE_OFFSET: u32 = 64;

/// 1.0 in Q64.64
pub const ONE_Q64: u128 = 1u128 << SCALE_OFFSET;

/// Basis point denominator (10000 = 100%)
pub const BASIS_POINT_MAX: u64 = 10_000;

// ============================================================================
// Bin Layout
// ============================================================================

/// Number of bins held by one bin array
pub const BIN_ARRAY_SIZE: usize = 70;

/// Lowest addressable bin id
pub const MIN_BIN_ID: i32 = -443_636;

/// Highest addressable bin id
pub const MAX_BIN_ID: i32 = 443_636;

/// Largest accepted bin step (100%)
pub const MAX_BIN_STEP: u16 = 10_000;

// ============================================================================
// Fee and Payload Caps
// ============================================================================

/// Largest accepted swap fee (10%)
pub const MAX_FEE_BPS: u16 = 1_000;

/// Hard cap on bins visited by one swap
pub const MAX_BIN_WALK: u32 = 512;

/// Hard cap on entries in one deposit distribution
pub const MAX_DISTRIBUTION_ENTRIES: usize = 2 * BIN_ARRAY_SIZE;

/// Hard cap on entries in one removal batch
pub const MAX_REMOVAL_ENTRIES: usize = 2 * BIN_ARRAY_SIZE;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_FEE_BPS: u16 = 30;
pub const DEFAULT_MAX_BIN_WALK: u32 = 64;
pub const DEFAULT_MAX_DISTRIBUTION_ENTRIES: usize = BIN_ARRAY_SIZE;
pub const DEFAULT_MAX_REMOVAL_ENTRIES: usize = BIN_ARRAY_SIZE;
