//! # Engine Error Types
//!
//! Every fallible engine operation returns [`DlmmError`]. Variants carry the
//! values a caller needs to retry with adjusted parameters (requested vs
//! available shares, minimum vs produced output, and so on). [`DlmmError::kind`]
//! collapses the variants onto the coarse error taxonomy.

use thiserror::Error;

/// Engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DlmmError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================

    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Invalid bin step {0}: must be in 1..={max}", max = crate::constants::MAX_BIN_STEP)]
    InvalidBinStep(u16),

    #[error("Invalid fee {0} bps: must be at most {max}", max = crate::constants::MAX_FEE_BPS)]
    InvalidFee(u16),

    #[error("Invalid distribution: {0}")]
    InvalidDistribution(&'static str),

    #[error("Rounding residue of {amount} has no destination bin")]
    RoundingResidue { amount: u64 },

    #[error("Too many entries: {actual} (max {max})")]
    TooManyEntries { actual: usize, max: usize },

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    // ========================================================================
    // Amount Errors
    // ========================================================================

    #[error("Zero amount")]
    ZeroAmount,

    #[error("Deposit into bin {bin_id} mints zero shares")]
    ZeroSharesMinted { bin_id: i32 },

    // ========================================================================
    // Liquidity and Trading Errors
    // ========================================================================

    #[error("Insufficient shares in bin {bin_id}: requested {requested}, owned {available}")]
    InsufficientShares {
        bin_id: i32,
        requested: u128,
        available: u128,
    },

    #[error("Insufficient liquidity: requested {requested}, filled {filled}")]
    InsufficientLiquidity { requested: u64, filled: u64 },

    #[error("Slippage exceeded: minimum out {min_amount_out}, produced {amount_out}")]
    SlippageExceeded { min_amount_out: u64, amount_out: u64 },

    #[error("Bin walk limit of {limit} bins exceeded")]
    BinLimitExceeded { limit: u32 },

    #[error("Bin {0} is outside the representable price range")]
    BinOutOfRange(i32),

    // ========================================================================
    // Math Errors
    // ========================================================================

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    // ========================================================================
    // Account and Authorization Errors
    // ========================================================================

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Pool not found")]
    PoolNotFound,

    #[error("Pool already exists")]
    PoolAlreadyExists,

    #[error("Bin array {0} not found")]
    BinArrayNotFound(i32),

    #[error("Bin array {0} already exists")]
    BinArrayAlreadyExists(i32),

    #[error("Position not found")]
    PositionNotFound,

    #[error("Record does not belong to this pool")]
    PoolMismatch,

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Token transfer failed: {0}")]
    TransferFailed(String),

    #[error("Read-only work unit cannot commit")]
    ReadOnlyCommit,
}

/// Result type using engine errors
pub type DlmmResult<T> = Result<T, DlmmError>;

/// Coarse error taxonomy reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfig,
    ZeroAmount,
    InsufficientShares,
    InsufficientLiquidity,
    SlippageExceeded,
    Overflow,
    BinLimitExceeded,
    Unauthorized,
    NotFound,
    Storage,
}

impl DlmmError {
    /// Map this error onto the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_)
            | Self::InvalidBinStep(_)
            | Self::InvalidFee(_)
            | Self::InvalidDistribution(_)
            | Self::RoundingResidue { .. }
            | Self::TooManyEntries { .. }
            | Self::ConfigLoad(_)
            | Self::PoolAlreadyExists
            | Self::BinArrayAlreadyExists(_) => ErrorKind::InvalidConfig,
            Self::ZeroAmount | Self::ZeroSharesMinted { .. } => ErrorKind::ZeroAmount,
            Self::InsufficientShares { .. } => ErrorKind::InsufficientShares,
            Self::InsufficientLiquidity { .. } => ErrorKind::InsufficientLiquidity,
            Self::SlippageExceeded { .. } => ErrorKind::SlippageExceeded,
            Self::MathOverflow | Self::MathUnderflow | Self::DivisionByZero => ErrorKind::Overflow,
            Self::BinLimitExceeded { .. } | Self::BinOutOfRange(_) => ErrorKind::BinLimitExceeded,
            Self::Unauthorized | Self::PoolMismatch => ErrorKind::Unauthorized,
            Self::PoolNotFound | Self::BinArrayNotFound(_) | Self::PositionNotFound => {
                ErrorKind::NotFound
            }
            Self::CorruptRecord(_) | Self::TransferFailed(_) | Self::ReadOnlyCommit => {
                ErrorKind::Storage
            }
        }
    }

    /// Create a too many entries error
    pub fn too_many_entries(actual: usize, max: usize) -> Self {
        Self::TooManyEntries { actual, max }
    }

    /// Create a corrupt record error from a decode failure
    pub fn corrupt(err: impl std::fmt::Display) -> Self {
        Self::CorruptRecord(err.to_string())
    }
}
