//! Record addressing.
//!
//! Single source of truth for how Pool, BinArray and Position records are
//! located in the account store. Derivation is pure and deterministic.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::BIN_ARRAY_SIZE;

// ============================================================================
// Record Seed Constants
// ============================================================================

pub const POOL_SEED: &[u8] = b"lb_pair";
pub const BIN_ARRAY_SEED: &[u8] = b"bin_array";
pub const POSITION_SEED: &[u8] = b"position";

// ============================================================================
// Identities
// ============================================================================

/// Opaque 32-byte identity of a token or a principal
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Address whose leading bytes spell `label`, zero padded and truncated to 32
    pub fn from_label(label: &str) -> Self {
        let mut bytes = [0u8; 32];
        let src = label.as_bytes();
        let len = src.len().min(bytes.len());
        bytes[..len].copy_from_slice(&src[..len]);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Labels are printable; raw addresses show a short hex prefix
        let trimmed: Vec<u8> = self.0.iter().copied().take_while(|b| *b != 0).collect();
        match std::str::from_utf8(&trimmed) {
            Ok(label) if !label.is_empty() && trimmed.iter().all(|b| b.is_ascii_graphic()) => {
                write!(f, "Address({})", label)
            }
            _ => write!(f, "Address({}..)", &self.to_string()[..8]),
        }
    }
}

// ============================================================================
// Record Keys
// ============================================================================

/// Key of a Pool record
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
    Serialize, Deserialize,
)]
pub struct PoolKey {
    pub token_x: Address,
    pub token_y: Address,
}

/// Key of a BinArray record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinArrayKey {
    pub pool: PoolKey,
    pub index: i32,
}

/// Key of a Position record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionKey {
    pub pool: PoolKey,
    pub owner: Address,
}

/// Any record key understood by the account store
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKey {
    Pool(PoolKey),
    BinArray(BinArrayKey),
    Position(PositionKey),
}

impl RecordKey {
    /// Stable byte address: seed followed by the key fields
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RecordKey::Pool(pool) => [POOL_SEED, &pool.token_x.0[..], &pool.token_y.0[..]].concat(),
            RecordKey::BinArray(key) => [
                BIN_ARRAY_SEED,
                &key.pool.token_x.0[..],
                &key.pool.token_y.0[..],
                &key.index.to_le_bytes()[..],
            ]
            .concat(),
            RecordKey::Position(key) => [
                POSITION_SEED,
                &key.pool.token_x.0[..],
                &key.pool.token_y.0[..],
                &key.owner.0[..],
            ]
            .concat(),
        }
    }
}

impl From<PoolKey> for RecordKey {
    fn from(key: PoolKey) -> Self {
        RecordKey::Pool(key)
    }
}

impl From<BinArrayKey> for RecordKey {
    fn from(key: BinArrayKey) -> Self {
        RecordKey::BinArray(key)
    }
}

impl From<PositionKey> for RecordKey {
    fn from(key: PositionKey) -> Self {
        RecordKey::Position(key)
    }
}

// ============================================================================
// Derivation Functions
// ============================================================================

/// Derive the pool key for a token pair
pub fn derive_pool_key(token_x: &Address, token_y: &Address) -> PoolKey {
    PoolKey {
        token_x: *token_x,
        token_y: *token_y,
    }
}

/// Derive the bin array key for an array index
pub fn derive_bin_array_key(pool: &PoolKey, index: i32) -> BinArrayKey {
    BinArrayKey { pool: *pool, index }
}

/// Derive the position key for an owner
pub fn derive_position_key(pool: &PoolKey, owner: &Address) -> PositionKey {
    PositionKey {
        pool: *pool,
        owner: *owner,
    }
}

/// Index of the bin array covering `bin_id`
pub fn bin_array_index(bin_id: i32) -> i32 {
    bin_id.div_euclid(BIN_ARRAY_SIZE as i32)
}

/// Bin array key covering `bin_id`
pub fn derive_bin_array_key_for_bin(pool: &PoolKey, bin_id: i32) -> BinArrayKey {
    derive_bin_array_key(pool, bin_array_index(bin_id))
}
