//! Bin and BinArray data structures
//!
//! A bin holds both token reserves at one fixed price plus the share supply
//! over those reserves. Bins are stored in fixed-width arrays so that one
//! state update touches a bounded number of records.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::BIN_ARRAY_SIZE;
use crate::error::{DlmmError, DlmmResult};
use crate::math::{safe_add_u128, safe_add_u64, safe_sub_u128, safe_sub_u64, SwapStep};
use crate::state::address::PoolKey;

/// Liquidity at one discrete price level
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Bin {
    pub reserve_x: u64,
    pub reserve_y: u64,
    pub total_shares: u128,
}

impl Bin {
    pub fn is_empty(&self) -> bool {
        self.total_shares == 0
    }

    /// Credit a deposit and its minted shares
    pub fn deposit(&mut self, amount_x: u64, amount_y: u64, shares: u128) -> DlmmResult<()> {
        self.reserve_x = safe_add_u64(self.reserve_x, amount_x)?;
        self.reserve_y = safe_add_u64(self.reserve_y, amount_y)?;
        self.total_shares = safe_add_u128(self.total_shares, shares)?;
        Ok(())
    }

    /// Debit a withdrawal and burn its shares
    pub fn withdraw(&mut self, amount_x: u64, amount_y: u64, shares: u128) -> DlmmResult<()> {
        self.reserve_x = safe_sub_u64(self.reserve_x, amount_x)?;
        self.reserve_y = safe_sub_u64(self.reserve_y, amount_y)?;
        self.total_shares = safe_sub_u128(self.total_shares, shares)?;
        Ok(())
    }

    /// Apply a swap step: gross input (fee included) in, output out
    pub fn apply_swap(&mut self, step: &SwapStep, swap_for_y: bool) -> DlmmResult<()> {
        if swap_for_y {
            self.reserve_x = safe_add_u64(self.reserve_x, step.amount_in)?;
            self.reserve_y = safe_sub_u64(self.reserve_y, step.amount_out)?;
        } else {
            self.reserve_y = safe_add_u64(self.reserve_y, step.amount_in)?;
            self.reserve_x = safe_sub_u64(self.reserve_x, step.amount_out)?;
        }
        Ok(())
    }
}

/// Fixed-width block of bins covering ids `[index * W, index * W + W)`
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BinArray {
    pub pool: PoolKey,
    pub index: i32,
    pub bins: Vec<Bin>,
}

impl BinArray {
    pub fn new(pool: PoolKey, index: i32) -> Self {
        Self {
            pool,
            index,
            bins: vec![Bin::default(); BIN_ARRAY_SIZE],
        }
    }

    pub fn lower_bin_id(&self) -> i32 {
        self.index * BIN_ARRAY_SIZE as i32
    }

    pub fn upper_bin_id(&self) -> i32 {
        self.lower_bin_id() + BIN_ARRAY_SIZE as i32 - 1
    }

    pub fn contains(&self, bin_id: i32) -> bool {
        (self.lower_bin_id()..=self.upper_bin_id()).contains(&bin_id)
    }

    /// Returns the slot within the array for a global bin id
    pub fn offset_for(&self, bin_id: i32) -> DlmmResult<usize> {
        if !self.contains(bin_id) {
            return Err(DlmmError::BinArrayNotFound(crate::state::bin_array_index(bin_id)));
        }
        Ok((bin_id - self.lower_bin_id()) as usize)
    }

    pub fn get_bin(&self, bin_id: i32) -> DlmmResult<&Bin> {
        let off = self.offset_for(bin_id)?;
        self.bins.get(off).ok_or_else(|| DlmmError::corrupt("bin array is short"))
    }

    pub fn get_bin_mut(&mut self, bin_id: i32) -> DlmmResult<&mut Bin> {
        let off = self.offset_for(bin_id)?;
        self.bins
            .get_mut(off)
            .ok_or_else(|| DlmmError::corrupt("bin array is short"))
    }

    /// Structural check run after decoding
    pub fn validate(&self) -> DlmmResult<()> {
        if self.bins.len() != BIN_ARRAY_SIZE {
            return Err(DlmmError::CorruptRecord(format!(
                "bin array {} holds {} bins",
                self.index,
                self.bins.len()
            )));
        }
        Ok(())
    }

    /// Iterate `(bin_id, bin)` over every slot
    pub fn iter_bins(&self) -> impl Iterator<Item = (i32, &Bin)> {
        let lower = self.lower_bin_id();
        self.bins
            .iter()
            .enumerate()
            .map(move |(k, bin)| (lower + k as i32, bin))
    }
}
