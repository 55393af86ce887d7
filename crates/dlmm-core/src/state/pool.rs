//! Pool (pair) configuration and aggregate reserves

use std::collections::BTreeSet;
use std::ops::Bound;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::{BIN_ARRAY_SIZE, MAX_BIN_STEP, MAX_FEE_BPS};
use crate::error::{DlmmError, DlmmResult};
use crate::math::{get_price_from_id, safe_add_u64, safe_sub_u64};
use crate::state::address::{derive_pool_key, Address, PoolKey};

/// Two-token exchange pool
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Pool {
    pub token_x: Address,
    pub token_y: Address,

    /// Price increment between adjacent bins, in basis points
    pub bin_step: u16,

    /// Fee charged on the input leg of every swap, in basis points
    pub base_fee_bps: u16,

    /// Bin anchoring the current trading price
    pub active_bin_id: i32,

    /// Sum of every bin's reserve_x
    pub reserve_x: u64,

    /// Sum of every bin's reserve_y
    pub reserve_y: u64,

    /// Indexes of the bin arrays created for this pool
    pub bin_arrays: BTreeSet<i32>,
}

impl Pool {
    /// Validated pool with empty reserves
    pub fn new(
        token_x: Address,
        token_y: Address,
        bin_step: u16,
        base_fee_bps: u16,
        active_bin_id: i32,
    ) -> DlmmResult<Self> {
        if token_x == token_y {
            return Err(DlmmError::InvalidConfig("token_x and token_y must differ"));
        }
        if bin_step == 0 || bin_step > MAX_BIN_STEP {
            return Err(DlmmError::InvalidBinStep(bin_step));
        }
        if base_fee_bps > MAX_FEE_BPS {
            return Err(DlmmError::InvalidFee(base_fee_bps));
        }
        // Active bin must be priceable
        get_price_from_id(active_bin_id, bin_step)?;

        Ok(Self {
            token_x,
            token_y,
            bin_step,
            base_fee_bps,
            active_bin_id,
            reserve_x: 0,
            reserve_y: 0,
            bin_arrays: BTreeSet::new(),
        })
    }

    pub fn key(&self) -> PoolKey {
        derive_pool_key(&self.token_x, &self.token_y)
    }

    /// Q64.64 price of a bin in this pool
    pub fn price_of(&self, bin_id: i32) -> DlmmResult<u128> {
        get_price_from_id(bin_id, self.bin_step)
    }

    pub fn register_bin_array(&mut self, index: i32) {
        self.bin_arrays.insert(index);
    }

    /// First bin of the nearest created array past `index` in the walk
    /// direction: the upper bin walking down, the lower bin walking up
    pub fn next_bin_array_entry(&self, index: i32, downward: bool) -> Option<i32> {
        let width = BIN_ARRAY_SIZE as i32;
        if downward {
            self.bin_arrays
                .range(..index)
                .next_back()
                .map(|next| next * width + width - 1)
        } else {
            self.bin_arrays
                .range((Bound::Excluded(index), Bound::Unbounded))
                .next()
                .map(|next| next * width)
        }
    }

    pub fn credit_reserves(&mut self, amount_x: u64, amount_y: u64) -> DlmmResult<()> {
        self.reserve_x = safe_add_u64(self.reserve_x, amount_x)?;
        self.reserve_y = safe_add_u64(self.reserve_y, amount_y)?;
        Ok(())
    }

    pub fn debit_reserves(&mut self, amount_x: u64, amount_y: u64) -> DlmmResult<()> {
        self.reserve_x = safe_sub_u64(self.reserve_x, amount_x)?;
        self.reserve_y = safe_sub_u64(self.reserve_y, amount_y)?;
        Ok(())
    }
}
