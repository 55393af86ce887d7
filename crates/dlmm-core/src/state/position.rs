//! Liquidity provider positions
//!
//! A position records the shares one owner holds in each bin of one pool.
//! Only bins with a nonzero balance carry an entry.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::{DlmmError, DlmmResult};
use crate::math::safe_add_u128;
use crate::state::address::{derive_position_key, Address, PoolKey, PositionKey};

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Position {
    pub pool: PoolKey,
    pub owner: Address,
    pub shares: BTreeMap<i32, u128>,
}

impl Position {
    pub fn new(pool: PoolKey, owner: Address) -> Self {
        Self {
            pool,
            owner,
            shares: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> PositionKey {
        derive_position_key(&self.pool, &self.owner)
    }

    /// Shares held in `bin_id`, zero when absent
    pub fn shares_in(&self, bin_id: i32) -> u128 {
        self.shares.get(&bin_id).copied().unwrap_or(0)
    }

    pub fn add_shares(&mut self, bin_id: i32, amount: u128) -> DlmmResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.shares.entry(bin_id).or_insert(0);
        *entry = safe_add_u128(*entry, amount)?;
        Ok(())
    }

    /// Burn shares from a bin entry, dropping the entry once it reaches zero
    pub fn remove_shares(&mut self, bin_id: i32, amount: u128) -> DlmmResult<()> {
        let available = self.shares_in(bin_id);
        if amount > available {
            return Err(DlmmError::InsufficientShares {
                bin_id,
                requested: amount,
                available,
            });
        }
        let left = available - amount;
        if left == 0 {
            self.shares.remove(&bin_id);
        } else {
            self.shares.insert(bin_id, left);
        }
        Ok(())
    }

    /// No bin entries remain
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn lower_bin_id(&self) -> Option<i32> {
        self.shares.keys().next().copied()
    }

    pub fn upper_bin_id(&self) -> Option<i32> {
        self.shares.keys().next_back().copied()
    }
}
