//! # Token Settlement
//!
//! The engine never moves tokens. Each operation produces a [`Settlement`],
//! the signed change to the caller's external balances, and hands it to a
//! [`TokenTransfer`] collaborator before committing state. A rejected
//! settlement aborts the operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::state::{Address, PoolKey};

/// Change to the caller's external token balances.
///
/// Negative values are debits (tokens paid into the pool), positive values
/// are credits (tokens paid out of the pool).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub delta_x: i128,
    pub delta_y: i128,
}

impl Settlement {
    /// Caller pays `(amount_x, amount_y)` into the pool
    pub fn deposit(amount_x: u64, amount_y: u64) -> Self {
        Self {
            delta_x: -(amount_x as i128),
            delta_y: -(amount_y as i128),
        }
    }

    /// Caller receives `(amount_x, amount_y)` from the pool
    pub fn withdrawal(amount_x: u64, amount_y: u64) -> Self {
        Self {
            delta_x: amount_x as i128,
            delta_y: amount_y as i128,
        }
    }

    /// Caller pays `amount_in` of the input token and receives `amount_out`
    pub fn swap(amount_in: u64, amount_out: u64, swap_for_y: bool) -> Self {
        if swap_for_y {
            Self {
                delta_x: -(amount_in as i128),
                delta_y: amount_out as i128,
            }
        } else {
            Self {
                delta_x: amount_out as i128,
                delta_y: -(amount_in as i128),
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.delta_x == 0 && self.delta_y == 0
    }
}

/// Failures reported by a token-transfer collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Insufficient balance of {token} for {owner}: required {required}, available {available}")]
    InsufficientBalance {
        owner: Address,
        token: Address,
        required: u64,
        available: u64,
    },

    #[error("Vault for {token} cannot pay {required}")]
    VaultShortfall { token: Address, required: u64 },

    #[error("Balance overflow for {token}")]
    Overflow { token: Address },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// Applies settlements to external balances
pub trait TokenTransfer {
    fn settle(
        &mut self,
        pool: &PoolKey,
        owner: &Address,
        settlement: &Settlement,
    ) -> Result<(), TransferError>;
}

// ============================================================================
// In-Memory Ledger
// ============================================================================

/// Process-local balance book with one vault per pool and token.
///
/// Both legs are checked before either is applied.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    balances: BTreeMap<(Address, Address), u64>,
    vaults: BTreeMap<(PoolKey, Address), u64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `owner`
    pub fn fund(&mut self, owner: Address, token: Address, amount: u64) {
        let balance = self.balances.entry((owner, token)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, owner: &Address, token: &Address) -> u64 {
        self.balances.get(&(*owner, *token)).copied().unwrap_or(0)
    }

    /// Tokens held on behalf of a pool
    pub fn vault(&self, pool: &PoolKey, token: &Address) -> u64 {
        self.vaults.get(&(*pool, *token)).copied().unwrap_or(0)
    }

    /// New `(owner balance, vault balance)` after applying `delta` to the owner
    fn apply_leg(
        &self,
        pool: &PoolKey,
        owner: &Address,
        token: &Address,
        delta: i128,
    ) -> Result<(u64, u64), TransferError> {
        let balance = self.balance(owner, token);
        let vault = self.vault(pool, token);
        let magnitude =
            u64::try_from(delta.unsigned_abs()).map_err(|_| TransferError::Overflow { token: *token })?;

        if delta < 0 {
            let new_balance =
                balance
                    .checked_sub(magnitude)
                    .ok_or(TransferError::InsufficientBalance {
                        owner: *owner,
                        token: *token,
                        required: magnitude,
                        available: balance,
                    })?;
            let new_vault = vault
                .checked_add(magnitude)
                .ok_or(TransferError::Overflow { token: *token })?;
            Ok((new_balance, new_vault))
        } else {
            let new_vault = vault.checked_sub(magnitude).ok_or(TransferError::VaultShortfall {
                token: *token,
                required: magnitude,
            })?;
            let new_balance = balance
                .checked_add(magnitude)
                .ok_or(TransferError::Overflow { token: *token })?;
            Ok((new_balance, new_vault))
        }
    }
}

impl TokenTransfer for MemoryLedger {
    fn settle(
        &mut self,
        pool: &PoolKey,
        owner: &Address,
        settlement: &Settlement,
    ) -> Result<(), TransferError> {
        let (balance_x, vault_x) = self.apply_leg(pool, owner, &pool.token_x, settlement.delta_x)?;
        let (balance_y, vault_y) = self.apply_leg(pool, owner, &pool.token_y, settlement.delta_y)?;

        self.balances.insert((*owner, pool.token_x), balance_x);
        self.balances.insert((*owner, pool.token_y), balance_y);
        self.vaults.insert((*pool, pool.token_x), vault_x);
        self.vaults.insert((*pool, pool.token_y), vault_y);

        debug!(
            owner = %owner,
            delta_x = settlement.delta_x,
            delta_y = settlement.delta_y,
            "Settled"
        );
        Ok(())
    }
}

/// Records every settlement and accepts all of them
#[derive(Debug, Clone, Default)]
pub struct SettlementJournal {
    pub entries: Vec<(PoolKey, Address, Settlement)>,
}

impl SettlementJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all recorded deltas
    pub fn net(&self) -> Settlement {
        self.entries
            .iter()
            .fold(Settlement::default(), |acc, (_, _, s)| Settlement {
                delta_x: acc.delta_x + s.delta_x,
                delta_y: acc.delta_y + s.delta_y,
            })
    }
}

impl TokenTransfer for SettlementJournal {
    fn settle(
        &mut self,
        pool: &PoolKey,
        owner: &Address,
        settlement: &Settlement,
    ) -> Result<(), TransferError> {
        self.entries.push((*pool, *owner, *settlement));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::derive_pool_key;

    fn setup() -> (PoolKey, Address, MemoryLedger) {
        let pool = derive_pool_key(&Address::from_label("X"), &Address::from_label("Y"));
        let owner = Address::from_label("alice");
        let mut ledger = MemoryLedger::new();
        ledger.fund(owner, pool.token_x, 1_000);
        ledger.fund(owner, pool.token_y, 1_000);
        (pool, owner, ledger)
    }

    #[test]
    fn test_settlement_signs() {
        assert_eq!(
            Settlement::swap(10, 9, true),
            Settlement {
                delta_x: -10,
                delta_y: 9
            }
        );
        assert_eq!(
            Settlement::swap(10, 9, false),
            Settlement {
                delta_x: 9,
                delta_y: -10
            }
        );
        assert!(Settlement::default().is_zero());
    }

    #[test]
    fn test_ledger_moves_tokens_through_vault() {
        let (pool, owner, mut ledger) = setup();

        ledger.settle(&pool, &owner, &Settlement::deposit(400, 100)).unwrap();
        assert_eq!(ledger.balance(&owner, &pool.token_x), 600);
        assert_eq!(ledger.vault(&pool, &pool.token_x), 400);

        ledger.settle(&pool, &owner, &Settlement::withdrawal(400, 100)).unwrap();
        assert_eq!(ledger.balance(&owner, &pool.token_y), 1_000);
        assert_eq!(ledger.vault(&pool, &pool.token_y), 0);
    }

    #[test]
    fn test_ledger_rejects_without_partial_apply() {
        let (pool, owner, mut ledger) = setup();

        // X leg is fine, Y leg overdraws
        let err = ledger
            .settle(&pool, &owner, &Settlement::deposit(10, 5_000))
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientBalance { required: 5_000, .. }));
        assert_eq!(ledger.balance(&owner, &pool.token_x), 1_000);
        assert_eq!(ledger.vault(&pool, &pool.token_x), 0);

        let err = ledger
            .settle(&pool, &owner, &Settlement::withdrawal(1, 0))
            .unwrap_err();
        assert!(matches!(err, TransferError::VaultShortfall { required: 1, .. }));
    }

    #[test]
    fn test_journal_net() {
        let (pool, owner, _) = setup();
        let mut journal = SettlementJournal::new();
        journal.settle(&pool, &owner, &Settlement::deposit(5, 5)).unwrap();
        journal.settle(&pool, &owner, &Settlement::swap(2, 1, true)).unwrap();
        assert_eq!(
            journal.net(),
            Settlement {
                delta_x: -7,
                delta_y: -4
            }
        );
    }
}
