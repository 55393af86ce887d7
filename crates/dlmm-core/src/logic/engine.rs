//! # Engine Facade
//!
//! Public operation surface. Every mutating operation follows the same
//! sequence:
//!
//! 1. open a [`WorkUnit`] over the caller's store
//! 2. run the transition against the unit's working set
//! 3. hand the settlement to the caller's [`TokenTransfer`]
//! 4. commit
//!
//! Any failure before step 4 drops the unit, so the store is left exactly as
//! it was. The engine holds configuration only; store and transfer are
//! passed on every call.

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::constants::{BIN_ARRAY_SIZE, MAX_BIN_ID, MIN_BIN_ID};
use crate::error::{DlmmError, DlmmResult};
use crate::state::{
    bin_array_index, derive_bin_array_key, derive_pool_key, derive_position_key, Address, Bin,
    BinArray, Pool, PoolKey, Position, RecordKey,
};
use crate::store::{load_record, AccountStore};
use crate::transfer::{Settlement, TokenTransfer};

use super::liquidity::{
    self, AddLiquidityParams, AddLiquidityResult, RemoveLiquidityParams, RemoveLiquidityResult,
};
use super::swap::{execute_swap, SwapParams, SwapQuote, SwapResult};
use super::unit_of_work::WorkUnit;

/// Parameters for pool creation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InitializePoolParams {
    pub token_x: Address,
    pub token_y: Address,
    pub bin_step: u16,
    /// Starting active bin
    #[serde(default)]
    pub active_bin_id: i32,
    /// Swap fee; the configured default when absent
    #[serde(default)]
    pub base_fee_bps: Option<u16>,
}

impl InitializePoolParams {
    pub fn new(token_x: Address, token_y: Address, bin_step: u16) -> Self {
        Self {
            token_x,
            token_y,
            bin_step,
            active_bin_id: 0,
            base_fee_bps: None,
        }
    }
}

/// Settlement engine for a discretized liquidity market maker
#[derive(Debug, Clone, Default)]
pub struct DlmmEngine {
    config: EngineConfig,
}

impl DlmmEngine {
    /// Create an engine with a validated configuration
    pub fn new(config: EngineConfig) -> DlmmResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Create a pool record
    pub fn initialize_pool<S: AccountStore + ?Sized>(
        &self,
        store: &mut S,
        params: &InitializePoolParams,
    ) -> DlmmResult<PoolKey> {
        let fee = params.base_fee_bps.unwrap_or(self.config.default_fee_bps);
        let pool = Pool::new(
            params.token_x,
            params.token_y,
            params.bin_step,
            fee,
            params.active_bin_id,
        )?;
        let key = pool.key();

        let mut unit = WorkUnit::new(store);
        if unit.pool_exists(&key) {
            return Err(DlmmError::PoolAlreadyExists);
        }
        unit.stage_pool(pool);
        unit.commit()?;

        info!(
            token_x = ?params.token_x,
            token_y = ?params.token_y,
            bin_step = params.bin_step,
            base_fee_bps = fee,
            active_bin_id = params.active_bin_id,
            "Pool initialized"
        );
        Ok(key)
    }

    /// Create an empty bin array
    pub fn initialize_bin_array<S: AccountStore + ?Sized>(
        &self,
        store: &mut S,
        pool: &PoolKey,
        index: i32,
    ) -> DlmmResult<()> {
        let lower = index
            .checked_mul(BIN_ARRAY_SIZE as i32)
            .ok_or(DlmmError::BinOutOfRange(i32::MAX))?;
        let upper = lower
            .checked_add(BIN_ARRAY_SIZE as i32 - 1)
            .ok_or(DlmmError::BinOutOfRange(lower))?;
        if upper < MIN_BIN_ID || lower > MAX_BIN_ID {
            return Err(DlmmError::BinOutOfRange(lower));
        }

        let mut unit = WorkUnit::new(store);
        let mut pool_state = unit.load_pool(pool)?;
        let key = derive_bin_array_key(pool, index);
        if unit.bin_array_exists(&key) {
            return Err(DlmmError::BinArrayAlreadyExists(index));
        }
        unit.stage_bin_array(BinArray::new(*pool, index));
        pool_state.register_bin_array(index);
        unit.stage_pool(pool_state);
        unit.commit()?;

        info!(index, lower_bin_id = lower, "Bin array initialized");
        Ok(())
    }

    // ========================================================================
    // Liquidity
    // ========================================================================

    /// Deposit into bins around the active bin
    pub fn add_liquidity<S, T>(
        &self,
        store: &mut S,
        transfer: &mut T,
        pool: &PoolKey,
        params: &AddLiquidityParams,
    ) -> DlmmResult<AddLiquidityResult>
    where
        S: AccountStore + ?Sized,
        T: TokenTransfer + ?Sized,
    {
        let mut unit = WorkUnit::new(store);
        let result = liquidity::add_liquidity(&mut unit, &self.config, pool, params)?;
        settle(transfer, pool, &params.owner, &result.settlement)?;
        unit.commit()?;

        info!(
            owner = ?params.owner,
            amount_x = result.amount_x,
            amount_y = result.amount_y,
            bins = result.deposits.len(),
            "Add liquidity complete"
        );
        Ok(result)
    }

    /// Burn shares from the owner's position; `caller` must be the owner
    pub fn remove_liquidity<S, T>(
        &self,
        store: &mut S,
        transfer: &mut T,
        pool: &PoolKey,
        caller: &Address,
        params: &RemoveLiquidityParams,
    ) -> DlmmResult<RemoveLiquidityResult>
    where
        S: AccountStore + ?Sized,
        T: TokenTransfer + ?Sized,
    {
        let mut unit = WorkUnit::new(store);
        let result = liquidity::remove_liquidity(&mut unit, &self.config, pool, caller, params)
            .map_err(|e| {
                if let DlmmError::InsufficientShares {
                    bin_id,
                    requested,
                    available,
                } = &e
                {
                    warn!(bin_id, requested, available, "Remove liquidity rejected");
                }
                e
            })?;
        settle(transfer, pool, caller, &result.settlement)?;
        unit.commit()?;

        info!(
            owner = ?params.owner,
            amount_x = result.amount_x,
            amount_y = result.amount_y,
            bins = result.withdrawals.len(),
            position_closed = result.position_closed,
            "Remove liquidity complete"
        );
        Ok(result)
    }

    // ========================================================================
    // Swap
    // ========================================================================

    /// Execute a swap, failing unless at least `min_amount_out` is produced
    pub fn swap<S, T>(
        &self,
        store: &mut S,
        transfer: &mut T,
        pool: &PoolKey,
        params: &SwapParams,
    ) -> DlmmResult<SwapResult>
    where
        S: AccountStore + ?Sized,
        T: TokenTransfer + ?Sized,
    {
        let limit = self.config.walk_limit(params.max_bins);
        let mut unit = WorkUnit::new(store);
        let mut pool_state = unit.load_pool(pool)?;

        let quote = execute_swap(
            &mut unit,
            &mut pool_state,
            params.amount_in,
            params.swap_for_y,
            limit,
        )
        .map_err(|e| {
            if let DlmmError::InsufficientLiquidity { requested, filled } = &e {
                warn!(requested, filled, "Swap ran out of liquidity");
            }
            e
        })?;

        if quote.amount_out < params.min_amount_out {
            warn!(
                min_amount_out = params.min_amount_out,
                amount_out = quote.amount_out,
                "Swap slippage exceeded"
            );
            return Err(DlmmError::SlippageExceeded {
                min_amount_out: params.min_amount_out,
                amount_out: quote.amount_out,
            });
        }

        let result = SwapResult::from_quote(quote, params.swap_for_y);
        unit.stage_pool(pool_state);
        settle(transfer, pool, &params.trader, &result.settlement)?;
        unit.commit()?;

        info!(
            trader = ?params.trader,
            swap_for_y = params.swap_for_y,
            amount_in = result.amount_in,
            amount_out = result.amount_out,
            fee = result.fee,
            active_bin_id = result.end_bin_id,
            bins_visited = result.bins_visited,
            "Swap complete"
        );
        Ok(result)
    }

    /// Run the swap walk against current state without writing anything
    pub fn quote_swap<S: AccountStore + ?Sized>(
        &self,
        store: &S,
        pool: &PoolKey,
        amount_in: u64,
        swap_for_y: bool,
        max_bins: Option<u32>,
    ) -> DlmmResult<SwapQuote> {
        let limit = self.config.walk_limit(max_bins);
        let mut unit = WorkUnit::read_only(store);
        let mut pool_state = unit.load_pool(pool)?;
        execute_swap(&mut unit, &mut pool_state, amount_in, swap_for_y, limit)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn pool<S: AccountStore + ?Sized>(&self, store: &S, pool: &PoolKey) -> DlmmResult<Pool> {
        load_record::<Pool, S>(store, &RecordKey::Pool(*pool))?.ok_or(DlmmError::PoolNotFound)
    }

    /// Bin state; bins in arrays that were never created read as empty
    pub fn bin<S: AccountStore + ?Sized>(
        &self,
        store: &S,
        pool: &PoolKey,
        bin_id: i32,
    ) -> DlmmResult<Bin> {
        self.pool(store, pool)?;
        let key = RecordKey::BinArray(derive_bin_array_key(pool, bin_array_index(bin_id)));
        match load_record::<BinArray, S>(store, &key)? {
            Some(array) => array.get_bin(bin_id).copied(),
            None => Ok(Bin::default()),
        }
    }

    pub fn position<S: AccountStore + ?Sized>(
        &self,
        store: &S,
        pool: &PoolKey,
        owner: &Address,
    ) -> DlmmResult<Option<Position>> {
        load_record::<Position, S>(store, &RecordKey::Position(derive_position_key(pool, owner)))
    }

    /// Key of the pool trading `token_x` against `token_y`
    pub fn pool_key(&self, token_x: &Address, token_y: &Address) -> PoolKey {
        derive_pool_key(token_x, token_y)
    }
}

/// Apply a settlement through the transfer collaborator
fn settle<T: TokenTransfer + ?Sized>(
    transfer: &mut T,
    pool: &PoolKey,
    owner: &Address,
    settlement: &Settlement,
) -> DlmmResult<()> {
    if settlement.is_zero() {
        return Ok(());
    }
    transfer.settle(pool, owner, settlement).map_err(|e| {
        warn!(owner = ?owner, error = %e, "Settlement rejected");
        DlmmError::TransferFailed(e.to_string())
    })
}
