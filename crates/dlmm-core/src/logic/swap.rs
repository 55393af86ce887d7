//! SwapEngine: multi-bin swap walk
//!
//! The walk starts at the active bin and moves one bin at a time, jumping
//! over bin arrays that were never created:
//! - `swap_for_y = true` sells X for Y and walks toward decreasing ids
//! - `swap_for_y = false` sells Y for X and walks toward increasing ids
//!
//! Each bin trades at its fixed price. The fee is charged on the input leg
//! and stays in the bin's input-side reserve, so it accrues to the bin's
//! shareholders without minting shares.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DlmmError, DlmmResult};
use crate::math::{compute_swap_step, safe_add_u64, safe_sub_u64};
use crate::state::{derive_bin_array_key_for_bin, Address, Pool, PoolKey};
use crate::store::AccountStore;
use crate::transfer::Settlement;

use super::unit_of_work::WorkUnit;

/// Parameters for swap execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    /// Principal paying the input and receiving the output
    pub trader: Address,
    /// Amount of input token to swap (gross, fee included)
    pub amount_in: u64,
    /// Minimum amount of output token to receive
    pub min_amount_out: u64,
    /// Sell X for Y when true, Y for X when false
    pub swap_for_y: bool,
    /// Maximum number of bins to visit; capped by the engine limit
    pub max_bins: Option<u32>,
}

/// Swap state tracking during the walk
#[derive(Debug)]
struct SwapState {
    amount_remaining: u64,
    amount_out: u64,
    total_fee: u64,
    current_bin_id: i32,
    last_bin_id: i32,
    bins_visited: u32,
}

/// Outcome of a walk, before settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    /// Input actually consumed (may be below the request when dust remains)
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub start_bin_id: i32,
    pub end_bin_id: i32,
    pub bins_visited: u32,
}

/// Final swap result for transfer processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub start_bin_id: i32,
    pub end_bin_id: i32,
    pub bins_visited: u32,
    pub settlement: Settlement,
}

impl SwapResult {
    pub fn from_quote(quote: SwapQuote, swap_for_y: bool) -> Self {
        Self {
            amount_in: quote.amount_in,
            amount_out: quote.amount_out,
            fee: quote.fee,
            start_bin_id: quote.start_bin_id,
            end_bin_id: quote.end_bin_id,
            bins_visited: quote.bins_visited,
            settlement: Settlement::swap(quote.amount_in, quote.amount_out, swap_for_y),
        }
    }
}

/// Walk bins from the active bin, trading up to `amount_in`.
///
/// Mutates the bins in `unit` and the reserves and active bin of `pool`.
/// The caller decides whether to commit.
pub fn execute_swap<S: AccountStore + ?Sized>(
    unit: &mut WorkUnit<'_, S>,
    pool: &mut Pool,
    amount_in: u64,
    swap_for_y: bool,
    limit: u32,
) -> DlmmResult<SwapQuote> {
    if amount_in == 0 {
        return Err(DlmmError::ZeroAmount);
    }

    let pool_key: PoolKey = pool.key();
    let start_bin_id = pool.active_bin_id;
    let mut state = SwapState {
        amount_remaining: amount_in,
        amount_out: 0,
        total_fee: 0,
        current_bin_id: start_bin_id,
        last_bin_id: start_bin_id,
        bins_visited: 0,
    };
    let insufficient = |state: &SwapState| DlmmError::InsufficientLiquidity {
        requested: amount_in,
        filled: amount_in - state.amount_remaining,
    };

    loop {
        if state.bins_visited >= limit {
            return Err(DlmmError::BinLimitExceeded { limit });
        }

        let bin_id = state.current_bin_id;
        let price = match pool.price_of(bin_id) {
            Ok(price) => price,
            Err(DlmmError::BinOutOfRange(_)) => return Err(insufficient(&state)),
            Err(e) => return Err(e),
        };
        let array_key = derive_bin_array_key_for_bin(&pool_key, bin_id);
        let Some(array) = unit.bin_array_mut(&array_key)? else {
            // Missing arrays hold no liquidity; resume at the next created one
            match pool.next_bin_array_entry(array_key.index, swap_for_y) {
                Some(entry) => {
                    debug!(from = bin_id, to = entry, "Skipping missing bin array");
                    state.current_bin_id = entry;
                    continue;
                }
                None => return Err(insufficient(&state)),
            }
        };
        let bin = array.get_bin_mut(bin_id)?;

        state.bins_visited += 1;
        state.last_bin_id = bin_id;

        let step = compute_swap_step(
            bin.reserve_x,
            bin.reserve_y,
            price,
            pool.base_fee_bps,
            state.amount_remaining,
            swap_for_y,
        )?;

        if step.amount_in == 0 && !step.drained {
            debug!(bin_id, remaining = state.amount_remaining, "Input too small for bin");
            break;
        }

        bin.apply_swap(&step, swap_for_y)?;
        if swap_for_y {
            pool.credit_reserves(step.amount_in, 0)?;
            pool.debit_reserves(0, step.amount_out)?;
        } else {
            pool.credit_reserves(0, step.amount_in)?;
            pool.debit_reserves(step.amount_out, 0)?;
        }

        state.amount_remaining = safe_sub_u64(state.amount_remaining, step.amount_in)?;
        state.amount_out = safe_add_u64(state.amount_out, step.amount_out)?;
        state.total_fee = safe_add_u64(state.total_fee, step.fee)?;

        debug!(
            bin_id,
            amount_in = step.amount_in,
            amount_out = step.amount_out,
            fee = step.fee,
            drained = step.drained,
            "Swap step"
        );

        if state.amount_remaining == 0 || !step.drained {
            break;
        }

        let next = if swap_for_y {
            bin_id.checked_sub(1)
        } else {
            bin_id.checked_add(1)
        };
        match next {
            Some(next) => state.current_bin_id = next,
            None => return Err(insufficient(&state)),
        }
    }

    pool.active_bin_id = state.last_bin_id;

    let consumed = amount_in - state.amount_remaining;
    if consumed == 0 {
        return Err(DlmmError::ZeroAmount);
    }

    Ok(SwapQuote {
        amount_in: consumed,
        amount_out: state.amount_out,
        fee: state.total_fee,
        start_bin_id,
        end_bin_id: state.last_bin_id,
        bins_visited: state.bins_visited,
    })
}
