//! LiquidityManager: deposit distribution, share minting and burning.
//!
//! Both operations run against a [`WorkUnit`] and leave committing to the
//! caller. On error the unit holds partial changes and must be dropped.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::constants::BASIS_POINT_MAX;
use crate::error::{DlmmError, DlmmResult};
use crate::math::{
    amounts_for_shares, mul_div_u64, safe_add_u64, safe_sub_u64, shares_for_deposit, Rounding,
};
use crate::state::{
    bin_array_index, derive_bin_array_key_for_bin, derive_position_key, Address, PoolKey, Position,
};
use crate::store::AccountStore;
use crate::transfer::Settlement;

use super::unit_of_work::WorkUnit;

// ============================================================================
// Parameters and Results
// ============================================================================

/// One entry of a deposit distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinLiquidityDistribution {
    /// Offset of the target bin from the active bin
    pub delta_id: i32,
    /// Share of `amount_x` in basis points
    pub dist_x: u16,
    /// Share of `amount_y` in basis points
    pub dist_y: u16,
}

/// One entry of a removal batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinLiquidityReduction {
    pub bin_id: i32,
    pub shares_to_burn: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityParams {
    pub owner: Address,
    pub amount_x: u64,
    pub amount_y: u64,
    pub distribution: Vec<BinLiquidityDistribution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityParams {
    /// Owner of record of the position being reduced
    pub owner: Address,
    pub reductions: Vec<BinLiquidityReduction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinDeposit {
    pub bin_id: i32,
    pub amount_x: u64,
    pub amount_y: u64,
    pub shares_minted: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityResult {
    pub amount_x: u64,
    pub amount_y: u64,
    pub deposits: Vec<BinDeposit>,
    pub settlement: Settlement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinWithdrawal {
    pub bin_id: i32,
    pub amount_x: u64,
    pub amount_y: u64,
    pub shares_burned: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityResult {
    pub amount_x: u64,
    pub amount_y: u64,
    pub withdrawals: Vec<BinWithdrawal>,
    pub settlement: Settlement,
    /// The position had no shares left and was pruned
    pub position_closed: bool,
}

// ============================================================================
// Distribution Planning
// ============================================================================

/// Amounts allocated to one distribution entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub delta_id: i32,
    pub amount_x: u64,
    pub amount_y: u64,
}

/// Validated split of a deposit across its distribution entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    pub allocations: Vec<Allocation>,
    /// Total X placed into bins
    pub amount_x: u64,
    /// Total Y placed into bins
    pub amount_y: u64,
}

/// Validate a distribution and split both amounts across its entries.
///
/// Each token's weights may total at most 10 000; a token deposits
/// `amount * total_weight / 10_000` and keeps the rest with the caller.
/// Integer division remainders go to the weighted entry closest to the
/// active bin.
pub fn plan_distribution(
    amount_x: u64,
    amount_y: u64,
    distribution: &[BinLiquidityDistribution],
    max_entries: usize,
) -> DlmmResult<DistributionPlan> {
    if amount_x == 0 && amount_y == 0 {
        return Err(DlmmError::ZeroAmount);
    }
    if distribution.is_empty() {
        return Err(DlmmError::InvalidDistribution("empty distribution"));
    }
    if distribution.len() > max_entries {
        return Err(DlmmError::too_many_entries(distribution.len(), max_entries));
    }

    let mut seen = BTreeSet::new();
    for entry in distribution {
        if !seen.insert(entry.delta_id) {
            return Err(DlmmError::InvalidDistribution("duplicate delta_id"));
        }
    }

    let weight_x: u64 = distribution.iter().map(|e| e.dist_x as u64).sum();
    let weight_y: u64 = distribution.iter().map(|e| e.dist_y as u64).sum();
    if weight_x > BASIS_POINT_MAX {
        return Err(DlmmError::InvalidDistribution("dist_x exceeds 10000"));
    }
    if weight_y > BASIS_POINT_MAX {
        return Err(DlmmError::InvalidDistribution("dist_y exceeds 10000"));
    }

    let deposit_x = mul_div_u64(amount_x, weight_x, BASIS_POINT_MAX, Rounding::Down)?;
    let deposit_y = mul_div_u64(amount_y, weight_y, BASIS_POINT_MAX, Rounding::Down)?;
    if deposit_x == 0 && deposit_y == 0 {
        return Err(DlmmError::ZeroAmount);
    }

    let mut allocations = distribution
        .iter()
        .map(|entry| {
            Ok(Allocation {
                delta_id: entry.delta_id,
                amount_x: mul_div_u64(amount_x, entry.dist_x as u64, BASIS_POINT_MAX, Rounding::Down)?,
                amount_y: mul_div_u64(amount_y, entry.dist_y as u64, BASIS_POINT_MAX, Rounding::Down)?,
            })
        })
        .collect::<DlmmResult<Vec<_>>>()?;

    let allocated_x = allocations
        .iter()
        .try_fold(0u64, |acc, a| safe_add_u64(acc, a.amount_x))?;
    let allocated_y = allocations
        .iter()
        .try_fold(0u64, |acc, a| safe_add_u64(acc, a.amount_y))?;
    let residue_x = safe_sub_u64(deposit_x, allocated_x)?;
    let residue_y = safe_sub_u64(deposit_y, allocated_y)?;

    // A nonzero residue implies a positive weight sum for that token, so a
    // weighted entry always exists and RoundingResidue cannot be reached
    if residue_x > 0 {
        let slot = closest_weighted(distribution, |e| e.dist_x)
            .ok_or(DlmmError::RoundingResidue { amount: residue_x })?;
        allocations[slot].amount_x = safe_add_u64(allocations[slot].amount_x, residue_x)?;
    }
    if residue_y > 0 {
        let slot = closest_weighted(distribution, |e| e.dist_y)
            .ok_or(DlmmError::RoundingResidue { amount: residue_y })?;
        allocations[slot].amount_y = safe_add_u64(allocations[slot].amount_y, residue_y)?;
    }

    Ok(DistributionPlan {
        allocations,
        amount_x: deposit_x,
        amount_y: deposit_y,
    })
}

/// Slot of the entry with positive weight and smallest |delta_id|, first on ties
fn closest_weighted(
    distribution: &[BinLiquidityDistribution],
    weight: impl Fn(&BinLiquidityDistribution) -> u16,
) -> Option<usize> {
    distribution
        .iter()
        .enumerate()
        .filter(|(_, e)| weight(e) > 0)
        .min_by_key(|(slot, e)| (e.delta_id.unsigned_abs(), *slot))
        .map(|(slot, _)| slot)
}

// ============================================================================
// Add
// ============================================================================

/// Distribute a deposit across bins and mint shares to the owner's position
pub fn add_liquidity<S: AccountStore + ?Sized>(
    unit: &mut WorkUnit<'_, S>,
    config: &EngineConfig,
    pool_key: &PoolKey,
    params: &AddLiquidityParams,
) -> DlmmResult<AddLiquidityResult> {
    let plan = plan_distribution(
        params.amount_x,
        params.amount_y,
        &params.distribution,
        config.max_distribution_entries,
    )?;

    let mut pool = unit.load_pool(pool_key)?;
    let position_key = derive_position_key(pool_key, &params.owner);
    let mut position = unit
        .load_position(&position_key)?
        .unwrap_or_else(|| Position::new(*pool_key, params.owner));

    let mut deposits = Vec::with_capacity(plan.allocations.len());
    for allocation in plan.allocations {
        let bin_id = pool
            .active_bin_id
            .checked_add(allocation.delta_id)
            .ok_or(DlmmError::BinOutOfRange(pool.active_bin_id))?;
        // Every entry must be priceable, empty ones included
        pool.price_of(bin_id)?;

        if allocation.amount_x == 0 && allocation.amount_y == 0 {
            continue;
        }

        let array_key = derive_bin_array_key_for_bin(pool_key, bin_id);
        pool.register_bin_array(array_key.index);
        let array = unit.bin_array_or_init(&array_key)?;
        let bin = array.get_bin_mut(bin_id)?;
        let minted = shares_for_deposit(
            bin.total_shares,
            bin.reserve_x,
            bin.reserve_y,
            allocation.amount_x,
            allocation.amount_y,
        )?;
        if minted == 0 {
            return Err(DlmmError::ZeroSharesMinted { bin_id });
        }

        bin.deposit(allocation.amount_x, allocation.amount_y, minted)?;
        position.add_shares(bin_id, minted)?;
        pool.credit_reserves(allocation.amount_x, allocation.amount_y)?;

        debug!(
            bin_id,
            amount_x = allocation.amount_x,
            amount_y = allocation.amount_y,
            minted,
            "Deposited into bin"
        );
        deposits.push(BinDeposit {
            bin_id,
            amount_x: allocation.amount_x,
            amount_y: allocation.amount_y,
            shares_minted: minted,
        });
    }

    unit.stage_pool(pool);
    unit.stage_position(position);

    Ok(AddLiquidityResult {
        amount_x: plan.amount_x,
        amount_y: plan.amount_y,
        deposits,
        settlement: Settlement::deposit(plan.amount_x, plan.amount_y),
    })
}

// ============================================================================
// Remove
// ============================================================================

/// Burn position shares and pay out the proportional reserves
pub fn remove_liquidity<S: AccountStore + ?Sized>(
    unit: &mut WorkUnit<'_, S>,
    config: &EngineConfig,
    pool_key: &PoolKey,
    caller: &Address,
    params: &RemoveLiquidityParams,
) -> DlmmResult<RemoveLiquidityResult> {
    if params.reductions.len() > config.max_removal_entries {
        return Err(DlmmError::too_many_entries(
            params.reductions.len(),
            config.max_removal_entries,
        ));
    }

    let mut pool = unit.load_pool(pool_key)?;
    let mut position = unit
        .load_position(&derive_position_key(pool_key, &params.owner))?
        .ok_or(DlmmError::PositionNotFound)?;
    if position.owner != *caller {
        return Err(DlmmError::Unauthorized);
    }

    let reductions: Vec<_> = params
        .reductions
        .iter()
        .filter(|r| r.shares_to_burn > 0)
        .collect();
    if reductions.is_empty() {
        return Err(DlmmError::ZeroAmount);
    }

    let mut total_x = 0u64;
    let mut total_y = 0u64;
    let mut withdrawals = Vec::with_capacity(reductions.len());

    for reduction in reductions {
        let bin_id = reduction.bin_id;
        position.remove_shares(bin_id, reduction.shares_to_burn)?;

        let array = unit
            .bin_array_mut(&derive_bin_array_key_for_bin(pool_key, bin_id))?
            .ok_or(DlmmError::BinArrayNotFound(bin_array_index(bin_id)))?;
        let bin = array.get_bin_mut(bin_id)?;

        let (out_x, out_y) = amounts_for_shares(
            bin.reserve_x,
            bin.reserve_y,
            bin.total_shares,
            reduction.shares_to_burn,
        )?;
        bin.withdraw(out_x, out_y, reduction.shares_to_burn)?;
        pool.debit_reserves(out_x, out_y)?;

        total_x = safe_add_u64(total_x, out_x)?;
        total_y = safe_add_u64(total_y, out_y)?;

        debug!(
            bin_id,
            shares = reduction.shares_to_burn,
            out_x,
            out_y,
            bin_drained = bin.is_empty(),
            "Withdrew from bin"
        );
        withdrawals.push(BinWithdrawal {
            bin_id,
            amount_x: out_x,
            amount_y: out_y,
            shares_burned: reduction.shares_to_burn,
        });
    }

    let position_closed = position.is_empty();
    unit.stage_pool(pool);
    unit.stage_position(position);

    Ok(RemoveLiquidityResult {
        amount_x: total_x,
        amount_y: total_y,
        withdrawals,
        settlement: Settlement::withdrawal(total_x, total_y),
        position_closed,
    })
}
