//! # Bin Math
//!
//! Share mint/burn and the single-bin exchange step. Every function here is
//! pure: callers own the reserves and apply the results.
//!
//! Minting follows the bin's reserve ratio. Bin value, used to compare a
//! bin's holdings before and after a trade, is measured in Q64 units of
//! token Y:
//!
//! ```text
//! value = price * x + y * 2^64
//! ```

use ethnum::U256;

use crate::constants::{BASIS_POINT_MAX, ONE_Q64, SCALE_OFFSET};
use crate::error::{DlmmError, DlmmResult};
use crate::math::safe_math::{
    mul_div_u128, safe_calculate_bps, safe_cast_u128_to_u64, safe_sub_u128, safe_sub_u64,
    Rounding,
};

// ============================================================================
// Share Accounting
// ============================================================================

/// Q64 value of `(amount_x, amount_y)` at a bin priced `price`
pub fn bin_value(amount_x: u64, amount_y: u64, price: u128) -> U256 {
    U256::from(price) * U256::from(amount_x) + (U256::from(amount_y) << SCALE_OFFSET)
}

/// Shares minted by the first deposit into an empty bin
pub fn seed_shares(amount_x: u64, amount_y: u64) -> u128 {
    amount_x as u128 + amount_y as u128
}

/// Shares minted for depositing `(amount_x, amount_y)` into a bin.
///
/// An empty bin is seeded with the sum of the two amounts. Otherwise every
/// side with a nonzero reserve bounds the mint at `amount * total / reserve`
/// and the smallest bound is minted, rounded down. Any surplus on the other
/// side is left in the bin for the existing holders.
pub fn shares_for_deposit(
    total_shares: u128,
    reserve_x: u64,
    reserve_y: u64,
    amount_x: u64,
    amount_y: u64,
) -> DlmmResult<u128> {
    if total_shares == 0 {
        return Ok(seed_shares(amount_x, amount_y));
    }

    let mut minted: Option<u128> = None;
    for (amount, reserve) in [(amount_x, reserve_x), (amount_y, reserve_y)] {
        if reserve == 0 {
            continue;
        }
        let bound = mul_div_u128(amount as u128, total_shares, reserve as u128, Rounding::Down)?;
        minted = Some(minted.map_or(bound, |m| m.min(bound)));
    }
    Ok(minted.unwrap_or(0))
}

/// Reserves paid out for burning `shares` of a bin's `total_shares`.
///
/// Burning the whole supply returns the reserves exactly so that an emptied
/// bin holds no dust.
pub fn amounts_for_shares(
    reserve_x: u64,
    reserve_y: u64,
    total_shares: u128,
    shares: u128,
) -> DlmmResult<(u64, u64)> {
    if shares > total_shares {
        return Err(DlmmError::MathUnderflow);
    }
    if shares == total_shares {
        return Ok((reserve_x, reserve_y));
    }

    let out_x = mul_div_u128(reserve_x as u128, shares, total_shares, Rounding::Down)?;
    let out_y = mul_div_u128(reserve_y as u128, shares, total_shares, Rounding::Down)?;
    Ok((safe_cast_u128_to_u64(out_x)?, safe_cast_u128_to_u64(out_y)?))
}

// ============================================================================
// Swap Step
// ============================================================================

/// Outcome of trading against a single bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapStep {
    /// Gross input taken from the trader (fee included)
    pub amount_in: u64,
    /// Output paid from the bin
    pub amount_out: u64,
    /// Fee portion of `amount_in`, retained by the bin
    pub fee: u64,
    /// The bin's output-side reserve is exhausted
    pub drained: bool,
}

/// Convert an input amount into output at `price`, rounding down
fn quote_out(net_in: u128, price: u128, swap_for_y: bool) -> DlmmResult<u128> {
    if swap_for_y {
        mul_div_u128(net_in, price, ONE_Q64, Rounding::Down)
    } else {
        mul_div_u128(net_in, ONE_Q64, price, Rounding::Down)
    }
}

/// Net input that buys exactly `reserve_out`, rounding up
fn input_for_output(reserve_out: u64, price: u128, swap_for_y: bool) -> DlmmResult<u128> {
    if swap_for_y {
        mul_div_u128(reserve_out as u128, ONE_Q64, price, Rounding::Up)
    } else {
        mul_div_u128(reserve_out as u128, price, ONE_Q64, Rounding::Up)
    }
}

/// Trade up to `amount_in` against one bin.
///
/// `swap_for_y` sells X for Y. A bin whose output side is empty yields a
/// zero step marked `drained`. A remainder too small to buy one unit yields a
/// zero step that is not drained, which ends the walk.
pub fn compute_swap_step(
    reserve_x: u64,
    reserve_y: u64,
    price: u128,
    fee_bps: u16,
    amount_in: u64,
    swap_for_y: bool,
) -> DlmmResult<SwapStep> {
    let reserve_out = if swap_for_y { reserve_y } else { reserve_x };
    if reserve_out == 0 {
        return Ok(SwapStep {
            drained: true,
            ..SwapStep::default()
        });
    }

    let max_net_in = input_for_output(reserve_out, price, swap_for_y)?;
    let max_gross_in = mul_div_u128(
        max_net_in,
        BASIS_POINT_MAX as u128,
        safe_sub_u128(BASIS_POINT_MAX as u128, fee_bps as u128)?,
        Rounding::Up,
    )?;

    if amount_in as u128 >= max_gross_in {
        let gross = safe_cast_u128_to_u64(max_gross_in)?;
        let fee = safe_cast_u128_to_u64(max_gross_in - max_net_in)?;
        return Ok(SwapStep {
            amount_in: gross,
            amount_out: reserve_out,
            fee,
            drained: true,
        });
    }

    let fee = safe_calculate_bps(amount_in, fee_bps, Rounding::Up)?;
    let net_in = safe_sub_u64(amount_in, fee)?;
    let amount_out = quote_out(net_in as u128, price, swap_for_y)?;

    if amount_out == 0 {
        return Ok(SwapStep::default());
    }

    Ok(SwapStep {
        amount_in,
        amount_out: safe_cast_u128_to_u64(amount_out.min(reserve_out as u128))?,
        fee,
        drained: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::price_math::get_price_from_id;

    #[test]
    fn test_seed_and_proportional_mint() {
        assert_eq!(shares_for_deposit(0, 0, 0, 500_000, 500_000).unwrap(), 1_000_000);
        assert_eq!(shares_for_deposit(0, 0, 0, 0, 7).unwrap(), 7);

        // Doubling a balanced bin doubles its shares
        let minted = shares_for_deposit(1_000_000, 500_000, 500_000, 500_000, 500_000).unwrap();
        assert_eq!(minted, 1_000_000);

        // The scarcer side sets the mint
        assert_eq!(shares_for_deposit(1_000, 100, 400, 50, 100).unwrap(), 250);
        assert_eq!(shares_for_deposit(1_000, 100, 400, 10, 400).unwrap(), 100);
    }

    #[test]
    fn test_mint_against_one_sided_bin() {
        // Only X is held, so only X earns shares
        assert_eq!(shares_for_deposit(1_000, 1_000, 0, 500, 9_999).unwrap(), 500);
        assert_eq!(shares_for_deposit(1_000, 1_000, 0, 0, 9_999).unwrap(), 0);

        // X alone into a two-sided bin mints nothing
        assert_eq!(shares_for_deposit(1_000, 500, 500, 100_000, 0).unwrap(), 0);
    }

    #[test]
    fn test_mint_overflow() {
        assert_eq!(
            shares_for_deposit(u128::MAX, 1, 0, u64::MAX, u64::MAX),
            Err(DlmmError::MathOverflow)
        );
    }

    #[test]
    fn test_burn_rounds_down_and_full_burn_is_exact() {
        assert_eq!(amounts_for_shares(10, 7, 3, 1).unwrap(), (3, 2));
        assert_eq!(amounts_for_shares(10, 7, 3, 3).unwrap(), (10, 7));
        assert_eq!(amounts_for_shares(10, 7, 3, 4), Err(DlmmError::MathUnderflow));
    }

    #[test]
    fn test_partial_step_x_for_y() {
        let step = compute_swap_step(0, 250_000, ONE_Q64, 30, 100_000, true).unwrap();
        assert_eq!(step.amount_in, 100_000);
        assert_eq!(step.fee, 300);
        assert_eq!(step.amount_out, 99_700);
        assert!(!step.drained);
    }

    #[test]
    fn test_draining_step_keeps_fee_in_gross() {
        let step = compute_swap_step(0, 1_000, ONE_Q64, 30, 5_000, true).unwrap();
        // ceil(1000 * 10000 / 9970) = 1004
        assert_eq!(step.amount_in, 1_004);
        assert_eq!(step.fee, 4);
        assert_eq!(step.amount_out, 1_000);
        assert!(step.drained);
    }

    #[test]
    fn test_step_y_for_x_at_higher_price() {
        let price = get_price_from_id(1, 100).unwrap();
        let step = compute_swap_step(1_000_000, 0, price, 0, 10_100, false).unwrap();
        // 10_100 / 1.01 = 10_000 minus Q64 truncation
        assert!(step.amount_out == 9_999 || step.amount_out == 10_000);
        assert!(!step.drained);
    }

    #[test]
    fn test_empty_and_dust_steps() {
        let empty = compute_swap_step(10, 0, ONE_Q64, 30, 100, true).unwrap();
        assert!(empty.drained);
        assert_eq!(empty.amount_in, 0);

        let dust = compute_swap_step(0, 1_000, ONE_Q64, 30, 1, true).unwrap();
        assert_eq!(dust, SwapStep::default());
    }
}
