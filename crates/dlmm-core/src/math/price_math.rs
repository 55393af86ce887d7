//! # Bin Price Math
//!
//! Maps a bin id to its fixed Q64.64 price:
//!
//! ```text
//! price(id) = (1 + bin_step / 10_000) ^ id
//! ```
//!
//! The power is computed by square-and-multiply with a U256 intermediate.
//! Negative ids take the Q64.64 reciprocal of the positive power. Deep
//! negative ids whose price is too small to stay distinct from the next bin
//! are out of range for that step.

use ethnum::U256;

use crate::constants::{BASIS_POINT_MAX, MAX_BIN_ID, MIN_BIN_ID, ONE_Q64, SCALE_OFFSET};
use crate::error::{DlmmError, DlmmResult};

/// Q64.64 growth factor between adjacent bins
pub fn get_base(bin_step: u16) -> u128 {
    ONE_Q64 + (bin_step as u128 * ONE_Q64) / BASIS_POINT_MAX as u128
}

/// Smallest representable price for `bin_step`; adjacent bins at or above it
/// differ by at least four Q64 units
pub fn min_price(bin_step: u16) -> u128 {
    (4 * BASIS_POINT_MAX as u128).div_ceil(bin_step as u128)
}

/// Q64.64 price of `bin_id` for a pool with `bin_step`
pub fn get_price_from_id(bin_id: i32, bin_step: u16) -> DlmmResult<u128> {
    if !(MIN_BIN_ID..=MAX_BIN_ID).contains(&bin_id) {
        return Err(DlmmError::BinOutOfRange(bin_id));
    }
    if bin_step == 0 {
        return Err(DlmmError::InvalidBinStep(bin_step));
    }

    let magnitude =
        pow_q64(get_base(bin_step), bin_id.unsigned_abs()).ok_or(DlmmError::BinOutOfRange(bin_id))?;

    if bin_id >= 0 {
        return Ok(magnitude);
    }

    // 1 / magnitude in Q64.64 is 2^128 / magnitude; magnitude >= 2^64 keeps this below 2^64
    let reciprocal = (U256::ONE << (2 * SCALE_OFFSET)) / U256::from(magnitude);
    if reciprocal < U256::from(min_price(bin_step)) {
        return Err(DlmmError::BinOutOfRange(bin_id));
    }
    Ok(reciprocal.as_u128())
}

/// `base ^ exp` in Q64.64, `None` once the result leaves u128
fn pow_q64(base: u128, mut exp: u32) -> Option<u128> {
    let limit = U256::from(u128::MAX);
    let mut result = U256::from(ONE_Q64);
    let mut squared = U256::from(base);

    while exp > 0 {
        if exp & 1 == 1 {
            result = (result * squared) >> SCALE_OFFSET;
            if result > limit {
                return None;
            }
        }
        exp >>= 1;
        if exp > 0 {
            squared = (squared * squared) >> SCALE_OFFSET;
            if squared > limit {
                return None;
            }
        }
    }

    Some(result.as_u128())
}
