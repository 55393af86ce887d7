//! # Safe Math Operations
//!
//! Overflow-checked arithmetic and 256-bit mul-div used by every state
//! transition in the engine.

use ethnum::U256;

use crate::error::{DlmmError, DlmmResult};

/// Rounding direction for division
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Up,
    Down,
}

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    (cast_max, $fn_name:ident, $from_type:ty, $to_type:ty) => {
        /// Narrowing cast that fails on values above the target range
        pub fn $fn_name(value: $from_type) -> DlmmResult<$to_type> {
            <$to_type>::try_from(value).map_err(|_| DlmmError::MathOverflow)
        }
    };

    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked arithmetic reporting an engine error instead of wrapping
        pub fn $fn_name(a: $type, b: $type) -> DlmmResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, DlmmError::MathOverflow);
safe_arith!(safe_sub_u64, u64, checked_sub, DlmmError::MathUnderflow);

safe_arith!(safe_add_u128, u128, checked_add, DlmmError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, DlmmError::MathUnderflow);

safe_arith!(cast_max, safe_cast_u128_to_u64, u128, u64);

/// Narrow a 256-bit value to u128
pub fn u256_to_u128(value: U256) -> DlmmResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(DlmmError::MathOverflow);
    }
    Ok(value.as_u128())
}

/// `a * b / denominator` with a 256-bit product and explicit rounding
pub fn mul_div(a: U256, b: U256, denominator: U256, rounding: Rounding) -> DlmmResult<U256> {
    if denominator == U256::ZERO {
        return Err(DlmmError::DivisionByZero);
    }

    let product = a.checked_mul(b).ok_or(DlmmError::MathOverflow)?;
    let quotient = product / denominator;

    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up => {
            if product % denominator == U256::ZERO {
                Ok(quotient)
            } else {
                quotient
                    .checked_add(U256::ONE)
                    .ok_or(DlmmError::MathOverflow)
            }
        }
    }
}

/// Mul-div on u128 operands using a U256 intermediate
pub fn mul_div_u128(a: u128, b: u128, denominator: u128, rounding: Rounding) -> DlmmResult<u128> {
    let result = mul_div(
        U256::from(a),
        U256::from(b),
        U256::from(denominator),
        rounding,
    )?;
    u256_to_u128(result)
}

/// Mul-div on u64 operands
pub fn mul_div_u64(a: u64, b: u64, denominator: u64, rounding: Rounding) -> DlmmResult<u64> {
    let result = mul_div_u128(a as u128, b as u128, denominator as u128, rounding)?;
    safe_cast_u128_to_u64(result)
}

/// Apply a basis point rate to an amount
pub fn safe_calculate_bps(amount: u64, bps: u16, rounding: Rounding) -> DlmmResult<u64> {
    mul_div_u64(amount, bps as u64, crate::constants::BASIS_POINT_MAX, rounding)
}
