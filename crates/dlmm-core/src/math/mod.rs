//! Fixed-point math for bin pricing, share accounting and swap steps

pub mod bin_math;
pub mod price_math;
pub mod safe_math;

pub use bin_math::*;
pub use price_math::*;
pub use safe_math::*;
