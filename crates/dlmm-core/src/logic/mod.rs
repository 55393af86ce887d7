//! Engine operations: liquidity management, swap walk and the facade that
//! runs them atomically against a store.

pub mod engine;
pub mod liquidity;
pub mod swap;
pub mod unit_of_work;

pub use engine::*;
pub use liquidity::*;
pub use swap::*;
pub use unit_of_work::WorkUnit;
