//! Ledger state records
//!
//! Pool, BinArray and Position records plus the keys that locate them.

pub mod address;
pub mod bin;
pub mod pool;
pub mod position;

pub use address::*;
pub use bin::*;
pub use pool::*;
pub use position::*;
