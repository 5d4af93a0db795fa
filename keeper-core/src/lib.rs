#![allow(clippy::missing_errors_doc)]

pub mod address;
pub mod error;
pub mod fixed_decimal;
pub mod peg;
pub mod pool;
pub mod rebalance_delta;
pub mod reserve_invariant;

pub use address::Address;
pub use error::CoreError;
pub use fixed_decimal::{FixedDecimal, U256};
