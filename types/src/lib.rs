//! Fundamental types for the farming engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! addresses, asset denominations, integral and fixed-point amounts, block heights,
//! and the governance-tunable farming parameters.

pub mod address;
pub mod amount;
pub mod dec;
pub mod error;
pub mod params;
pub mod time;

pub use address::{Address, Denom};
pub use amount::{Amount, Coins};
pub use dec::{Dec, DecCoins};
pub use error::TypesError;
pub use params::FarmingParams;
pub use time::{BlockContext, BlockHeight};
