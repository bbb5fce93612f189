//! Nullable infrastructure for deterministic testing.
//!
//! Everything the engine treats as an external collaborator (chain height,
//! storage, bank) is abstracted behind a trait or a plain value. This crate
//! provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod bank;
pub mod chain;
pub mod store;

pub use bank::NullBank;
pub use chain::NullChain;
pub use store::NullFarmingStore;
