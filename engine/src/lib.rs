//! Reward-accrual engine for staking farms.
//!
//! Stakers lock an asset into its pool and earn every reward token emitted
//! to that pool in proportion to `stake × time held`. Instead of touching
//! every position when rewards arrive, the engine keeps a chain of period
//! snapshots holding the cumulative reward per unit of stake:
//!
//! `earned(p) = (cumulative[end] − cumulative[p.previous_period]) × p.staked_amount`
//!
//! so each stake, unstake or harvest does O(1) work regardless of how many
//! stakers the pool has. Snapshots are reference counted and pruned as soon
//! as neither the pool nor any position anchors to them.
//!
//! This crate handles:
//! - Snapshot reference counting ([`SnapshotLedger`])
//! - Period rollover and reward computation ([`RewardAccumulator`])
//! - Stake / unstake / harvest orchestration and reward emission ([`FarmingEngine`])
//! - Invariant sweeps, genesis export/import, and configuration

pub mod accumulator;
pub mod config;
pub mod engine;
pub mod error;
pub mod genesis;
pub mod invariants;
pub mod snapshots;
pub mod spans;

pub use accumulator::RewardAccumulator;
pub use config::EngineConfig;
pub use engine::FarmingEngine;
pub use error::{FarmError, InvariantViolation};
pub use genesis::{export_genesis, import_genesis, FarmingGenesis, SnapshotRecord};
pub use invariants::{check_invariants, InvariantReport};
pub use snapshots::SnapshotLedger;
