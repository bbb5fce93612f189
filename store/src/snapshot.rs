//! Period snapshot storage.

use crate::StoreError;
use farm_types::{DecCoins, Denom};
use serde::{Deserialize, Serialize};

/// Cumulative reward-per-unit-stake of an asset up through one period.
///
/// Keyed by `(asset, period)`. The cumulative value never changes once
/// written; only the reference count moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cumulative_unit_rewards: DecCoins,
    /// Live anchors on this snapshot: the pool's forward anchor and every
    /// position whose reward computation starts here. Never zero while
    /// stored.
    pub reference_count: u8,
}

impl Snapshot {
    pub fn new(cumulative_unit_rewards: DecCoins, reference_count: u8) -> Self {
        Self {
            cumulative_unit_rewards,
            reference_count,
        }
    }
}

/// Trait for snapshot storage.
///
/// Keys are `(asset, period)` pairs.
pub trait SnapshotStore {
    fn get_snapshot(&self, asset: &Denom, period: u64) -> Result<Option<Snapshot>, StoreError>;

    fn put_snapshot(&self, asset: &Denom, period: u64, snapshot: &Snapshot)
        -> Result<(), StoreError>;

    fn delete_snapshot(&self, asset: &Denom, period: u64) -> Result<(), StoreError>;

    /// All snapshots of one asset in ascending period order.
    fn iter_snapshots_for_asset(&self, asset: &Denom) -> Result<Vec<(u64, Snapshot)>, StoreError>;

    /// Every snapshot of every asset, ordered by asset then period.
    fn iter_snapshots(&self) -> Result<Vec<(Denom, u64, Snapshot)>, StoreError>;
}
