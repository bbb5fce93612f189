//! Per-asset pool storage.

use crate::StoreError;
use farm_types::{Amount, DecCoins, Denom};
use serde::{Deserialize, Serialize};

/// Aggregate staking and reward state of one asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// The staked asset this pool belongs to.
    pub asset: Denom,
    /// Sum of every live position's staked amount.
    pub total_staked: Amount,
    /// Rewards emitted since the last period rollover.
    pub current_rewards: DecCoins,
    /// Rewards owed to stakers and not yet paid out.
    /// Always at least `current_rewards`, component-wise.
    pub outstanding_rewards: DecCoins,
    /// The period currently accumulating rewards. Snapshots exist for
    /// periods strictly below it.
    pub period: u64,
}

impl Pool {
    /// A freshly created pool. Its period-0 snapshot must be written with it.
    pub fn new(asset: Denom) -> Self {
        Self {
            asset,
            total_staked: 0,
            current_rewards: DecCoins::new(),
            outstanding_rewards: DecCoins::new(),
            period: 1,
        }
    }

    /// The snapshot index the pool itself holds a reference on.
    pub fn anchor_period(&self) -> u64 {
        self.period.saturating_sub(1)
    }
}

/// Trait for pool storage operations. Pools are never deleted.
pub trait PoolStore {
    fn get_pool(&self, asset: &Denom) -> Result<Option<Pool>, StoreError>;
    fn put_pool(&self, pool: &Pool) -> Result<(), StoreError>;
    fn iter_pools(&self) -> Result<Vec<Pool>, StoreError>;

    fn pool_count(&self) -> Result<u64, StoreError> {
        self.iter_pools().map(|v| v.len() as u64)
    }
}
