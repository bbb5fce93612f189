//! Staking position storage.

use crate::StoreError;
use farm_types::{Address, Amount, BlockHeight, Denom};
use serde::{Deserialize, Serialize};

/// One staker's stake in one asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub staker: Address,
    pub asset: Denom,
    pub staked_amount: Amount,
    /// Snapshot index this position's reward computation starts from.
    pub previous_period: u64,
    /// Block height of the last anchoring.
    pub anchor_height: BlockHeight,
}

impl Position {
    /// A position that has not been anchored yet.
    pub fn new(staker: Address, asset: Denom) -> Self {
        Self {
            staker,
            asset,
            staked_amount: 0,
            previous_period: 0,
            anchor_height: BlockHeight::GENESIS,
        }
    }
}

/// Trait for position storage.
///
/// Keys are `(staker, asset)` pairs.
pub trait PositionStore {
    fn get_position(&self, staker: &Address, asset: &Denom)
        -> Result<Option<Position>, StoreError>;

    fn put_position(&self, position: &Position) -> Result<(), StoreError>;

    fn delete_position(&self, staker: &Address, asset: &Denom) -> Result<(), StoreError>;

    /// Every position of one staker, ordered by asset.
    fn iter_positions_by_staker(&self, staker: &Address) -> Result<Vec<Position>, StoreError>;

    /// Every position in one asset.
    fn iter_positions_by_asset(&self, asset: &Denom) -> Result<Vec<Position>, StoreError>;

    /// Every position, ordered by staker then asset.
    fn iter_positions(&self) -> Result<Vec<Position>, StoreError>;

    fn position_count(&self) -> Result<u64, StoreError> {
        self.iter_positions().map(|v| v.len() as u64)
    }
}
