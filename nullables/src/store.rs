//! Nullable store: thread-safe in-memory key-value storage for testing.
//!
//! Records are encoded with the same key layout and codec a persistent
//! backend would use, so encoding bugs surface in unit tests.

use farm_store::codec::{self, POOL_PREFIX};
use farm_store::{
    Pool, PoolStore, Position, PositionStore, Snapshot, SnapshotStore, StoreError,
};
use farm_types::{Address, Denom};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// An in-memory farming store.
pub struct NullFarmingStore {
    rows: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl NullFarmingStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of raw rows held (pools + snapshots + positions).
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn get_row(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.rows.lock().unwrap().get(key).cloned()
    }

    fn put_row(&self, key: Vec<u8>, value: Vec<u8>) {
        self.rows.lock().unwrap().insert(key, value);
    }

    fn delete_row(&self, key: &[u8]) -> bool {
        self.rows.lock().unwrap().remove(key).is_some()
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.rows
            .lock()
            .unwrap()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Default for NullFarmingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolStore for NullFarmingStore {
    fn get_pool(&self, asset: &Denom) -> Result<Option<Pool>, StoreError> {
        self.get_row(&codec::pool_key(asset))
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    fn put_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        self.put_row(codec::pool_key(&pool.asset), codec::encode(pool)?);
        Ok(())
    }

    fn iter_pools(&self) -> Result<Vec<Pool>, StoreError> {
        self.scan_prefix(&[POOL_PREFIX])
            .iter()
            .map(|(_, v)| codec::decode(v))
            .collect()
    }
}

impl SnapshotStore for NullFarmingStore {
    fn get_snapshot(&self, asset: &Denom, period: u64) -> Result<Option<Snapshot>, StoreError> {
        self.get_row(&codec::snapshot_key(asset, period))
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    fn put_snapshot(
        &self,
        asset: &Denom,
        period: u64,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        self.put_row(codec::snapshot_key(asset, period), codec::encode(snapshot)?);
        Ok(())
    }

    fn delete_snapshot(&self, asset: &Denom, period: u64) -> Result<(), StoreError> {
        if !self.delete_row(&codec::snapshot_key(asset, period)) {
            return Err(StoreError::NotFound(format!("snapshot {asset}/{period}")));
        }
        Ok(())
    }

    fn iter_snapshots_for_asset(&self, asset: &Denom) -> Result<Vec<(u64, Snapshot)>, StoreError> {
        self.scan_prefix(&codec::snapshot_prefix(asset))
            .iter()
            .map(|(k, v)| -> Result<(u64, Snapshot), StoreError> {
                Ok((codec::period_from_snapshot_key(k)?, codec::decode(v)?))
            })
            .collect()
    }

    fn iter_snapshots(&self) -> Result<Vec<(Denom, u64, Snapshot)>, StoreError> {
        self.scan_prefix(&[codec::SNAPSHOT_PREFIX])
            .iter()
            .map(|(k, v)| -> Result<(Denom, u64, Snapshot), StoreError> {
                Ok((
                    codec::asset_from_snapshot_key(k)?,
                    codec::period_from_snapshot_key(k)?,
                    codec::decode(v)?,
                ))
            })
            .collect()
    }
}

impl PositionStore for NullFarmingStore {
    fn get_position(
        &self,
        staker: &Address,
        asset: &Denom,
    ) -> Result<Option<Position>, StoreError> {
        self.get_row(&codec::position_key(staker, asset))
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    fn put_position(&self, position: &Position) -> Result<(), StoreError> {
        self.put_row(
            codec::position_key(&position.staker, &position.asset),
            codec::encode(position)?,
        );
        Ok(())
    }

    fn delete_position(&self, staker: &Address, asset: &Denom) -> Result<(), StoreError> {
        if !self.delete_row(&codec::position_key(staker, asset)) {
            return Err(StoreError::NotFound(format!("position {staker}/{asset}")));
        }
        Ok(())
    }

    fn iter_positions_by_staker(&self, staker: &Address) -> Result<Vec<Position>, StoreError> {
        self.scan_prefix(&codec::position_prefix(staker))
            .iter()
            .map(|(_, v)| codec::decode(v))
            .collect()
    }

    fn iter_positions_by_asset(&self, asset: &Denom) -> Result<Vec<Position>, StoreError> {
        Ok(self
            .iter_positions()?
            .into_iter()
            .filter(|p| &p.asset == asset)
            .collect())
    }

    fn iter_positions(&self) -> Result<Vec<Position>, StoreError> {
        self.scan_prefix(&[codec::POSITION_PREFIX])
            .iter()
            .map(|(_, v)| codec::decode(v))
            .collect()
    }
}
