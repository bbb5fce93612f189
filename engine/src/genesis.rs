//! Genesis export and import.
//!
//! A genesis document is a plain dump of every pool, snapshot and position
//! together with the parameters. Import validates the whole document before
//! writing a single record.

use crate::error::FarmError;
use crate::invariants::check_records;
use farm_store::{FarmingStore, Pool, Position, Snapshot};
use farm_types::{Denom, FarmingParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// One stored snapshot with its key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub asset: Denom,
    pub period: u64,
    pub snapshot: Snapshot,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmingGenesis {
    #[serde(default)]
    pub params: FarmingParams,
    #[serde(default)]
    pub pools: Vec<Pool>,
    #[serde(default)]
    pub snapshots: Vec<SnapshotRecord>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

impl FarmingGenesis {
    /// Reject duplicates, dangling references and any state that breaks
    /// the global invariants.
    pub fn validate(&self) -> Result<(), FarmError> {
        self.params
            .validate()
            .map_err(|e| FarmError::InvalidGenesis(e.to_string()))?;

        let mut assets = BTreeSet::new();
        for pool in &self.pools {
            if !assets.insert(&pool.asset) {
                return Err(invalid(format!("duplicate pool {}", pool.asset)));
            }
        }

        let mut snapshot_keys = BTreeSet::new();
        for record in &self.snapshots {
            if !assets.contains(&record.asset) {
                return Err(invalid(format!(
                    "snapshot {}/{} has no pool",
                    record.asset, record.period
                )));
            }
            if record.snapshot.reference_count == 0 {
                return Err(invalid(format!(
                    "snapshot {}/{} has no references",
                    record.asset, record.period
                )));
            }
            if !snapshot_keys.insert((&record.asset, record.period)) {
                return Err(invalid(format!(
                    "duplicate snapshot {}/{}",
                    record.asset, record.period
                )));
            }
        }

        let mut position_keys = BTreeSet::new();
        for position in &self.positions {
            if !assets.contains(&position.asset) {
                return Err(invalid(format!(
                    "position {}/{} has no pool",
                    position.staker, position.asset
                )));
            }
            if !position_keys.insert((&position.staker, &position.asset)) {
                return Err(invalid(format!(
                    "duplicate position {}/{}",
                    position.staker, position.asset
                )));
            }
        }

        let snapshots: Vec<(Denom, u64, Snapshot)> = self
            .snapshots
            .iter()
            .map(|r| (r.asset.clone(), r.period, r.snapshot.clone()))
            .collect();
        let report = check_records(&self.pools, &snapshots, &self.positions);
        if let Some(first) = report.broken.into_iter().next() {
            return Err(invalid(first));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, FarmError> {
        serde_json::to_string_pretty(self).map_err(|e| FarmError::InvalidGenesis(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, FarmError> {
        serde_json::from_str(json).map_err(|e| FarmError::InvalidGenesis(e.to_string()))
    }
}

fn invalid(msg: String) -> FarmError {
    FarmError::InvalidGenesis(msg)
}

/// Dump every farming record in `store`.
pub fn export_genesis<S: FarmingStore + ?Sized>(
    store: &S,
    params: &FarmingParams,
) -> Result<FarmingGenesis, FarmError> {
    let snapshots = store
        .iter_snapshots()?
        .into_iter()
        .map(|(asset, period, snapshot)| SnapshotRecord {
            asset,
            period,
            snapshot,
        })
        .collect();
    let genesis = FarmingGenesis {
        params: params.clone(),
        pools: store.iter_pools()?,
        snapshots,
        positions: store.iter_positions()?,
    };
    info!(
        pools = genesis.pools.len(),
        snapshots = genesis.snapshots.len(),
        positions = genesis.positions.len(),
        "exported farming genesis"
    );
    Ok(genesis)
}

/// Load a validated genesis into an empty store.
pub fn import_genesis<S: FarmingStore + ?Sized>(
    store: &S,
    genesis: &FarmingGenesis,
) -> Result<(), FarmError> {
    genesis.validate()?;
    if store.pool_count()? != 0 || store.position_count()? != 0 {
        return Err(invalid("store already holds farming state".to_string()));
    }

    for pool in &genesis.pools {
        store.put_pool(pool)?;
    }
    for record in &genesis.snapshots {
        store.put_snapshot(&record.asset, record.period, &record.snapshot)?;
    }
    for position in &genesis.positions {
        store.put_position(position)?;
    }
    info!(
        pools = genesis.pools.len(),
        snapshots = genesis.snapshots.len(),
        positions = genesis.positions.len(),
        "imported farming genesis"
    );
    Ok(())
}
