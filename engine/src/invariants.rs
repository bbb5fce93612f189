//! Global invariant sweep.
//!
//! Too expensive for the per-operation path; the engine runs it every
//! `invariant_check_interval` blocks and genesis import runs it once.

use crate::error::{FarmError, InvariantViolation};
use farm_store::{FarmingStore, Pool, Position, Snapshot};
use farm_types::{Amount, Denom};
use std::collections::BTreeMap;

/// Outcome of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvariantReport {
    /// One message per broken invariant, in discovery order.
    pub broken: Vec<String>,
    pub pools: u64,
    pub positions: u64,
    /// Sum of every snapshot's reference count.
    pub references: u64,
}

impl InvariantReport {
    pub fn is_ok(&self) -> bool {
        self.broken.is_empty()
    }

    /// Fold the report into a single violation. Meaningless when `is_ok`.
    pub fn into_violation(self) -> InvariantViolation {
        let count = self.broken.len();
        let first = self.broken.into_iter().next().unwrap_or_default();
        InvariantViolation::Broken { count, first }
    }
}

/// Sweep every record in `store`.
pub fn check_invariants<S: FarmingStore + ?Sized>(store: &S) -> Result<InvariantReport, FarmError> {
    let pools = store.iter_pools()?;
    let snapshots = store.iter_snapshots()?;
    let positions = store.iter_positions()?;
    Ok(check_records(&pools, &snapshots, &positions))
}

/// Sweep an explicit set of records.
pub fn check_records(
    pools: &[Pool],
    snapshots: &[(Denom, u64, Snapshot)],
    positions: &[Position],
) -> InvariantReport {
    let mut report = InvariantReport {
        pools: pools.len() as u64,
        positions: positions.len() as u64,
        references: snapshots
            .iter()
            .map(|(_, _, s)| u64::from(s.reference_count))
            .sum(),
        ..InvariantReport::default()
    };

    let expected = report.pools + report.positions;
    if report.references != expected {
        report.broken.push(format!(
            "reference counts sum to {}, expected {} pools + {} positions = {}",
            report.references, report.pools, report.positions, expected
        ));
    }

    let index: BTreeMap<(&Denom, u64), &Snapshot> =
        snapshots.iter().map(|(a, p, s)| ((a, *p), s)).collect();
    // Each snapshot is held once by its pool's anchor and once per
    // position anchored at it.
    let mut anchors: BTreeMap<(&Denom, u64), u64> = BTreeMap::new();
    for pool in pools.iter().filter(|p| p.period > 0) {
        *anchors.entry((&pool.asset, pool.anchor_period())).or_default() += 1;
    }
    for position in positions {
        *anchors
            .entry((&position.asset, position.previous_period))
            .or_default() += 1;
    }
    for ((asset, period), snapshot) in &index {
        let held = anchors.get(&(*asset, *period)).copied().unwrap_or(0);
        if snapshot.reference_count == 0 {
            report
                .broken
                .push(format!("snapshot {asset}/{period} is stored with no references"));
        } else if u64::from(snapshot.reference_count) != held {
            report.broken.push(format!(
                "snapshot {asset}/{period} has {} references but {held} anchors",
                snapshot.reference_count
            ));
        }
    }

    let mut staked: BTreeMap<&Denom, Amount> = BTreeMap::new();
    for position in positions {
        let sum = staked.entry(&position.asset).or_default();
        *sum = sum.saturating_add(position.staked_amount);
    }

    let by_asset: BTreeMap<&Denom, &Pool> = pools.iter().map(|p| (&p.asset, p)).collect();
    for pool in pools {
        let asset = &pool.asset;
        if !pool.outstanding_rewards.is_all_gte(&pool.current_rewards) {
            report.broken.push(format!(
                "pool {asset}: outstanding {} below current {}",
                pool.outstanding_rewards, pool.current_rewards
            ));
        }
        let positions_total = staked.get(asset).copied().unwrap_or(0);
        if pool.total_staked != positions_total {
            report.broken.push(format!(
                "pool {asset}: total staked {} but positions hold {}",
                pool.total_staked, positions_total
            ));
        }
        if pool.period == 0 || !index.contains_key(&(asset, pool.anchor_period())) {
            report.broken.push(format!(
                "pool {asset}: no snapshot at its anchor period {}",
                pool.anchor_period()
            ));
        }
    }

    for position in positions {
        let asset = &position.asset;
        let staker = &position.staker;
        let Some(pool) = by_asset.get(asset) else {
            report
                .broken
                .push(format!("position {staker}/{asset}: pool is missing"));
            continue;
        };
        if position.staked_amount == 0 {
            report
                .broken
                .push(format!("position {staker}/{asset}: zero stake"));
        }
        if position.previous_period >= pool.period {
            report.broken.push(format!(
                "position {staker}/{asset}: anchored at {} but pool is at period {}",
                position.previous_period, pool.period
            ));
        }
        if !index.contains_key(&(asset, position.previous_period)) {
            report.broken.push(format!(
                "position {staker}/{asset}: no snapshot at period {}",
                position.previous_period
            ));
        }
    }

    report
}
