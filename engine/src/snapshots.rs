//! Reference-counted period snapshots.
//!
//! A snapshot lives exactly as long as something anchors to it: the pool's
//! own forward anchor at `period - 1`, or a position's `previous_period`.
//! Releasing the last reference deletes the row, so storage stays bounded
//! by `#pools + #positions` no matter how many periods have elapsed.

use crate::error::{FarmError, InvariantViolation};
use farm_store::{Snapshot, SnapshotStore};
use farm_types::Denom;
use tracing::{debug, trace};

pub struct SnapshotLedger<'a, S: SnapshotStore + ?Sized> {
    store: &'a S,
    max_references: u8,
}

impl<'a, S: SnapshotStore + ?Sized> SnapshotLedger<'a, S> {
    pub fn new(store: &'a S, max_references: u8) -> Self {
        Self {
            store,
            max_references,
        }
    }

    /// Snapshot at `(asset, period)`, if it exists.
    pub fn find(&self, asset: &Denom, period: u64) -> Result<Option<Snapshot>, FarmError> {
        Ok(self.store.get_snapshot(asset, period)?)
    }

    /// Snapshot at `(asset, period)`. Absence is an invariant violation:
    /// callers only ask for periods something anchors to.
    pub fn get(&self, asset: &Denom, period: u64) -> Result<Snapshot, FarmError> {
        self.find(asset, period)?.ok_or_else(|| {
            InvariantViolation::MissingSnapshot {
                asset: asset.clone(),
                period,
            }
            .into()
        })
    }

    pub fn put(&self, asset: &Denom, period: u64, snapshot: &Snapshot) -> Result<(), FarmError> {
        trace!(%asset, period, refs = snapshot.reference_count, "put snapshot");
        Ok(self.store.put_snapshot(asset, period, snapshot)?)
    }

    /// Whether the snapshot already carries as many anchors as allowed.
    pub fn is_saturated(&self, asset: &Denom, period: u64) -> Result<bool, FarmError> {
        Ok(self.get(asset, period)?.reference_count >= self.max_references)
    }

    /// Add an anchor to the snapshot. Returns the new count.
    pub fn increment_ref(&self, asset: &Denom, period: u64) -> Result<u8, FarmError> {
        let mut snapshot = self.get(asset, period)?;
        if snapshot.reference_count >= self.max_references {
            return Err(InvariantViolation::ReferenceOverflow {
                asset: asset.clone(),
                period,
                cap: self.max_references,
            }
            .into());
        }
        snapshot.reference_count += 1;
        self.put(asset, period, &snapshot)?;
        Ok(snapshot.reference_count)
    }

    /// Release an anchor, deleting the snapshot when it was the last one.
    /// Returns the remaining count.
    pub fn decrement_ref(&self, asset: &Denom, period: u64) -> Result<u8, FarmError> {
        let mut snapshot = self.get(asset, period)?;
        if snapshot.reference_count == 0 {
            return Err(InvariantViolation::ReferenceUnderflow {
                asset: asset.clone(),
                period,
            }
            .into());
        }
        snapshot.reference_count -= 1;
        if snapshot.reference_count == 0 {
            debug!(%asset, period, "pruning unreferenced snapshot");
            self.store.delete_snapshot(asset, period)?;
        } else {
            self.put(asset, period, &snapshot)?;
        }
        Ok(snapshot.reference_count)
    }
}
