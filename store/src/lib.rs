//! Abstract storage traits for the farming engine.
//!
//! Every storage backend (a node's state database, the in-memory store used
//! in tests) implements these traits. The engine depends only on the traits,
//! and every operation receives the store explicitly.

pub mod bank;
pub mod codec;
pub mod error;
pub mod pool;
pub mod position;
pub mod snapshot;

pub use bank::{Bank, BankError};
pub use error::StoreError;
pub use pool::{Pool, PoolStore};
pub use position::{Position, PositionStore};
pub use snapshot::{Snapshot, SnapshotStore};

/// Everything the reward engine reads and writes, bundled.
pub trait FarmingStore: PoolStore + SnapshotStore + PositionStore {}

impl<T: PoolStore + SnapshotStore + PositionStore + ?Sized> FarmingStore for T {}
