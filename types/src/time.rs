//! Block heights and the per-block execution context.
//!
//! The engine never reads a wall clock. Every operation receives the
//! height of the block it executes in, so replaying the same blocks on
//! every replica yields identical state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Height of a block in the chain being processed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHeight(i64);

impl BlockHeight {
    /// The genesis height.
    pub const GENESIS: Self = Self(0);

    pub fn new(height: i64) -> Self {
        Self(height)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// The following block's height.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Whether this height falls on a multiple of `interval` (never for 0).
    pub fn is_multiple_of(&self, interval: u64) -> bool {
        interval != 0 && self.0 >= 0 && (self.0 as u64) % interval == 0
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only facts about the block currently being executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub height: BlockHeight,
}

impl BlockContext {
    pub fn at(height: i64) -> Self {
        Self {
            height: BlockHeight::new(height),
        }
    }
}
