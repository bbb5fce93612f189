//! Nullable chain: deterministic block heights for testing.

use farm_types::{BlockContext, BlockHeight};
use std::cell::Cell;

/// A deterministic block producer for testing.
///
/// The height only advances when you tell it to.
pub struct NullChain {
    current: Cell<i64>,
}

impl NullChain {
    pub fn new(initial_height: i64) -> Self {
        Self {
            current: Cell::new(initial_height),
        }
    }

    /// Context of the block currently being executed.
    pub fn ctx(&self) -> BlockContext {
        BlockContext::at(self.current.get())
    }

    pub fn height(&self) -> BlockHeight {
        BlockHeight::new(self.current.get())
    }

    /// Move to the next block and return its context.
    pub fn advance(&self) -> BlockContext {
        self.advance_by(1)
    }

    /// Skip ahead `blocks` blocks and return the new context.
    pub fn advance_by(&self, blocks: i64) -> BlockContext {
        self.current.set(self.current.get() + blocks);
        self.ctx()
    }
}

impl Default for NullChain {
    fn default() -> Self {
        Self::new(1)
    }
}
