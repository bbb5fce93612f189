//! Pre-built [`tracing::Span`] constructors for engine operations.
//!
//! Every span carries the asset, and the staker where there is one.

use farm_types::{Address, Amount, BlockHeight, Denom};
use tracing::{debug_span, info_span, Span};

/// Span covering everything the engine does within one block.
pub fn block_span(height: BlockHeight) -> Span {
    info_span!("farm_block", height = %height)
}

pub fn stake_span(staker: &Address, asset: &Denom, amount: Amount) -> Span {
    info_span!("stake", staker = %staker, asset = %asset, amount = %amount)
}

pub fn unstake_span(staker: &Address, asset: &Denom, amount: Amount) -> Span {
    info_span!("unstake", staker = %staker, asset = %asset, amount = %amount)
}

pub fn harvest_span(staker: &Address, asset: &Denom) -> Span {
    info_span!("harvest", staker = %staker, asset = %asset)
}

pub fn allocate_span(asset: &Denom) -> Span {
    debug_span!("allocate_rewards", asset = %asset)
}

pub fn rollover_span(asset: &Denom, period: u64) -> Span {
    debug_span!("rollover", asset = %asset, period = period)
}

pub fn invariants_span(height: BlockHeight) -> Span {
    info_span!("invariants", height = %height)
}
