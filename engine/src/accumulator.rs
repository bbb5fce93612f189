//! Period rollover and reward computation.
//!
//! Rewards emitted to a pool collect in `current_rewards`. A rollover folds
//! them into a new snapshot as `current_rewards / total_staked` on top of
//! the previous cumulative value, then opens the next period. A position's
//! reward between two anchors is the difference of the two cumulative values
//! times its (constant) stake, so every position must be settled before its
//! stake changes.
//!
//! Ordering within one asset matters: roll over before computing rewards,
//! release the old anchor before taking the new one.

use crate::error::{FarmError, InvariantViolation};
use crate::snapshots::SnapshotLedger;
use crate::spans;
use farm_store::{Bank, FarmingStore, Pool, Position, Snapshot};
use farm_types::{Address, BlockContext, Coins, DecCoins, Denom};
use tracing::{debug, info};

/// Binds pools, positions and snapshots for one block.
pub struct RewardAccumulator<'a, S: FarmingStore + ?Sized> {
    store: &'a S,
    snapshots: SnapshotLedger<'a, S>,
    ctx: BlockContext,
}

impl<'a, S: FarmingStore + ?Sized> RewardAccumulator<'a, S> {
    pub fn new(store: &'a S, ctx: BlockContext, max_references: u8) -> Self {
        Self {
            store,
            snapshots: SnapshotLedger::new(store, max_references),
            ctx,
        }
    }

    pub fn snapshots(&self) -> &SnapshotLedger<'a, S> {
        &self.snapshots
    }

    /// Load a pool that something is known to reference.
    pub fn load_pool(&self, asset: &Denom) -> Result<Pool, FarmError> {
        self.store
            .get_pool(asset)?
            .ok_or_else(|| InvariantViolation::MissingPool(asset.clone()).into())
    }

    /// Create the pool of a never-seen asset together with its period-0
    /// snapshot, which carries the pool's own reference.
    pub fn initialize_pool(&self, asset: &Denom) -> Result<Pool, FarmError> {
        let pool = Pool::new(asset.clone());
        self.snapshots
            .put(asset, pool.anchor_period(), &Snapshot::new(DecCoins::new(), 1))?;
        self.store.put_pool(&pool)?;
        info!(%asset, height = %self.ctx.height, "created pool");
        Ok(pool)
    }

    /// Close the pool's current period and return its index.
    pub fn rollover_period(&self, asset: &Denom) -> Result<u64, FarmError> {
        let mut pool = self.load_pool(asset)?;
        self.rollover(&mut pool)
    }

    /// Rollover on an already loaded pool; `pool` is updated and stored.
    pub(crate) fn rollover(&self, pool: &mut Pool) -> Result<u64, FarmError> {
        let asset = pool.asset.clone();
        let _span = spans::rollover_span(&asset, pool.period).entered();

        let unit_rewards = if pool.total_staked == 0 {
            DecCoins::new()
        } else {
            pool.current_rewards
                .checked_quo_int(pool.total_staked)
                .map_err(InvariantViolation::arithmetic(&asset))?
        };

        let previous = self.snapshots.get(&asset, pool.anchor_period())?;
        self.snapshots.decrement_ref(&asset, pool.anchor_period())?;

        let cumulative = previous
            .cumulative_unit_rewards
            .checked_add(&unit_rewards)
            .map_err(InvariantViolation::arithmetic(&asset))?;
        self.snapshots
            .put(&asset, pool.period, &Snapshot::new(cumulative, 1))?;

        if pool.total_staked == 0 && !pool.current_rewards.is_zero() {
            debug!(
                %asset,
                stranded = %pool.current_rewards,
                "rewards emitted to an empty pool stay undistributed"
            );
        }
        pool.current_rewards = DecCoins::new();
        let old_period = pool.period;
        pool.period += 1;
        self.store.put_pool(pool)?;

        debug!(%asset, period = old_period, unit = %unit_rewards, "rolled over period");
        Ok(old_period)
    }

    /// Reward accrued by `position` from its anchor up to `end_period`.
    pub fn rewards_earned(
        &self,
        position: &Position,
        end_period: u64,
    ) -> Result<DecCoins, FarmError> {
        if position.anchor_height == self.ctx.height {
            return Ok(DecCoins::new());
        }
        let asset = &position.asset;
        let start = self.snapshots.get(asset, position.previous_period)?;
        let end = self.snapshots.get(asset, end_period)?;
        Self::earned_between(asset, &start, &end, position, end_period)
    }

    fn earned_between(
        asset: &Denom,
        start: &Snapshot,
        end: &Snapshot,
        position: &Position,
        end_period: u64,
    ) -> Result<DecCoins, FarmError> {
        let difference = end
            .cumulative_unit_rewards
            .checked_sub(&start.cumulative_unit_rewards)
            .map_err(|_| InvariantViolation::DecreasingCumulative {
                asset: asset.clone(),
                from: position.previous_period,
                to: end_period,
            })?;
        Ok(difference
            .checked_mul_int(position.staked_amount)
            .map_err(InvariantViolation::arithmetic(asset))?)
    }

    /// What a withdrawal would pay right now, without writing anything.
    pub fn pending_rewards(&self, position: &Position) -> Result<Coins, FarmError> {
        if position.anchor_height == self.ctx.height {
            return Ok(Coins::new());
        }
        let asset = &position.asset;
        let pool = self.load_pool(asset)?;
        let unit_rewards = if pool.total_staked == 0 {
            DecCoins::new()
        } else {
            pool.current_rewards
                .checked_quo_int(pool.total_staked)
                .map_err(InvariantViolation::arithmetic(asset))?
        };
        let latest = self.snapshots.get(asset, pool.anchor_period())?;
        let projected = Snapshot::new(
            latest
                .cumulative_unit_rewards
                .checked_add(&unit_rewards)
                .map_err(InvariantViolation::arithmetic(asset))?,
            latest.reference_count,
        );
        let start = self.snapshots.get(asset, position.previous_period)?;
        let earned = Self::earned_between(asset, &start, &projected, position, pool.period)?;
        let (owed, _) = earned
            .truncate_decimal()
            .map_err(InvariantViolation::arithmetic(asset))?;
        Ok(owed)
    }

    /// Settle `position`: roll the pool over, pay out the integral part of
    /// what it earned, and release its anchor. The fractional remainder stays
    /// in `outstanding_rewards`.
    ///
    /// The position is not reanchored; callers follow up with [`Self::reanchor`]
    /// or delete it.
    pub fn withdraw<B: Bank + ?Sized>(
        &self,
        position: &Position,
        bank: &B,
        reward_reserve: &Address,
    ) -> Result<Coins, FarmError> {
        let asset = &position.asset;
        let mut pool = self.load_pool(asset)?;
        let end_period = self.rollover(&mut pool)?;

        let earned = self.rewards_earned(position, end_period)?;
        let (owed, _) = earned
            .truncate_decimal()
            .map_err(InvariantViolation::arithmetic(asset))?;

        if !owed.is_empty() {
            bank.transfer(reward_reserve, &position.staker, &owed)?;
            pool.outstanding_rewards = pool
                .outstanding_rewards
                .checked_sub(&owed.to_dec_coins())
                .map_err(|_| InvariantViolation::OutstandingUnderflow(asset.clone()))?;
            self.store.put_pool(&pool)?;
            debug!(staker = %position.staker, %asset, paid = %owed, "withdrew rewards");
        }

        self.snapshots
            .decrement_ref(asset, position.previous_period)?;
        Ok(owed)
    }

    /// Anchor `position` to the pool's latest snapshot as of this block and
    /// store it.
    pub fn reanchor(&self, position: &mut Position) -> Result<(), FarmError> {
        let pool = self.load_pool(&position.asset)?;
        let anchor = pool.anchor_period();
        self.snapshots.increment_ref(&position.asset, anchor)?;
        position.previous_period = anchor;
        position.anchor_height = self.ctx.height;
        self.store.put_position(position)?;
        Ok(())
    }
}
