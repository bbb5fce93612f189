//! Stake, unstake and harvest orchestration plus reward emission.
//!
//! [`FarmingEngine`] owns nothing but parameters and counters. Every
//! operation receives the block context, the store and the bank, so the
//! same engine value can drive any backend.

use crate::accumulator::RewardAccumulator;
use crate::error::{FarmError, InvariantViolation};
use crate::invariants::check_invariants;
use crate::spans;
use farm_store::{Bank, FarmingStore, Pool, Position};
use farm_types::{Address, Amount, BlockContext, Coins, Denom, FarmingParams};
use farm_utils::StatsCounter;
use tracing::{debug, error, info, Span};

const STAT_NAMES: &[&str] = &[
    "stake",
    "unstake",
    "harvest",
    "allocate",
    "rejected",
    "fatal",
    "invariant_sweeps",
];

/// Entry point for every farming state transition.
pub struct FarmingEngine {
    params: FarmingParams,
    stats: StatsCounter,
}

impl FarmingEngine {
    pub fn new(params: FarmingParams) -> Result<Self, FarmError> {
        params
            .validate()
            .map_err(|e| FarmError::Config(e.to_string()))?;
        Ok(Self {
            params,
            stats: StatsCounter::new(STAT_NAMES),
        })
    }

    pub fn params(&self) -> &FarmingParams {
        &self.params
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    fn accumulator<'a, S: FarmingStore + ?Sized>(
        &self,
        ctx: &BlockContext,
        store: &'a S,
    ) -> RewardAccumulator<'a, S> {
        RewardAccumulator::new(store, *ctx, self.params.max_snapshot_references)
    }

    /// Lock `amount` of `asset` from `staker` into the asset's pool.
    ///
    /// Creates the pool and the position on first use. An existing position
    /// is settled first; the rewards it had earned are paid and returned.
    pub fn stake<S, B>(
        &self,
        ctx: &BlockContext,
        store: &S,
        bank: &B,
        staker: &Address,
        asset: &Denom,
        amount: Amount,
    ) -> Result<Coins, FarmError>
    where
        S: FarmingStore + ?Sized,
        B: Bank + ?Sized,
    {
        let _span = spans::stake_span(staker, asset, amount).entered();
        let result = self.apply_stake(ctx, store, bank, staker, asset, amount);
        self.record("stake", result)
    }

    fn apply_stake<S, B>(
        &self,
        ctx: &BlockContext,
        store: &S,
        bank: &B,
        staker: &Address,
        asset: &Denom,
        amount: Amount,
    ) -> Result<Coins, FarmError>
    where
        S: FarmingStore + ?Sized,
        B: Bank + ?Sized,
    {
        if amount == 0 {
            return Err(FarmError::ZeroAmount);
        }
        let acc = self.accumulator(ctx, store);
        let existing = store.get_position(staker, asset)?;
        if let Some(position) = &existing {
            let pending = acc.pending_rewards(position)?;
            ensure_funds(bank, &self.params.reward_reserve, &pending)?;
        }

        let principal = Coins::single(asset.clone(), amount);
        bank.transfer(staker, &Address::staking_reserve(asset), &principal)?;

        let pool = match store.get_pool(asset)? {
            Some(pool) => pool,
            None => acc.initialize_pool(asset)?,
        };

        // Rewards still in the current period were earned at the old total
        // stake and must be folded in before it changes. A fresh position
        // also needs a new period when the current anchor is full.
        let (mut position, withdrawn) = match existing {
            Some(position) => {
                let withdrawn = acc.withdraw(&position, bank, &self.params.reward_reserve)?;
                (position, withdrawn)
            }
            None => {
                let saturated = acc.snapshots().is_saturated(asset, pool.anchor_period())?;
                if saturated || !pool.current_rewards.is_zero() {
                    acc.rollover_period(asset)?;
                }
                (Position::new(staker.clone(), asset.clone()), Coins::new())
            }
        };

        let mut pool = acc.load_pool(asset)?;
        pool.total_staked = checked_add(asset, pool.total_staked, amount)?;
        store.put_pool(&pool)?;

        position.staked_amount = checked_add(asset, position.staked_amount, amount)?;
        acc.reanchor(&mut position)?;

        debug!(
            %staker,
            %asset,
            amount,
            total = pool.total_staked,
            withdrawn = %withdrawn,
            "staked"
        );
        Ok(withdrawn)
    }

    /// Return `amount` of `staker`'s stake in `asset`, paying out the rewards
    /// earned so far. The position is removed once nothing is left staked.
    pub fn unstake<S, B>(
        &self,
        ctx: &BlockContext,
        store: &S,
        bank: &B,
        staker: &Address,
        asset: &Denom,
        amount: Amount,
    ) -> Result<Coins, FarmError>
    where
        S: FarmingStore + ?Sized,
        B: Bank + ?Sized,
    {
        let _span = spans::unstake_span(staker, asset, amount).entered();
        let result = self.apply_unstake(ctx, store, bank, staker, asset, amount);
        self.record("unstake", result)
    }

    fn apply_unstake<S, B>(
        &self,
        ctx: &BlockContext,
        store: &S,
        bank: &B,
        staker: &Address,
        asset: &Denom,
        amount: Amount,
    ) -> Result<Coins, FarmError>
    where
        S: FarmingStore + ?Sized,
        B: Bank + ?Sized,
    {
        if amount == 0 {
            return Err(FarmError::ZeroAmount);
        }
        let mut position = find_position(store, staker, asset)?;
        if amount > position.staked_amount {
            return Err(FarmError::InsufficientStake {
                requested: amount,
                staked: position.staked_amount,
            });
        }

        let acc = self.accumulator(ctx, store);
        let principal = Coins::single(asset.clone(), amount);
        let staking_reserve = Address::staking_reserve(asset);
        ensure_funds(bank, &staking_reserve, &principal)?;
        let pending = acc.pending_rewards(&position)?;
        ensure_funds(bank, &self.params.reward_reserve, &pending)?;

        let withdrawn = acc.withdraw(&position, bank, &self.params.reward_reserve)?;

        let mut pool = acc.load_pool(asset)?;
        pool.total_staked = pool
            .total_staked
            .checked_sub(amount)
            .ok_or_else(|| InvariantViolation::StakeUnderflow(asset.clone()))?;
        store.put_pool(&pool)?;

        position.staked_amount -= amount;
        if position.staked_amount == 0 {
            store.delete_position(staker, asset)?;
            debug!(%staker, %asset, "closed position");
        } else {
            acc.reanchor(&mut position)?;
        }

        bank.transfer(&staking_reserve, staker, &principal)?;
        debug!(
            %staker,
            %asset,
            amount,
            total = pool.total_staked,
            withdrawn = %withdrawn,
            "unstaked"
        );
        Ok(withdrawn)
    }

    /// Pay out everything `staker` has earned in `asset` without touching
    /// the stake. A second harvest in the same block pays nothing.
    pub fn harvest<S, B>(
        &self,
        ctx: &BlockContext,
        store: &S,
        bank: &B,
        staker: &Address,
        asset: &Denom,
    ) -> Result<Coins, FarmError>
    where
        S: FarmingStore + ?Sized,
        B: Bank + ?Sized,
    {
        let _span = spans::harvest_span(staker, asset).entered();
        let result = self.apply_harvest(ctx, store, bank, staker, asset);
        self.record("harvest", result)
    }

    fn apply_harvest<S, B>(
        &self,
        ctx: &BlockContext,
        store: &S,
        bank: &B,
        staker: &Address,
        asset: &Denom,
    ) -> Result<Coins, FarmError>
    where
        S: FarmingStore + ?Sized,
        B: Bank + ?Sized,
    {
        let mut position = find_position(store, staker, asset)?;
        let acc = self.accumulator(ctx, store);
        let pending = acc.pending_rewards(&position)?;
        ensure_funds(bank, &self.params.reward_reserve, &pending)?;

        let withdrawn = acc.withdraw(&position, bank, &self.params.reward_reserve)?;
        acc.reanchor(&mut position)?;
        debug!(%staker, %asset, withdrawn = %withdrawn, "harvested");
        Ok(withdrawn)
    }

    /// Credit rewards emitted for `asset` in this block.
    ///
    /// The caller has already moved `coins` into the reward reserve. Run
    /// this after the block's stake operations so the emission is shared
    /// by the stake that was live during the block.
    pub fn allocate_rewards<S: FarmingStore + ?Sized>(
        &self,
        ctx: &BlockContext,
        store: &S,
        asset: &Denom,
        coins: &Coins,
    ) -> Result<(), FarmError> {
        let _span = spans::allocate_span(asset).entered();
        let result = self.apply_allocation(ctx, store, asset, coins);
        self.record("allocate", result)
    }

    fn apply_allocation<S: FarmingStore + ?Sized>(
        &self,
        ctx: &BlockContext,
        store: &S,
        asset: &Denom,
        coins: &Coins,
    ) -> Result<(), FarmError> {
        if coins.is_empty() {
            return Ok(());
        }
        let mut pool = store
            .get_pool(asset)?
            .ok_or_else(|| FarmError::PoolNotFound(asset.clone()))?;
        let emitted = coins.to_dec_coins();
        pool.current_rewards = pool
            .current_rewards
            .checked_add(&emitted)
            .map_err(InvariantViolation::arithmetic(asset))?;
        pool.outstanding_rewards = pool
            .outstanding_rewards
            .checked_add(&emitted)
            .map_err(InvariantViolation::arithmetic(asset))?;
        store.put_pool(&pool)?;
        debug!(%asset, height = %ctx.height, emitted = %coins, "allocated rewards");
        Ok(())
    }

    /// What [`Self::harvest`] would pay right now. Reads only.
    pub fn pending_rewards<S: FarmingStore + ?Sized>(
        &self,
        ctx: &BlockContext,
        store: &S,
        staker: &Address,
        asset: &Denom,
    ) -> Result<Coins, FarmError> {
        let position = find_position(store, staker, asset)?;
        self.accumulator(ctx, store).pending_rewards(&position)
    }

    pub fn pool<S: FarmingStore + ?Sized>(
        &self,
        store: &S,
        asset: &Denom,
    ) -> Result<Option<Pool>, FarmError> {
        Ok(store.get_pool(asset)?)
    }

    pub fn position<S: FarmingStore + ?Sized>(
        &self,
        store: &S,
        staker: &Address,
        asset: &Denom,
    ) -> Result<Option<Position>, FarmError> {
        Ok(store.get_position(staker, asset)?)
    }

    pub fn positions_by_staker<S: FarmingStore + ?Sized>(
        &self,
        store: &S,
        staker: &Address,
    ) -> Result<Vec<Position>, FarmError> {
        Ok(store.iter_positions_by_staker(staker)?)
    }

    pub fn pools<S: FarmingStore + ?Sized>(&self, store: &S) -> Result<Vec<Pool>, FarmError> {
        Ok(store.iter_pools()?)
    }

    /// Open the span covering this block's farming work. Keep the returned
    /// span entered while the block's operations run.
    pub fn begin_block(&self, ctx: &BlockContext) -> Span {
        debug!(height = %ctx.height, "begin block");
        spans::block_span(ctx.height)
    }

    /// Close the block, sweeping every invariant when the height falls on
    /// the configured interval.
    pub fn end_block<S: FarmingStore + ?Sized>(
        &self,
        ctx: &BlockContext,
        store: &S,
    ) -> Result<(), FarmError> {
        if !ctx.height.is_multiple_of(self.params.invariant_check_interval) {
            return Ok(());
        }
        let _span = spans::invariants_span(ctx.height).entered();
        self.stats.increment("invariant_sweeps");
        let report = check_invariants(store)?;
        if report.is_ok() {
            info!(
                pools = report.pools,
                positions = report.positions,
                references = report.references,
                "invariants hold"
            );
            return Ok(());
        }
        for broken in &report.broken {
            error!(height = %ctx.height, %broken, "invariant broken");
        }
        self.stats.increment("fatal");
        Err(report.into_violation().into())
    }

    fn record<T>(&self, op: &'static str, result: Result<T, FarmError>) -> Result<T, FarmError> {
        match &result {
            Ok(_) => self.stats.increment(op),
            Err(err) if err.is_fatal() => {
                self.stats.increment("fatal");
                error!(op, error = %err, "fatal farming error");
            }
            Err(err) => {
                self.stats.increment("rejected");
                debug!(op, error = %err, "operation rejected");
            }
        }
        result
    }
}

fn find_position<S: FarmingStore + ?Sized>(
    store: &S,
    staker: &Address,
    asset: &Denom,
) -> Result<Position, FarmError> {
    store
        .get_position(staker, asset)?
        .ok_or_else(|| FarmError::PositionNotFound {
            staker: staker.clone(),
            asset: asset.clone(),
        })
}

/// Fail with `InsufficientFunds` unless `address` holds all of `coins`.
fn ensure_funds<B: Bank + ?Sized>(bank: &B, address: &Address, coins: &Coins) -> Result<(), FarmError> {
    for (denom, needed) in coins.iter() {
        let available = bank.balance(address, denom)?;
        if available < *needed {
            return Err(FarmError::InsufficientFunds {
                address: address.clone(),
                denom: denom.clone(),
                needed: *needed,
                available,
            });
        }
    }
    Ok(())
}

fn checked_add(asset: &Denom, a: Amount, b: Amount) -> Result<Amount, FarmError> {
    a.checked_add(b).ok_or_else(|| {
        InvariantViolation::Arithmetic {
            asset: asset.clone(),
            source: farm_types::TypesError::Overflow,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_nullables::{NullBank, NullChain, NullFarmingStore};
    use farm_store::{PoolStore, SnapshotStore};

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn asset() -> Denom {
        Denom::new("pool1").unwrap()
    }

    fn reward() -> Denom {
        Denom::new("ureward").unwrap()
    }

    struct Fixture {
        engine: FarmingEngine,
        store: NullFarmingStore,
        bank: NullBank,
        chain: NullChain,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_params(FarmingParams::default())
        }

        fn with_params(params: FarmingParams) -> Self {
            Self {
                engine: FarmingEngine::new(params).unwrap(),
                store: NullFarmingStore::new(),
                bank: NullBank::new(),
                chain: NullChain::default(),
            }
        }

        fn fund(&self, who: &str, amount: u128) {
            self.bank.mint(&addr(who), &Coins::single(asset(), amount));
        }

        fn stake(&self, who: &str, amount: u128) -> Result<Coins, FarmError> {
            self.engine.stake(
                &self.chain.ctx(),
                &self.store,
                &self.bank,
                &addr(who),
                &asset(),
                amount,
            )
        }

        fn unstake(&self, who: &str, amount: u128) -> Result<Coins, FarmError> {
            self.engine.unstake(
                &self.chain.ctx(),
                &self.store,
                &self.bank,
                &addr(who),
                &asset(),
                amount,
            )
        }

        fn harvest(&self, who: &str) -> Result<Coins, FarmError> {
            self.engine
                .harvest(&self.chain.ctx(), &self.store, &self.bank, &addr(who), &asset())
        }

        fn emit(&self, amount: u128) {
            let coins = Coins::single(reward(), amount);
            self.bank.mint(&self.engine.params().reward_reserve, &coins);
            self.engine
                .allocate_rewards(&self.chain.ctx(), &self.store, &asset(), &coins)
                .unwrap();
        }
    }

    #[test]
    fn first_stake_creates_pool_and_position() {
        let f = Fixture::new();
        f.fund("farm1alice", 100);
        assert!(f.stake("farm1alice", 100).unwrap().is_empty());

        let pool = f.store.get_pool(&asset()).unwrap().unwrap();
        assert_eq!(pool.total_staked, 100);
        assert_eq!(pool.period, 1);
        let position = f.engine.position(&f.store, &addr("farm1alice"), &asset()).unwrap().unwrap();
        assert_eq!(position.staked_amount, 100);
        assert_eq!(position.previous_period, 0);
        // Pool and position both anchor period 0.
        assert_eq!(f.store.get_snapshot(&asset(), 0).unwrap().unwrap().reference_count, 2);
        assert_eq!(f.bank.balance_of(&Address::staking_reserve(&asset()), &asset()), 100);
        assert_eq!(f.engine.stats().get("stake"), 1);
    }

    #[test]
    fn zero_amounts_are_rejected_before_any_write() {
        let f = Fixture::new();
        assert!(matches!(f.stake("farm1alice", 0), Err(FarmError::ZeroAmount)));
        assert!(matches!(f.unstake("farm1alice", 0), Err(FarmError::ZeroAmount)));
        assert!(f.store.iter_pools().unwrap().is_empty());
        assert_eq!(f.engine.stats().get("rejected"), 2);
    }

    #[test]
    fn stake_without_funds_changes_nothing() {
        let f = Fixture::new();
        f.fund("farm1alice", 10);
        let err = f.stake("farm1alice", 11).unwrap_err();
        assert!(matches!(err, FarmError::InsufficientFunds { needed: 11, available: 10, .. }));
        assert!(f.store.get_pool(&asset()).unwrap().is_none());
    }

    #[test]
    fn unstake_more_than_staked_is_rejected() {
        let f = Fixture::new();
        f.fund("farm1alice", 100);
        f.stake("farm1alice", 100).unwrap();
        let err = f.unstake("farm1alice", 101).unwrap_err();
        assert!(matches!(
            err,
            FarmError::InsufficientStake {
                requested: 101,
                staked: 100
            }
        ));
    }

    #[test]
    fn missing_position_is_reported() {
        let f = Fixture::new();
        assert!(matches!(
            f.harvest("farm1bob"),
            Err(FarmError::PositionNotFound { .. })
        ));
        assert!(matches!(
            f.unstake("farm1bob", 1),
            Err(FarmError::PositionNotFound { .. })
        ));
        assert!(matches!(
            f.engine
                .pending_rewards(&f.chain.ctx(), &f.store, &addr("farm1bob"), &asset()),
            Err(FarmError::PositionNotFound { .. })
        ));
    }

    #[test]
    fn emission_to_unknown_pool_fails() {
        let f = Fixture::new();
        let err = f
            .engine
            .allocate_rewards(
                &f.chain.ctx(),
                &f.store,
                &asset(),
                &Coins::single(reward(), 5),
            )
            .unwrap_err();
        assert!(matches!(err, FarmError::PoolNotFound(_)));
        // Nothing to allocate is fine even without a pool.
        f.engine
            .allocate_rewards(&f.chain.ctx(), &f.store, &asset(), &Coins::new())
            .unwrap();
    }

    #[test]
    fn harvest_pays_emission_of_previous_blocks() {
        let f = Fixture::new();
        f.fund("farm1alice", 100);
        f.stake("farm1alice", 100).unwrap();
        f.emit(40);
        f.chain.advance();

        assert_eq!(
            f.engine
                .pending_rewards(&f.chain.ctx(), &f.store, &addr("farm1alice"), &asset())
                .unwrap(),
            Coins::single(reward(), 40)
        );
        assert_eq!(f.harvest("farm1alice").unwrap(), Coins::single(reward(), 40));
        assert_eq!(f.bank.balance_of(&addr("farm1alice"), &reward()), 40);
        // Second harvest in the same block pays nothing.
        assert!(f.harvest("farm1alice").unwrap().is_empty());
    }

    #[test]
    fn restake_pays_out_earned_rewards() {
        let f = Fixture::new();
        f.fund("farm1alice", 150);
        f.stake("farm1alice", 100).unwrap();
        f.emit(30);
        f.chain.advance();
        assert_eq!(f.stake("farm1alice", 50).unwrap(), Coins::single(reward(), 30));
        let position = f.engine.position(&f.store, &addr("farm1alice"), &asset()).unwrap().unwrap();
        assert_eq!(position.staked_amount, 150);
        assert_eq!(f.store.get_pool(&asset()).unwrap().unwrap().total_staked, 150);
    }

    #[test]
    fn full_unstake_closes_position_and_returns_principal() {
        let f = Fixture::new();
        f.fund("farm1alice", 100);
        f.stake("farm1alice", 100).unwrap();
        f.chain.advance();
        assert!(f.unstake("farm1alice", 100).unwrap().is_empty());

        assert!(f.engine.position(&f.store, &addr("farm1alice"), &asset()).unwrap().is_none());
        assert_eq!(f.bank.balance_of(&addr("farm1alice"), &asset()), 100);
        assert_eq!(f.store.get_pool(&asset()).unwrap().unwrap().total_staked, 0);
        assert!(check_invariants(&f.store).unwrap().is_ok());
    }

    #[test]
    fn underfunded_reward_reserve_blocks_harvest_without_side_effects() {
        let f = Fixture::new();
        f.fund("farm1alice", 100);
        f.stake("farm1alice", 100).unwrap();
        // Allocate without minting the reserve.
        f.engine
            .allocate_rewards(
                &f.chain.ctx(),
                &f.store,
                &asset(),
                &Coins::single(reward(), 10),
            )
            .unwrap();
        f.chain.advance();
        let before = f.store.get_pool(&asset()).unwrap().unwrap();
        assert!(matches!(
            f.harvest("farm1alice"),
            Err(FarmError::InsufficientFunds { needed: 10, .. })
        ));
        assert_eq!(f.store.get_pool(&asset()).unwrap().unwrap(), before);
    }

    #[test]
    fn saturated_anchor_opens_a_new_period_for_fresh_positions() {
        let params = FarmingParams {
            max_snapshot_references: FarmingParams::LEGACY_MAX_SNAPSHOT_REFERENCES,
            ..FarmingParams::default()
        };
        let f = Fixture::with_params(params);
        f.fund("farm1alice", 10);
        f.fund("farm1bob", 10);
        f.stake("farm1alice", 10).unwrap();
        f.stake("farm1bob", 10).unwrap();

        let pool = f.store.get_pool(&asset()).unwrap().unwrap();
        assert_eq!(pool.period, 2);
        let bob = f.engine.position(&f.store, &addr("farm1bob"), &asset()).unwrap().unwrap();
        assert_eq!(bob.previous_period, 1);
        assert_eq!(f.store.get_snapshot(&asset(), 0).unwrap().unwrap().reference_count, 1);
        assert_eq!(f.store.get_snapshot(&asset(), 1).unwrap().unwrap().reference_count, 2);
        assert_eq!(f.engine.stats().get("fatal"), 0);
    }

    #[test]
    fn fatal_errors_are_counted() {
        let f = Fixture::new();
        f.fund("farm1alice", 10);
        f.stake("farm1alice", 10).unwrap();
        // Drop the pool's anchor snapshot behind the engine's back.
        f.store.delete_snapshot(&asset(), 0).unwrap();
        f.chain.advance();
        let err = f.harvest("farm1alice").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(f.engine.stats().get("fatal"), 1);
    }

    #[test]
    fn end_block_sweeps_on_interval() {
        let params = FarmingParams {
            invariant_check_interval: 2,
            ..FarmingParams::default()
        };
        let f = Fixture::with_params(params);
        f.fund("farm1alice", 10);
        f.stake("farm1alice", 10).unwrap();

        f.engine.end_block(&BlockContext::at(1), &f.store).unwrap();
        assert_eq!(f.engine.stats().get("invariant_sweeps"), 0);
        f.engine.end_block(&BlockContext::at(2), &f.store).unwrap();
        assert_eq!(f.engine.stats().get("invariant_sweeps"), 1);

        // Corrupt total stake; the next sweep must catch it.
        let mut pool = f.store.get_pool(&asset()).unwrap().unwrap();
        pool.total_staked = 11;
        f.store.put_pool(&pool).unwrap();
        let err = f.engine.end_block(&BlockContext::at(4), &f.store).unwrap_err();
        assert!(matches!(
            err,
            FarmError::Invariant(InvariantViolation::Broken { count: 1, .. })
        ));
    }

    #[test]
    fn invalid_params_are_a_config_error() {
        let params = FarmingParams {
            max_snapshot_references: 1,
            ..FarmingParams::default()
        };
        assert!(matches!(FarmingEngine::new(params), Err(FarmError::Config(_))));
    }
}
