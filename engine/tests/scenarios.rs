use farm_engine::{
    check_invariants, export_genesis, import_genesis, FarmError, FarmingEngine, InvariantViolation,
};
use farm_nullables::{NullBank, NullChain, NullFarmingStore};
use farm_store::{PoolStore, PositionStore, SnapshotStore};
use farm_types::{Address, Coins, Dec, Denom, FarmingParams};

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

fn lp() -> Denom {
    Denom::new("pool/lp1").unwrap()
}

fn reward() -> Denom {
    Denom::new("ureward").unwrap()
}

/// Engine plus nullable collaborators, checking every invariant after
/// each successful operation.
struct Farm {
    engine: FarmingEngine,
    store: NullFarmingStore,
    bank: NullBank,
    chain: NullChain,
    emitted: u128,
}

impl Farm {
    fn new() -> Self {
        Self::with_params(FarmingParams::default())
    }

    fn with_params(params: FarmingParams) -> Self {
        Self {
            engine: FarmingEngine::new(params).unwrap(),
            store: NullFarmingStore::new(),
            bank: NullBank::new(),
            chain: NullChain::default(),
            emitted: 0,
        }
    }

    fn fund(&self, who: &str, amount: u128) {
        self.bank.mint(&addr(who), &Coins::single(lp(), amount));
    }

    fn assert_invariants(&self) {
        let report = check_invariants(&self.store).unwrap();
        assert!(report.is_ok(), "broken invariants: {:?}", report.broken);
    }

    fn stake(&self, who: &str, amount: u128) -> u128 {
        let paid = self
            .engine
            .stake(&self.chain.ctx(), &self.store, &self.bank, &addr(who), &lp(), amount)
            .unwrap();
        self.assert_invariants();
        paid.amount_of(&reward())
    }

    fn unstake(&self, who: &str, amount: u128) -> u128 {
        let paid = self
            .engine
            .unstake(&self.chain.ctx(), &self.store, &self.bank, &addr(who), &lp(), amount)
            .unwrap();
        self.assert_invariants();
        paid.amount_of(&reward())
    }

    fn harvest(&self, who: &str) -> u128 {
        let paid = self
            .engine
            .harvest(&self.chain.ctx(), &self.store, &self.bank, &addr(who), &lp())
            .unwrap();
        self.assert_invariants();
        paid.amount_of(&reward())
    }

    fn pending(&self, who: &str) -> u128 {
        self.engine
            .pending_rewards(&self.chain.ctx(), &self.store, &addr(who), &lp())
            .unwrap()
            .amount_of(&reward())
    }

    /// Emit at the end of the current block and move to the next one.
    fn emit_and_advance(&mut self, amount: u128) {
        let coins = Coins::single(reward(), amount);
        self.bank.mint(&self.engine.params().reward_reserve, &coins);
        let ctx = self.chain.ctx();
        self.engine
            .allocate_rewards(&ctx, &self.store, &lp(), &coins)
            .unwrap();
        self.engine.end_block(&ctx, &self.store).unwrap();
        self.emitted += amount;
        self.chain.advance();
    }

    fn outstanding(&self) -> Dec {
        self.store
            .get_pool(&lp())
            .unwrap()
            .unwrap()
            .outstanding_rewards
            .amount_of(&reward())
    }
}

#[test]
fn two_stakers_split_in_proportion_to_stake() {
    let mut farm = Farm::new();
    farm.fund("farm1alice", 100);
    farm.fund("farm1bob", 300);
    farm.stake("farm1alice", 100);
    farm.stake("farm1bob", 300);
    farm.emit_and_advance(400);

    assert_eq!(farm.pending("farm1alice"), 100);
    assert_eq!(farm.pending("farm1bob"), 300);
    assert_eq!(farm.harvest("farm1alice"), 100);
    assert_eq!(farm.harvest("farm1bob"), 300);
    assert!(farm.outstanding().is_zero());
}

#[test]
fn emission_into_empty_pool_stays_stranded() {
    let mut farm = Farm::new();
    farm.fund("farm1alice", 10);
    farm.fund("farm1bob", 100);
    farm.stake("farm1alice", 10);
    farm.chain.advance();
    farm.unstake("farm1alice", 10);
    assert_eq!(farm.store.get_pool(&lp()).unwrap().unwrap().total_staked, 0);

    farm.emit_and_advance(50);
    farm.stake("farm1bob", 100);
    farm.emit_and_advance(0);

    assert_eq!(farm.harvest("farm1bob"), 0);
    assert_eq!(farm.outstanding(), Dec::from_int(50));
    assert!(farm.store.get_pool(&lp()).unwrap().unwrap().current_rewards.is_zero());
}

#[test]
fn stake_then_unstake_without_emission_restores_balance() {
    let farm = Farm::new();
    farm.fund("farm1alice", 100);
    farm.stake("farm1alice", 100);
    farm.chain.advance_by(5);
    assert_eq!(farm.unstake("farm1alice", 100), 0);

    assert_eq!(farm.bank.balance_of(&addr("farm1alice"), &lp()), 100);
    assert_eq!(farm.bank.balance_of(&Address::staking_reserve(&lp()), &lp()), 0);
    assert!(farm.store.iter_positions().unwrap().is_empty());
    // Only the pool's own anchor remains.
    assert_eq!(farm.store.iter_snapshots().unwrap().len(), 1);
}

#[test]
fn harvest_is_idempotent_within_a_block() {
    let mut farm = Farm::new();
    farm.fund("farm1alice", 7);
    farm.stake("farm1alice", 7);
    farm.emit_and_advance(70);

    assert_eq!(farm.harvest("farm1alice"), 70);
    assert_eq!(farm.harvest("farm1alice"), 0);
    assert_eq!(farm.harvest("farm1alice"), 0);
    assert_eq!(farm.bank.balance_of(&addr("farm1alice"), &reward()), 70);
}

#[test]
fn restaking_and_harvesting_in_one_block_pays_once() {
    let mut farm = Farm::new();
    farm.fund("farm1alice", 20);
    farm.stake("farm1alice", 10);
    farm.emit_and_advance(30);

    let on_stake = farm.stake("farm1alice", 10);
    let on_harvest = farm.harvest("farm1alice");
    assert_eq!(on_stake + on_harvest, 30);
    assert_eq!(on_harvest, 0);
}

#[test]
fn late_staker_only_shares_later_emissions() {
    let mut farm = Farm::new();
    farm.fund("farm1alice", 100);
    farm.fund("farm1bob", 100);
    farm.stake("farm1alice", 100);
    farm.emit_and_advance(100);

    farm.stake("farm1bob", 100);
    farm.emit_and_advance(100);

    assert_eq!(farm.harvest("farm1bob"), 50);
    assert_eq!(farm.harvest("farm1alice"), 150);
}

#[test]
fn partial_unstake_keeps_earning_on_the_remainder() {
    let mut farm = Farm::new();
    farm.fund("farm1alice", 100);
    farm.fund("farm1bob", 100);
    farm.stake("farm1alice", 100);
    farm.stake("farm1bob", 100);
    farm.emit_and_advance(200);

    assert_eq!(farm.unstake("farm1alice", 50), 100);
    farm.emit_and_advance(150);

    assert_eq!(farm.harvest("farm1alice"), 50);
    assert_eq!(farm.harvest("farm1bob"), 200);
    assert_eq!(farm.bank.balance_of(&addr("farm1alice"), &lp()), 50);
}

#[test]
fn payouts_never_exceed_emissions() {
    let mut farm = Farm::new();
    let stakers = [("farm1alice", 3), ("farm1bob", 7), ("farm1carol", 11)];
    for (who, amount) in stakers {
        farm.fund(who, amount);
        farm.stake(who, amount);
    }
    for amount in [10, 13, 1, 29] {
        farm.emit_and_advance(amount);
    }

    let paid: u128 = stakers.iter().map(|(who, _)| farm.harvest(who)).sum();
    assert!(paid <= farm.emitted);
    // Whatever truncation kept back is still owed.
    assert_eq!(
        farm.outstanding().checked_add(Dec::from_int(paid)).unwrap(),
        Dec::from_int(farm.emitted)
    );
    assert_eq!(
        farm.bank.balance_of(&farm.engine.params().reward_reserve, &reward()),
        farm.emitted - paid
    );
}

#[test]
fn fresh_positions_in_one_block_share_the_anchor_snapshot() {
    let farm = Farm::new();
    for who in ["farm1alice", "farm1bob", "farm1carol"] {
        farm.fund(who, 5);
        farm.stake(who, 5);
    }
    let anchor = farm.store.get_snapshot(&lp(), 0).unwrap().unwrap();
    assert_eq!(anchor.reference_count, 4);
}

#[test]
fn legacy_reference_cap_holds_with_many_fresh_positions_in_one_block() {
    let mut farm = Farm::with_params(FarmingParams {
        max_snapshot_references: FarmingParams::LEGACY_MAX_SNAPSHOT_REFERENCES,
        ..FarmingParams::default()
    });
    let stakers = ["farm1alice", "farm1bob", "farm1carol", "farm1dave"];
    for who in stakers {
        farm.fund(who, 10);
        farm.stake(who, 10);
    }
    for (_, _, snapshot) in farm.store.iter_snapshots().unwrap() {
        assert!(snapshot.reference_count <= 2);
    }

    farm.emit_and_advance(40);
    for who in stakers {
        assert_eq!(farm.harvest(who), 10);
    }
}

#[test]
fn default_cap_survives_more_fresh_positions_than_a_u8_can_count() {
    let farm = Farm::new();
    for i in 0..300 {
        let who = format!("farm1staker{i}");
        farm.fund(&who, 1);
        farm.stake(&who, 1);
    }
    assert_eq!(farm.store.iter_positions().unwrap().len(), 300);
    assert_eq!(farm.engine.stats().get("fatal"), 0);
}

#[test]
fn corrupted_anchor_is_fatal_not_a_panic() {
    let farm = Farm::new();
    farm.fund("farm1alice", 10);
    farm.stake("farm1alice", 10);
    farm.store.delete_snapshot(&lp(), 0).unwrap();

    let err = farm
        .engine
        .stake(&farm.chain.ctx(), &farm.store, &farm.bank, &addr("farm1alice"), &lp(), 0)
        .unwrap_err();
    assert!(matches!(err, FarmError::ZeroAmount));
    let err = farm
        .engine
        .unstake(&farm.chain.ctx(), &farm.store, &farm.bank, &addr("farm1alice"), &lp(), 5)
        .unwrap_err();
    assert!(matches!(
        err,
        FarmError::Invariant(InvariantViolation::MissingSnapshot { period: 0, .. })
    ));
}

#[test]
fn user_errors_leave_state_untouched() {
    let farm = Farm::new();
    farm.fund("farm1alice", 10);
    farm.stake("farm1alice", 10);
    let before = export_genesis(&farm.store, farm.engine.params()).unwrap();

    let ctx = farm.chain.ctx();
    let alice = addr("farm1alice");
    assert!(matches!(
        farm.engine.unstake(&ctx, &farm.store, &farm.bank, &alice, &lp(), 11),
        Err(FarmError::InsufficientStake { .. })
    ));
    assert!(matches!(
        farm.engine.stake(&ctx, &farm.store, &farm.bank, &alice, &lp(), 1),
        Err(FarmError::InsufficientFunds { .. })
    ));
    assert!(matches!(
        farm.engine.harvest(&ctx, &farm.store, &farm.bank, &addr("farm1bob"), &lp()),
        Err(FarmError::PositionNotFound { .. })
    ));

    let after = export_genesis(&farm.store, farm.engine.params()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn genesis_round_trip_preserves_pending_rewards() {
    let mut farm = Farm::new();
    farm.fund("farm1alice", 30);
    farm.fund("farm1bob", 10);
    farm.stake("farm1alice", 30);
    farm.stake("farm1bob", 10);
    farm.emit_and_advance(80);

    let genesis = export_genesis(&farm.store, farm.engine.params()).unwrap();
    let json = genesis.to_json().unwrap();

    let restored = NullFarmingStore::new();
    import_genesis(&restored, &farm_engine::FarmingGenesis::from_json(&json).unwrap()).unwrap();
    assert!(check_invariants(&restored).unwrap().is_ok());

    let ctx = farm.chain.ctx();
    for who in ["farm1alice", "farm1bob"] {
        let original = farm
            .engine
            .pending_rewards(&ctx, &farm.store, &addr(who), &lp())
            .unwrap();
        let imported = farm
            .engine
            .pending_rewards(&ctx, &restored, &addr(who), &lp())
            .unwrap();
        assert_eq!(original, imported);
    }
    assert_eq!(farm.pending("farm1alice"), 60);
}

#[test]
fn pools_and_positions_are_queryable() {
    let farm = Farm::new();
    let other = Denom::new("pool/lp2").unwrap();
    farm.fund("farm1alice", 10);
    farm.bank.mint(&addr("farm1alice"), &Coins::single(other.clone(), 4));
    farm.stake("farm1alice", 10);
    farm.engine
        .stake(&farm.chain.ctx(), &farm.store, &farm.bank, &addr("farm1alice"), &other, 4)
        .unwrap();

    let positions = farm
        .engine
        .positions_by_staker(&farm.store, &addr("farm1alice"))
        .unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(farm.engine.pools(&farm.store).unwrap().len(), 2);
    assert_eq!(
        farm.engine.pool(&farm.store, &other).unwrap().unwrap().total_staked,
        4
    );
    assert!(farm
        .engine
        .position(&farm.store, &addr("farm1bob"), &other)
        .unwrap()
        .is_none());
}
