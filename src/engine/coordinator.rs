//! Ranking coordinator and bounded matching passes.
//!
//! ## Ranking refresh
//!
//! After any balance change of `account` on `side` of a market, the
//! coordinator compares the position with the values stored in the on-pool
//! and in-P2P sets of that side:
//!
//! 1. on-pool changed: notify stake accrual with the stale value, then update
//!    the on-pool set;
//! 2. in-P2P changed: update the in-P2P set.
//!
//! ## Passes
//!
//! A match pass moves underlying from the on-pool book to the in-P2P book of
//! one side, largest ranked account first, visiting at most
//! `max_matching_iterations` accounts. An unmatch pass goes the other way.
//!
//! Passes are split in two steps so that a failure leaves no trace:
//! [`MatchingEngine::plan_pass`] does every fallible computation against
//! borrowed state, [`MatchingEngine::commit_pass`] writes the result.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::engine::pool::{Pool, StakeAccrual, StakedAsset};
use crate::engine::store::PositionStore;
use crate::error::{CoreError, Result};
use crate::ranking::RankedBalanceSet;
use crate::types::math::{add, min, ray_div, ray_mul, sub};
use crate::types::{Book, Market, MatchOutcome, PoolRates, Position, Side};

/// The four ranked sets of one market
#[derive(Debug, Clone)]
pub struct MarketBooks {
    supply_on_pool: RankedBalanceSet,
    supply_in_p2p: RankedBalanceSet,
    borrow_on_pool: RankedBalanceSet,
    borrow_in_p2p: RankedBalanceSet,
}

impl MarketBooks {
    pub fn new(max_sorted_users: NonZeroUsize) -> Self {
        Self {
            supply_on_pool: RankedBalanceSet::new(max_sorted_users),
            supply_in_p2p: RankedBalanceSet::new(max_sorted_users),
            borrow_on_pool: RankedBalanceSet::new(max_sorted_users),
            borrow_in_p2p: RankedBalanceSet::new(max_sorted_users),
        }
    }

    pub fn get(&self, side: Side, book: Book) -> &RankedBalanceSet {
        match (side, book) {
            (Side::Supply, Book::OnPool) => &self.supply_on_pool,
            (Side::Supply, Book::InP2P) => &self.supply_in_p2p,
            (Side::Borrow, Book::OnPool) => &self.borrow_on_pool,
            (Side::Borrow, Book::InP2P) => &self.borrow_in_p2p,
        }
    }

    pub fn get_mut(&mut self, side: Side, book: Book) -> &mut RankedBalanceSet {
        match (side, book) {
            (Side::Supply, Book::OnPool) => &mut self.supply_on_pool,
            (Side::Supply, Book::InP2P) => &mut self.supply_in_p2p,
            (Side::Borrow, Book::OnPool) => &mut self.borrow_on_pool,
            (Side::Borrow, Book::InP2P) => &mut self.borrow_in_p2p,
        }
    }
}

/// Direction of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// On-pool to in-P2P
    Match,
    /// In-P2P to on-pool
    Unmatch,
}

impl PassKind {
    pub fn source(self) -> Book {
        match self {
            PassKind::Match => Book::OnPool,
            PassKind::Unmatch => Book::InP2P,
        }
    }

    pub fn destination(self) -> Book {
        match self {
            PassKind::Match => Book::InP2P,
            PassKind::Unmatch => Book::OnPool,
        }
    }
}

/// Computed but not yet applied pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPlan {
    pub kind: PassKind,
    pub outcome: MatchOutcome,

    /// New positions of the visited accounts, in visiting order
    pub positions: Vec<(Address, Position)>,
}

/// Owns the ranked sets of every market.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    books: HashMap<Address, MarketBooks>,
    max_sorted_users: NonZeroUsize,
    max_iterations: usize,
}

impl MatchingEngine {
    pub fn new(max_sorted_users: NonZeroUsize, max_iterations: usize) -> Self {
        Self {
            books: HashMap::new(),
            max_sorted_users,
            max_iterations,
        }
    }

    #[inline]
    pub fn max_sorted_users(&self) -> NonZeroUsize {
        self.max_sorted_users
    }

    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Create empty books for a market; existing books are kept
    pub fn register_market(&mut self, market: Address) {
        let max_sorted_users = self.max_sorted_users;
        self.books
            .entry(market)
            .or_insert_with(|| MarketBooks::new(max_sorted_users));
    }

    pub fn books(&self, market: Address) -> Result<&MarketBooks> {
        self.books.get(&market).ok_or(CoreError::MarketNotCreated(market))
    }

    pub fn set(&self, market: Address, side: Side, book: Book) -> Result<&RankedBalanceSet> {
        Ok(self.books(market)?.get(side, book))
    }

    /// Bring the rankings of `account` on `side` in line with `position`.
    ///
    /// # Errors
    ///
    /// [`CoreError::MarketNotCreated`] if the market has no books
    pub fn on_balance_changed<P: Pool, R: StakeAccrual>(
        &mut self,
        market: Address,
        side: Side,
        account: Address,
        position: &Position,
        pool: &P,
        rewards: &mut R,
    ) -> Result<()> {
        let books = self
            .books
            .get_mut(&market)
            .ok_or(CoreError::MarketNotCreated(market))?;

        refresh(books, market, side, account, position, pool, rewards);
        Ok(())
    }

    /// Compute a pass over the ranked `kind.source()` set of `side`.
    ///
    /// Nothing is modified. `market` and `pool_rates` must already reflect
    /// accrual up to the current block.
    pub fn plan_pass(
        &self,
        market: &Market,
        pool_rates: PoolRates,
        side: Side,
        kind: PassKind,
        amount: U256,
        positions: &PositionStore,
    ) -> Result<PassPlan> {
        let set = self.set(market.id, side, kind.source())?;

        let (rate_from, rate_to) = match kind {
            PassKind::Match => (pool_rates.rate(side), market.p2p_rate(side)),
            PassKind::Unmatch => (market.p2p_rate(side), pool_rates.rate(side)),
        };

        let mut outcome = MatchOutcome::new(side, amount);
        let mut planned = Vec::new();

        for (account, _) in set.iter_ranked().take(self.max_iterations) {
            let remaining = outcome.remaining();
            if remaining.is_zero() {
                break;
            }

            let mut position = positions.read(market.id, account);
            let from = position.balance(side, kind.source());
            let to = position.balance(side, kind.destination());

            let underlying = ray_mul(from, rate_from)?;
            let moved = min(underlying, remaining);

            let scaled_from = min(from, ray_div(moved, rate_from)?);
            position.set_balance(side, kind.source(), sub(from, scaled_from)?);
            position.set_balance(side, kind.destination(), add(to, ray_div(moved, rate_to)?)?);

            outcome.processed = add(outcome.processed, moved)?;
            outcome.accounts.push(account);
            planned.push((account, position));
        }

        Ok(PassPlan {
            kind,
            outcome,
            positions: planned,
        })
    }

    /// Write a planned pass to the position store and refresh rankings.
    pub fn commit_pass<P: Pool, R: StakeAccrual>(
        &mut self,
        market: Address,
        plan: &PassPlan,
        positions: &mut PositionStore,
        pool: &P,
        rewards: &mut R,
    ) -> Result<()> {
        let books = self
            .books
            .get_mut(&market)
            .ok_or(CoreError::MarketNotCreated(market))?;

        let side = plan.outcome.side;
        for (account, position) in &plan.positions {
            positions.write(market, *account, *position);
            refresh(books, market, side, *account, position, pool, rewards);
        }

        debug!(
            market = %market,
            side = side.as_str(),
            kind = ?plan.kind,
            requested = %plan.outcome.requested,
            processed = %plan.outcome.processed,
            iterations = plan.outcome.iterations(),
            "pass committed"
        );
        Ok(())
    }
}

fn refresh<P: Pool, R: StakeAccrual>(
    books: &mut MarketBooks,
    market: Address,
    side: Side,
    account: Address,
    position: &Position,
    pool: &P,
    rewards: &mut R,
) {
    let on_pool = position.balance(side, Book::OnPool);
    let in_p2p = position.balance(side, Book::InP2P);

    let pool_set = books.get_mut(side, Book::OnPool);
    let stale = pool_set.value_of(account);
    if stale != on_pool {
        let total_staked = pool.total_staked(market, side);
        rewards.update_stake(account, StakedAsset { market, side }, stale, total_staked);
        pool_set.update(account, on_pool);
    }

    let p2p_set = books.get_mut(side, Book::InP2P);
    if p2p_set.value_of(account) != in_p2p {
        p2p_set.update(account, in_p2p);
    }

    debug!(
        market = %market,
        side = side.as_str(),
        account = %account,
        on_pool = %on_pool,
        in_p2p = %in_p2p,
        "ranking refreshed"
    );
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pool::{RecordingAccrual, SimulatedPool};
    use crate::types::math::{to_ray, RAY};

    fn market_id() -> Address {
        Address::repeat_byte(0x22)
    }

    fn account(byte: u8) -> Address {
        Address::with_last_byte(byte)
    }

    fn value(v: u64) -> U256 {
        U256::from(v)
    }

    fn supplier(on_pool: u64, in_p2p: u64) -> Position {
        Position::new(value(in_p2p), value(on_pool), U256::ZERO, U256::ZERO)
    }

    fn setup() -> (MatchingEngine, SimulatedPool, RecordingAccrual) {
        let mut engine = MatchingEngine::new(NonZeroUsize::new(3).unwrap(), 2);
        engine.register_market(market_id());

        let mut pool = SimulatedPool::new();
        pool.list_reserve(market_id(), RAY, RAY);
        pool.set_total_staked(market_id(), Side::Supply, value(1_000));

        (engine, pool, RecordingAccrual::default())
    }

    #[test]
    fn test_unknown_market_rejected() {
        let (mut engine, pool, mut rewards) = setup();
        let other = Address::repeat_byte(0x99);

        let result = engine.on_balance_changed(other, Side::Supply, account(1), &supplier(1, 0), &pool, &mut rewards);
        assert_eq!(result, Err(CoreError::MarketNotCreated(other)));
        assert!(rewards.updates.is_empty());
    }

    #[test]
    fn test_refresh_updates_both_books() {
        let (mut engine, pool, mut rewards) = setup();

        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &supplier(100, 40), &pool, &mut rewards)
            .unwrap();

        let books = engine.books(market_id()).unwrap();
        assert_eq!(books.get(Side::Supply, Book::OnPool).value_of(account(1)), value(100));
        assert_eq!(books.get(Side::Supply, Book::InP2P).value_of(account(1)), value(40));
        assert!(books.get(Side::Borrow, Book::OnPool).is_empty());
    }

    #[test]
    fn test_stake_notified_with_stale_value() {
        let (mut engine, pool, mut rewards) = setup();

        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &supplier(100, 0), &pool, &mut rewards)
            .unwrap();
        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &supplier(60, 0), &pool, &mut rewards)
            .unwrap();

        assert_eq!(rewards.updates.len(), 2);
        assert_eq!(rewards.updates[0].amount_before, U256::ZERO);
        assert_eq!(rewards.updates[1].amount_before, value(100));
        assert_eq!(rewards.updates[1].total_staked, value(1_000));
        assert_eq!(
            rewards.updates[1].asset,
            StakedAsset {
                market: market_id(),
                side: Side::Supply
            }
        );
    }

    #[test]
    fn test_unchanged_on_pool_skips_notification() {
        let (mut engine, pool, mut rewards) = setup();

        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &supplier(100, 0), &pool, &mut rewards)
            .unwrap();
        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &supplier(100, 25), &pool, &mut rewards)
            .unwrap();

        assert_eq!(rewards.updates.len(), 1);
        let set = engine.set(market_id(), Side::Supply, Book::InP2P).unwrap();
        assert_eq!(set.value_of(account(1)), value(25));
    }

    #[test]
    fn test_plan_match_largest_first() {
        let (mut engine, pool, mut rewards) = setup();
        let mut positions = PositionStore::new();

        for (byte, on_pool) in [(1u8, 50u64), (2, 200), (3, 100)] {
            let position = supplier(on_pool, 0);
            positions.write(market_id(), account(byte), position);
            engine
                .on_balance_changed(market_id(), Side::Supply, account(byte), &position, &pool, &mut rewards)
                .unwrap();
        }

        let market = Market::new(market_id(), PoolRates::new(RAY, RAY), 0);
        let plan = engine
            .plan_pass(&market, PoolRates::new(RAY, RAY), Side::Supply, PassKind::Match, value(250), &positions)
            .unwrap();

        assert_eq!(plan.outcome.accounts, vec![account(2), account(3)]);
        assert_eq!(plan.outcome.processed, value(250));
        assert_eq!(plan.positions[0].1, supplier(0, 200));
        assert_eq!(plan.positions[1].1, supplier(50, 50));

        // Planning alone changes nothing
        assert_eq!(positions.read(market_id(), account(2)), supplier(200, 0));
    }

    #[test]
    fn test_plan_respects_iteration_bound() {
        let (mut engine, pool, mut rewards) = setup();
        let mut positions = PositionStore::new();

        for byte in 1..=3u8 {
            let position = supplier(10, 0);
            positions.write(market_id(), account(byte), position);
            engine
                .on_balance_changed(market_id(), Side::Supply, account(byte), &position, &pool, &mut rewards)
                .unwrap();
        }

        let market = Market::new(market_id(), PoolRates::new(RAY, RAY), 0);
        let plan = engine
            .plan_pass(&market, PoolRates::new(RAY, RAY), Side::Supply, PassKind::Match, value(1_000), &positions)
            .unwrap();

        assert_eq!(plan.outcome.iterations(), 2);
        assert_eq!(plan.outcome.processed, value(20));
        assert!(!plan.outcome.is_complete());
    }

    #[test]
    fn test_plan_converts_between_rates() {
        let (mut engine, pool, mut rewards) = setup();
        let mut positions = PositionStore::new();

        let position = supplier(100, 0);
        positions.write(market_id(), account(1), position);
        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &position, &pool, &mut rewards)
            .unwrap();

        // 100 pool units at 1.5 = 150 underlying = 75 p2p units at 2.0
        let mut market = Market::new(market_id(), PoolRates::new(RAY, RAY), 0);
        market.supply_p2p_rate = to_ray("2").unwrap();
        let pool_rates = PoolRates::new(to_ray("1.5").unwrap(), RAY);

        let plan = engine
            .plan_pass(&market, pool_rates, Side::Supply, PassKind::Match, value(1_000), &positions)
            .unwrap();

        assert_eq!(plan.outcome.processed, value(150));
        assert_eq!(plan.positions[0].1, supplier(0, 75));
    }

    #[test]
    fn test_commit_moves_rankings() {
        let (mut engine, pool, mut rewards) = setup();
        let mut positions = PositionStore::new();

        let position = supplier(100, 0);
        positions.write(market_id(), account(1), position);
        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &position, &pool, &mut rewards)
            .unwrap();

        let market = Market::new(market_id(), PoolRates::new(RAY, RAY), 0);
        let plan = engine
            .plan_pass(&market, PoolRates::new(RAY, RAY), Side::Supply, PassKind::Match, value(100), &positions)
            .unwrap();
        engine
            .commit_pass(market_id(), &plan, &mut positions, &pool, &mut rewards)
            .unwrap();

        assert_eq!(positions.read(market_id(), account(1)), supplier(0, 100));
        let books = engine.books(market_id()).unwrap();
        assert!(!books.get(Side::Supply, Book::OnPool).contains(account(1)));
        assert!(books.get(Side::Supply, Book::InP2P).is_ranked(account(1)));
        assert_eq!(rewards.updates.last().map(|u| u.amount_before), Some(value(100)));
    }

    #[test]
    fn test_unmatch_plan() {
        let (mut engine, pool, mut rewards) = setup();
        let mut positions = PositionStore::new();

        let position = supplier(0, 80);
        positions.write(market_id(), account(1), position);
        engine
            .on_balance_changed(market_id(), Side::Supply, account(1), &position, &pool, &mut rewards)
            .unwrap();

        let market = Market::new(market_id(), PoolRates::new(RAY, RAY), 0);
        let plan = engine
            .plan_pass(&market, PoolRates::new(RAY, RAY), Side::Supply, PassKind::Unmatch, value(30), &positions)
            .unwrap();

        assert!(plan.outcome.is_complete());
        assert_eq!(plan.positions[0].1, supplier(30, 50));
    }
}
