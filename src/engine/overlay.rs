//! The overlay's entry points.
//!
//! `LendingOverlay` wires the market and position stores, the ranking
//! coordinator, the accrual engine and the two external collaborators.
//! Every mutating call works on staged copies and writes back only once all
//! fallible steps have succeeded.

use alloy_primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::accrual;
use crate::engine::coordinator::{MatchingEngine, PassKind};
use crate::engine::pool::{Pool, StakeAccrual};
use crate::engine::store::{MarketStore, PositionStore};
use crate::error::{CoreError, Result};
use crate::ranking::RankedBalanceSet;
use crate::types::math::{add, min, ray_div, ray_mul, sub, MAX_RESERVE_FACTOR};
use crate::types::{Book, Market, MatchOutcome, P2PRates, PoolRates, Position, Side};

/// Accounting core of the P2P overlay over one pool.
///
/// ## Example
///
/// ```
/// use alloy_primitives::{Address, U256};
/// use p2p_overlay::config::EngineConfig;
/// use p2p_overlay::engine::{LendingOverlay, NullAccrual, SimulatedPool};
/// use p2p_overlay::types::math::RAY;
/// use p2p_overlay::types::{Book, Position, Side};
///
/// let market = Address::repeat_byte(1);
/// let mut pool = SimulatedPool::new();
/// pool.list_reserve(market, RAY, RAY);
///
/// let mut overlay = LendingOverlay::new(EngineConfig::default(), pool, NullAccrual);
/// overlay.create_market(market).unwrap();
///
/// let alice = Address::with_last_byte(1);
/// let position = Position::new(U256::ZERO, U256::from(500u64), U256::ZERO, U256::ZERO);
/// overlay.set_position(market, alice, position).unwrap();
/// overlay.update_supplier_ranking(market, alice).unwrap();
///
/// let ranked = overlay.ranking(market, Side::Supply, Book::OnPool).unwrap();
/// assert_eq!(ranked.maximum(), Some((U256::from(500u64), alice)));
/// ```
#[derive(Debug)]
pub struct LendingOverlay<P: Pool, R: StakeAccrual> {
    config: EngineConfig,
    markets: MarketStore,
    positions: PositionStore,
    engine: MatchingEngine,
    pool: P,
    rewards: R,
}

impl<P: Pool, R: StakeAccrual> LendingOverlay<P, R> {
    pub fn new(config: EngineConfig, pool: P, rewards: R) -> Self {
        let engine = MatchingEngine::new(config.max_sorted_users, config.max_matching_iterations);
        Self {
            config,
            markets: MarketStore::new(),
            positions: PositionStore::new(),
            engine,
            pool,
            rewards,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn markets(&self) -> &MarketStore {
        &self.markets
    }

    pub fn market(&self, id: Address) -> Result<&Market> {
        self.markets.get(id)
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut P {
        &mut self.pool
    }

    pub fn rewards(&self) -> &R {
        &self.rewards
    }

    pub fn rewards_mut(&mut self) -> &mut R {
        &mut self.rewards
    }

    pub fn ranking(&self, market: Address, side: Side, book: Book) -> Result<&RankedBalanceSet> {
        self.engine.set(market, side, book)
    }

    // ========================================================================
    // Market Setup
    // ========================================================================

    /// Create a market anchored at the pool's current rates.
    ///
    /// # Errors
    ///
    /// * [`CoreError::AlreadyCreated`] on a second call for the same id
    /// * [`CoreError::InvalidParameter`] if the pool reports a zero rate or
    ///   the configured default reserve factor is above [`MAX_RESERVE_FACTOR`]
    pub fn create_market(&mut self, id: Address) -> Result<()> {
        if self.markets.contains(id) {
            return Err(CoreError::AlreadyCreated(id));
        }
        if self.config.default_reserve_factor > MAX_RESERVE_FACTOR {
            return Err(CoreError::invalid(
                "reserve_factor",
                format!("default {} exceeds {} basis points", self.config.default_reserve_factor, MAX_RESERVE_FACTOR),
            ));
        }

        let pool_rates = self.pool.current_rates(id);
        if pool_rates.supply_rate.is_zero() || pool_rates.borrow_rate.is_zero() {
            return Err(CoreError::invalid("pool_rates", format!("pool has no rates for {}", id)));
        }

        self.markets
            .create(Market::new(id, pool_rates, self.config.default_reserve_factor))?;
        self.engine.register_market(id);

        info!(
            market = %id,
            pool_supply_rate = %pool_rates.supply_rate,
            pool_borrow_rate = %pool_rates.borrow_rate,
            reserve_factor = self.config.default_reserve_factor,
            "market created"
        );
        Ok(())
    }

    pub fn set_weights(&mut self, market: Address, supply_weight: u64, borrow_weight: u64) -> Result<()> {
        self.markets.set_weights(market, supply_weight, borrow_weight)?;
        info!(market = %market, supply_weight, borrow_weight, "weights set");
        Ok(())
    }

    pub fn set_reserve_factor(&mut self, market: Address, reserve_factor: u16) -> Result<()> {
        self.markets.set_reserve_factor(market, reserve_factor)?;
        info!(market = %market, reserve_factor, "reserve factor set");
        Ok(())
    }

    pub fn set_threshold(&mut self, market: Address, threshold: U256) -> Result<()> {
        self.markets.set_threshold(market, threshold)
    }

    pub fn set_cap(&mut self, market: Address, cap: U256) -> Result<()> {
        self.markets.set_cap(market, cap)
    }

    // ========================================================================
    // Positions and Rankings
    // ========================================================================

    /// Record an account's balances. Rankings follow on the next
    /// `update_*_ranking` call.
    pub fn set_position(&mut self, market: Address, account: Address, position: Position) -> Result<()> {
        self.markets.get(market)?;
        self.positions.write(market, account, position);
        Ok(())
    }

    pub fn update_supplier_ranking(&mut self, market: Address, account: Address) -> Result<()> {
        self.update_ranking(market, Side::Supply, account)
    }

    pub fn update_borrower_ranking(&mut self, market: Address, account: Address) -> Result<()> {
        self.update_ranking(market, Side::Borrow, account)
    }

    fn update_ranking(&mut self, market: Address, side: Side, account: Address) -> Result<()> {
        self.markets.get(market)?;
        let position = self.positions.read(market, account);
        self.engine
            .on_balance_changed(market, side, account, &position, &self.pool, &mut self.rewards)
    }

    // ========================================================================
    // Exchange Rates
    // ========================================================================

    /// P2P exchange rates the market would have at the pool's current rates.
    ///
    /// Read-only.
    pub fn compute_p2p_exchange_rates(&self, market: Address) -> Result<P2PRates> {
        let market = self.markets.get(market)?;
        accrual::compute_p2p_exchange_rates(market, self.pool.current_rates(market.id))
    }

    /// Accrue the market up to `block` and store the new rates.
    ///
    /// A second call for the same block returns the stored rates unchanged.
    ///
    /// # Errors
    ///
    /// * [`CoreError::MarketNotCreated`] for an unknown market
    /// * [`CoreError::NonMonotonicBlock`] if `block` precedes the last update
    /// * arithmetic errors from the accrual; the market is left untouched
    pub fn update_p2p_exchange_rates(&mut self, market: Address, block: u64) -> Result<P2PRates> {
        let (staged, _) = self.accrued(market, block)?;
        let rates = staged.p2p_rates();
        self.markets.replace(staged)?;
        Ok(rates)
    }

    /// Staged copy of a market accrued to `block`, with the pool rates it is
    /// now anchored on
    fn accrued(&self, id: Address, block: u64) -> Result<(Market, PoolRates)> {
        let mut market = self.markets.get(id)?.clone();

        if let Some(last) = market.last_update_block {
            if block < last {
                return Err(CoreError::NonMonotonicBlock { last, requested: block });
            }
            if block == last {
                let anchored = PoolRates::new(market.last_pool_supply_rate, market.last_pool_borrow_rate);
                return Ok((market, anchored));
            }
        }

        let pool_rates = self.pool.current_rates(id);
        let rates = accrual::compute_p2p_exchange_rates(&market, pool_rates)?;
        market.apply_accrual(rates, pool_rates, block);

        debug!(
            market = %id,
            block,
            supply_p2p_rate = %rates.supply_rate,
            borrow_p2p_rate = %rates.borrow_rate,
            "p2p exchange rates updated"
        );
        Ok((market, pool_rates))
    }

    // ========================================================================
    // Matching Passes
    // ========================================================================

    /// Move up to `amount` underlying of on-pool suppliers into P2P
    pub fn match_suppliers(&mut self, market: Address, amount: U256, block: u64) -> Result<MatchOutcome> {
        self.run_pass(market, Side::Supply, PassKind::Match, amount, block)
    }

    /// Move up to `amount` underlying of on-pool borrowers into P2P
    pub fn match_borrowers(&mut self, market: Address, amount: U256, block: u64) -> Result<MatchOutcome> {
        self.run_pass(market, Side::Borrow, PassKind::Match, amount, block)
    }

    /// Move up to `amount` underlying of matched suppliers back to the pool
    pub fn unmatch_suppliers(&mut self, market: Address, amount: U256, block: u64) -> Result<MatchOutcome> {
        self.run_pass(market, Side::Supply, PassKind::Unmatch, amount, block)
    }

    /// Move up to `amount` underlying of matched borrowers back to the pool
    pub fn unmatch_borrowers(&mut self, market: Address, amount: U256, block: u64) -> Result<MatchOutcome> {
        self.run_pass(market, Side::Borrow, PassKind::Unmatch, amount, block)
    }

    fn run_pass(
        &mut self,
        market: Address,
        side: Side,
        kind: PassKind,
        amount: U256,
        block: u64,
    ) -> Result<MatchOutcome> {
        let (mut staged, pool_rates) = self.accrued(market, block)?;
        let plan = self
            .engine
            .plan_pass(&staged, pool_rates, side, kind, amount, &self.positions)?;

        let scaled = ray_div(plan.outcome.processed, staged.p2p_rate(side))?;
        let delta = staged.delta_mut(side);
        delta.p2p_amount = match kind {
            PassKind::Match => add(delta.p2p_amount, scaled)?,
            PassKind::Unmatch if scaled > delta.p2p_amount => {
                // Positions written outside a matching pass, or rounding drift
                warn!(
                    market = %market,
                    side = side.as_str(),
                    p2p_amount = %delta.p2p_amount,
                    unmatched = %scaled,
                    "unmatched volume above p2p amount, clamping to zero"
                );
                U256::ZERO
            }
            PassKind::Unmatch => sub(delta.p2p_amount, scaled)?,
        };

        self.markets.replace(staged)?;
        self.engine
            .commit_pass(market, &plan, &mut self.positions, &self.pool, &mut self.rewards)?;

        Ok(plan.outcome)
    }

    // ========================================================================
    // Delta
    // ========================================================================

    /// Park `amount` underlying of `side`'s matched volume at the pool
    pub fn increase_delta(&mut self, market: Address, side: Side, amount: U256, block: u64) -> Result<()> {
        let (mut staged, pool_rates) = self.accrued(market, block)?;
        let scaled = ray_div(amount, pool_rates.rate(side))?;

        let delta = staged.delta_mut(side);
        delta.p2p_delta = add(delta.p2p_delta, scaled)?;

        debug!(market = %market, side = side.as_str(), amount = %amount, p2p_delta = %delta.p2p_delta, "delta increased");
        self.markets.replace(staged)
    }

    /// Absorb up to `amount` underlying of `side`'s delta.
    ///
    /// Returns the underlying amount actually absorbed.
    pub fn decrease_delta(&mut self, market: Address, side: Side, amount: U256, block: u64) -> Result<U256> {
        let (mut staged, pool_rates) = self.accrued(market, block)?;
        let rate = pool_rates.rate(side);

        let delta = staged.delta_mut(side);
        let absorbed = min(amount, ray_mul(delta.p2p_delta, rate)?);
        let scaled = min(delta.p2p_delta, ray_div(absorbed, rate)?);
        delta.p2p_delta = sub(delta.p2p_delta, scaled)?;

        debug!(market = %market, side = side.as_str(), absorbed = %absorbed, p2p_delta = %delta.p2p_delta, "delta decreased");
        self.markets.replace(staged)?;
        Ok(absorbed)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pool::{NullAccrual, SimulatedPool};
    use crate::types::math::{to_ray, RAY};

    fn ray(s: &str) -> U256 {
        to_ray(s).unwrap()
    }

    fn market_id() -> Address {
        Address::repeat_byte(0x33)
    }

    fn overlay() -> LendingOverlay<SimulatedPool, NullAccrual> {
        let mut pool = SimulatedPool::new();
        pool.list_reserve(market_id(), ray("1.01"), ray("1.02"));
        let mut overlay = LendingOverlay::new(EngineConfig::default(), pool, NullAccrual);
        overlay.create_market(market_id()).unwrap();
        overlay
    }

    #[test]
    fn test_create_market_twice() {
        let mut overlay = overlay();
        assert_eq!(
            overlay.create_market(market_id()),
            Err(CoreError::AlreadyCreated(market_id()))
        );
    }

    #[test]
    fn test_create_market_without_pool_rates() {
        let mut overlay = overlay();
        let result = overlay.create_market(Address::repeat_byte(0x44));

        assert!(matches!(result, Err(CoreError::InvalidParameter { name: "pool_rates", .. })));
        assert!(!overlay.markets().contains(Address::repeat_byte(0x44)));
    }

    #[test]
    fn test_new_market_defaults() {
        let overlay = overlay();
        let market = overlay.market(market_id()).unwrap();

        assert_eq!(market.p2p_rates(), P2PRates::new(RAY, RAY));
        assert_eq!((market.supply_weight, market.borrow_weight), (1, 1));
        assert_eq!(market.last_update_block, None);
    }

    #[test]
    fn test_update_rates_is_noop_for_same_block() {
        let mut overlay = overlay();
        overlay.pool_mut().advance_to(1).unwrap();

        let first = overlay.update_p2p_exchange_rates(market_id(), 1).unwrap();
        overlay.pool_mut().advance_to(2).unwrap();
        let second = overlay.update_p2p_exchange_rates(market_id(), 1).unwrap();

        assert_eq!(first, second);
        // (1.01 + 1.02) / 2
        assert_eq!(first.supply_rate, ray("1.015"));
    }

    #[test]
    fn test_update_rates_rejects_past_block() {
        let mut overlay = overlay();
        overlay.update_p2p_exchange_rates(market_id(), 10).unwrap();

        assert_eq!(
            overlay.update_p2p_exchange_rates(market_id(), 9),
            Err(CoreError::NonMonotonicBlock { last: 10, requested: 9 })
        );
    }

    #[test]
    fn test_view_does_not_persist() {
        let mut overlay = overlay();
        overlay.pool_mut().advance_to(1).unwrap();

        let view = overlay.compute_p2p_exchange_rates(market_id()).unwrap();
        assert_eq!(view.supply_rate, ray("1.015"));
        assert_eq!(overlay.market(market_id()).unwrap().supply_p2p_rate, RAY);
    }

    #[test]
    fn test_create_market_rejects_unusable_default_reserve_factor() {
        let mut pool = SimulatedPool::new();
        pool.list_reserve(market_id(), RAY, RAY);
        let config = EngineConfig {
            default_reserve_factor: 5000,
            ..EngineConfig::default()
        };
        let mut overlay = LendingOverlay::new(config, pool, NullAccrual);

        let result = overlay.create_market(market_id());

        assert!(matches!(result, Err(CoreError::InvalidParameter { name: "reserve_factor", .. })));
        assert!(overlay.markets().is_empty());
    }

    #[test]
    fn test_set_position_requires_market() {
        let mut overlay = overlay();
        let other = Address::repeat_byte(0x55);
        let result = overlay.set_position(other, Address::with_last_byte(1), Position::default());

        assert_eq!(result, Err(CoreError::MarketNotCreated(other)));
    }

    #[test]
    fn test_delta_round_trip() {
        let mut overlay = overlay();
        overlay.pool_mut().advance_to(1).unwrap();

        // Pool supply index 1.01: 101 underlying = 100 pool units
        overlay
            .increase_delta(market_id(), Side::Supply, U256::from(101u64), 1)
            .unwrap();
        assert_eq!(overlay.market(market_id()).unwrap().supply_delta.p2p_delta, U256::from(100u64));

        let absorbed = overlay
            .decrease_delta(market_id(), Side::Supply, U256::from(1_000u64), 1)
            .unwrap();
        assert_eq!(absorbed, U256::from(101u64));
        assert!(overlay.market(market_id()).unwrap().supply_delta.p2p_delta.is_zero());
    }

    #[test]
    fn test_failed_pass_leaves_market_untouched() {
        let mut overlay = overlay();
        overlay.update_p2p_exchange_rates(market_id(), 5).unwrap();
        let before = overlay.market(market_id()).unwrap().clone();

        let result = overlay.match_suppliers(market_id(), U256::from(10u64), 4);

        assert!(matches!(result, Err(CoreError::NonMonotonicBlock { .. })));
        assert_eq!(overlay.market(market_id()).unwrap(), &before);
    }
}
