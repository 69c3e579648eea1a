//! Market records and their delta state.

use alloy_primitives::{Address, U256};

use crate::types::math::RAY;
use crate::types::rates::{P2PRates, PoolRates};
use crate::types::Side;

/// Matched volume of one side of a market, and the part of it that is
/// temporarily parked at the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delta {
    /// Total matched volume, scaled by the side's P2P exchange rate
    pub p2p_amount: U256,

    /// Matched volume without a live counterparty, scaled by the pool rate
    pub p2p_delta: U256,
}

impl Delta {
    /// True when there is nothing to blend with pool growth
    #[inline]
    pub fn is_inactive(&self) -> bool {
        self.p2p_amount.is_zero() || self.p2p_delta.is_zero()
    }
}

/// Per-market accounting state.
///
/// Created once by `create_market`, mutated by accrual and matching, never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    /// Asset / pool-token address identifying the market
    pub id: Address,

    /// P2P exchange rate of the supply side (ray, non-decreasing)
    pub supply_p2p_rate: U256,

    /// P2P exchange rate of the borrow side (ray, non-decreasing)
    pub borrow_p2p_rate: U256,

    /// Pool supply index at the last accrual (ray)
    pub last_pool_supply_rate: U256,

    /// Pool borrow index at the last accrual (ray)
    pub last_pool_borrow_rate: U256,

    /// Protocol spread in basis points (0..=10 000)
    pub reserve_factor: u16,

    /// Weight of supply growth in the blended rate
    pub supply_weight: u64,

    /// Weight of borrow growth in the blended rate
    pub borrow_weight: u64,

    pub supply_delta: Delta,
    pub borrow_delta: Delta,

    /// Minimum position size, enforced by callers
    pub threshold: U256,

    /// Maximum position size, enforced by callers (zero means uncapped)
    pub cap: U256,

    /// Block of the last persisted accrual, `None` until the first one
    pub last_update_block: Option<u64>,
}

impl Market {
    /// Create a market anchored at the pool's current rates.
    ///
    /// Both P2P exchange rates start at 1 ray and the weights at 1/1.
    pub fn new(id: Address, pool_rates: PoolRates, reserve_factor: u16) -> Self {
        Self {
            id,
            supply_p2p_rate: RAY,
            borrow_p2p_rate: RAY,
            last_pool_supply_rate: pool_rates.supply_rate,
            last_pool_borrow_rate: pool_rates.borrow_rate,
            reserve_factor,
            supply_weight: 1,
            borrow_weight: 1,
            supply_delta: Delta::default(),
            borrow_delta: Delta::default(),
            threshold: U256::ZERO,
            cap: U256::ZERO,
            last_update_block: None,
        }
    }

    pub fn p2p_rate(&self, side: Side) -> U256 {
        match side {
            Side::Supply => self.supply_p2p_rate,
            Side::Borrow => self.borrow_p2p_rate,
        }
    }

    pub fn p2p_rates(&self) -> P2PRates {
        P2PRates {
            supply_rate: self.supply_p2p_rate,
            borrow_rate: self.borrow_p2p_rate,
        }
    }

    pub fn last_pool_rate(&self, side: Side) -> U256 {
        match side {
            Side::Supply => self.last_pool_supply_rate,
            Side::Borrow => self.last_pool_borrow_rate,
        }
    }

    pub fn delta(&self, side: Side) -> &Delta {
        match side {
            Side::Supply => &self.supply_delta,
            Side::Borrow => &self.borrow_delta,
        }
    }

    pub fn delta_mut(&mut self, side: Side) -> &mut Delta {
        match side {
            Side::Supply => &mut self.supply_delta,
            Side::Borrow => &mut self.borrow_delta,
        }
    }

    /// Store freshly accrued rates and re-anchor on the given pool rates
    pub fn apply_accrual(&mut self, rates: P2PRates, pool_rates: PoolRates, block: u64) {
        self.supply_p2p_rate = rates.supply_rate;
        self.borrow_p2p_rate = rates.borrow_rate;
        self.last_pool_supply_rate = pool_rates.supply_rate;
        self.last_pool_borrow_rate = pool_rates.borrow_rate;
        self.last_update_block = Some(block);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
