//! Rate snapshots exchanged between the pool, the accrual engine and markets.
//!
//! All values are rays (10^27 = 1.0).

use alloy_primitives::U256;

use crate::types::Side;

/// Current supply and borrow indexes of the underlying pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolRates {
    pub supply_rate: U256,
    pub borrow_rate: U256,
}

impl PoolRates {
    pub fn new(supply_rate: U256, borrow_rate: U256) -> Self {
        Self {
            supply_rate,
            borrow_rate,
        }
    }

    pub fn rate(&self, side: Side) -> U256 {
        match side {
            Side::Supply => self.supply_rate,
            Side::Borrow => self.borrow_rate,
        }
    }
}

/// P2P exchange rates of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct P2PRates {
    pub supply_rate: U256,
    pub borrow_rate: U256,
}

impl P2PRates {
    pub fn new(supply_rate: U256, borrow_rate: U256) -> Self {
        Self {
            supply_rate,
            borrow_rate,
        }
    }

    pub fn rate(&self, side: Side) -> U256 {
        match side {
            Side::Supply => self.supply_rate,
            Side::Borrow => self.borrow_rate,
        }
    }
}

/// Multiplicative growth over one accrual interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrowthFactors {
    /// Pool supply index growth (current / last)
    pub pool_supply_growth: U256,

    /// Pool borrow index growth (current / last)
    pub pool_borrow_growth: U256,

    /// Growth applied to fully matched suppliers
    pub supply_p2p_growth: U256,

    /// Growth applied to fully matched borrowers
    pub borrow_p2p_growth: U256,
}

impl GrowthFactors {
    pub fn pool(&self, side: Side) -> U256 {
        match side {
            Side::Supply => self.pool_supply_growth,
            Side::Borrow => self.pool_borrow_growth,
        }
    }

    pub fn p2p(&self, side: Side) -> U256 {
        match side {
            Side::Supply => self.supply_p2p_growth,
            Side::Borrow => self.borrow_p2p_growth,
        }
    }
}
