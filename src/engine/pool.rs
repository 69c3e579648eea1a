//! Boundary traits towards the underlying pool and the reward collaborator,
//! plus an in-memory pool for simulations and tests.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::types::math::{ray_mul, ray_pow, RAY};
use crate::types::{PoolRates, Side};

/// Read access to the underlying money market.
pub trait Pool {
    /// Current supply and borrow indexes (ray) of a market's reserve.
    ///
    /// Zero rates mean the reserve is unknown to the pool.
    fn current_rates(&self, market: Address) -> PoolRates;

    /// Total on-pool stake of one side of a market
    fn total_staked(&self, market: Address, side: Side) -> U256;
}

/// Stake bucket reported to the reward collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StakedAsset {
    pub market: Address,
    pub side: Side,
}

/// Reward collaborator notified before an on-pool stake changes.
pub trait StakeAccrual {
    /// Accrue rewards for `user` on `asset` using the stake held so far.
    ///
    /// `amount_before` is the stake prior to the change; the return value is
    /// the amount accrued, which the core does not interpret.
    fn update_stake(
        &mut self,
        user: Address,
        asset: StakedAsset,
        amount_before: U256,
        total_staked: U256,
    ) -> U256;
}

/// Ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAccrual;

impl StakeAccrual for NullAccrual {
    fn update_stake(&mut self, _: Address, _: StakedAsset, _: U256, _: U256) -> U256 {
        U256::ZERO
    }
}

/// One notification received by a [`RecordingAccrual`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeUpdate {
    pub user: Address,
    pub asset: StakedAsset,
    pub amount_before: U256,
    pub total_staked: U256,
}

/// Keeps every notification in arrival order and accrues nothing
#[derive(Debug, Clone, Default)]
pub struct RecordingAccrual {
    pub updates: Vec<StakeUpdate>,
}

impl StakeAccrual for RecordingAccrual {
    fn update_stake(
        &mut self,
        user: Address,
        asset: StakedAsset,
        amount_before: U256,
        total_staked: U256,
    ) -> U256 {
        self.updates.push(StakeUpdate {
            user,
            asset,
            amount_before,
            total_staked,
        });
        U256::ZERO
    }
}

// ============================================================================
// SimulatedPool
// ============================================================================

#[derive(Debug, Clone)]
struct Reserve {
    supply_rate_per_block: U256,
    borrow_rate_per_block: U256,
    supply_index: U256,
    borrow_index: U256,
    supply_staked: U256,
    borrow_staked: U256,
}

/// Pool whose indexes compound a fixed per-block growth.
///
/// ```
/// use alloy_primitives::Address;
/// use p2p_overlay::engine::{Pool, SimulatedPool};
/// use p2p_overlay::types::math::{to_ray, RAY};
///
/// let market = Address::repeat_byte(1);
/// let mut pool = SimulatedPool::new();
/// pool.list_reserve(market, to_ray("1.01").unwrap(), RAY);
/// pool.advance_to(2).unwrap();
///
/// assert_eq!(pool.current_rates(market).supply_rate, to_ray("1.0201").unwrap());
/// assert_eq!(pool.current_rates(market).borrow_rate, RAY);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulatedPool {
    reserves: HashMap<Address, Reserve>,
    block: u64,
}

impl SimulatedPool {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn block(&self) -> u64 {
        self.block
    }

    /// List a reserve with indexes at 1 ray.
    ///
    /// Listing again replaces the per-block growth and keeps the indexes.
    pub fn list_reserve(&mut self, market: Address, supply_rate_per_block: U256, borrow_rate_per_block: U256) {
        let reserve = self.reserves.entry(market).or_insert(Reserve {
            supply_rate_per_block,
            borrow_rate_per_block,
            supply_index: RAY,
            borrow_index: RAY,
            supply_staked: U256::ZERO,
            borrow_staked: U256::ZERO,
        });
        reserve.supply_rate_per_block = supply_rate_per_block;
        reserve.borrow_rate_per_block = borrow_rate_per_block;
    }

    /// Overwrite the staked total of one side; ignored for unlisted markets
    pub fn set_total_staked(&mut self, market: Address, side: Side, amount: U256) {
        if let Some(reserve) = self.reserves.get_mut(&market) {
            match side {
                Side::Supply => reserve.supply_staked = amount,
                Side::Borrow => reserve.borrow_staked = amount,
            }
        }
    }

    /// Compound every reserve up to `block`.
    ///
    /// Either all reserves advance or none does.
    ///
    /// # Errors
    ///
    /// * [`CoreError::NonMonotonicBlock`] if `block` is in the past
    /// * [`CoreError::ArithmeticOverflow`] if an index overflows
    pub fn advance_to(&mut self, block: u64) -> Result<()> {
        if block < self.block {
            return Err(CoreError::NonMonotonicBlock {
                last: self.block,
                requested: block,
            });
        }

        let elapsed = block - self.block;
        let mut staged = Vec::with_capacity(self.reserves.len());
        for (market, reserve) in &self.reserves {
            let supply_index = ray_mul(reserve.supply_index, ray_pow(reserve.supply_rate_per_block, elapsed)?)?;
            let borrow_index = ray_mul(reserve.borrow_index, ray_pow(reserve.borrow_rate_per_block, elapsed)?)?;
            staged.push((*market, supply_index, borrow_index));
        }

        for (market, supply_index, borrow_index) in staged {
            if let Some(reserve) = self.reserves.get_mut(&market) {
                reserve.supply_index = supply_index;
                reserve.borrow_index = borrow_index;
            }
        }

        debug!(from = self.block, to = block, reserves = self.reserves.len(), "pool advanced");
        self.block = block;
        Ok(())
    }
}

impl Pool for SimulatedPool {
    fn current_rates(&self, market: Address) -> PoolRates {
        self.reserves
            .get(&market)
            .map(|r| PoolRates::new(r.supply_index, r.borrow_index))
            .unwrap_or_default()
    }

    fn total_staked(&self, market: Address, side: Side) -> U256 {
        self.reserves
            .get(&market)
            .map(|r| match side {
                Side::Supply => r.supply_staked,
                Side::Borrow => r.borrow_staked,
            })
            .unwrap_or(U256::ZERO)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
