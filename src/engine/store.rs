//! Market and position storage.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::{CoreError, Result};
use crate::types::math::MAX_RESERVE_FACTOR;
use crate::types::{Market, Position};

/// Every created market, keyed by its id.
#[derive(Debug, Clone, Default)]
pub struct MarketStore {
    markets: HashMap<Address, Market>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new market.
    ///
    /// # Errors
    ///
    /// [`CoreError::AlreadyCreated`] if a market with the same id exists
    pub fn create(&mut self, market: Market) -> Result<()> {
        if self.markets.contains_key(&market.id) {
            return Err(CoreError::AlreadyCreated(market.id));
        }
        self.markets.insert(market.id, market);
        Ok(())
    }

    pub fn get(&self, id: Address) -> Result<&Market> {
        self.markets.get(&id).ok_or(CoreError::MarketNotCreated(id))
    }

    pub fn get_mut(&mut self, id: Address) -> Result<&mut Market> {
        self.markets.get_mut(&id).ok_or(CoreError::MarketNotCreated(id))
    }

    #[inline]
    pub fn contains(&self, id: Address) -> bool {
        self.markets.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Replace a market wholesale (used to commit staged updates)
    pub fn replace(&mut self, market: Market) -> Result<()> {
        let slot = self.get_mut(market.id)?;
        *slot = market;
        Ok(())
    }

    /// Set the growth blend weights; both must be nonzero
    pub fn set_weights(&mut self, id: Address, supply_weight: u64, borrow_weight: u64) -> Result<()> {
        let market = self.get_mut(id)?;
        if supply_weight == 0 || borrow_weight == 0 {
            return Err(CoreError::invalid("weights", "supply and borrow weights must be nonzero"));
        }
        market.supply_weight = supply_weight;
        market.borrow_weight = borrow_weight;
        Ok(())
    }

    /// Set the protocol spread; at most [`MAX_RESERVE_FACTOR`] bps
    pub fn set_reserve_factor(&mut self, id: Address, reserve_factor: u16) -> Result<()> {
        let market = self.get_mut(id)?;
        if reserve_factor > MAX_RESERVE_FACTOR {
            return Err(CoreError::invalid(
                "reserve_factor",
                format!("{} exceeds {} basis points", reserve_factor, MAX_RESERVE_FACTOR),
            ));
        }
        market.reserve_factor = reserve_factor;
        Ok(())
    }

    pub fn set_threshold(&mut self, id: Address, threshold: U256) -> Result<()> {
        self.get_mut(id)?.threshold = threshold;
        Ok(())
    }

    pub fn set_cap(&mut self, id: Address, cap: U256) -> Result<()> {
        self.get_mut(id)?.cap = cap;
        Ok(())
    }
}

/// Balances of every (market, account) pair.
///
/// Absent entries read as an empty position; writing an empty position
/// drops the entry.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    positions: HashMap<(Address, Address), Position>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, market: Address, account: Address) -> Position {
        self.positions
            .get(&(market, account))
            .copied()
            .unwrap_or_default()
    }

    pub fn write(&mut self, market: Address, account: Address, position: Position) {
        if position.is_empty() {
            self.positions.remove(&(market, account));
        } else {
            self.positions.insert((market, account), position);
        }
    }

    /// Number of stored non-empty positions
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
