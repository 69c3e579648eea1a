//! Position types: which side and which book a balance lives in.
//!
//! Every account holds, per market, four scaled balances: supply and borrow,
//! each split between the part matched peer-to-peer and the part sitting on
//! the underlying pool.

use alloy_primitives::U256;

// ============================================================================
// Side enum
// ============================================================================

/// Side of the market a balance belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Side {
    /// Lender side
    #[default]
    Supply,
    /// Debtor side
    Borrow,
}

impl Side {
    /// Returns the counterparty side
    pub fn opposite(self) -> Self {
        match self {
            Side::Supply => Side::Borrow,
            Side::Borrow => Side::Supply,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Supply => "supply",
            Side::Borrow => "borrow",
        }
    }
}

// ============================================================================
// Book enum
// ============================================================================

/// Where a balance is currently placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Book {
    /// Routed through the underlying pool
    #[default]
    OnPool,
    /// Matched directly against a counterparty
    InP2P,
}

impl Book {
    pub fn as_str(self) -> &'static str {
        match self {
            Book::OnPool => "on_pool",
            Book::InP2P => "in_p2p",
        }
    }
}

// ============================================================================
// Position struct
// ============================================================================

/// Balances of one account in one market.
///
/// On-pool balances are scaled by the pool index, in-P2P balances by the
/// market's P2P exchange rate; multiplying by the matching rate (`ray_mul`)
/// gives underlying units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub supply_in_p2p: U256,
    pub supply_on_pool: U256,
    pub borrow_in_p2p: U256,
    pub borrow_on_pool: U256,
}

impl Position {
    pub fn new(
        supply_in_p2p: U256,
        supply_on_pool: U256,
        borrow_in_p2p: U256,
        borrow_on_pool: U256,
    ) -> Self {
        Self {
            supply_in_p2p,
            supply_on_pool,
            borrow_in_p2p,
            borrow_on_pool,
        }
    }

    /// Get the balance held on one side in one book
    pub fn balance(&self, side: Side, book: Book) -> U256 {
        match (side, book) {
            (Side::Supply, Book::InP2P) => self.supply_in_p2p,
            (Side::Supply, Book::OnPool) => self.supply_on_pool,
            (Side::Borrow, Book::InP2P) => self.borrow_in_p2p,
            (Side::Borrow, Book::OnPool) => self.borrow_on_pool,
        }
    }

    /// Set the balance held on one side in one book
    pub fn set_balance(&mut self, side: Side, book: Book, value: U256) {
        let slot = match (side, book) {
            (Side::Supply, Book::InP2P) => &mut self.supply_in_p2p,
            (Side::Supply, Book::OnPool) => &mut self.supply_on_pool,
            (Side::Borrow, Book::InP2P) => &mut self.borrow_in_p2p,
            (Side::Borrow, Book::OnPool) => &mut self.borrow_on_pool,
        };
        *slot = value;
    }

    /// Check if every balance is zero
    pub fn is_empty(&self) -> bool {
        self.supply_in_p2p.is_zero()
            && self.supply_on_pool.is_zero()
            && self.borrow_in_p2p.is_zero()
            && self.borrow_on_pool.is_zero()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
