//! Summary of a bounded matching or unmatching pass.

use alloy_primitives::{Address, U256};

use crate::types::Side;

/// Result of one pass over a ranked set.
///
/// ## Example
///
/// ```
/// use alloy_primitives::U256;
/// use p2p_overlay::types::{MatchOutcome, Side};
///
/// let outcome = MatchOutcome::new(Side::Supply, U256::from(100u64));
/// assert!(outcome.is_empty());
/// assert_eq!(outcome.remaining(), U256::from(100u64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    /// Side whose accounts were moved between books
    pub side: Side,

    /// Underlying amount the caller asked to move
    pub requested: U256,

    /// Underlying amount actually moved
    pub processed: U256,

    /// Accounts visited, largest first
    pub accounts: Vec<Address>,
}

impl MatchOutcome {
    pub fn new(side: Side, requested: U256) -> Self {
        Self {
            side,
            requested,
            processed: U256::ZERO,
            accounts: Vec::new(),
        }
    }

    /// Number of accounts the pass touched
    #[inline]
    pub fn iterations(&self) -> usize {
        self.accounts.len()
    }

    /// Amount left over when the pass ran out of accounts or iterations
    pub fn remaining(&self) -> U256 {
        self.requested.saturating_sub(self.processed)
    }

    /// Check if the whole requested amount was moved
    pub fn is_complete(&self) -> bool {
        self.processed >= self.requested
    }

    /// Check if nothing was moved
    pub fn is_empty(&self) -> bool {
        self.processed.is_zero()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
