//! Entry node for slab-based storage.
//!
//! ## Design
//!
//! `RankNode` holds one account's tracked value plus the bookkeeping needed
//! by whichever part of the set currently owns it:
//!
//! - ranked entries are keyed in a `BTreeMap` by `(Reverse(value), seq)`;
//! - buffered entries form a doubly-linked FIFO through `prev` / `next`.
//!
//! ## Slab Integration
//!
//! Per official slab docs (https://docs.rs/slab/0.4.11):
//! - Keys are `usize` values returned by `slab.insert()`
//! - Keys may be reused after `slab.remove()`
//! - O(1) insert, remove, and lookup

use alloy_primitives::{Address, U256};

/// Which part of the set an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Ranked,
    Buffered,
}

/// Entry stored in the slab.
///
/// The pointers are slab keys (`usize`), not direct references, and are only
/// meaningful while the entry is buffered.
#[derive(Debug, Clone)]
pub struct RankNode {
    /// Tracked account
    pub account: Address,

    /// Last value reported for the account
    pub value: U256,

    /// Insertion sequence, breaks ties between equal ranked values
    pub seq: u64,

    pub placement: Placement,

    /// Next (newer) entry in the buffer queue
    pub next: Option<usize>,

    /// Previous (older) entry in the buffer queue
    pub prev: Option<usize>,
}

impl RankNode {
    /// Create a new unlinked node
    ///
    /// # Example
    ///
    /// ```
    /// use alloy_primitives::{Address, U256};
    /// use p2p_overlay::ranking::{Placement, RankNode};
    ///
    /// let node = RankNode::new(Address::repeat_byte(1), U256::from(10u64), 0, Placement::Ranked);
    ///
    /// assert!(node.is_unlinked());
    /// assert!(node.is_ranked());
    /// ```
    #[inline]
    pub fn new(account: Address, value: U256, seq: u64, placement: Placement) -> Self {
        Self {
            account,
            value,
            seq,
            placement,
            next: None,
            prev: None,
        }
    }

    /// Check if this node is unlinked (not part of a buffer queue of 2+)
    #[inline]
    pub fn is_unlinked(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }

    #[inline]
    pub fn is_ranked(&self) -> bool {
        self.placement == Placement::Ranked
    }

    #[inline]
    pub fn is_buffered(&self) -> bool {
        self.placement == Placement::Buffered
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
