//! Bounded ranked set of account balances.
//!
//! ## Architecture
//!
//! One `RankedBalanceSet` tracks one (market, side, book). It uses:
//!
//! - **Slab**: storage for every tracked entry, ranked or buffered
//! - **BTreeMap**: ranked entries sorted by value, high to low
//! - **HashMap**: account to slab key mapping for O(1) lookup
//! - **OverflowBuffer**: FIFO of accounts that did not fit in the ranked part
//!
//! ## Ordering
//!
//! Ranked entries are keyed by `(Reverse(value), seq)`: the largest value
//! comes first and equal values keep their insertion order, so among equal
//! values the most recently inserted one sits closest to the minimum.
//!
//! ## Example
//!
//! ```
//! use std::num::NonZeroUsize;
//!
//! use alloy_primitives::{Address, U256};
//! use p2p_overlay::ranking::RankedBalanceSet;
//!
//! let mut set = RankedBalanceSet::new(NonZeroUsize::new(2).unwrap());
//! set.update(Address::with_last_byte(1), U256::from(10u64));
//! set.update(Address::with_last_byte(2), U256::from(20u64));
//! set.update(Address::with_last_byte(3), U256::from(30u64));
//!
//! // Full: the smallest value was pushed to the buffer
//! assert_eq!(set.ranked_len(), 2);
//! assert!(set.is_buffered(Address::with_last_byte(1)));
//! assert_eq!(set.minimum().unwrap(), (U256::from(20u64), Address::with_last_byte(2)));
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

use alloy_primitives::{Address, U256};
use sha2::{Digest, Sha256};
use slab::Slab;
use tracing::trace;

use crate::error::{CoreError, Result};
use crate::ranking::{OverflowBuffer, Placement, RankNode};

type RankKey = (Reverse<U256>, u64);

/// Bounded, rank-ordered collection of (account, balance) pairs.
#[derive(Debug, Clone)]
pub struct RankedBalanceSet {
    /// Every tracked entry, ranked or buffered
    nodes: Slab<RankNode>,

    /// Ranked entries, largest value first
    ranked: BTreeMap<RankKey, usize>,

    /// Account to slab key mapping
    index: HashMap<Address, usize>,

    /// Accounts waiting for a ranked slot
    buffer: OverflowBuffer,

    /// NMAX: maximum number of ranked entries
    max_size: usize,

    /// Next insertion sequence number
    next_seq: u64,
}

impl RankedBalanceSet {
    /// Create an empty set ranking at most `max_size` accounts
    pub fn new(max_size: NonZeroUsize) -> Self {
        Self::with_capacity(max_size, 0)
    }

    /// Create an empty set with storage pre-allocated for `capacity` entries
    pub fn with_capacity(max_size: NonZeroUsize, capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            ranked: BTreeMap::new(),
            index: HashMap::with_capacity(capacity),
            buffer: OverflowBuffer::new(),
            max_size: max_size.get(),
            next_seq: 0,
        }
    }

    // ========================================================================
    // Capacity and Size
    // ========================================================================

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of ranked entries (never above `max_size`)
    #[inline]
    pub fn ranked_len(&self) -> usize {
        self.ranked.len()
    }

    /// Number of buffered entries
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len
    }

    /// Number of tracked accounts, ranked or buffered
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ranked.len() >= self.max_size
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Record `new_value` as the current balance of `account`.
    ///
    /// A changed or zero value drops the account's previous entry; a nonzero
    /// value of an untracked account is ranked if there is room or if it beats
    /// the current minimum (which then moves to the buffer), and buffered
    /// otherwise. Finally, if a ranked slot is free, the oldest buffered
    /// account is promoted.
    ///
    /// Repeating an update with the same value changes nothing.
    pub fn update(&mut self, account: Address, new_value: U256) {
        if let Some(&key) = self.index.get(&account) {
            let node = &self.nodes[key];
            if node.value != new_value || new_value.is_zero() {
                self.detach(key);
                self.nodes.remove(key);
                self.index.remove(&account);
            }
        }

        if !new_value.is_zero() && !self.index.contains_key(&account) {
            self.insert(account, new_value);
        }

        self.promote();
    }

    /// Unlink an entry from the ranked map or the buffer, keeping it in the slab
    fn detach(&mut self, key: usize) {
        let node = &self.nodes[key];
        let (placement, rank) = (node.placement, (Reverse(node.value), node.seq));
        match placement {
            Placement::Ranked => {
                self.ranked.remove(&rank);
            }
            Placement::Buffered => self.buffer.remove(key, &mut self.nodes),
        }
    }

    fn insert(&mut self, account: Address, value: U256) {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.is_full() {
            let (min_rank, min_key) = match self.ranked.iter().next_back() {
                Some((rank, key)) => (*rank, *key),
                None => return,
            };
            let Reverse(min_value) = min_rank.0;

            if value > min_value {
                self.ranked.remove(&min_rank);
                self.nodes[min_key].placement = Placement::Buffered;
                self.buffer.push_back(min_key, &mut self.nodes);
                trace!(evicted = %self.nodes[min_key].account, value = %min_value, "evicted minimum to buffer");
            } else {
                let key = self
                    .nodes
                    .insert(RankNode::new(account, value, seq, Placement::Buffered));
                self.index.insert(account, key);
                self.buffer.push_back(key, &mut self.nodes);
                return;
            }
        }

        let key = self
            .nodes
            .insert(RankNode::new(account, value, seq, Placement::Ranked));
        self.index.insert(account, key);
        self.ranked.insert((Reverse(value), seq), key);
    }

    /// Move the oldest buffered entry into a free ranked slot
    fn promote(&mut self) {
        if self.is_full() {
            return;
        }

        if let Some(key) = self.buffer.pop_front(&mut self.nodes) {
            let node = &mut self.nodes[key];
            node.placement = Placement::Ranked;
            self.ranked.insert((Reverse(node.value), node.seq), key);
            trace!(promoted = %node.account, value = %node.value, "promoted from buffer");
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Smallest ranked (value, account) pair
    ///
    /// # Errors
    ///
    /// [`CoreError::EmptySet`] if nothing is ranked
    pub fn minimum(&self) -> Result<(U256, Address)> {
        self.ranked
            .values()
            .next_back()
            .map(|&key| {
                let node = &self.nodes[key];
                (node.value, node.account)
            })
            .ok_or(CoreError::EmptySet)
    }

    /// Largest ranked (value, account) pair
    pub fn maximum(&self) -> Option<(U256, Address)> {
        self.ranked.values().next().map(|&key| {
            let node = &self.nodes[key];
            (node.value, node.account)
        })
    }

    /// Stored value of a ranked or buffered account, zero if untracked
    pub fn value_of(&self, account: Address) -> U256 {
        self.index
            .get(&account)
            .map(|&key| self.nodes[key].value)
            .unwrap_or(U256::ZERO)
    }

    #[inline]
    pub fn contains(&self, account: Address) -> bool {
        self.index.contains_key(&account)
    }

    pub fn is_ranked(&self, account: Address) -> bool {
        self.index
            .get(&account)
            .is_some_and(|&key| self.nodes[key].is_ranked())
    }

    pub fn is_buffered(&self, account: Address) -> bool {
        self.index
            .get(&account)
            .is_some_and(|&key| self.nodes[key].is_buffered())
    }

    /// Ranked entries, largest value first
    pub fn iter_ranked(&self) -> impl Iterator<Item = (Address, U256)> + '_ {
        self.ranked.values().map(move |&key| {
            let node = &self.nodes[key];
            (node.account, node.value)
        })
    }

    /// Buffered entries, oldest first
    pub fn iter_buffered(&self) -> impl Iterator<Item = (Address, U256)> + '_ {
        self.buffer.keys(&self.nodes).map(move |key| {
            let node = &self.nodes[key];
            (node.account, node.value)
        })
    }

    // ========================================================================
    // State Root
    // ========================================================================

    /// SHA-256 digest of the ranked entries (in rank order) followed by the
    /// buffered entries (in queue order)
    pub fn compute_state_root(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();

        for (account, value) in self.iter_ranked() {
            hasher.update(account.as_slice());
            hasher.update(value.to_be_bytes::<32>());
        }
        hasher.update([0xff]);
        for (account, value) in self.iter_buffered() {
            hasher.update(account.as_slice());
            hasher.update(value.to_be_bytes::<32>());
        }

        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        root
    }

    pub fn state_root_hex(&self) -> String {
        hex::encode(self.compute_state_root())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
