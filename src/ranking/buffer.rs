//! Overflow buffer for accounts that did not qualify for a ranked slot.
//!
//! ## Queue Structure
//!
//! ```text
//! head (oldest) <-> entry2 <-> entry3 <-> tail (newest)
//! ```
//!
//! - Evicted or unqualified accounts are appended at the tail
//! - Promotion takes from the head (FIFO)
//! - Any entry can be removed in O(1) using its slab key

use slab::Slab;

use crate::ranking::RankNode;

/// FIFO queue of buffered entries.
///
/// The entries live in the slab; this struct only holds the queue metadata.
#[derive(Debug, Clone, Default)]
pub struct OverflowBuffer {
    /// Oldest buffered entry (slab key), promoted first
    pub head: Option<usize>,

    /// Newest buffered entry (slab key)
    pub tail: Option<usize>,

    /// Number of buffered entries
    pub len: usize,
}

impl OverflowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append an entry at the tail of the queue
    ///
    /// # Panics
    ///
    /// Panics if the key doesn't exist in the slab
    pub fn push_back(&mut self, key: usize, slab: &mut Slab<RankNode>) {
        let node = slab.get_mut(key).expect("Invalid slab key");
        node.prev = self.tail;
        node.next = None;

        if let Some(tail_key) = self.tail {
            let tail_node = slab.get_mut(tail_key).expect("Invalid tail key");
            tail_node.next = Some(key);
        } else {
            self.head = Some(key);
        }

        self.tail = Some(key);
        self.len += 1;
    }

    /// Unlink an entry from anywhere in the queue
    ///
    /// # Panics
    ///
    /// Panics if the key doesn't exist in the slab
    pub fn remove(&mut self, key: usize, slab: &mut Slab<RankNode>) {
        let node = slab.get(key).expect("Invalid slab key");
        let prev_key = node.prev;
        let next_key = node.next;

        if let Some(prev) = prev_key {
            slab.get_mut(prev).expect("Invalid prev key").next = next_key;
        } else {
            self.head = next_key;
        }

        if let Some(next) = next_key {
            slab.get_mut(next).expect("Invalid next key").prev = prev_key;
        } else {
            self.tail = prev_key;
        }

        let node = slab.get_mut(key).expect("Invalid slab key");
        node.prev = None;
        node.next = None;

        self.len -= 1;
    }

    /// Unlink and return the oldest entry
    pub fn pop_front(&mut self, slab: &mut Slab<RankNode>) -> Option<usize> {
        let key = self.head?;
        self.remove(key, slab);
        Some(key)
    }

    /// Slab keys in FIFO order
    pub fn keys<'a>(&self, slab: &'a Slab<RankNode>) -> BufferIter<'a> {
        BufferIter {
            slab,
            cursor: self.head,
        }
    }

    pub fn clear(&mut self) {
        self.head = None;
        self.tail = None;
        self.len = 0;
    }
}

/// Iterator over buffered slab keys, oldest first
pub struct BufferIter<'a> {
    slab: &'a Slab<RankNode>,
    cursor: Option<usize>,
}

impl<'a> Iterator for BufferIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let key = self.cursor?;
        self.cursor = self.slab.get(key).and_then(|node| node.next);
        Some(key)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
