//! Bounded ranking of account balances.
//!
//! ## Architecture
//!
//! Matching must visit the biggest counterparties first without sorting
//! every position on each balance change. Each (market, side, book) keeps a
//! [`RankedBalanceSet`]:
//!
//! - at most `NMAX` accounts are ranked, ordered by descending balance;
//! - accounts that do not fit wait in an [`OverflowBuffer`] and are promoted
//!   when a ranked slot frees up.
//!
//! ## Components
//!
//! - [`RankNode`]: one tracked account, stored in a slab
//! - [`OverflowBuffer`]: FIFO queue of buffered entries
//! - [`RankedBalanceSet`]: the ranked map, the index and the buffer
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | update | O(log NMAX) |
//! | value_of | O(1) |
//! | minimum / maximum | O(log NMAX) |

pub mod buffer;
pub mod node;
pub mod set;

pub use buffer::OverflowBuffer;
pub use node::{Placement, RankNode};
pub use set::RankedBalanceSet;
