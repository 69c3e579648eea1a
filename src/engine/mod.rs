//! Accounting engine of the overlay.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: same calls in the same order give the same state
//! 2. **Fixed-Point Math**: wad and ray `U256` arithmetic only
//! 3. **Atomic Calls**: fallible work is staged before anything is written
//! 4. **Per-Market State**: no market ever reads another market's books
//!
//! ## Components
//!
//! - [`accrual`]: pool growth to P2P exchange rate growth
//! - [`coordinator`]: ranking refreshes and bounded matching passes
//! - [`store`]: market and position storage
//! - [`pool`]: boundary traits and a simulated pool
//! - [`overlay`]: [`LendingOverlay`], the entry points

pub mod accrual;
pub mod coordinator;
pub mod overlay;
pub mod pool;
pub mod store;

pub use coordinator::{MarketBooks, MatchingEngine, PassKind, PassPlan};
pub use overlay::LendingOverlay;
pub use pool::{NullAccrual, Pool, RecordingAccrual, SimulatedPool, StakeAccrual, StakeUpdate, StakedAsset};
pub use store::{MarketStore, PositionStore};
