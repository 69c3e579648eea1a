//! # P2P Overlay
//!
//! Accounting core of a peer-to-peer lending overlay on top of a pooled
//! money market.
//!
//! ## Architecture
//!
//! - **Types**: markets, positions, rates and fixed-point math
//! - **Ranking**: bounded, slab-backed ranked sets of account balances
//! - **Engine**: ranking coordinator, interest accrual and the entry points
//!
//! ## Design Principles
//!
//! 1. **Determinism**: all operations produce identical results for identical inputs
//! 2. **No Floating Point**: balances are wads (10^18), rates are rays (10^27)
//! 3. **Bounded Work**: rankings hold at most NMAX accounts, passes visit at
//!    most a fixed number of them
//! 4. **Synchronous Execution**: every call runs to completion on `&mut self`

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types and fixed-point math
pub mod types;

/// Bounded ranked balance sets
pub mod ranking;

/// Accrual, matching and the overlay entry points
pub mod engine;

/// Environment configuration
pub mod config;

/// Error taxonomy
pub mod error;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::{ConfigError, EngineConfig};
pub use engine::{LendingOverlay, MatchingEngine, NullAccrual, Pool, SimulatedPool, StakeAccrual};
pub use error::{CoreError, Result};
pub use ranking::RankedBalanceSet;
pub use types::{Book, Delta, Market, MatchOutcome, P2PRates, PoolRates, Position, Side};
