//! Core data types for the overlay.
//!
//! ## Types
//!
//! - [`Market`]: per-market rates, weights and [`Delta`] state
//! - [`Position`]: per-account balances split by [`Side`] and [`Book`]
//! - [`PoolRates`], [`P2PRates`], [`GrowthFactors`]: ray-scale rate snapshots
//! - [`MatchOutcome`]: summary of a bounded matching pass
//!
//! ## Fixed-Point Arithmetic
//!
//! Balances are wads (10^18) and rates are rays (10^27), both stored as
//! `U256`. See [`math`] for the rounding rules.

mod market;
mod outcome;
mod position;
mod rates;
pub mod math;

// Re-export all types at module level
pub use market::{Delta, Market};
pub use outcome::MatchOutcome;
pub use position::{Book, Position, Side};
pub use rates::{GrowthFactors, P2PRates, PoolRates};
