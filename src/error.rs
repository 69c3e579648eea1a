//! Error taxonomy for the overlay core.
//!
//! Every error aborts the whole call that produced it. Mutating entry points
//! stage their results before writing, so an `Err` leaves no partial state.

use alloy_primitives::Address;
use thiserror::Error;

/// Errors raised by the accounting core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A fixed-point multiply or add exceeded 256 bits
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// A checked subtraction went below zero
    #[error("arithmetic underflow")]
    ArithmeticUnderflow,

    /// Division by a zero divisor (usually an uninitialised pool rate)
    #[error("division by zero")]
    DivisionByZero,

    /// `minimum()` requested on a ranked set with no ranked entries
    #[error("ranked set is empty")]
    EmptySet,

    #[error("market {0} already created")]
    AlreadyCreated(Address),

    #[error("market {0} not created")]
    MarketNotCreated(Address),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The caller supplied a block older than the market's last update
    #[error("block {requested} precedes last update at block {last}")]
    NonMonotonicBlock { last: u64, requested: u64 },
}

impl CoreError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
