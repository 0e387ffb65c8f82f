// arithmetic_codec/src/error.rs

//! Error types for encoding and decoding operations.

use thiserror::Error;

use crate::decimal::ParseDecimalError;

/// Error type for encoding and decoding operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticCodingError {
    /// The symbol sequence or artifact does not satisfy the call's preconditions.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The probability model is unusable.
    #[error("invalid probability model: {0}")]
    InvalidModel(String),

    /// Precision must be at least one significant digit.
    #[error("invalid precision: {0} (must be >= 1)")]
    InvalidPrecision(u32),

    /// A probability could not be read as a decimal number.
    #[error("invalid number: {0}")]
    InvalidNumber(#[from] ParseDecimalError),

    /// Narrowing produced an empty interval; more significant digits are needed.
    #[error(
        "interval collapsed at symbol {position} with precision {precision}; \
         increase the precision"
    )]
    IntervalCollapsed {
        /// Index of the input symbol whose step collapsed the interval.
        position: usize,
        /// Significant digits in effect.
        precision: u32,
    },

    /// Decoding emitted `limit` symbols without reaching the end-of-sequence marker.
    #[error(
        "decoding did not reach the end-of-sequence marker within {limit} symbols \
         at precision {precision}"
    )]
    DecodeLimitExceeded {
        /// Maximum number of symbols the decoder was allowed to emit.
        limit: usize,
        /// Significant digits in effect.
        precision: u32,
    },
}

impl ArithmeticCodingError {
    /// Returns `true` for failures caused by running out of significant digits.
    pub fn is_precision_exhausted(&self) -> bool {
        matches!(
            self,
            ArithmeticCodingError::IntervalCollapsed { .. }
                | ArithmeticCodingError::DecodeLimitExceeded { .. }
        )
    }
}

/// Convenience type alias for Results with `ArithmeticCodingError`.
pub type Result<T> = std::result::Result<T, ArithmeticCodingError>;
