// arithmetic_codec/src/lib.rs

//! Arithmetic Coding Library
//!
//! This library encodes a symbol sequence as a single arbitrary-precision
//! decimal fraction and decodes it back, given the same ordered probability
//! table. Precision is chosen per call through [`CodecConfig`].

pub mod arithmetic_coding;
pub mod decimal;
pub mod error;
pub mod interval;
pub mod probability;

pub use arithmetic_coding::{
    arithmetic_decode, arithmetic_encode, ArithmeticCoder, CodecConfig, EncodedArtifact,
    MAX_DERIVED_DECODE_SYMBOLS,
};
pub use decimal::{
    Context, Decimal, ParseDecimalError, DEFAULT_PRECISION, MAX_EXPONENT, MAX_PRECISION,
};
pub use error::{ArithmeticCodingError, Result};
pub use interval::{select_minimal_fraction, Interval, RangeNarrower};
pub use probability::{build_model, ProbabilityTable};
