// arithmetic_codec/src/arithmetic_coding.rs

use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decimal::{Context, Decimal, DEFAULT_PRECISION};
use crate::error::{ArithmeticCodingError, Result};
use crate::interval::{fraction_digits, select_minimal_fraction, RangeNarrower};
use crate::probability::{build_model, ProbabilityTable};

/// Floor on the digits one decoded symbol is assumed to consume.
const MIN_DIGITS_PER_SYMBOL: f64 = 1e-6;
const DECODE_LIMIT_FACTOR: usize = 2;
const DECODE_LIMIT_SLACK: usize = 64;
/// Ceiling on the derived decode limit; longer sequences need an explicit
/// [`CodecConfig::max_decode_symbols`].
pub const MAX_DERIVED_DECODE_SYMBOLS: usize = 1_000_000;

/// Settings shared by encoding and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Significant decimal digits kept by every arithmetic operation. Bounds
    /// the longest sequence that survives a round trip.
    pub precision: u32,
    /// Most symbols a decode may emit before giving up. `None` derives a
    /// bound from the precision, the code length and the table.
    pub max_decode_symbols: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            precision: DEFAULT_PRECISION,
            max_decode_symbols: None,
        }
    }
}

impl CodecConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_decode_symbols(mut self, limit: usize) -> Self {
        self.max_decode_symbols = Some(limit);
        self
    }
}

/// Everything needed to decode: the code digits, the ordered table and the
/// end-of-sequence marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize",
    deserialize = "S: Deserialize<'de> + Clone + Eq + Hash"
))]
pub struct EncodedArtifact<S> {
    /// Decimal digits of the code value with the leading `0.` removed.
    pub digits: String,
    pub probability_table: ProbabilityTable<S>,
    pub end_of_sequence: S,
}

impl<S> EncodedArtifact<S> {
    /// The code value `0.<digits>`, read exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if `digits` holds anything but ASCII digits.
    pub fn fraction(&self) -> Result<Decimal> {
        if !self.digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ArithmeticCodingError::InvalidInput(format!(
                "encoded digits {:?} contain a non-digit character",
                self.digits
            )));
        }
        Ok(format!("0.{}", self.digits).parse()?)
    }
}

/// Encoder/decoder bound to one precision context.
#[derive(Debug, Clone)]
pub struct ArithmeticCoder {
    config: CodecConfig,
    context: Context,
}

impl ArithmeticCoder {
    /// Constructs a new `ArithmeticCoder` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.precision` is zero.
    pub fn new(config: CodecConfig) -> Result<Self> {
        let context = Context::new(config.precision)?;
        Ok(ArithmeticCoder { config, context })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Encodes `symbols` into the shortest decimal fraction inside the final
    /// interval.
    ///
    /// When `probability_table` is `None` the table is estimated from symbol
    /// frequencies. All preconditions are checked before narrowing starts.
    ///
    /// # Errors
    ///
    /// * [`ArithmeticCodingError::InvalidInput`] if `end_of_sequence` is not in
    ///   `symbols` or the supplied table, or a symbol is missing from the table.
    /// * [`ArithmeticCodingError::InvalidModel`] if the probabilities do not sum
    ///   to one.
    /// * [`ArithmeticCodingError::IntervalCollapsed`] if the precision is too low
    ///   for the sequence.
    pub fn encode<S>(
        &self,
        symbols: &[S],
        end_of_sequence: S,
        probability_table: Option<ProbabilityTable<S>>,
    ) -> Result<EncodedArtifact<S>>
    where
        S: Clone + Eq + Hash,
    {
        if !symbols.contains(&end_of_sequence) {
            return Err(ArithmeticCodingError::InvalidInput(
                "symbol sequence does not contain the end-of-sequence marker".to_string(),
            ));
        }

        let table = build_model(symbols, &end_of_sequence, probability_table, &self.context)?;
        if let Some(position) = symbols.iter().position(|symbol| !table.contains(symbol)) {
            return Err(ArithmeticCodingError::InvalidInput(format!(
                "symbol at position {position} is not in the probability table"
            )));
        }

        let mut narrower = RangeNarrower::new(&table, &self.context);
        for symbol in symbols {
            narrower.narrow(symbol)?;
        }
        let interval = narrower.finish();
        let digits = fraction_digits(&select_minimal_fraction(&interval)?);

        debug!(
            symbols = symbols.len(),
            alphabet = table.len(),
            digits = digits.len(),
            precision = self.context.precision(),
            "encoded sequence"
        );
        Ok(EncodedArtifact {
            digits,
            probability_table: table,
            end_of_sequence,
        })
    }

    /// Decodes an artifact back into its symbols, end-of-sequence marker
    /// included.
    ///
    /// # Errors
    ///
    /// * [`ArithmeticCodingError::InvalidInput`] if the digits are malformed or
    ///   the marker is missing from the table.
    /// * [`ArithmeticCodingError::InvalidModel`] if the probabilities do not sum
    ///   to one.
    /// * [`ArithmeticCodingError::DecodeLimitExceeded`] if the marker is not
    ///   reached within the symbol limit, or the code settles on a value that
    ///   repeats the same symbol forever. Both happen when the precision is too
    ///   low for the encoded sequence.
    pub fn decode<S>(&self, artifact: &EncodedArtifact<S>) -> Result<Vec<S>>
    where
        S: Clone + Eq + Hash,
    {
        let table = &artifact.probability_table;
        if !table.contains(&artifact.end_of_sequence) {
            return Err(ArithmeticCodingError::InvalidInput(
                "probability table does not contain the end-of-sequence marker".to_string(),
            ));
        }
        table.check_normalized(&self.context)?;

        let mut fraction = artifact.fraction()?;
        let bounds = table.cumulative_lower_bounds(&self.context);
        let limit = self.config.max_decode_symbols.unwrap_or_else(|| {
            default_decode_limit(table, artifact.digits.len(), self.context.precision())
        });

        let mut output = Vec::new();
        loop {
            if output.len() >= limit {
                warn!(
                    limit,
                    precision = self.context.precision(),
                    "end-of-sequence marker not reached"
                );
                return Err(ArithmeticCodingError::DecodeLimitExceeded {
                    limit,
                    precision: self.context.precision(),
                });
            }

            // Last bound <= fraction; a fraction on a boundary belongs to the
            // interval starting there.
            let position = bounds
                .partition_point(|bound| *bound <= fraction)
                .saturating_sub(1);
            let (symbol, probability) = &table.entries()[position];
            output.push(symbol.clone());
            if *symbol == artifact.end_of_sequence {
                break;
            }

            let next = self.context.sub(&fraction, &bounds[position]);
            let next = self.context.div(&next, probability)?;
            if next == fraction {
                // a fixed point selects the same symbol on every later step
                warn!(
                    symbols = output.len(),
                    precision = self.context.precision(),
                    "code value stopped changing before the end-of-sequence marker"
                );
                return Err(ArithmeticCodingError::DecodeLimitExceeded {
                    limit,
                    precision: self.context.precision(),
                });
            }
            fraction = next;
        }

        debug!(
            symbols = output.len(),
            digits = artifact.digits.len(),
            precision = self.context.precision(),
            "decoded sequence"
        );
        Ok(output)
    }
}

/// Upper bound on the symbols a well-formed code can hold.
///
/// Every symbol consumes at least `-log10(p_max)` digits of the code, and the
/// code carries at most `max(digits, precision)` digits of information. The
/// result never exceeds [`MAX_DERIVED_DECODE_SYMBOLS`].
fn default_decode_limit<S>(table: &ProbabilityTable<S>, digits: usize, precision: u32) -> usize {
    let available = digits.max(precision as usize) as f64;
    let most_likely = table
        .max_probability()
        .to_f64()
        .unwrap_or(1.0)
        .clamp(f64::MIN_POSITIVE, 1.0);
    let per_symbol = (-most_likely.log10()).max(MIN_DIGITS_PER_SYMBOL);
    let estimate = (available / per_symbol).ceil() as usize;
    estimate
        .saturating_mul(DECODE_LIMIT_FACTOR)
        .saturating_add(DECODE_LIMIT_SLACK)
        .min(MAX_DERIVED_DECODE_SYMBOLS)
}

/// Encodes a symbol sequence using arithmetic coding.
///
/// # Arguments
///
/// * `symbols` - Input symbols; must contain `end_of_sequence`.
/// * `end_of_sequence` - Marker whose decoding stops the decoder.
/// * `probability_table` - Ordered table, or `None` to estimate one from
///   frequencies.
/// * `config` - Precision and decode limits.
///
/// # Returns
///
/// * `Result<EncodedArtifact<S>, ArithmeticCodingError>` - The code digits with
///   the table and marker, or an error.
///
/// # Examples
///
/// ```
/// use arithmetic_codec::{arithmetic_encode, CodecConfig, ProbabilityTable};
///
/// let table = ProbabilityTable::from_f64_entries([('R', 0.4), ('G', 0.5), ('B', 0.1)])?;
/// let encoded = arithmetic_encode(&['G', 'G', 'B'], 'B', Some(table), &CodecConfig::default())?;
/// assert_eq!(encoded.digits, "83");
/// # Ok::<(), arithmetic_codec::ArithmeticCodingError>(())
/// ```
pub fn arithmetic_encode<S>(
    symbols: &[S],
    end_of_sequence: S,
    probability_table: Option<ProbabilityTable<S>>,
    config: &CodecConfig,
) -> Result<EncodedArtifact<S>>
where
    S: Clone + Eq + Hash,
{
    ArithmeticCoder::new(*config)?.encode(symbols, end_of_sequence, probability_table)
}

/// Decodes an artifact produced by [`arithmetic_encode`].
///
/// # Arguments
///
/// * `artifact` - Code digits, table and marker.
/// * `config` - Precision and decode limits.
///
/// # Returns
///
/// * `Result<Vec<S>, ArithmeticCodingError>` - Decoded symbols ending with the
///   end-of-sequence marker, or an error.
///
/// # Examples
///
/// ```
/// use arithmetic_codec::{arithmetic_decode, arithmetic_encode, CodecConfig};
///
/// let text: Vec<char> = "hello$".chars().collect();
/// let config = CodecConfig::default();
/// let encoded = arithmetic_encode(&text, '$', None, &config)?;
/// assert_eq!(arithmetic_decode(&encoded, &config)?, text);
/// # Ok::<(), arithmetic_codec::ArithmeticCodingError>(())
/// ```
pub fn arithmetic_decode<S>(artifact: &EncodedArtifact<S>, config: &CodecConfig) -> Result<Vec<S>>
where
    S: Clone + Eq + Hash,
{
    ArithmeticCoder::new(*config)?.decode(artifact)
}
