// arithmetic_codec/src/interval.rs

//! Interval narrowing and minimal-fraction selection.

use std::hash::Hash;

use contracts::{debug_ensures, debug_requires};
use num_bigint::BigInt;
use num_traits::pow;
use tracing::{trace, warn};

use crate::decimal::{Context, Decimal};
use crate::error::{ArithmeticCodingError, Result};
use crate::probability::ProbabilityTable;

/// A code interval `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    lower: Decimal,
    upper: Decimal,
}

impl Interval {
    #[debug_requires(lower <= upper, "interval bounds out of order")]
    pub fn new(lower: Decimal, upper: Decimal) -> Self {
        Interval { lower, upper }
    }

    /// The starting interval `[0, 1)`.
    pub fn unit() -> Self {
        Interval::new(Decimal::zero(), Decimal::one())
    }

    pub fn lower(&self) -> &Decimal {
        &self.lower
    }

    pub fn upper(&self) -> &Decimal {
        &self.upper
    }

    pub fn width(&self, context: &Context) -> Decimal {
        context.sub(&self.upper, &self.lower)
    }

    /// Whether `lower <= value < upper`.
    pub fn contains(&self, value: &Decimal) -> bool {
        self.lower <= *value && *value < self.upper
    }

    /// True once rounding has squeezed the interval to a point.
    pub fn is_collapsed(&self) -> bool {
        self.lower >= self.upper
    }

    /// Subdivides this interval in table order, one sub-interval per symbol
    /// with width proportional to its probability.
    pub fn partition<'a, S>(
        &self,
        table: &'a ProbabilityTable<S>,
        context: &'a Context,
    ) -> Partition<'a, S> {
        Partition {
            entries: table.entries().iter(),
            context,
            cursor: self.lower.clone(),
            width: self.width(context),
        }
    }
}

/// Iterator over the sub-intervals of a partitioned interval.
pub struct Partition<'a, S> {
    entries: std::slice::Iter<'a, (S, Decimal)>,
    context: &'a Context,
    cursor: Decimal,
    width: Decimal,
}

impl<'a, S> Iterator for Partition<'a, S> {
    type Item = (&'a S, Interval);

    fn next(&mut self) -> Option<Self::Item> {
        let (symbol, probability) = self.entries.next()?;
        let span = self.context.mul(probability, &self.width);
        let upper = self.context.add(&self.cursor, &span);
        let lower = std::mem::replace(&mut self.cursor, upper.clone());
        Some((symbol, Interval::new(lower, upper)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

/// Forward half of the codec: narrows `[0, 1)` one symbol at a time.
pub struct RangeNarrower<'a, S> {
    table: &'a ProbabilityTable<S>,
    context: &'a Context,
    interval: Interval,
    steps: usize,
}

impl<'a, S> RangeNarrower<'a, S>
where
    S: Clone + Eq + Hash,
{
    pub fn new(table: &'a ProbabilityTable<S>, context: &'a Context) -> Self {
        RangeNarrower {
            table,
            context,
            interval: Interval::unit(),
            steps: 0,
        }
    }

    /// Current interval.
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Number of symbols narrowed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Replaces the current interval by the sub-interval owned by `symbol`.
    ///
    /// # Errors
    ///
    /// Returns an error if `symbol` is not in the table, or if rounding
    /// collapses the new interval to a point.
    pub fn narrow(&mut self, symbol: &S) -> Result<&Interval> {
        let position = self.table.position(symbol).ok_or_else(|| {
            ArithmeticCodingError::InvalidInput(format!(
                "symbol at position {} is not in the probability table",
                self.steps
            ))
        })?;
        let (_, next) = self
            .interval
            .partition(self.table, self.context)
            .nth(position)
            .ok_or_else(|| {
                ArithmeticCodingError::InvalidModel(format!(
                    "table position {position} has no sub-interval"
                ))
            })?;

        if next.is_collapsed() {
            warn!(
                step = self.steps,
                precision = self.context.precision(),
                "interval collapsed during narrowing"
            );
            return Err(ArithmeticCodingError::IntervalCollapsed {
                position: self.steps,
                precision: self.context.precision(),
            });
        }

        trace!(step = self.steps, lower = %next.lower, upper = %next.upper, "narrowed");
        self.interval = next;
        self.steps += 1;
        Ok(&self.interval)
    }

    pub fn finish(self) -> Interval {
        self.interval
    }
}

/// Picks the value in `interval` with the fewest decimal digits.
///
/// Granularities `0.1, 0.01, ...` are tried in turn; at each one the multiples
/// just at or above `lower` are the only candidates. The result is written
/// as `n * 10^-k` with `n < 10^k`, so it always stays below one. The search
/// ends no later than the number of fractional digits of `lower`, where
/// `lower` itself qualifies.
///
/// # Errors
///
/// Returns an error if the interval is empty.
#[debug_ensures(ret.as_ref().map_or(true, |fraction| interval.contains(fraction)))]
pub fn select_minimal_fraction(interval: &Interval) -> Result<Decimal> {
    if interval.is_collapsed() {
        return Err(ArithmeticCodingError::InvalidInput(
            "cannot select a fraction from an empty interval".to_string(),
        ));
    }

    let finest = interval.lower.scale().max(1);
    let mut digits: u32 = 1;
    while u64::from(digits) <= finest {
        let limit: BigInt = pow(BigInt::from(10), digits as usize);
        let floor = interval.lower.floor_scaled(digits);
        for numerator in [floor.clone(), floor + 1] {
            if numerator >= limit {
                break;
            }
            let candidate = Decimal::new(numerator, -i64::from(digits));
            if interval.contains(&candidate) {
                return Ok(candidate);
            }
        }
        digits += 1;
    }

    Err(ArithmeticCodingError::InvalidInput(format!(
        "no fraction below one lies in [{}, {})",
        interval.lower, interval.upper
    )))
}

/// Fractional digits of a value in [0, 1) with the leading `0.` removed.
pub fn fraction_digits(fraction: &Decimal) -> String {
    let text = fraction.to_string();
    match text.strip_prefix("0.") {
        Some(digits) => digits.to_string(),
        None => text,
    }
}
