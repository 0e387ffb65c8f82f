// arithmetic_codec/src/probability.rs

//! Ordered probability tables.
//!
//! The order of the entries defines how every interval is partitioned, so the
//! encoder and the decoder must walk the same table in the same order. The
//! table therefore keeps an explicit list of `(symbol, probability)` pairs and
//! only uses a hash index for lookups.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::decimal::{Context, Decimal};
use crate::error::{ArithmeticCodingError, Result};

/// Maximum distance between the probability total and one.
pub fn normalization_tolerance() -> Decimal {
    Decimal::new(1, -5)
}

/// Ordered mapping from symbols to probabilities in (0, 1].
#[derive(Debug, Clone)]
pub struct ProbabilityTable<S> {
    entries: Vec<(S, Decimal)>,
    index: HashMap<S, usize>,
    max_probability: Decimal,
}

impl<S> ProbabilityTable<S>
where
    S: Clone + Eq + Hash,
{
    /// Builds a table from ordered `(symbol, probability)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is empty, a symbol repeats, or a
    /// probability lies outside (0, 1].
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Decimal)>,
    {
        let entries: Vec<(S, Decimal)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(ArithmeticCodingError::InvalidModel(
                "probability table is empty".to_string(),
            ));
        }

        let one = Decimal::one();
        let mut index = HashMap::with_capacity(entries.len());
        let mut max_probability = Decimal::zero();
        for (position, (symbol, probability)) in entries.iter().enumerate() {
            if probability.is_negative() || probability.is_zero() || *probability > one {
                return Err(ArithmeticCodingError::InvalidModel(format!(
                    "probability at entry {position} is outside (0, 1]"
                )));
            }
            if index.insert(symbol.clone(), position).is_some() {
                return Err(ArithmeticCodingError::InvalidModel(format!(
                    "entry {position} repeats an earlier symbol"
                )));
            }
            if *probability > max_probability {
                max_probability = probability.clone();
            }
        }

        Ok(ProbabilityTable {
            entries,
            index,
            max_probability,
        })
    }

    /// Builds a table from floating-point probabilities, reading each float
    /// through its shortest decimal text.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is not finite or the entries are rejected
    /// by [`ProbabilityTable::from_entries`].
    pub fn from_f64_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
    {
        let entries = entries
            .into_iter()
            .map(|(symbol, probability)| Ok((symbol, Decimal::try_from(probability)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_entries(entries)
    }

    /// Estimates probabilities from symbol frequencies over the whole sequence.
    ///
    /// Symbols appear in the order of their first occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error if `symbols` is empty.
    pub fn from_frequencies(symbols: &[S], context: &Context) -> Result<Self> {
        if symbols.is_empty() {
            return Err(ArithmeticCodingError::InvalidModel(
                "cannot estimate probabilities from an empty sequence".to_string(),
            ));
        }

        let mut order: Vec<S> = Vec::new();
        let mut counts: HashMap<&S, usize> = HashMap::new();
        for symbol in symbols {
            let count = counts.entry(symbol).or_insert(0);
            if *count == 0 {
                order.push(symbol.clone());
            }
            *count += 1;
        }

        let total = Decimal::from(symbols.len());
        let entries = order
            .into_iter()
            .map(|symbol| {
                let count = Decimal::from(counts[&symbol]);
                let probability = context.div(&count, &total)?;
                Ok((symbol, probability))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_entries(entries)
    }

    pub fn contains(&self, symbol: &S) -> bool {
        self.index.contains_key(symbol)
    }

    /// Position of `symbol` in table order.
    pub fn position(&self, symbol: &S) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub fn probability(&self, symbol: &S) -> Option<&Decimal> {
        self.position(symbol).map(|position| &self.entries[position].1)
    }
}

impl<S> ProbabilityTable<S> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in table order.
    pub fn entries(&self) -> &[(S, Decimal)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &Decimal)> {
        self.entries.iter().map(|(symbol, probability)| (symbol, probability))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &S> {
        self.entries.iter().map(|(symbol, _)| symbol)
    }

    /// Largest probability in the table.
    pub fn max_probability(&self) -> &Decimal {
        &self.max_probability
    }

    /// Sum of all probabilities, accumulated in table order.
    pub fn total(&self, context: &Context) -> Decimal {
        context.sum(self.entries.iter().map(|(_, probability)| probability))
    }

    /// Checks that the probabilities sum to one within [`normalization_tolerance`].
    ///
    /// # Errors
    ///
    /// Returns an error describing the total when it is out of tolerance.
    pub fn check_normalized(&self, context: &Context) -> Result<()> {
        let total = self.total(context);
        let deviation = context.sub(&total, &Decimal::one()).abs();
        if deviation >= normalization_tolerance() {
            return Err(ArithmeticCodingError::InvalidModel(format!(
                "probabilities sum to {total}, expected 1"
            )));
        }
        Ok(())
    }

    /// Lower bound of every symbol's range inside [0, 1), in table order.
    pub fn cumulative_lower_bounds(&self, context: &Context) -> Vec<Decimal> {
        let mut bounds = Vec::with_capacity(self.entries.len());
        let mut cursor = Decimal::zero();
        for (_, probability) in &self.entries {
            let next = context.add(&cursor, probability);
            bounds.push(std::mem::replace(&mut cursor, next));
        }
        bounds
    }

    pub fn into_entries(self) -> Vec<(S, Decimal)> {
        self.entries
    }
}

/// Produces the probability table for one encode call.
///
/// A supplied table must contain the end-of-sequence marker; otherwise one is
/// estimated from `symbols`. Either way the result must sum to one.
///
/// # Errors
///
/// Returns [`ArithmeticCodingError::InvalidInput`] if a supplied table lacks the
/// marker and [`ArithmeticCodingError::InvalidModel`] if the probabilities are
/// unusable.
pub fn build_model<S>(
    symbols: &[S],
    end_of_sequence: &S,
    supplied: Option<ProbabilityTable<S>>,
    context: &Context,
) -> Result<ProbabilityTable<S>>
where
    S: Clone + Eq + Hash,
{
    let table = match supplied {
        Some(table) => {
            if !table.contains(end_of_sequence) {
                return Err(ArithmeticCodingError::InvalidInput(
                    "probability table does not contain the end-of-sequence marker".to_string(),
                ));
            }
            table
        }
        None => ProbabilityTable::from_frequencies(symbols, context)?,
    };
    table.check_normalized(context)?;
    Ok(table)
}

impl<S: PartialEq> PartialEq for ProbabilityTable<S> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<S: Serialize> Serialize for ProbabilityTable<S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> std::result::Result<Z::Ok, Z::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

impl<'de, S> Deserialize<'de> for ProbabilityTable<S>
where
    S: Deserialize<'de> + Clone + Eq + Hash,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = Vec::<(S, Decimal)>::deserialize(deserializer)?;
        ProbabilityTable::from_entries(entries).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn rgb() -> ProbabilityTable<char> {
        ProbabilityTable::from_f64_entries([('R', 0.4), ('G', 0.5), ('B', 0.1)]).unwrap()
    }

    #[test]
    fn test_frequencies_follow_first_occurrence() {
        let ctx = Context::default();
        let symbols: Vec<char> = "abracadabra$".chars().collect();
        let table = ProbabilityTable::from_frequencies(&symbols, &ctx).unwrap();

        let order: Vec<char> = table.symbols().copied().collect();
        assert_eq!(order, vec!['a', 'b', 'r', 'c', 'd', '$']);

        let expected_a = ctx.div(&Decimal::from(5u32), &Decimal::from(12u32)).unwrap();
        assert_eq!(table.probability(&'a'), Some(&expected_a));
        assert!(table.check_normalized(&ctx).is_ok());
    }

    #[test]
    fn test_frequencies_reject_empty_sequence() {
        let ctx = Context::default();
        let result = ProbabilityTable::<char>::from_frequencies(&[], &ctx);
        assert!(matches!(result, Err(ArithmeticCodingError::InvalidModel(_))));
    }

    #[test]
    fn test_from_f64_keeps_short_decimals() {
        let table = rgb();
        assert_eq!(table.probability(&'R').unwrap().to_string(), "0.4");
        assert_eq!(table.position(&'B'), Some(2));
        assert_eq!(table.max_probability(), &dec("0.5"));
    }

    #[test]
    fn test_rejects_bad_entries() {
        assert!(matches!(
            ProbabilityTable::<char>::from_entries(Vec::new()),
            Err(ArithmeticCodingError::InvalidModel(_))
        ));
        assert!(matches!(
            ProbabilityTable::from_f64_entries([('a', 0.5), ('a', 0.5)]),
            Err(ArithmeticCodingError::InvalidModel(_))
        ));
        assert!(matches!(
            ProbabilityTable::from_f64_entries([('a', 0.0), ('b', 1.0)]),
            Err(ArithmeticCodingError::InvalidModel(_))
        ));
        assert!(matches!(
            ProbabilityTable::from_f64_entries([('a', 1.5)]),
            Err(ArithmeticCodingError::InvalidModel(_))
        ));
        assert!(matches!(
            ProbabilityTable::from_f64_entries([('a', f64::INFINITY)]),
            Err(ArithmeticCodingError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_normalization_tolerance() {
        let ctx = Context::default();
        let close = ProbabilityTable::from_f64_entries([('a', 0.500001), ('b', 0.5)]).unwrap();
        assert!(close.check_normalized(&ctx).is_ok());

        let far = ProbabilityTable::from_f64_entries([('a', 0.5), ('b', 0.4)]).unwrap();
        assert!(matches!(
            far.check_normalized(&ctx),
            Err(ArithmeticCodingError::InvalidModel(_))
        ));

        let edge = ProbabilityTable::from_f64_entries([('a', 0.50001), ('b', 0.5)]).unwrap();
        assert!(edge.check_normalized(&ctx).is_err());
    }

    #[test]
    fn test_cumulative_lower_bounds() {
        let ctx = Context::default();
        let bounds = rgb().cumulative_lower_bounds(&ctx);
        assert_eq!(bounds, vec![Decimal::zero(), dec("0.4"), dec("0.9")]);
    }

    #[test]
    fn test_build_model_requires_marker_in_supplied_table() {
        let ctx = Context::default();
        let symbols = vec!['G', 'G', 'B'];
        let result = build_model(&symbols, &'$', Some(rgb()), &ctx);
        assert!(matches!(result, Err(ArithmeticCodingError::InvalidInput(_))));

        let table = build_model(&symbols, &'B', Some(rgb()), &ctx).unwrap();
        assert_eq!(table, rgb());
    }

    #[test]
    fn test_build_model_estimates_when_absent() {
        let ctx = Context::default();
        let symbols = vec!['x', 'y', 'x', '$'];
        let table = build_model(&symbols, &'$', None, &ctx).unwrap();
        assert_eq!(table.probability(&'x'), Some(&dec("0.5")));
        assert_eq!(table.probability(&'$'), Some(&dec("0.25")));
    }

    #[test]
    fn test_serde_preserves_order() {
        let json = serde_json::to_string(&rgb()).unwrap();
        assert_eq!(json, r#"[["R","0.4"],["G","0.5"],["B","0.1"]]"#);

        let back: ProbabilityTable<char> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rgb());

        let duplicate = r#"[["R","0.5"],["R","0.5"]]"#;
        assert!(serde_json::from_str::<ProbabilityTable<char>>(duplicate).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_exponents() {
        let json = r#"[["a","1e4294967296"]]"#;
        assert!(serde_json::from_str::<ProbabilityTable<char>>(json).is_err());

        let huge = Decimal::new(1, 4_294_967_296);
        assert!(matches!(
            ProbabilityTable::from_entries([('a', huge)]),
            Err(ArithmeticCodingError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_negligible_probability_fails_normalization() {
        let ctx = Context::default();
        let json = r#"[["a","0.5"],["b","1e-3000000"]]"#;
        let table: ProbabilityTable<char> = serde_json::from_str(json).unwrap();
        assert_eq!(table.max_probability(), &dec("0.5"));
        assert!(matches!(
            table.check_normalized(&ctx),
            Err(ArithmeticCodingError::InvalidModel(_))
        ));
    }
}
