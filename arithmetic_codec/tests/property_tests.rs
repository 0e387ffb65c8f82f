use arithmetic_codec::{
    arithmetic_decode, arithmetic_encode, select_minimal_fraction, ArithmeticCoder, CodecConfig,
    Context, Decimal, Interval, ProbabilityTable, RangeNarrower,
};
use proptest::prelude::*;

const EOS: u32 = u32::MAX;

/// Table over `0..weights.len()` plus the marker, probabilities proportional
/// to the weights.
fn weighted_table(weights: &[u32], context: &Context) -> ProbabilityTable<u32> {
    let total = Decimal::from(weights.iter().map(|&w| u64::from(w)).sum::<u64>());
    let entries = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let symbol = if i == 0 { EOS } else { i as u32 };
            (symbol, context.div(&Decimal::from(w), &total).unwrap())
        })
        .collect::<Vec<_>>();
    ProbabilityTable::from_entries(entries).unwrap()
}

proptest! {
    #[test]
    fn test_round_trip_with_supplied_table(
        weights in prop::collection::vec(1u32..20, 2..6),
        picks in prop::collection::vec(1usize..6, 0..25),
    ) {
        let config = CodecConfig::default();
        let coder = ArithmeticCoder::new(config).unwrap();
        let table = weighted_table(&weights, coder.context());

        let mut symbols: Vec<u32> = picks
            .iter()
            .map(|&p| (p % (weights.len() - 1) + 1) as u32)
            .collect();
        symbols.push(EOS);

        let encoded = coder.encode(&symbols, EOS, Some(table)).unwrap();
        prop_assert!(encoded.probability_table.check_normalized(coder.context()).is_ok());
        prop_assert_eq!(coder.decode(&encoded).unwrap(), symbols);
    }

    #[test]
    fn test_digits_are_minimal(text in "[abc]{0,20}") {
        let config = CodecConfig::default();
        let context = Context::new(config.precision).unwrap();
        let mut symbols: Vec<char> = text.chars().collect();
        symbols.push('$');

        let encoded = arithmetic_encode(&symbols, '$', None, &config).unwrap();
        let mut narrower = RangeNarrower::new(&encoded.probability_table, &context);
        for symbol in &symbols {
            narrower.narrow(symbol).unwrap();
        }
        let interval: Interval = narrower.finish();

        let digits = encoded.digits.len() as u32;
        let value: Decimal = format!("0.{}", encoded.digits).parse().unwrap();
        prop_assert!(interval.contains(&value));
        prop_assert_eq!(select_minimal_fraction(&interval).unwrap(), value);

        if digits > 1 {
            let shorter = digits - 1;
            let floor = interval.lower().floor_scaled(shorter);
            for numerator in [floor.clone(), floor + 1] {
                let rival = Decimal::new(numerator, -i64::from(shorter));
                // codes are always below one
                if rival < Decimal::one() {
                    prop_assert!(!interval.contains(&rival));
                }
            }
        }
    }

    #[test]
    fn test_encoding_is_deterministic(text in "[a-e]{0,30}") {
        let config = CodecConfig::default();
        let mut symbols: Vec<char> = text.chars().collect();
        symbols.push('$');

        let first = arithmetic_encode(&symbols, '$', None, &config).unwrap();
        let second = arithmetic_encode(&symbols, '$', None, &config).unwrap();
        prop_assert_eq!(first.digits, second.digits);
    }
}

#[test]
fn test_reversed_table_still_round_trips() {
    let config = CodecConfig::default();
    let symbols: Vec<char> = "banana$".chars().collect();
    let forward = arithmetic_encode(&symbols, '$', None, &config).unwrap();

    let mut entries = forward.probability_table.clone().into_entries();
    entries.reverse();
    let reversed = ProbabilityTable::from_entries(entries).unwrap();
    let backward = arithmetic_encode(&symbols, '$', Some(reversed), &config).unwrap();

    assert_ne!(forward.digits, backward.digits);
    assert_eq!(arithmetic_decode(&forward, &config).unwrap(), symbols);
    assert_eq!(arithmetic_decode(&backward, &config).unwrap(), symbols);
}

#[test]
fn test_concurrent_calls_keep_their_own_precision() {
    let symbols: Vec<char> = "concurrency$".chars().collect();
    let handles: Vec<_> = [40u32, 100, 250]
        .into_iter()
        .map(|precision| {
            let symbols = symbols.clone();
            std::thread::spawn(move || {
                let config = CodecConfig::default().with_precision(precision);
                let encoded = arithmetic_encode(&symbols, '$', None, &config).unwrap();
                arithmetic_decode(&encoded, &config).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), symbols);
    }
}
