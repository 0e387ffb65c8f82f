// arithmetic_codec_demo/src/main.rs

use arithmetic_codec::{
    arithmetic_decode, arithmetic_encode, CodecConfig, EncodedArtifact, ProbabilityTable,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Helper function to print a probability table in table order.
///
/// # Arguments
///
/// * `table` - Table to print.
fn print_table(table: &ProbabilityTable<char>) {
    for (symbol, probability) in table.iter() {
        println!("  {:?} -> {}", symbol, probability);
    }
}

fn report(original: &[char], decoded: &[char]) {
    if decoded == original {
        println!("Decoding successful. The decoded symbols match the original input.");
    } else {
        println!("Decoding failed. The decoded symbols do not match the original input.");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CodecConfig::default();

    // Worked example with a supplied table
    let symbols = ['G', 'G', 'B'];
    let table = ProbabilityTable::from_f64_entries([('R', 0.4), ('G', 0.5), ('B', 0.1)])?;
    println!("Original Symbols: {:?}", symbols);
    println!("Probability Table:");
    print_table(&table);

    let encoded = arithmetic_encode(&symbols, 'B', Some(table), &config)?;
    println!("Encoded Fraction: 0.{}", encoded.digits);

    let decoded = arithmetic_decode(&encoded, &config)?;
    println!("Decoded Symbols: {:?}", decoded);
    report(&symbols, &decoded);

    // Text with a table estimated from its own frequencies
    let text: Vec<char> = "arithmetic coding in rust$".chars().collect();
    let encoded = arithmetic_encode(&text, '$', None, &config)?;
    info!(
        symbols = text.len(),
        digits = encoded.digits.len(),
        precision = config.precision,
        "encoded text"
    );
    println!();
    println!("Encoded Fraction: 0.{}", encoded.digits);

    // The artifact is the whole wire contract
    let json = serde_json::to_string_pretty(&encoded)?;
    println!("Serialized Artifact ({} bytes)", json.len());
    let restored: EncodedArtifact<char> = serde_json::from_str(&json)?;

    let decoded = arithmetic_decode(&restored, &config)?;
    println!("Decoded Text: {}", decoded.iter().collect::<String>());
    report(&text, &decoded);

    Ok(())
}
