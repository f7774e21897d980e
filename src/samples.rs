//! Parsing of the multimeter's delimited sample stream
//!
//! The meter replies to a buffer fetch with either one value or many
//! comma-separated values, and the payload may carry stray status
//! characters (unit suffixes, overload markers). Parsing is deliberately
//! lossy: a token that cannot be salvaged is dropped and the run continues
//! with whatever valid readings remain.

/// Outcome of parsing a single token of the payload
enum Token
{
    Value(f64),
    Skipped,
}

fn parse_token(raw: &str) -> Token
{
    // Keep only the characters that can appear in a float: digits, the
    // decimal point, signs, and the exponent marker
    let scrubbed: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
        .collect();

    if scrubbed.is_empty() {
        return Token::Skipped;
    }

    match scrubbed.parse::<f64>() {
        Ok(value) => Token::Value(value),
        Err(_) => {
            log::warn!("skipping unparseable sample token {:?}", raw);
            Token::Skipped
        }
    }
}

/// Turns one raw fetch payload into an ordered sequence of current readings
///
/// A payload without the delimiter is treated as a single token, an empty
/// payload yields an empty sequence, and malformed tokens are dropped.
/// Order is preserved and the output never has more entries than the
/// payload had tokens.
pub fn parse_sample_stream(raw: &str) -> Vec<f64>
{
    let payload = raw.trim();

    if payload.is_empty() {
        return Vec::new();
    }

    let mut readings = Vec::new();

    for token in payload.split(',') {
        if let Token::Value(value) = parse_token(token) {
            readings.push(value);
        }
    }

    readings
}
