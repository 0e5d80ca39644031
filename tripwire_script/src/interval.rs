//! Interval text format used by repeating triggers.
//!
//! Intervals are written as unit-suffixed fragments: `1h20m50s` is one hour,
//! twenty minutes, and fifty seconds. Fragments with the same unit add up, so
//! `30s40s` is seventy seconds. Supported units are `h`, `m`, and `s`.

use thiserror::Error;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Errors for unparsable interval text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("empty interval string")]
    Empty,
    #[error("unknown time unit '{unit}' in '{text}' (use h, m, or s)")]
    UnknownUnit { unit: char, text: String },
    #[error("number without a time unit in '{text}'")]
    MissingUnit { text: String },
    #[error("interval '{text}' is not a sequence of <number><unit> fragments")]
    Malformed { text: String },
}

/// Parse interval text like `1h20m50s` into milliseconds.
///
/// # Errors
/// Returns an [`IntervalError`] for empty input, unknown units, or fragments
/// without a trailing unit.
pub fn parse_interval(text: &str) -> Result<u64, IntervalError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(IntervalError::Empty);
    }
    let mut total_ms: u64 = 0;
    let mut digits = String::new();
    for ch in trimmed.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if digits.is_empty() {
            return Err(IntervalError::Malformed {
                text: trimmed.to_string(),
            });
        }
        let amount: u64 = digits.parse().map_err(|_| IntervalError::Malformed {
            text: trimmed.to_string(),
        })?;
        digits.clear();
        let per_unit = match ch.to_ascii_lowercase() {
            'h' => MS_PER_HOUR,
            'm' => MS_PER_MINUTE,
            's' => MS_PER_SECOND,
            other => {
                return Err(IntervalError::UnknownUnit {
                    unit: other,
                    text: trimmed.to_string(),
                });
            },
        };
        total_ms = total_ms.saturating_add(amount.saturating_mul(per_unit));
    }
    if !digits.is_empty() {
        return Err(IntervalError::MissingUnit {
            text: trimmed.to_string(),
        });
    }
    Ok(total_ms)
}

/// Render milliseconds back into compact interval text (`4850000` ->
/// `"1h20m50s"`). Sub-second remainders are dropped; zero renders as `"0s"`.
pub fn format_interval(ms: u64) -> String {
    let mut secs = ms / MS_PER_SECOND;
    let hours = secs / 3600;
    secs %= 3600;
    let minutes = secs / 60;
    secs %= 60;
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if secs > 0 || out.is_empty() {
        out.push_str(&format!("{secs}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_units() {
        assert_eq!(parse_interval("1h20m50s").unwrap(), 4_850_000);
    }

    #[test]
    fn repeated_units_add_up() {
        assert_eq!(parse_interval("30s40s").unwrap(), 70_000);
    }

    #[test]
    fn single_units() {
        assert_eq!(parse_interval("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval("90m").unwrap(), 5_400_000);
        assert_eq!(parse_interval("5s").unwrap(), 5_000);
    }

    #[test]
    fn case_insensitive_units() {
        assert_eq!(parse_interval("1H30M").unwrap(), 5_400_000);
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(parse_interval("").unwrap_err(), IntervalError::Empty);
        assert_eq!(parse_interval("   ").unwrap_err(), IntervalError::Empty);
        assert!(matches!(
            parse_interval("h20m").unwrap_err(),
            IntervalError::Malformed { .. }
        ));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(matches!(
            parse_interval("10d").unwrap_err(),
            IntervalError::UnknownUnit { unit: 'd', .. }
        ));
    }

    #[test]
    fn rejects_bare_number() {
        assert!(matches!(
            parse_interval("1500").unwrap_err(),
            IntervalError::MissingUnit { .. }
        ));
    }

    #[test]
    fn formats_round_trip_examples() {
        assert_eq!(format_interval(4_850_000), "1h20m50s");
        assert_eq!(format_interval(70_000), "1m10s");
        assert_eq!(format_interval(0), "0s");
        assert_eq!(format_interval(7_200_000), "2h");
    }
}
