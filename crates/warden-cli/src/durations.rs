//! Duration flag parsing.

use time::Duration;
use warden_core::{Error, Result};

/// Parse a duration flag: an integer with an `s`, `m`, `h`, or `d`
/// suffix. A bare integer counts as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::bad_parameter("empty duration"));
    }
    let (number, unit) = match s.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&s[..idx], &s[idx..]),
        _ => (s, "s"),
    };
    let value: i64 = number
        .parse()
        .map_err(|_| Error::bad_parameter(format!("invalid duration {s:?}")))?;
    if value <= 0 {
        return Err(Error::bad_parameter(format!(
            "duration must be positive, got {s:?}"
        )));
    }
    match unit {
        "s" => Ok(Duration::seconds(value)),
        "m" => Ok(Duration::minutes(value)),
        "h" => Ok(Duration::hours(value)),
        "d" => Ok(Duration::days(value)),
        other => Err(Error::bad_parameter(format!(
            "unknown duration unit {other:?} in {s:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_values() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::minutes(10));
        assert_eq!(parse_duration("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration("1d").unwrap(), Duration::days(1));
    }

    #[test]
    fn bare_integer_is_seconds() {
        assert_eq!(parse_duration("90").unwrap(), Duration::seconds(90));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("-5m").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("10w").is_err());
    }
}
