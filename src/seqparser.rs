use regex::Regex;
use std::sync::OnceLock;

/// Parses the expected sequence number out of a chain error log line like
/// `account sequence mismatch, expected 42, got 41`.
///
/// Kept as its own tiny module so it can be unit-tested in isolation from
/// the Submitter's retry loop (§10 Design Notes: "regex parse of the chain
/// error log → a small `Option<u64>`-returning parser, unit-tested in
/// isolation").
pub fn parse_expected_sequence(log: &str) -> Option<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"expected (\d+)").expect("valid regex"));
    pattern
        .captures(log)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expected_sequence_from_typical_log() {
        let log = "account sequence mismatch, expected 42, got 41: incorrect account sequence";
        assert_eq!(parse_expected_sequence(log), Some(42));
    }

    #[test]
    fn returns_none_when_pattern_absent() {
        assert_eq!(parse_expected_sequence("insufficient funds"), None);
    }

    #[test]
    fn returns_none_on_unparseable_number() {
        assert_eq!(parse_expected_sequence("expected abc, got 41"), None);
    }
}
