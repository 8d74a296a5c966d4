//! Date-scoped business numbers.
//!
//! Every contract, payment, consumption record and refund case carries a
//! human-readable number `{PREFIX}{YYYYMMDD}{seq:03}`, e.g. `HT20241227003`.
//! The counter itself lives in the database (one atomic upsert per number);
//! this module only formats, parses and dates them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of business document a number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequencePrefix {
    /// Contract (`HT`).
    Contract,
    /// Payment receipt (`SK`).
    Payment,
    /// Consumption record (`XK`).
    Consumption,
    /// Refund case (`TF`).
    Refund,
}

impl SequencePrefix {
    /// All prefixes.
    pub const ALL: [Self; 4] = [Self::Contract, Self::Payment, Self::Consumption, Self::Refund];

    /// Returns the two-letter code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Contract => "HT",
            Self::Payment => "SK",
            Self::Consumption => "XK",
            Self::Refund => "TF",
        }
    }

    /// Parses a two-letter code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
}

impl fmt::Display for SequencePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors parsing a business number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Unknown two-letter prefix.
    #[error("Unknown business number prefix in '{0}'")]
    UnknownPrefix(String),

    /// Date part is missing or not a calendar date.
    #[error("Invalid date in business number '{0}'")]
    InvalidDate(String),

    /// Sequence part is missing, too short or not numeric.
    #[error("Invalid sequence in business number '{0}'")]
    InvalidSequence(String),
}

/// A parsed business number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusinessNumber {
    /// Document kind.
    pub prefix: SequencePrefix,
    /// Business date the counter belongs to.
    pub date: NaiveDate,
    /// 1-based counter value for `(prefix, date)`.
    pub seq: u64,
}

impl BusinessNumber {
    /// Creates a business number.
    #[must_use]
    pub const fn new(prefix: SequencePrefix, date: NaiveDate, seq: u64) -> Self {
        Self { prefix, date, seq }
    }
}

impl fmt::Display for BusinessNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{:03}",
            self.prefix.code(),
            self.date.format("%Y%m%d"),
            self.seq
        )
    }
}

impl FromStr for BusinessNumber {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let prefix = s
            .get(..2)
            .and_then(SequencePrefix::from_code)
            .ok_or_else(|| SequenceError::UnknownPrefix(s.to_string()))?;

        let date = s
            .get(2..10)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
            .ok_or_else(|| SequenceError::InvalidDate(s.to_string()))?;

        let seq = s
            .get(10..)
            .filter(|rest| rest.len() >= 3 && rest.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|rest| rest.parse::<u64>().ok())
            .filter(|seq| *seq > 0)
            .ok_or_else(|| SequenceError::InvalidSequence(s.to_string()))?;

        Ok(Self { prefix, date, seq })
    }
}

/// Returns the business date of an instant in the business timezone.
#[must_use]
pub fn business_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_contract_number() {
        let number = BusinessNumber::new(SequencePrefix::Contract, date(2024, 12, 27), 3);
        assert_eq!(number.to_string(), "HT20241227003");
    }

    #[test]
    fn test_sequence_widens_past_999() {
        let number = BusinessNumber::new(SequencePrefix::Refund, date(2024, 1, 2), 1234);
        assert_eq!(number.to_string(), "TF202401021234");
        let parsed: BusinessNumber = "TF202401021234".parse().unwrap();
        assert_eq!(parsed.seq, 1234);
    }

    #[test]
    fn test_parse() {
        let parsed: BusinessNumber = "XK20250301042".parse().unwrap();
        assert_eq!(parsed.prefix, SequencePrefix::Consumption);
        assert_eq!(parsed.date, date(2025, 3, 1));
        assert_eq!(parsed.seq, 42);
    }

    #[rstest]
    #[case("ZZ20250301001", SequenceError::UnknownPrefix("ZZ20250301001".into()))]
    #[case("H", SequenceError::UnknownPrefix("H".into()))]
    #[case("SK20251301001", SequenceError::InvalidDate("SK20251301001".into()))]
    #[case("SK2025", SequenceError::InvalidDate("SK2025".into()))]
    #[case("SK2025030101", SequenceError::InvalidSequence("SK2025030101".into()))]
    #[case("SK20250301000", SequenceError::InvalidSequence("SK20250301000".into()))]
    #[case("SK20250301a01", SequenceError::InvalidSequence("SK20250301a01".into()))]
    fn test_parse_errors(#[case] input: &str, #[case] expected: SequenceError) {
        assert_eq!(input.parse::<BusinessNumber>().unwrap_err(), expected);
    }

    #[test]
    fn test_prefix_codes() {
        for prefix in SequencePrefix::ALL {
            assert_eq!(SequencePrefix::from_code(prefix.code()), Some(prefix));
        }
        assert_eq!(SequencePrefix::from_code("XX"), None);
    }

    #[test]
    fn test_business_date_uses_timezone() {
        // 2024-12-27 17:30 UTC is already the 28th in Shanghai (UTC+8).
        let at = Utc.with_ymd_and_hms(2024, 12, 27, 17, 30, 0).unwrap();
        assert_eq!(business_date(at, chrono_tz::Asia::Shanghai), date(2024, 12, 28));
        assert_eq!(business_date(at, chrono_tz::UTC), date(2024, 12, 27));
    }
}
