//! Domain primitives: Instrument, Owner, TradeTime, Action.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tradable instrument symbol (e.g., "AAPL", "MSFT").
///
/// Symbols are trimmed and upper-cased on construction so that "aapl " and
/// "AAPL" land in the same lot queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instrument(pub String);

impl Instrument {
    /// Create an Instrument from a string.
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Instrument(symbol.as_ref().trim().to_uppercase())
    }

    /// Get the symbol as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner/account identifier a transaction was recorded under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Owner(pub String);

impl Owner {
    /// Create an Owner from a string.
    pub fn new(owner: impl AsRef<str>) -> Self {
        Owner(owner.as_ref().trim().to_string())
    }

    /// Get the owner as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable timestamp: {0:?}")]
pub struct TradeTimeParseError(pub String);

/// Time of a trade. Date-only inputs are taken as midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeTime(pub NaiveDateTime);

impl TradeTime {
    const DATE_TIME_FORMATS: [&'static str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    /// Create a TradeTime from a date-time.
    pub fn new(at: NaiveDateTime) -> Self {
        TradeTime(at)
    }

    /// Create a TradeTime at midnight of the given date.
    pub fn from_date(date: NaiveDate) -> Self {
        TradeTime(date.and_time(chrono::NaiveTime::MIN))
    }

    /// Parse a date (`YYYY-MM-DD`), a naive date-time, or an RFC 3339
    /// timestamp (normalized to UTC).
    pub fn parse(s: &str) -> Result<Self, TradeTimeParseError> {
        let s = s.trim();

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }

        for format in Self::DATE_TIME_FORMATS {
            if let Ok(at) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(TradeTime(at));
            }
        }

        DateTime::parse_from_rfc3339(s)
            .map(|at| TradeTime(at.naive_utc()))
            .map_err(|_| TradeTimeParseError(s.to_string()))
    }

    /// Calendar date of the trade.
    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    /// Get the underlying date-time.
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl std::fmt::Display for TradeTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Trade action, normalized from free-form source text.
///
/// Unknown actions are preserved rather than rejected at parse time; the
/// transaction processor decides to skip and report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Unrecognized(String),
}

impl Action {
    /// Normalize an action string (case- and whitespace-insensitive).
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "buy" => Action::Buy,
            "sell" => Action::Sell,
            _ => Action::Unrecognized(s.trim().to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Action::Unrecognized(_))
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
            Action::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_normalization() {
        assert_eq!(Action::parse("Buy"), Action::Buy);
        assert_eq!(Action::parse("  SELL \t"), Action::Sell);
        assert_eq!(Action::parse("sell"), Action::Sell);
        assert_eq!(
            Action::parse(" hold "),
            Action::Unrecognized("hold".to_string())
        );
        assert!(!Action::parse("hold").is_recognized());
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(serde_json::to_string(&Action::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&Action::Sell).unwrap(), "\"sell\"");
    }

    #[test]
    fn test_instrument_is_normalized() {
        assert_eq!(Instrument::new(" aapl "), Instrument::new("AAPL"));
        assert_eq!(Instrument::new("msft").to_string(), "MSFT");
    }

    #[test]
    fn test_trade_time_parses_date_only() {
        let t = TradeTime::parse("2024-03-01").unwrap();
        assert_eq!(t.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(t.to_string(), "2024-03-01T00:00:00");
    }

    #[test]
    fn test_trade_time_parses_date_time_variants() {
        let a = TradeTime::parse("2024-03-01 09:30:00").unwrap();
        let b = TradeTime::parse("2024-03-01T09:30:00").unwrap();
        let c = TradeTime::parse("2024-03-01T09:30:00Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_trade_time_rfc3339_offset_normalized_to_utc() {
        let t = TradeTime::parse("2024-03-01T09:30:00-05:00").unwrap();
        assert_eq!(t.to_string(), "2024-03-01T14:30:00");
    }

    #[test]
    fn test_trade_time_rejects_garbage() {
        assert!(TradeTime::parse("2024-13-01").is_err());
        assert!(TradeTime::parse("yesterday").is_err());
    }

    #[test]
    fn test_trade_time_ordering() {
        let earlier = TradeTime::parse("2024-03-01").unwrap();
        let later = TradeTime::parse("2024-03-01 00:00:01").unwrap();
        assert!(earlier < later);
    }
}
