//! Data sources and their fixed schemas.
//!
//! Every request targets exactly one [`Source`].  Each source owns a table in
//! the analytical store and a server-push telemetry stream; the column list
//! below is the vocabulary handed to the query generator and the condition
//! translator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Columns of `healthcare_dataset`.
const HEALTHCARE_FIELDS: &[&str] = &[
    "utc",
    "heart_rate",
    "blood_pressure",
    "oxygen_saturation",
    "respiratory_rate",
    "temperature",
    "label",
];

/// Columns of `iot_dataset`.
const IOT_FIELDS: &[&str] = &[
    "utc",
    "temperature",
    "humidity",
    "tvoc",
    "eco2",
    "raw_h2",
    "raw_ethanol",
    "pressure",
    "pm1",
    "pm2_5",
    "nc0_5",
    "nc1_0",
    "nc2_5",
    "cnt",
    "fire_alarm",
];

/// Columns of `stock_dataset`.
const STOCK_FIELDS: &[&str] = &["utc", "spy", "qqq", "iwm", "aapl", "msft", "nvda", "vix"];

/// A data source a request can be answered from or monitored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Patient vital signs.
    #[serde(alias = "healthcare", alias = "HEALTHCARE")]
    Healthcare,
    /// Smoke-detector sensor readings.
    #[serde(rename = "IoT", alias = "iot", alias = "IOT", alias = "Iot")]
    Iot,
    /// Index and equity prices.
    #[serde(alias = "stock", alias = "STOCK")]
    Stock,
}

impl Source {
    /// All known sources, in display order.
    pub const ALL: [Source; 3] = [Source::Healthcare, Source::Iot, Source::Stock];

    /// The ordered field names of this source's schema.
    pub fn schema(self) -> &'static [&'static str] {
        match self {
            Self::Healthcare => HEALTHCARE_FIELDS,
            Self::Iot => IOT_FIELDS,
            Self::Stock => STOCK_FIELDS,
        }
    }

    /// The table holding this source's historical records.
    pub fn table(self) -> &'static str {
        match self {
            Self::Healthcare => "healthcare_dataset",
            Self::Iot => "iot_dataset",
            Self::Stock => "stock_dataset",
        }
    }

    /// The path of this source's server-push endpoint, relative to the
    /// stream base URL.
    pub fn stream_path(self) -> &'static str {
        match self {
            Self::Healthcare => "/healthcare-stream",
            Self::Iot => "/iot-stream",
            Self::Stock => "/stock-stream",
        }
    }

    /// Whether `field` (already normalized) belongs to this source's schema.
    pub fn has_field(self, field: &str) -> bool {
        self.schema().contains(&field)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthcare => write!(f, "Healthcare"),
            Self::Iot => write!(f, "IoT"),
            Self::Stock => write!(f, "Stock"),
        }
    }
}

impl FromStr for Source {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "healthcare" => Ok(Self::Healthcare),
            "iot" => Ok(Self::Iot),
            "stock" => Ok(Self::Stock),
            _ => Err(KernelError::UnknownSource { name: s.to_owned() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("IoT".parse::<Source>().unwrap(), Source::Iot);
        assert_eq!(" healthcare ".parse::<Source>().unwrap(), Source::Healthcare);
        assert_eq!("STOCK".parse::<Source>().unwrap(), Source::Stock);
        assert!("weather".parse::<Source>().is_err());
    }

    #[test]
    fn serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&Source::Iot).unwrap(), "\"IoT\"");
        let s: Source = serde_json::from_str("\"iot\"").unwrap();
        assert_eq!(s, Source::Iot);
        let s: Source = serde_json::from_str("\"Healthcare\"").unwrap();
        assert_eq!(s, Source::Healthcare);
    }

    #[test]
    fn schemas_are_fixed_and_ordered() {
        assert_eq!(Source::Stock.schema().first(), Some(&"utc"));
        assert_eq!(Source::Iot.schema().last(), Some(&"fire_alarm"));
        assert!(Source::Healthcare.has_field("heart_rate"));
        assert!(!Source::Healthcare.has_field("fire_alarm"));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for source in Source::ALL {
            assert_eq!(source.to_string().parse::<Source>().unwrap(), source);
        }
    }
}
