//! Record normalization.
//!
//! Stream payloads arrive with whatever keys the source chose (`"Fire
//! Alarm"`, `"Temperature[C]"`, `"PM2.5"`) and with numbers often encoded as
//! text.  [`TelemetryRecord::normalize`] maps them onto the canonical field
//! names used by conditions and coerces textual numbers.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use rta_kernel::Record;

/// A normalized field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A numeric value (booleans become `1` / `0`).
    Number(f64),
    /// Anything that is not textually numeric.
    Text(String),
    /// An explicit `null`.
    Null,
}

impl FieldValue {
    /// Coerce one raw JSON value.
    ///
    /// Text that parses as a finite number becomes [`FieldValue::Number`];
    /// any other text is kept verbatim.  Coercion never fails.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| Self::Text(n.to_string()), Self::Number),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Self::Number(n),
                _ => Self::Text(s.clone()),
            },
            other => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// One telemetry event with canonical field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl TelemetryRecord {
    /// Normalize a raw record.
    ///
    /// If two raw keys collapse onto the same canonical name, the one that
    /// sorts last in the raw record wins.
    pub fn normalize(raw: &Record) -> Self {
        let fields = raw
            .iter()
            .map(|(key, value)| (normalize_field(key), FieldValue::from_json(value)))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { fields }
    }

    /// Look up a canonical field.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Iterate over the canonical field names.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Raw keys whose table column does not follow the general rule.
///
/// Keys are compared case-insensitively.
const FIELD_ALIASES: &[(&str, &str)] = &[("pm1.0", "pm1")];

/// Canonicalize a field name.
///
/// Lowercases, drops a trailing bracketed unit suffix, and replaces
/// whitespace and `.` with `_`: `"Temperature[C]"` → `temperature`,
/// `"Fire Alarm"` → `fire_alarm`, `"PM2.5"` → `pm2_5`.  Keys listed in
/// [`FIELD_ALIASES`] map straight to their column (`"PM1.0"` → `pm1`).
pub fn normalize_field(name: &str) -> String {
    let mut name = name.trim();
    if let Some((_, column)) = FIELD_ALIASES
        .iter()
        .find(|(raw, _)| raw.eq_ignore_ascii_case(name))
    {
        return (*column).to_string();
    }
    if name.ends_with(']')
        && let Some(open) = name.rfind('[')
        && open > 0
    {
        name = name[..open].trim_end();
    }

    name.chars()
        .map(|c| {
            if c.is_whitespace() || c == '.' {
                '_'
            } else {
                c
            }
        })
        .collect::<String>()
        .to_lowercase()
}

/// Render a number without a trailing `.0` when it is integral.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
