//! Condition evaluation.
//!
//! A [`Condition`] is a small comparison tree parsed once from translator
//! output, validated against the active source's field vocabulary, and then
//! evaluated against every incoming [`TelemetryRecord`].  Nothing in the
//! condition text is ever executed.

mod parser;
mod record;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use rta_kernel::Record;

use crate::error::Result;

pub use parser::parse;
pub(crate) use parser::strip_fences;
pub use record::{FieldValue, TelemetryRecord, normalize_field};

use record::format_number;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Ge,
    Le,
}

impl CompareOp {
    /// The operator with its operands swapped (`a < b` ⇔ `b > a`).
    pub fn flipped(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Lt => Self::Gt,
            Self::Ge => Self::Le,
            Self::Le => Self::Ge,
            Self::Eq | Self::Ne => self,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }

    fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
        })
    }
}

/// The constant side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// A structured boolean predicate over record fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// `field <op> value`, with `field` in canonical form.
    Compare {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

/// The outcome of evaluating a condition against one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub matched: bool,
    /// A restatement of the condition on match, the cause of the failure
    /// when the record could not be evaluated, empty otherwise.
    pub reason: String,
}

impl Evaluation {
    fn matched(reason: String) -> Self {
        Self {
            matched: true,
            reason,
        }
    }

    fn unmatched() -> Self {
        Self {
            matched: false,
            reason: String::new(),
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            matched: false,
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

impl Condition {
    /// Parse and validate condition text; see [`parse`].
    pub fn compile(text: &str, vocabulary: &[&str]) -> Result<Self> {
        parse(text, vocabulary)
    }

    /// The distinct fields referenced, in first-use order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Self::And(a, b) | Self::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
        }
    }

    /// Evaluate against a normalized record.
    ///
    /// Never fails: a missing field or an ordering comparison between a
    /// number and text yields `matched = false` with the cause as reason.
    pub fn evaluate(&self, record: &TelemetryRecord) -> Evaluation {
        if let Some(missing) = self.fields().into_iter().find(|f| record.get(f).is_none()) {
            return Evaluation::failed(format!("missing field `{missing}`"));
        }

        match self.test(record) {
            Ok(true) => Evaluation::matched(format!("Condition met: {self}")),
            Ok(false) => Evaluation::unmatched(),
            Err(reason) => Evaluation::failed(reason),
        }
    }

    /// Normalize `raw` and evaluate against it.
    pub fn evaluate_raw(&self, raw: &Record) -> Evaluation {
        self.evaluate(&TelemetryRecord::normalize(raw))
    }

    fn test(&self, record: &TelemetryRecord) -> std::result::Result<bool, String> {
        match self {
            Self::And(a, b) => Ok(a.test(record)? && b.test(record)?),
            Self::Or(a, b) => Ok(a.test(record)? || b.test(record)?),
            Self::Compare { field, op, value } => {
                let actual = record
                    .get(field)
                    .ok_or_else(|| format!("missing field `{field}`"))?;
                compare(field, actual, *op, value)
            }
        }
    }
}

fn compare(
    field: &str,
    actual: &FieldValue,
    op: CompareOp,
    expected: &Literal,
) -> std::result::Result<bool, String> {
    let ordering = match (actual, expected) {
        (FieldValue::Number(a), Literal::Number(b)) => a.partial_cmp(b),
        (FieldValue::Text(a), Literal::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    };

    match ordering {
        Some(ordering) => Ok(op.holds(ordering)),
        None if op.is_ordering() => Err(format!(
            "cannot compare `{field}` ({actual}) with {expected} using `{op}`"
        )),
        None => Ok(op == CompareOp::Ne),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { field, op, value } => write!(f, "{field} {op} {value}"),
            Self::And(a, b) => {
                write_operand(f, a, true)?;
                f.write_str(" and ")?;
                write_operand(f, b, true)
            }
            Self::Or(a, b) => {
                write_operand(f, a, false)?;
                f.write_str(" or ")?;
                write_operand(f, b, false)
            }
        }
    }
}

/// Parenthesize an `or` that appears under an `and`.
fn write_operand(f: &mut fmt::Formatter<'_>, c: &Condition, under_and: bool) -> fmt::Result {
    if under_and && matches!(c, Condition::Or(..)) {
        write!(f, "({c})")
    } else {
        write!(f, "{c}")
    }
}

/// Compile `text` and evaluate it against `raw` in one step.
///
/// Fails closed: text that does not compile yields `matched = false` with a
/// reason starting with `invalid condition`.
pub fn evaluate_text(text: &str, vocabulary: &[&str], raw: &Record) -> Evaluation {
    match Condition::compile(text, vocabulary) {
        Ok(condition) => condition.evaluate_raw(raw),
        Err(e) => Evaluation::failed(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
