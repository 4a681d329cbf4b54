//! Condition text parser.
//!
//! Accepts the small expression language translators emit:
//!
//! ```text
//! expr       := and_expr ( OR and_expr )*
//! and_expr   := primary ( AND primary )*
//! primary    := "(" expr ")" | comparison
//! comparison := operand op operand      (exactly one side is a field)
//! op         := > | < | >= | <= | == | != | = | <>
//! AND        := and | && | &
//! OR         := or  | || | |
//! operand    := field | number | 'text' | "text" | true | false
//! ```
//!
//! Anything else (function calls, attribute access, arithmetic, `not`,
//! field-to-field comparisons) is rejected.

use super::record::normalize_field;
use super::{CompareOp, Condition, Literal};
use crate::error::{IntentError, Result};

/// Deepest parenthesis nesting accepted.
const MAX_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    Op(CompareOp),
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("field `{name}`"),
            Self::Number(n) => format!("number {n}"),
            Self::Text(s) => format!("text '{s}'"),
            Self::Op(op) => format!("operator `{op}`"),
            Self::And => "`and`".into(),
            Self::Or => "`or`".into(),
            Self::LParen => "`(`".into(),
            Self::RParen => "`)`".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '>' | '<' | '=' | '!' => {
                let (op, width) = match (c, next) {
                    ('>', Some('=')) => (CompareOp::Ge, 2),
                    ('<', Some('=')) => (CompareOp::Le, 2),
                    ('<', Some('>')) => (CompareOp::Ne, 2),
                    ('=', Some('=')) => (CompareOp::Eq, 2),
                    ('!', Some('=')) => (CompareOp::Ne, 2),
                    ('>', _) => (CompareOp::Gt, 1),
                    ('<', _) => (CompareOp::Lt, 1),
                    ('=', _) => (CompareOp::Eq, 1),
                    _ => {
                        return Err(IntentError::invalid_condition(format!(
                            "unsupported operator `!` at position {i}"
                        )));
                    }
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            '&' => {
                tokens.push(Token::And);
                i += if next == Some('&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if next == Some('|') { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let Some(len) = chars[start..].iter().position(|&ch| ch == quote) else {
                    return Err(IntentError::invalid_condition(format!(
                        "unterminated string starting at position {i}"
                    )));
                };
                tokens.push(Token::Text(chars[start..start + len].iter().collect()));
                i = start + len + 1;
            }
            c if c.is_ascii_digit()
                || (c == '.' && next.is_some_and(|n| n.is_ascii_digit()))
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit() || n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || (matches!(chars[i], '+' | '-')
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| {
                    IntentError::invalid_condition(format!("malformed number `{literal}`"))
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::Number(1.0),
                    "false" => Token::Number(0.0),
                    "not" | "in" | "is" | "lambda" | "import" => {
                        return Err(IntentError::invalid_condition(format!(
                            "unsupported keyword `{word}`"
                        )));
                    }
                    _ => Token::Ident(normalize_field(&word)),
                });
            }
            other => {
                return Err(IntentError::invalid_condition(format!(
                    "unexpected character `{other}` at position {i}"
                )));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self, depth: usize) -> Result<Condition> {
        let mut left = self.and_expr(depth)?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr(depth)?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self, depth: usize) -> Result<Condition> {
        let mut left = self.primary(depth)?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.primary(depth)?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self, depth: usize) -> Result<Condition> {
        if self.peek() == Some(&Token::LParen) {
            if depth >= MAX_DEPTH {
                return Err(IntentError::invalid_condition("condition is nested too deeply"));
            }
            self.pos += 1;
            let inner = self.expr(depth + 1)?;
            return match self.advance() {
                Some(Token::RParen) => Ok(inner),
                Some(other) => Err(IntentError::invalid_condition(format!(
                    "expected `)`, found {}",
                    other.describe()
                ))),
                None => Err(IntentError::invalid_condition("missing closing `)`")),
            };
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Condition> {
        let left = self.operand()?;
        let op = match self.advance() {
            Some(Token::Op(op)) => op,
            Some(other) => {
                return Err(IntentError::invalid_condition(format!(
                    "expected a comparison operator, found {}",
                    other.describe()
                )));
            }
            None => {
                return Err(IntentError::invalid_condition(
                    "expected a comparison operator, found end of input",
                ));
            }
        };
        let right = self.operand()?;

        match (left, right) {
            (Operand::Field(field), Operand::Literal(value)) => {
                Ok(Condition::Compare { field, op, value })
            }
            (Operand::Literal(value), Operand::Field(field)) => Ok(Condition::Compare {
                field,
                op: op.flipped(),
                value,
            }),
            (Operand::Field(a), Operand::Field(b)) => Err(IntentError::invalid_condition(
                format!("comparison between two fields (`{a}`, `{b}`) is not supported"),
            )),
            (Operand::Literal(_), Operand::Literal(_)) => Err(IntentError::invalid_condition(
                "comparison must reference a field",
            )),
        }
    }

    fn operand(&mut self) -> Result<Operand> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Operand::Field(name)),
            Some(Token::Number(n)) => Ok(Operand::Literal(Literal::Number(n))),
            Some(Token::Text(s)) => Ok(Operand::Literal(Literal::Text(s))),
            Some(other) => Err(IntentError::invalid_condition(format!(
                "expected a field or literal, found {}",
                other.describe()
            ))),
            None => Err(IntentError::invalid_condition(
                "expected a field or literal, found end of input",
            )),
        }
    }
}

enum Operand {
    Field(String),
    Literal(Literal),
}

/// Strip markdown code fences and inline backticks around model output.
pub(crate) fn strip_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop an info string such as `python` on the opening fence line.
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
        text = text.trim_end().trim_end_matches("```");
    }
    text.trim().trim_matches('`').trim()
}

/// Parse condition text into a comparison tree.
///
/// Every referenced field must appear in `vocabulary`, unless the
/// vocabulary is empty.
pub fn parse(text: &str, vocabulary: &[&str]) -> Result<Condition> {
    let body = strip_fences(text);
    if body.is_empty() {
        return Err(IntentError::invalid_condition("condition is empty"));
    }

    let mut parser = Parser {
        tokens: tokenize(body)?,
        pos: 0,
    };
    let condition = parser.expr(0)?;

    if let Some(extra) = parser.peek() {
        return Err(IntentError::invalid_condition(format!(
            "unexpected {} after condition",
            extra.describe()
        )));
    }

    if !vocabulary.is_empty() {
        for field in condition.fields() {
            if !vocabulary.contains(&field) {
                return Err(IntentError::invalid_condition(format!(
                    "unknown field `{field}`"
                )));
            }
        }
    }

    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[&str] = &["fire_alarm", "temperature", "humidity", "pm2_5", "label"];

    #[test]
    fn parses_single_comparison() {
        let condition = parse("fire_alarm == 1", FIELDS).unwrap();
        assert_eq!(
            condition,
            Condition::Compare {
                field: "fire_alarm".into(),
                op: CompareOp::Eq,
                value: Literal::Number(1.0),
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let condition = parse("temperature > 50 or humidity < 20 and fire_alarm == 1", FIELDS)
            .unwrap();
        match condition {
            Condition::Or(_, right) => assert!(matches!(*right, Condition::And(_, _))),
            other => panic!("expected Or at the root, got {other:?}"),
        }
    }

    #[test]
    fn accepts_symbolic_connectives_and_parentheses() {
        let condition = parse("(temperature >= 40.5 && humidity <= 30) || fire_alarm != 0", FIELDS)
            .unwrap();
        assert!(matches!(condition, Condition::Or(_, _)));
        let grouped = parse("temperature > 1 and (humidity < 2 or fire_alarm == 1)", FIELDS)
            .unwrap();
        assert_eq!(
            grouped.to_string(),
            "temperature > 1 and (humidity < 2 or fire_alarm == 1)"
        );
        assert_eq!(
            condition.to_string(),
            "temperature >= 40.5 and humidity <= 30 or fire_alarm != 0"
        );
    }

    #[test]
    fn literal_on_the_left_is_flipped() {
        let condition = parse("50 < temperature", FIELDS).unwrap();
        assert_eq!(condition.to_string(), "temperature > 50");
    }

    #[test]
    fn field_names_are_normalized() {
        let condition = parse("Fire_Alarm == True", FIELDS).unwrap();
        assert_eq!(condition.to_string(), "fire_alarm == 1");
        let condition = parse("PM2.5 > 35", FIELDS).unwrap();
        assert_eq!(condition.fields(), vec!["pm2_5"]);
    }

    #[test]
    fn strips_code_fences() {
        let condition = parse("```python\ntemperature > 50\n```", FIELDS).unwrap();
        assert_eq!(condition.to_string(), "temperature > 50");
        let condition = parse("`humidity < 10`", FIELDS).unwrap();
        assert_eq!(condition.to_string(), "humidity < 10");
    }

    #[test]
    fn string_literals_and_sql_style_operators() {
        let condition = parse("label = 'Abnormal' and temperature <> -1.5", FIELDS).unwrap();
        assert_eq!(
            condition.to_string(),
            "label == 'Abnormal' and temperature != -1.5"
        );
    }

    #[test]
    fn rejects_code_and_unknown_constructs() {
        for bad in [
            "__import__('os').system('ls')",
            "temperature + 1 > 2",
            "not fire_alarm == 1",
            "len(label) > 3",
            "temperature > humidity",
            "1 == 1",
            "temperature >",
            "(temperature > 1",
            "temperature > 1 humidity < 2",
            "",
            "   ",
        ] {
            assert!(parse(bad, FIELDS).is_err(), "expected rejection of {bad:?}");
        }
    }

    #[test]
    fn rejects_fields_outside_vocabulary() {
        let err = parse("pressure > 1000", FIELDS).unwrap_err();
        assert!(err.to_string().contains("unknown field `pressure`"));
        assert!(parse("pressure > 1000", &[]).is_ok());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let text = format!("{}temperature > 1{}", "(".repeat(40), ")".repeat(40));
        assert!(parse(&text, FIELDS).is_err());
        let text = format!("{}temperature > 1{}", "(".repeat(5), ")".repeat(5));
        assert!(parse(&text, FIELDS).is_ok());
    }
}
