//! PHP scalar semantics
//!
//! Conversions and comparisons follow PHP 8 rules for the four scalar types.
//! Anything that would raise (non-numeric string in arithmetic, division by
//! zero) yields `None` so callers leave the op unfolded.

use std::cmp::Ordering;

use crate::features::ir::domain::OperandKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// Largest magnitude printed as an integer
const INTEGER_DISPLAY_LIMIT: f64 = 1e15;

impl Scalar {
    pub fn from_kind(kind: &OperandKind) -> Option<Self> {
        Some(match kind {
            OperandKind::Null => Scalar::Null,
            OperandKind::Bool(b) => Scalar::Bool(*b),
            OperandKind::Number(n) => Scalar::Number(*n),
            OperandKind::String(s) => Scalar::String(s.clone()),
            _ => return None,
        })
    }

    pub fn into_kind(self) -> OperandKind {
        match self {
            Scalar::Null => OperandKind::Null,
            Scalar::Bool(b) => OperandKind::Bool(b),
            Scalar::Number(n) => OperandKind::Number(n),
            Scalar::String(s) => OperandKind::String(s),
        }
    }

    /// Same variant, ignoring the value
    pub fn same_type(&self, other: &Scalar) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => *n != 0.0,
            Scalar::String(s) => string_truthy(s),
        }
    }

    /// Numeric value; `None` for strings that are not numeric
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Scalar::Null => Some(0.0),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Number(n) => Some(*n),
            Scalar::String(s) => numeric_string(s),
        }
    }

    /// Integer value for bitwise ops and `(int)` casts
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Scalar::String(s) => {
                // (int) "12abc" is 12; non-numeric prefixes are 0
                let trimmed = s.trim_start();
                let end = trimmed
                    .char_indices()
                    .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
                    .map(|(i, _)| i)
                    .unwrap_or(trimmed.len());
                Some(trimmed[..end].parse::<i64>().unwrap_or(0))
            }
            other => {
                let n = other.to_number()?;
                n.is_finite().then_some(n.trunc() as i64)
            }
        }
    }

    pub fn to_php_string(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(true) => "1".to_string(),
            Scalar::Bool(false) => String::new(),
            Scalar::Number(n) => format_number(*n),
            Scalar::String(s) => s.clone(),
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => a == b,
            (a, b) => a == b,
        }
    }

    /// `==`
    pub fn loose_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), b) | (b, Scalar::Bool(a)) => *a == b.truthy(),
            (Scalar::Null, Scalar::String(s)) | (Scalar::String(s), Scalar::Null) => s.is_empty(),
            (Scalar::Null, b) | (b, Scalar::Null) => !b.truthy(),
            (Scalar::Number(a), Scalar::Number(b)) => a == b,
            (Scalar::Number(n), Scalar::String(s)) | (Scalar::String(s), Scalar::Number(n)) => {
                match numeric_string(s) {
                    Some(m) => *n == m,
                    None => format_number(*n) == *s,
                }
            }
            (Scalar::String(a), Scalar::String(b)) => {
                match (numeric_string(a), numeric_string(b)) {
                    (Some(x), Some(y)) => x == y,
                    _ => a == b,
                }
            }
        }
    }

    /// Ordering used by `<`, `<=`, `>`, `>=` and `<=>`
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::String(a), Scalar::String(b))
                if numeric_string(a).is_none() || numeric_string(b).is_none() =>
            {
                Some(a.cmp(b))
            }
            (Scalar::Bool(_), _) | (_, Scalar::Bool(_)) | (Scalar::Null, _) | (_, Scalar::Null) => {
                Some(self.truthy().cmp(&other.truthy()))
            }
            _ => self.to_number()?.partial_cmp(&other.to_number()?),
        }
    }
}

/// `""` and `"0"` are the only falsy strings
pub fn string_truthy(s: &str) -> bool {
    !(s.is_empty() || s == "0")
}

/// Value of a numeric string (surrounding whitespace allowed)
pub fn numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Integral values print without a fraction, like PHP's float-to-string
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NAN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}INF", sign)
    } else if n.fract() == 0.0 && n.abs() < INTEGER_DISPLAY_LIMIT {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
