use chrono::{NaiveDate, TimeDelta};
use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use crate::ErrorKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────────── epoch-day utilities ─────────────────────────
Dates are whole days counted from 1970-01-01 (day 0). Negative values are
days before the epoch. Arithmetic treats a date as its day number.
------------------------------------------------------------------------ */

const UNIX_EPOCH_DATE: NaiveDate = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();

pub fn date_to_days(date: NaiveDate) -> i64 {
    (date - UNIX_EPOCH_DATE).num_days()
}

pub fn days_to_date(days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(days).and_then(|d| UNIX_EPOCH_DATE.checked_add_signed(d))
}

/// Parse user-facing number text. Accepts optional sign, decimal point and
/// exponent; rejects `inf`/`NaN` spellings that `f64::from_str` would take.
pub fn parse_number(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty()
        || !t
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        || !t.bytes().any(|b| b.is_ascii_digit())
    {
        return None;
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Canonical decimal rendering: integers print without a fraction, other
/// values keep up to 15 significant digits with trailing zeros removed.
/// Magnitudes outside `1e-5 ..= 1e15` use `1.5E+20` notation.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{n:.0}");
    }
    let sci = format!("{n:.14e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-5..15).contains(&exp) {
        let decimals = (14 - exp).max(0) as usize;
        trim_fraction(format!("{n:.decimals$}"))
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!(
            "{}E{sign}{:02}",
            trim_fraction(mantissa.to_string()),
            exp.abs()
        )
    }
}

fn trim_fraction(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

/// The kind tag of a [`Value`], used to index coercion tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    Text,
    Boolean,
    Date,
    Error,
    Array,
    Empty,
}

impl ValueKind {
    pub const COUNT: usize = 7;

    pub const ALL: [ValueKind; Self::COUNT] = [
        ValueKind::Number,
        ValueKind::Text,
        ValueKind::Boolean,
        ValueKind::Date,
        ValueKind::Error,
        ValueKind::Array,
        ValueKind::Empty,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A cell result or intermediate formula value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Days since 1970-01-01.
    Date(i64),
    Error(ErrorKind),
    /// Rectangular grid, row-major. Build with [`Value::from_rows`].
    Array(Vec<Vec<Value>>),
    #[default]
    Empty,
}

/// Numbers compare and hash by bit pattern, with `-0.0` folded into `0.0`.
fn number_bits(n: f64) -> u64 {
    if n == 0.0 { 0 } else { n.to_bits() }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => number_bits(*a) == number_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Empty, Value::Empty) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Number(n) => number_bits(*n).hash(state),
            Value::Text(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Error(e) => e.hash(state),
            Value::Array(a) => a.hash(state),
            Value::Empty => {}
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(true) => f.write_str("TRUE"),
            Value::Boolean(false) => f.write_str("FALSE"),
            Value::Date(days) => match days_to_date(*days) {
                Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
                None => f.write_str(&format_number(*days as f64)),
            },
            Value::Error(e) => write!(f, "{e}"),
            Value::Array(rows) => {
                f.write_str("{")?;
                for (r, row) in rows.iter().enumerate() {
                    if r > 0 {
                        f.write_str(";")?;
                    }
                    for (c, v) in row.iter().enumerate() {
                        if c > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{v}")?;
                    }
                }
                f.write_str("}")
            }
            Value::Empty => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    RaggedArray {
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::RaggedArray {
                row,
                expected,
                found,
            } => write!(
                f,
                "array row {row} has {found} columns, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for ValueError {}

impl From<ErrorKind> for Value {
    fn from(kind: ErrorKind) -> Self {
        Value::Error(kind)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl Value {
    /// Build an array, rejecting ragged rows.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Result<Value, ValueError> {
        if let Some(first) = rows.first() {
            let expected = first.len();
            for (row, cells) in rows.iter().enumerate() {
                if cells.len() != expected {
                    return Err(ValueError::RaggedArray {
                        row,
                        expected,
                        found: cells.len(),
                    });
                }
            }
        }
        Ok(Value::Array(rows))
    }

    /// Classify literal input text into its natural kind.
    ///
    /// A leading apostrophe forces text. Formula input (`=...`) is not
    /// handled here.
    pub fn parse_literal(raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Empty;
        }
        if let Some(rest) = raw.strip_prefix('\'') {
            return Value::Text(rest.to_string());
        }
        if let Some(n) = parse_number(raw) {
            return Value::Number(n);
        }
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("TRUE") {
            return Value::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return Value::Boolean(false);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Value::Date(date_to_days(date));
        }
        if let Some(kind) = ErrorKind::parse(trimmed) {
            return Value::Error(kind);
        }
        Value::Text(raw.to_string())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Date(_) => ValueKind::Date,
            Value::Error(_) => ValueKind::Error,
            Value::Array(_) => ValueKind::Array,
            Value::Empty => ValueKind::Empty,
        }
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// `(rows, cols)` of an array; scalars are 1×1.
    pub fn dims(&self) -> (usize, usize) {
        match self {
            Value::Array(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
            _ => (1, 1),
        }
    }

    /// First error found in row-major order, for scalars or arrays.
    pub fn first_error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(e) => Some(*e),
            Value::Array(rows) => rows.iter().flatten().find_map(Value::first_error),
            _ => None,
        }
    }
}
