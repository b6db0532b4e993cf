//! Operand coercion, driven by per-kind rule tables.
//!
//! Each operator class (arithmetic, text, logical, comparison) has a table
//! indexed by [`ValueKind`], so the full kind × operator matrix is visible
//! in one place and can be tested exhaustively.

use sheetcalc_common::{ErrorKind, Value, ValueKind, format_number, parse_number};
use sheetcalc_parse::BinaryOp;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberRule {
    Identity,
    ParseText,
    BoolAsInt,
    DaySerial,
    Propagate,
    Reject,
    Zero,
}

/// Arithmetic operand rules, indexed by `ValueKind::index`.
pub const NUMBER_RULES: [NumberRule; ValueKind::COUNT] = [
    NumberRule::Identity,  // Number
    NumberRule::ParseText, // Text
    NumberRule::BoolAsInt, // Boolean
    NumberRule::DaySerial, // Date
    NumberRule::Propagate, // Error
    NumberRule::Reject,    // Array
    NumberRule::Zero,      // Empty
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRule {
    Canonical,
    Propagate,
    Reject,
}

/// Concatenation operand rules.
pub const TEXT_RULES: [TextRule; ValueKind::COUNT] = [
    TextRule::Canonical, // Number
    TextRule::Canonical, // Text
    TextRule::Canonical, // Boolean
    TextRule::Canonical, // Date
    TextRule::Propagate, // Error
    TextRule::Reject,    // Array
    TextRule::Canonical, // Empty
];

/// Coerce a scalar for arithmetic.
pub fn to_number(value: &Value) -> Result<f64, ErrorKind> {
    match (NUMBER_RULES[value.kind().index()], value) {
        (NumberRule::Identity, Value::Number(n)) => Ok(*n),
        (NumberRule::ParseText, Value::Text(s)) => parse_number(s).ok_or(ErrorKind::Value),
        (NumberRule::BoolAsInt, Value::Boolean(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        (NumberRule::DaySerial, Value::Date(d)) => Ok(*d as f64),
        (NumberRule::Propagate, Value::Error(e)) => Err(*e),
        (NumberRule::Zero, _) => Ok(0.0),
        _ => Err(ErrorKind::Value),
    }
}

/// Coerce a scalar to its canonical text.
pub fn to_text(value: &Value) -> Result<String, ErrorKind> {
    match TEXT_RULES[value.kind().index()] {
        TextRule::Canonical => Ok(match value {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Empty => String::new(),
            other => other.to_string(),
        }),
        TextRule::Propagate => Err(value.error().unwrap_or(ErrorKind::Value)),
        TextRule::Reject => Err(ErrorKind::Value),
    }
}

/// Coerce a scalar to a logical value.
pub fn to_bool(value: &Value) -> Result<bool, ErrorKind> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Date(d) => Ok(*d != 0),
        Value::Empty => Ok(false),
        Value::Text(s) if s.trim().eq_ignore_ascii_case("TRUE") => Ok(true),
        Value::Text(s) if s.trim().eq_ignore_ascii_case("FALSE") => Ok(false),
        Value::Error(e) => Err(*e),
        Value::Text(_) | Value::Array(_) => Err(ErrorKind::Value),
    }
}

/// Comparison operand class. Numbers and dates share a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareClass {
    Numeric,
    Logical,
    Text,
    Blank,
    Error,
    Array,
}

impl CompareClass {
    pub const COUNT: usize = 6;

    pub fn of(value: &Value) -> Self {
        match value.kind() {
            ValueKind::Number | ValueKind::Date => CompareClass::Numeric,
            ValueKind::Boolean => CompareClass::Logical,
            ValueKind::Text => CompareClass::Text,
            ValueKind::Empty => CompareClass::Blank,
            ValueKind::Error => CompareClass::Error,
            ValueKind::Array => CompareClass::Array,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Compare as numbers.
    Numeric,
    /// Numbers when both sides coerce, otherwise case-insensitive text.
    NumericOrLexical,
    /// Left error first, then right.
    Propagate,
    Mismatch,
}

use CompareMode::{Mismatch as MM, Numeric as NU, NumericOrLexical as NL, Propagate as PR};

/// Rows are the left operand class, columns the right, both in
/// `CompareClass` declaration order.
pub const COMPARE_MODES: [[CompareMode; CompareClass::COUNT]; CompareClass::COUNT] = [
    //        Numeric Logical Text Blank Error Array
    /* Num */ [NU, NU, NL, NU, PR, MM],
    /* Log */ [NU, NU, NL, NU, PR, MM],
    /* Txt */ [NL, NL, NL, NL, PR, MM],
    /* Blk */ [NU, NU, NL, NU, PR, MM],
    /* Err */ [PR, PR, PR, PR, PR, PR],
    /* Arr */ [MM, MM, MM, MM, PR, MM],
];

pub fn compare_mode(left: &Value, right: &Value) -> CompareMode {
    COMPARE_MODES[CompareClass::of(left) as usize][CompareClass::of(right) as usize]
}

/// Apply a comparison operator to two scalars.
pub fn compare(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let ordering = match compare_mode(left, right) {
        CompareMode::Numeric => {
            match (to_number(left), to_number(right)) {
                (Ok(a), Ok(b)) => a.partial_cmp(&b),
                _ => return Value::Error(ErrorKind::Value),
            }
        }
        CompareMode::NumericOrLexical => match (to_number(left), to_number(right)) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => match (to_text(left), to_text(right)) {
                (Ok(a), Ok(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
                _ => return Value::Error(ErrorKind::Value),
            },
        },
        CompareMode::Propagate => {
            let kind = left
                .error()
                .or_else(|| right.error())
                .unwrap_or(ErrorKind::Value);
            return Value::Error(kind);
        }
        CompareMode::Mismatch => return Value::Error(ErrorKind::Value),
    };
    match ordering {
        Some(ord) => Value::Boolean(apply_ordering(op, ord)),
        None => Value::Error(ErrorKind::Value),
    }
}

fn apply_ordering(op: BinaryOp, ord: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        _ => false,
    }
}
