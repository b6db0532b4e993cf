//! Spreadsheet error codes.
//!
//! Formula errors are ordinary values: they are stored in cells and flow
//! through dependent formulas. Only the [`ErrorKind`] travels with a
//! [`crate::Value`], so two `#DIV/0!` results compare equal no matter
//! where they were produced.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All error codes a formula can evaluate to.
///
/// **Note:** names are CamelCase (idiomatic Rust) while `Display`
/// renders the spreadsheet wire text (`#DIV/0!`, ...).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    DivByZero,
    Value,
    Name,
    CircularReference,
    Ref,
    Num,
    Na,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::DivByZero,
        ErrorKind::Value,
        ErrorKind::Name,
        ErrorKind::CircularReference,
        ErrorKind::Ref,
        ErrorKind::Num,
        ErrorKind::Na,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DivByZero => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Name => "#NAME?",
            Self::CircularReference => "#CIRCULAR!",
            Self::Ref => "#REF!",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
        }
    }

    /// Parse wire text such as `#div/0!`. Case-insensitive, surrounding
    /// whitespace ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "#DIV/0!" => Some(Self::DivByZero),
            "#VALUE!" => Some(Self::Value),
            "#NAME?" => Some(Self::Name),
            "#CIRCULAR!" | "#CIRC!" => Some(Self::CircularReference),
            "#REF!" => Some(Self::Ref),
            "#NUM!" => Some(Self::Num),
            "#N/A" => Some(Self::Na),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
