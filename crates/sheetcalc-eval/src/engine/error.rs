use crate::resolver::RefError;
use sheetcalc_common::{CellAddress, SheetId};
use sheetcalc_parse::ParseError;
use thiserror::Error;

/// Engine invariant violations. These are bugs in scheduling, not formula
/// errors, and are surfaced through `RecalcReport::fatal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalFault {
    #[error("topological ordering left {remaining} cell(s) unordered")]
    UnorderedResidual { remaining: usize },

    #[error("precedent {cell} was read before it was computed")]
    UnresolvedPrecedent { cell: CellAddress },

    #[error("cell {cell} was re-entered while computing")]
    Reentered { cell: CellAddress },
}

/// Reasons an edit or workbook mutation is refused outright.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown sheet id {0}")]
    UnknownSheet(SheetId),

    #[error("no sheet named '{0}'")]
    UnknownSheetName(String),

    #[error("cell ({row}, {col}) is outside the grid")]
    OutOfBounds { row: u32, col: u32 },

    #[error("sheet '{0}' already exists")]
    DuplicateSheet(String),

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("name target does not bind: {0}")]
    Ref(#[from] RefError),
}
