use crate::registry::WorkbookId;
use sheetcalc_eval::EditError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkbookError {
    #[error("sheet '{0}' already exists")]
    DuplicateSheet(String),

    #[error("no sheet named '{0}'")]
    UnknownSheet(String),

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("workbook is closed")]
    Closed,

    #[error("no open workbook {0}")]
    UnknownWorkbook(WorkbookId),

    #[error("edit #{seq} was superseded by edit #{by}")]
    Superseded { seq: u64, by: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Edit(EditError),
}

impl From<EditError> for WorkbookError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::DuplicateSheet(name) => WorkbookError::DuplicateSheet(name),
            EditError::UnknownSheetName(name) => WorkbookError::UnknownSheet(name),
            EditError::InvalidName(name) => WorkbookError::InvalidName(name),
            other => WorkbookError::Edit(other),
        }
    }
}
