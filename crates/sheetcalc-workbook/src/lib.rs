//! Workbook-level API over the sheetcalc engine.
//!
//! A [`Workbook`] owns one engine behind a read/write lock and addresses
//! cells by sheet name with 1-based rows and columns. Edits are stamped
//! with sequence numbers on an [`EditQueue`] and applied in arrival order.

pub mod config;
pub mod error;
pub mod queue;
pub mod registry;
pub mod workbook;

pub use config::WorkbookConfig;
pub use error::WorkbookError;
pub use queue::{EditOutcome, EditQueue, PendingEdit};
pub use registry::{WorkbookId, WorkbookRegistry};
pub use workbook::Workbook;

// Re-export for convenience
pub use sheetcalc_common::{ErrorKind, Value};
pub use sheetcalc_eval::{EvalConfig, Function, FunctionInfo, RecalcReport};
