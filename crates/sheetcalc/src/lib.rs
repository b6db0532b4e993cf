//! Meta crate that re-exports the sheetcalc layers behind feature flags.
//! Most users want [`Workbook`]; the engine and parser stay reachable for
//! callers that drive recalculation themselves.

#[cfg(feature = "common")]
pub use sheetcalc_common as common;

#[cfg(feature = "parse")]
pub use sheetcalc_parse as parse;

#[cfg(feature = "eval")]
pub use sheetcalc_eval as eval;

#[cfg(feature = "workbook")]
pub use sheetcalc_workbook as workbook;

#[cfg(feature = "common")]
pub use sheetcalc_common::{CellAddress, ErrorKind, RangeRef, SheetId, Value};

#[cfg(feature = "eval")]
pub use sheetcalc_eval::{Engine, EvalConfig, Function, FunctionInfo, NameScope, RecalcReport};

#[cfg(feature = "workbook")]
pub use sheetcalc_workbook::{Workbook, WorkbookConfig, WorkbookError, WorkbookRegistry};
