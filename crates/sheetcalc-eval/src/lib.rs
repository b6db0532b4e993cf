pub mod broadcast;
pub mod coercion;
pub mod function;
pub mod function_registry;
pub mod interpreter;
pub mod resolver;
pub mod traits;

pub mod builtins;

mod macros;
pub mod test_workbook;

pub mod engine;

#[cfg(feature = "tracing")]
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use engine::{EditError, Engine, EvalConfig, InternalFault, NameScope, RecalcReport};
pub use function::{FnCaps, Function, FunctionInfo};
pub use resolver::{Expr, NamedTarget, RefError, ResolvedFormula, WorkbookView, resolve};
pub use sheetcalc_common::{CellAddress, ErrorKind, RangeRef, SheetId, Value};
