//! Dependency graph, scheduling and incremental recalculation.

pub mod cell;
pub mod error;
pub mod eval;
pub mod graph;
pub mod named_range;
pub mod scheduler;
pub mod sheet_registry;

#[cfg(test)]
mod tests;

pub use cell::{Cell, CellState, Formula};
pub use error::{EditError, InternalFault};
pub use eval::{Engine, RecalcReport};
pub use graph::{CycleError, DependencyGraph, Precedents};
pub use named_range::{NameScope, NamedRangeTable};
pub use scheduler::{Layer, Schedule, Scheduler};
pub use sheet_registry::SheetRegistry;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Limits and switches for binding and recalculation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// Number of addressable rows.
    pub max_rows: u32,
    /// Number of addressable columns.
    pub max_cols: u32,
    /// Largest range area a formula may reference.
    pub max_range_cells: u64,
    /// Skip cells whose in-pass precedents all kept their previous value.
    pub prune_unchanged: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_rows: 1_048_576,
            max_cols: 16_384,
            max_range_cells: 4_194_304,
            prune_unchanged: true,
        }
    }
}
