use crate::resolver::{RefError, ResolvedFormula};
use sheetcalc_common::Value;
use sheetcalc_parse::ASTNode;

/// Where a cell is in the recalculation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellState {
    #[default]
    Clean,
    Dirty,
    Computing,
}

#[derive(Debug, Clone)]
pub struct Formula {
    /// Input text, including the leading `=`.
    pub text: String,
    pub ast: ASTNode,
    /// `None` when binding failed; see `bind_error`.
    pub bound: Option<ResolvedFormula>,
    pub bind_error: Option<RefError>,
    /// Upper-cased names mentioned in the source, bound or not.
    pub names: Vec<String>,
}

impl Formula {
    pub fn is_valid(&self) -> bool {
        self.bound.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub input: String,
    pub formula: Option<Formula>,
    pub value: Value,
    pub state: CellState,
    /// Recalculation epoch the value was last computed in.
    pub epoch: u64,
}

impl Cell {
    pub fn literal(input: String, value: Value, epoch: u64) -> Self {
        Self {
            input,
            formula: None,
            value,
            state: CellState::Clean,
            epoch,
        }
    }

    pub fn formula(input: String, formula: Formula, previous: Value) -> Self {
        Self {
            input,
            formula: Some(formula),
            value: previous,
            state: CellState::Dirty,
            epoch: 0,
        }
    }
}
