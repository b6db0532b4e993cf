//! Lightweight in-memory context for interpreter and function tests.

use std::sync::Arc;

use crate::engine::{EvalConfig, InternalFault};
use crate::function::Function;
use crate::function_registry;
use crate::interpreter::Interpreter;
use crate::resolver::{NamedTarget, RefError, WorkbookView, resolve};
use crate::traits::EvaluationContext;
use rustc_hash::FxHashMap;
use sheetcalc_common::{CellAddress, SheetId, Value};
use sheetcalc_parse::{ParseError, parse};

#[derive(Default)]
pub struct TestWorkbook {
    sheets: Vec<String>,
    cells: FxHashMap<CellAddress, Value>,
    names: FxHashMap<String, NamedTarget>,
    fns: FxHashMap<String, Arc<dyn Function>>,
}

/// Why `TestWorkbook::eval` could not produce a value.
#[derive(Debug)]
pub enum TestEvalError {
    Parse(ParseError),
    Ref(RefError),
    Fault(InternalFault),
}

impl TestWorkbook {
    /* ─────────────── constructors ─────────────── */
    pub fn new() -> Self {
        Self {
            sheets: vec!["Sheet1".to_string()],
            ..Self::default()
        }
    }

    pub fn with_sheet(mut self, name: &str) -> Self {
        self.sheets.push(name.to_string());
        self
    }

    /* ─────────────── cell helpers ─────────────── */
    /// `row` and `col` are 1-based, as in A1 text.
    pub fn with_cell(mut self, sheet: SheetId, row: u32, col: u32, v: impl Into<Value>) -> Self {
        self.cells
            .insert(CellAddress::new(sheet, row - 1, col - 1), v.into());
        self
    }

    pub fn with_value(mut self, cell: CellAddress, v: Value) -> Self {
        self.cells.insert(cell, v);
        self
    }

    /* ─────────────── names and functions ─────────────── */
    pub fn with_name(mut self, name: &str, target: NamedTarget) -> Self {
        self.names.insert(name.to_ascii_uppercase(), target);
        self
    }

    pub fn with_function(mut self, func: Arc<dyn Function>) -> Self {
        self.fns.insert(func.name().to_ascii_uppercase(), func);
        self
    }

    /* ─────────────── interpreter shortcut ─────── */
    pub fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(self)
    }

    /// Parse, bind against sheet 0 and evaluate a formula.
    pub fn eval(&self, formula: &str) -> Result<Value, TestEvalError> {
        let ast = parse(formula).map_err(TestEvalError::Parse)?;
        let resolved =
            resolve(&ast, 0, self, &EvalConfig::default()).map_err(TestEvalError::Ref)?;
        self.interpreter()
            .evaluate(&resolved.expr)
            .map_err(TestEvalError::Fault)
    }
}

impl EvaluationContext for TestWorkbook {
    fn cell_value(&self, cell: &CellAddress) -> Result<Value, InternalFault> {
        Ok(self.cells.get(cell).cloned().unwrap_or_default())
    }

    fn resolve_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.fns
            .get(&name.to_ascii_uppercase())
            .cloned()
            .or_else(|| function_registry::get(name))
    }
}

impl WorkbookView for TestWorkbook {
    fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|s| s.eq_ignore_ascii_case(name))
            .map(|i| i as SheetId)
    }

    fn sheet_exists(&self, id: SheetId) -> bool {
        (id as usize) < self.sheets.len()
    }

    fn named_range(&self, name: &str, _scope: SheetId) -> Option<NamedTarget> {
        self.names.get(&name.to_ascii_uppercase()).copied()
    }
}
