use crate::engine::InternalFault;
use crate::function_registry;
use crate::interpreter::Interpreter;
use crate::resolver::Expr;
use sheetcalc_common::{CellAddress, RangeRef, Value};
use std::borrow::Cow;
use std::sync::Arc;

pub use crate::function::Function;

/// What the interpreter needs from whoever owns the cells.
pub trait EvaluationContext {
    /// Current value of a precedent. Unknown cells read as `Value::Empty`.
    fn cell_value(&self, cell: &CellAddress) -> Result<Value, InternalFault>;

    /// Row-major values of a range.
    fn range_values(&self, range: &RangeRef) -> Result<Vec<Vec<Value>>, InternalFault> {
        (range.start_row..=range.end_row)
            .map(|row| {
                (range.start_col..=range.end_col)
                    .map(|col| self.cell_value(&CellAddress::new(range.sheet, row, col)))
                    .collect()
            })
            .collect()
    }

    /// Case-insensitive function lookup.
    fn resolve_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        function_registry::get(name)
    }
}

/// A lazily evaluated function argument.
pub struct ArgumentHandle<'a, 'b> {
    expr: &'a Expr,
    interp: &'a Interpreter<'b>,
}

impl<'a, 'b> ArgumentHandle<'a, 'b> {
    pub(crate) fn new(expr: &'a Expr, interp: &'a Interpreter<'b>) -> Self {
        Self { expr, interp }
    }

    pub fn value(&self) -> Result<Cow<'a, Value>, InternalFault> {
        if let Expr::Literal(v) = self.expr {
            return Ok(Cow::Borrowed(v));
        }
        self.interp.evaluate(self.expr).map(Cow::Owned)
    }

    /// True for cell and range references. Aggregates treat values read
    /// through a reference leniently.
    pub fn is_reference(&self) -> bool {
        matches!(self.expr, Expr::Cell(_) | Expr::Range(_))
    }

    pub fn expr(&self) -> &'a Expr {
        self.expr
    }
}
