use crate::{
    broadcast::{broadcast_shape, project_index},
    coercion::{compare, to_number, to_text},
    engine::InternalFault,
    resolver::Expr,
    traits::{ArgumentHandle, EvaluationContext},
};
use sheetcalc_common::{CellAddress, ErrorKind, Value};
use sheetcalc_parse::{BinaryOp, UnaryOp};

/// Evaluates bound expressions against an [`EvaluationContext`].
///
/// Formula errors come back as `Ok(Value::Error(..))`; `Err` is reserved for
/// engine faults such as reading a precedent that has not been computed.
pub struct Interpreter<'a> {
    pub context: &'a dyn EvaluationContext,
    current_cell: Option<CellAddress>,
}

impl<'a> Interpreter<'a> {
    pub fn new(context: &'a dyn EvaluationContext) -> Self {
        Self {
            context,
            current_cell: None,
        }
    }

    pub fn new_with_cell(context: &'a dyn EvaluationContext, cell: CellAddress) -> Self {
        Self {
            context,
            current_cell: Some(cell),
        }
    }

    pub fn current_cell(&self) -> Option<CellAddress> {
        self.current_cell
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value, InternalFault> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Cell(cell) => self.context.cell_value(cell),
            Expr::Range(range) => Ok(Value::Array(self.context.range_values(range)?)),
            Expr::Unary { op, expr } => {
                let v = self.evaluate(expr)?;
                Ok(self.eval_unary(*op, v))
            }
            Expr::Binary { op, left, right } => {
                let l = self.evaluate(left)?;
                let r = self.evaluate(right)?;
                Ok(self.eval_binary(*op, l, r))
            }
            Expr::Call { name, args } => self.eval_function(name, args),
        }
    }

    /* ===================  unary ops  =================== */
    fn eval_unary(&self, op: UnaryOp, v: Value) -> Value {
        match op {
            UnaryOp::Plus => v,
            UnaryOp::Minus => map_array(v, |x| match to_number(&x) {
                Ok(n) => Value::Number(-n),
                Err(e) => Value::Error(e),
            }),
        }
    }

    /* ===================  binary ops  =================== */
    fn eval_binary(&self, op: BinaryOp, l: Value, r: Value) -> Value {
        if !matches!(l, Value::Array(_)) && !matches!(r, Value::Array(_)) {
            return scalar_binary(op, &l, &r);
        }
        let (ld, rd) = (l.dims(), r.dims());
        let (rows, cols) = match broadcast_shape(ld, rd) {
            Ok(shape) => shape,
            Err(e) => return Value::Error(e),
        };
        let out = (0..rows)
            .map(|i| {
                (0..cols)
                    .map(|j| {
                        let a = element(&l, project_index(ld, i, j));
                        let b = element(&r, project_index(rd, i, j));
                        scalar_binary(op, a, b)
                    })
                    .collect()
            })
            .collect();
        Value::Array(out)
    }

    /* ===================  functions  =================== */
    fn eval_function(&self, name: &str, args: &[Expr]) -> Result<Value, InternalFault> {
        let Some(fun) = self.context.resolve_function(name) else {
            return Ok(Value::Error(ErrorKind::Name));
        };
        let arity_ok =
            args.len() >= fun.min_args() && fun.max_args().is_none_or(|max| args.len() <= max);
        if !arity_ok {
            return Ok(Value::Error(ErrorKind::Value));
        }
        let handles: Vec<ArgumentHandle> = args.iter().map(|a| ArgumentHandle::new(a, self)).collect();
        fun.eval_scalar(&handles, self.context)
    }
}

static EMPTY: Value = Value::Empty;

fn element(v: &Value, (row, col): (usize, usize)) -> &Value {
    match v {
        Value::Array(rows) => rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY),
        scalar => scalar,
    }
}

fn map_array(v: Value, f: impl Fn(Value) -> Value + Copy) -> Value {
    match v {
        Value::Array(rows) => Value::Array(
            rows.into_iter()
                .map(|row| row.into_iter().map(f).collect())
                .collect(),
        ),
        scalar => f(scalar),
    }
}

fn scalar_binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    if let Some(e) = l.error().or_else(|| r.error()) {
        return Value::Error(e);
    }
    if op.is_comparison() {
        return compare(op, l, r);
    }
    if op == BinaryOp::Concat {
        return match (to_text(l), to_text(r)) {
            (Ok(a), Ok(b)) => Value::Text(a + &b),
            (Err(e), _) | (_, Err(e)) => Value::Error(e),
        };
    }
    let (a, b) = match (to_number(l), to_number(r)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return Value::Error(e),
    };
    let result = match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => divide(a, b),
        BinaryOp::Pow => power(a, b),
        _ => Err(ErrorKind::Value),
    };
    finite(result)
}

pub(crate) fn divide(a: f64, b: f64) -> Result<f64, ErrorKind> {
    if b == 0.0 {
        Err(ErrorKind::DivByZero)
    } else {
        Ok(a / b)
    }
}

pub(crate) fn power(base: f64, exp: f64) -> Result<f64, ErrorKind> {
    if base == 0.0 && exp == 0.0 {
        return Err(ErrorKind::Num);
    }
    if base == 0.0 && exp < 0.0 {
        return Err(ErrorKind::DivByZero);
    }
    if base < 0.0 && exp.fract() != 0.0 {
        return Err(ErrorKind::Num);
    }
    Ok(base.powf(exp))
}

/// Numeric results must be finite.
pub(crate) fn finite(result: Result<f64, ErrorKind>) -> Value {
    match result {
        Ok(n) if n.is_finite() => Value::Number(n),
        Ok(_) => Value::Error(ErrorKind::Num),
        Err(e) => Value::Error(e),
    }
}
