use super::utils::{for_each_value, map_elements};
use crate::coercion::to_bool;
use crate::engine::InternalFault;
use crate::function::Function;
use crate::traits::{ArgumentHandle, EvaluationContext};
use crate::{func_caps, register_functions};
use sheetcalc_common::{ErrorKind, Value};
use std::ops::ControlFlow;

/// Condition of `IF`: scalars coerce, arrays use their top-left element.
fn condition(v: &Value) -> Result<bool, ErrorKind> {
    match v {
        Value::Array(rows) => rows
            .first()
            .and_then(|r| r.first())
            .map_or(Err(ErrorKind::Value), to_bool),
        other => to_bool(other),
    }
}

/* ─────────────────────────── IF() ───────────────────────────────── */

#[derive(Debug)]
pub struct IfFn;

/// `IF(condition, then, [else])`. Only the selected branch is evaluated;
/// a missing else branch yields `FALSE`.
impl Function for IfFn {
    func_caps!(PURE, SHORT_CIRCUIT);
    fn name(&self) -> &str {
        "IF"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        let cond = match condition(&*args[0].value()?) {
            Ok(b) => b,
            Err(e) => return Ok(Value::Error(e)),
        };
        if cond {
            return Ok(args[1].value()?.into_owned());
        }
        match args.get(2) {
            Some(alt) => Ok(alt.value()?.into_owned()),
            None => Ok(Value::Boolean(false)),
        }
    }
}

/* ─────────────────────────── AND() / OR() ───────────────────────── */

/// Fold logical inputs. Text and blanks inside ranges are skipped; if
/// nothing logical remains the result is `#VALUE!`.
fn fold_logical<'a, 'b>(
    args: &'a [ArgumentHandle<'a, 'b>],
    init: bool,
    op: fn(bool, bool) -> bool,
) -> Result<Value, InternalFault> {
    let mut acc = init;
    let mut seen = false;
    let flow = for_each_value(args, |v, lenient| {
        match v {
            Value::Error(e) => return ControlFlow::Break(*e),
            Value::Text(_) | Value::Empty if lenient => {}
            other => match to_bool(other) {
                Ok(b) => {
                    acc = op(acc, b);
                    seen = true;
                }
                Err(e) => return ControlFlow::Break(e),
            },
        }
        ControlFlow::Continue(())
    })?;
    Ok(match flow {
        ControlFlow::Break(e) => Value::Error(e),
        ControlFlow::Continue(()) if !seen => Value::Error(ErrorKind::Value),
        ControlFlow::Continue(()) => Value::Boolean(acc),
    })
}

#[derive(Debug)]
pub struct AndFn;

impl Function for AndFn {
    func_caps!(PURE, REDUCTION);
    fn name(&self) -> &str {
        "AND"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        fold_logical(args, true, |a, b| a && b)
    }
}

#[derive(Debug)]
pub struct OrFn;

impl Function for OrFn {
    func_caps!(PURE, REDUCTION);
    fn name(&self) -> &str {
        "OR"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        fold_logical(args, false, |a, b| a || b)
    }
}

/* ─────────────────────────── NOT() ──────────────────────────────── */

#[derive(Debug)]
pub struct NotFn;

impl Function for NotFn {
    func_caps!(PURE, ELEMENTWISE);
    fn name(&self) -> &str {
        "NOT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        let v = args[0].value()?;
        Ok(map_elements(&v, |x| match to_bool(x) {
            Ok(b) => Value::Boolean(!b),
            Err(e) => Value::Error(e),
        }))
    }
}

/* ─────────────────────────── IFERROR() / ISERROR() ──────────────── */

#[derive(Debug)]
pub struct IfErrorFn;

/// `IFERROR(value, fallback)`: the fallback is evaluated only when `value`
/// is an error.
impl Function for IfErrorFn {
    func_caps!(PURE, SHORT_CIRCUIT, ERROR_HANDLING);
    fn name(&self) -> &str {
        "IFERROR"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        let v = args[0].value()?;
        if v.is_error() {
            return Ok(args[1].value()?.into_owned());
        }
        Ok(v.into_owned())
    }
}

#[derive(Debug)]
pub struct IsErrorFn;

impl Function for IsErrorFn {
    func_caps!(PURE, ELEMENTWISE, ERROR_HANDLING);
    fn name(&self) -> &str {
        "ISERROR"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        let v = args[0].value()?;
        Ok(map_elements(&v, |x| Value::Boolean(x.is_error())))
    }
}

pub fn register_builtins() {
    register_functions!(IfFn, AndFn, OrFn, NotFn, IfErrorFn, IsErrorFn);
}
