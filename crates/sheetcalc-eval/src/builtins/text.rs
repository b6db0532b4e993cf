use super::utils::{for_each_value, map_elements};
use crate::coercion::to_text;
use crate::engine::InternalFault;
use crate::function::Function;
use crate::traits::{ArgumentHandle, EvaluationContext};
use crate::{func_caps, register_functions};
use sheetcalc_common::Value;
use std::ops::ControlFlow;

#[derive(Debug)]
pub struct ConcatFn;

/// Joins the canonical text of every input, ranges included.
impl Function for ConcatFn {
    func_caps!(PURE, REDUCTION);
    fn name(&self) -> &str {
        "CONCAT"
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
        let mut out = String::new();
        let flow = for_each_value(args, |v, _| match to_text(v) {
            Ok(s) => {
                out.push_str(&s);
                ControlFlow::Continue(())
            }
            Err(e) => ControlFlow::Break(e),
        })?;
        Ok(match flow {
            ControlFlow::Continue(()) => Value::Text(out),
            ControlFlow::Break(e) => Value::Error(e),
        })
    }
}

/// Shared body of the single-argument text functions.
fn text_map<'a, 'b>(
    args: &'a [ArgumentHandle<'a, 'b>],
    f: impl Fn(String) -> Value,
) -> Result<Value, InternalFault> {
    let v = args[0].value()?;
    Ok(map_elements(&v, |x| match to_text(x) {
        Ok(s) => f(s),
        Err(e) => Value::Error(e),
    }))
}

#[derive(Debug)]
pub struct LenFn;

impl Function for LenFn {
    func_caps!(PURE, ELEMENTWISE);
    fn name(&self) -> &str {
        "LEN"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        text_map(args, |s| Value::Number(s.chars().count() as f64))
    }
}

#[derive(Debug)]
pub struct UpperFn;

impl Function for UpperFn {
    func_caps!(PURE, ELEMENTWISE);
    fn name(&self) -> &str {
        "UPPER"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        text_map(args, |s| Value::Text(s.to_uppercase()))
    }
}

#[derive(Debug)]
pub struct LowerFn;

impl Function for LowerFn {
    func_caps!(PURE, ELEMENTWISE);
    fn name(&self) -> &str {
        "LOWER"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        text_map(args, |s| Value::Text(s.to_lowercase()))
    }
}

pub fn register_builtins() {
    register_functions!(ConcatFn, LenFn, UpperFn, LowerFn);
}
