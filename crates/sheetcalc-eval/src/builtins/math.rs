use super::utils::{collect_numbers, for_each_value, map_elements, round_to_precision};
use crate::coercion::to_number;
use crate::engine::InternalFault;
use crate::function::Function;
use crate::interpreter::finite;
use crate::traits::{ArgumentHandle, EvaluationContext};
use crate::{func_caps, register_functions};
use sheetcalc_common::{ErrorKind, Value};
use std::ops::ControlFlow;

/// Unwrap the numbers of a reduction or return its error value.
macro_rules! numbers_or_error {
    ($args:expr) => {
        match collect_numbers($args)? {
            Ok(nums) => nums,
            Err(e) => return Ok(Value::Error(e)),
        }
    };
}

/* ─────────────────────────── SUM() ──────────────────────────────── */

#[derive(Debug)]
pub struct SumFn;

/// Adds all numbers in the arguments.
///
/// # Remarks
/// - Text, booleans and blanks inside ranges are ignored.
/// - Direct text arguments must be numeric or the result is `#VALUE!`.
/// - The first error met propagates.
impl Function for SumFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);
    fn name(&self) -> &str {
        "SUM"
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
        let nums = numbers_or_error!(args);
        Ok(finite(Ok(nums.iter().sum())))
    }
}

/* ─────────────────────────── AVERAGE() ──────────────────────────── */

#[derive(Debug)]
pub struct AverageFn;

/// Arithmetic mean of the numeric inputs; `#DIV/0!` when there are none.
impl Function for AverageFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);
    fn name(&self) -> &str {
        "AVERAGE"
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
        let nums = numbers_or_error!(args);
        if nums.is_empty() {
            return Ok(Value::Error(ErrorKind::DivByZero));
        }
        Ok(finite(Ok(nums.iter().sum::<f64>() / nums.len() as f64)))
    }
}

/* ─────────────────────────── COUNT() ────────────────────────────── */

#[derive(Debug)]
pub struct CountFn;

/// Counts numeric inputs. Error values are not counted and do not propagate.
impl Function for CountFn {
    func_caps!(PURE, REDUCTION);
    fn name(&self) -> &str {
        "COUNT"
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
        let mut count = 0usize;
        for_each_value(args, |v, lenient| {
            let numeric = match v {
                Value::Number(_) | Value::Date(_) => true,
                Value::Error(_) | Value::Empty => false,
                _ if lenient => false,
                other => to_number(other).is_ok(),
            };
            if numeric {
                count += 1;
            }
            ControlFlow::Continue(())
        })?;
        Ok(Value::Number(count as f64))
    }
}

/* ─────────────────────────── COUNTA() ───────────────────────────── */

#[derive(Debug)]
pub struct CountAFn;

/// Counts non-blank inputs, errors included.
impl Function for CountAFn {
    func_caps!(PURE, REDUCTION);
    fn name(&self) -> &str {
        "COUNTA"
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
        let mut count = 0usize;
        for_each_value(args, |v, _| {
            if !matches!(v, Value::Empty) {
                count += 1;
            }
            ControlFlow::Continue(())
        })?;
        Ok(Value::Number(count as f64))
    }
}

/* ─────────────────────────── MIN() / MAX() ──────────────────────── */

#[derive(Debug)]
pub struct MinFn;

/// Smallest numeric input, or `0` when there are none.
impl Function for MinFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);
    fn name(&self) -> &str {
        "MIN"
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
        let nums = numbers_or_error!(args);
        Ok(Value::Number(
            nums.into_iter().reduce(f64::min).unwrap_or(0.0),
        ))
    }
}

#[derive(Debug)]
pub struct MaxFn;

/// Largest numeric input, or `0` when there are none.
impl Function for MaxFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);
    fn name(&self) -> &str {
        "MAX"
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
        let nums = numbers_or_error!(args);
        Ok(Value::Number(
            nums.into_iter().reduce(f64::max).unwrap_or(0.0),
        ))
    }
}

/* ─────────────────────────── PRODUCT() ──────────────────────────── */

#[derive(Debug)]
pub struct ProductFn;

impl Function for ProductFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);
    fn name(&self) -> &str {
        "PRODUCT"
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
        let nums = numbers_or_error!(args);
        if nums.is_empty() {
            return Ok(Value::Number(0.0));
        }
        Ok(finite(Ok(nums.iter().product())))
    }
}

/* ─────────────────────────── ABS() ──────────────────────────────── */

#[derive(Debug)]
pub struct AbsFn;

impl Function for AbsFn {
    func_caps!(PURE, ELEMENTWISE, NUMERIC_ONLY);
    fn name(&self) -> &str {
        "ABS"
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
        Ok(map_elements(&v, |x| finite(to_number(x).map(f64::abs))))
    }
}

/* ─────────────────────────── ROUND() ────────────────────────────── */

#[derive(Debug)]
pub struct RoundFn;

/// `ROUND(number, digits)`, half away from zero. Negative `digits` round
/// to tens, hundreds and so on.
impl Function for RoundFn {
    func_caps!(PURE, ELEMENTWISE, NUMERIC_ONLY);
    fn name(&self) -> &str {
        "ROUND"
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
        let digits = match to_number(&*args[1].value()?) {
            Ok(d) => d.trunc() as i32,
            Err(e) => return Ok(Value::Error(e)),
        };
        Ok(map_elements(&v, |x| {
            finite(to_number(x).map(|n| round_to_precision(n, digits)))
        }))
    }
}

pub fn register_builtins() {
    register_functions!(
        SumFn, AverageFn, CountFn, CountAFn, MinFn, MaxFn, ProductFn, AbsFn, RoundFn
    );
}
