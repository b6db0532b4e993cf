use crate::coercion::to_number;
use crate::engine::InternalFault;
use crate::traits::ArgumentHandle;
use sheetcalc_common::{ErrorKind, Value};
use std::ops::ControlFlow;

/// Walk every input value of a variadic function in argument order.
///
/// Array elements and values read through a reference are passed with
/// `lenient = true`; direct scalar arguments with `false`. The walk stops at
/// the first `Break`.
pub(crate) fn for_each_value<'a, 'b>(
    args: &'a [ArgumentHandle<'a, 'b>],
    mut f: impl FnMut(&Value, bool) -> ControlFlow<ErrorKind>,
) -> Result<ControlFlow<ErrorKind>, InternalFault> {
    for arg in args {
        let v = arg.value()?;
        let lenient = arg.is_reference();
        match v.as_ref() {
            Value::Array(rows) => {
                for x in rows.iter().flatten() {
                    if let ControlFlow::Break(e) = f(x, true) {
                        return Ok(ControlFlow::Break(e));
                    }
                }
            }
            scalar => {
                if let ControlFlow::Break(e) = f(scalar, lenient) {
                    return Ok(ControlFlow::Break(e));
                }
            }
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// Numeric inputs of a reduction, or the first error met.
///
/// Text, booleans and blanks inside ranges and arrays are skipped; direct
/// scalar arguments are coerced and fail with `#VALUE!` when they cannot be.
pub(crate) fn collect_numbers<'a, 'b>(
    args: &'a [ArgumentHandle<'a, 'b>],
) -> Result<Result<Vec<f64>, ErrorKind>, InternalFault> {
    let mut nums = Vec::new();
    let flow = for_each_value(args, |v, lenient| {
        match v {
            Value::Error(e) => return ControlFlow::Break(*e),
            Value::Number(n) => nums.push(*n),
            Value::Date(d) => nums.push(*d as f64),
            _ if lenient => {}
            other => match to_number(other) {
                Ok(n) => nums.push(n),
                Err(e) => return ControlFlow::Break(e),
            },
        }
        ControlFlow::Continue(())
    })?;
    Ok(match flow {
        ControlFlow::Continue(()) => Ok(nums),
        ControlFlow::Break(e) => Err(e),
    })
}

/// Apply a scalar function to a value, element-wise over arrays.
pub(crate) fn map_elements(v: &Value, f: impl Fn(&Value) -> Value) -> Value {
    match v {
        Value::Array(rows) => Value::Array(
            rows.iter()
                .map(|row| row.iter().map(&f).collect())
                .collect(),
        ),
        scalar => f(scalar),
    }
}

/// Digits past this are below f64 resolution for any rounded value.
const MAX_ROUND_DIGITS: i32 = 15;

/// Round half away from zero. Negative `digits` round to the left of the
/// decimal point.
pub(crate) fn round_to_precision(n: f64, digits: i32) -> f64 {
    if digits >= 0 {
        if digits > MAX_ROUND_DIGITS {
            return n;
        }
        let factor = 10f64.powi(digits);
        let scaled = n * factor;
        if !scaled.is_finite() {
            return n;
        }
        scaled.round() / factor
    } else {
        let factor = 10f64.powi(digits.saturating_neg());
        if !factor.is_finite() {
            return 0.0;
        }
        (n / factor).round() * factor
    }
}
