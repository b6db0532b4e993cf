use std::sync::Arc;

use crate::engine::InternalFault;
use crate::func_caps;
use crate::function::Function;
use crate::test_workbook::TestWorkbook;
use crate::traits::{ArgumentHandle, EvaluationContext};
use sheetcalc_common::{CellAddress, ErrorKind, Value};

fn eval(wb: &TestWorkbook, formula: &str) -> Value {
    match wb.eval(formula) {
        Ok(v) => v,
        Err(e) => panic!("{formula}: {e:?}"),
    }
}

fn num(n: f64) -> Value {
    Value::Number(n)
}

/// A1..A4 = 1, "two", 3, TRUE; B1..B3 = 4, 5, 6; C1 = #N/A.
fn sample() -> TestWorkbook {
    TestWorkbook::new()
        .with_cell(0, 1, 1, 1.0)
        .with_cell(0, 2, 1, "two")
        .with_cell(0, 3, 1, 3.0)
        .with_cell(0, 4, 1, true)
        .with_cell(0, 1, 2, 4.0)
        .with_cell(0, 2, 2, 5.0)
        .with_cell(0, 3, 2, 6.0)
        .with_cell(0, 1, 3, Value::Error(ErrorKind::Na))
}

#[test]
fn test_sum_skips_non_numbers_in_ranges_only() {
    let wb = sample();
    assert_eq!(eval(&wb, "=SUM(A1:A4)"), num(4.0));
    assert_eq!(eval(&wb, "=SUM(A2)"), num(0.0));
    assert_eq!(eval(&wb, "=SUM(1,\"2\",TRUE)"), num(4.0));
    assert_eq!(eval(&wb, "=SUM(1,\"x\")"), Value::Error(ErrorKind::Value));
    assert_eq!(eval(&wb, "=SUM(B1:C3)"), Value::Error(ErrorKind::Na));
}

#[test]
fn test_sum_times_average() {
    let wb = TestWorkbook::new()
        .with_cell(0, 1, 1, 1.0)
        .with_cell(0, 2, 1, 2.0)
        .with_cell(0, 3, 1, 3.0)
        .with_cell(0, 4, 1, 4.0)
        .with_cell(0, 5, 1, 5.0)
        .with_cell(0, 1, 2, 2.0)
        .with_cell(0, 2, 2, 4.0)
        .with_cell(0, 3, 2, 6.0);
    assert_eq!(eval(&wb, "=SUM(A1:A5) * AVERAGE(B1:B3)"), num(60.0));
    assert_eq!(eval(&wb, "=SUM(A1:A5*2)"), num(30.0));
}

#[test]
fn test_average_and_extrema() {
    let wb = sample();
    assert_eq!(eval(&wb, "=AVERAGE(B1:B3)"), num(5.0));
    assert_eq!(eval(&wb, "=AVERAGE(D1:D9)"), Value::Error(ErrorKind::DivByZero));
    assert_eq!(eval(&wb, "=MIN(A1:B3)"), num(1.0));
    assert_eq!(eval(&wb, "=MAX(A1:B3, 10)"), num(10.0));
    assert_eq!(eval(&wb, "=MIN(D1:D3)"), num(0.0));
    assert_eq!(eval(&wb, "=MAX(A2)"), num(0.0));
    assert_eq!(eval(&wb, "=PRODUCT(B1:B3)"), num(120.0));
}

#[test]
fn test_counting() {
    let wb = sample();
    assert_eq!(eval(&wb, "=COUNT(A1:A4)"), num(2.0));
    assert_eq!(eval(&wb, "=COUNT(A1:C1)"), num(2.0));
    assert_eq!(eval(&wb, "=COUNT(1,\"2\",\"x\")"), num(2.0));
    assert_eq!(eval(&wb, "=COUNTA(A1:A9)"), num(4.0));
    assert_eq!(eval(&wb, "=COUNTA(C1)"), num(1.0));
}

#[test]
fn test_abs_and_round() {
    let wb = sample();
    assert_eq!(eval(&wb, "=ABS(-3)"), num(3.0));
    assert_eq!(eval(&wb, "=ABS(\"x\")"), Value::Error(ErrorKind::Value));
    assert_eq!(eval(&wb, "=ROUND(1.25,1)"), num(1.3));
    assert_eq!(eval(&wb, "=ROUND(-1.5,0)"), num(-2.0));
    assert_eq!(eval(&wb, "=ROUND(1234,-2)"), num(1200.0));
    assert_eq!(eval(&wb, "=ROUND(1.5,400)"), num(1.5));
    assert_eq!(eval(&wb, "=ROUND(1234,-400)"), num(0.0));
    assert_eq!(
        eval(&wb, "=ABS(B1:B2*-1)"),
        Value::Array(vec![vec![num(4.0)], vec![num(5.0)]])
    );
}

#[derive(Debug)]
struct FaultFn;

impl Function for FaultFn {
    func_caps!(PURE);
    fn name(&self) -> &str {
        "FAULT"
    }
    fn eval_scalar<'a, 'b>(
        &self,
        _args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault> {
        Err(InternalFault::Reentered {
            cell: CellAddress::new(0, 0, 0),
        })
    }
}

#[test]
fn test_if_evaluates_only_the_selected_branch() {
    let wb = sample().with_function(Arc::new(FaultFn));
    assert_eq!(eval(&wb, "=IF(TRUE,1,FAULT())"), num(1.0));
    assert_eq!(eval(&wb, "=IF(A1>2,FAULT(),\"small\")"), Value::Text("small".into()));
    assert_eq!(eval(&wb, "=IF(FALSE,1)"), Value::Boolean(false));
    assert_eq!(eval(&wb, "=IF(\"maybe\",1,2)"), Value::Error(ErrorKind::Value));
    assert_eq!(eval(&wb, "=IF(C1,1,2)"), Value::Error(ErrorKind::Na));
    assert!(wb.eval("=IF(FALSE,1,FAULT())").is_err());
}

#[test]
fn test_logical_functions() {
    let wb = sample();
    assert_eq!(eval(&wb, "=AND(TRUE,1)"), Value::Boolean(true));
    assert_eq!(eval(&wb, "=AND(A1:A4)"), Value::Boolean(true));
    assert_eq!(eval(&wb, "=OR(FALSE,0)"), Value::Boolean(false));
    assert_eq!(eval(&wb, "=OR(A2,D1)"), Value::Error(ErrorKind::Value));
    assert_eq!(eval(&wb, "=AND(1,C1)"), Value::Error(ErrorKind::Na));
    assert_eq!(eval(&wb, "=NOT(0)"), Value::Boolean(true));
}

#[test]
fn test_error_handling_functions() {
    let wb = sample();
    assert_eq!(eval(&wb, "=IFERROR(1/0,\"alt\")"), Value::Text("alt".into()));
    assert_eq!(eval(&wb, "=IFERROR(7,1/0)"), num(7.0));
    assert_eq!(eval(&wb, "=ISERROR(C1)"), Value::Boolean(true));
    assert_eq!(eval(&wb, "=ISERROR(A2)"), Value::Boolean(false));
}

#[test]
fn test_text_functions() {
    let wb = sample();
    assert_eq!(eval(&wb, "=CONCAT(\"a\",A1:A2,TRUE)"), Value::Text("a1twoTRUE".into()));
    assert_eq!(eval(&wb, "=CONCAT(A1,C1)"), Value::Error(ErrorKind::Na));
    assert_eq!(eval(&wb, "=LEN(\"héllo\")"), num(5.0));
    assert_eq!(eval(&wb, "=LEN(123.5)"), num(5.0));
    assert_eq!(eval(&wb, "=UPPER(\"MiXed\")"), Value::Text("MIXED".into()));
    assert_eq!(eval(&wb, "=LOWER(A2)"), Value::Text("two".into()));
}
