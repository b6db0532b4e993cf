//! Cycle detection, error inheritance and healing.
use super::common::{SHEET1, SHEET2, addr, engine, get, set};
use sheetcalc_common::{ErrorKind, Value};

const CIRCULAR: Value = Value::Error(ErrorKind::CircularReference);

#[test]
fn test_two_cell_cycle() {
    let mut engine = engine();
    let first = set(&mut engine, SHEET1, "E1", "=E2");
    assert!(first.cycle.is_none());

    let report = set(&mut engine, SHEET1, "E2", "=E1");
    let cycle = report.cycle.expect("cycle reported");
    assert_eq!(cycle.cycle, vec![addr(SHEET1, "E2"), addr(SHEET1, "E1")]);

    assert_eq!(get(&engine, SHEET1, "E1"), CIRCULAR);
    assert_eq!(get(&engine, SHEET1, "E2"), CIRCULAR);
    assert_eq!(
        engine.circular_cells(),
        vec![addr(SHEET1, "E1"), addr(SHEET1, "E2")]
    );
    assert!(report.fatal.is_none());
    assert_eq!(report.errors.len(), 2);
}

#[test]
fn test_cycle_message_names_the_path() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "A1", "=A2");
    let report = set(&mut engine, SHEET1, "A2", "=A1");
    let message = report.cycle.unwrap().to_string();
    assert!(message.starts_with("Circular reference detected"), "{message}");
    assert!(message.contains("A1") && message.contains("A2"), "{message}");
}

#[test]
fn test_self_reference_is_a_cycle_of_one() {
    let mut engine = engine();
    let report = set(&mut engine, SHEET1, "A1", "=A1+1");
    assert_eq!(report.cycle.unwrap().cycle, vec![addr(SHEET1, "A1")]);
    assert_eq!(get(&engine, SHEET1, "A1"), CIRCULAR);
}

#[test]
fn test_cycle_through_a_range() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "B1", "=SUM(B2:B3)");
    let report = set(&mut engine, SHEET1, "B3", "=B1*2");
    assert!(report.cycle.is_some());
    assert_eq!(get(&engine, SHEET1, "B1"), CIRCULAR);
    assert_eq!(get(&engine, SHEET1, "B3"), CIRCULAR);
}

#[test]
fn test_cycle_across_sheets() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "A1", "=Sheet2!A1");
    let report = set(&mut engine, SHEET2, "A1", "=Sheet1!A1+1");
    assert!(report.cycle.is_some());
    assert_eq!(get(&engine, SHEET1, "A1"), CIRCULAR);
    assert_eq!(get(&engine, SHEET2, "A1"), CIRCULAR);
}

#[test]
fn test_dependents_inherit_the_propagated_error() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "E3", "=E1+1");
    set(&mut engine, SHEET1, "E1", "=E2");
    set(&mut engine, SHEET1, "E2", "=E1");

    assert_eq!(get(&engine, SHEET1, "E3"), CIRCULAR);
    assert!(!engine.circular_cells().contains(&addr(SHEET1, "E3")));
    assert!(
        engine
            .graph()
            .precedents_of(&addr(SHEET1, "E3"))
            .is_some_and(|p| p.cells.contains(&addr(SHEET1, "E1")))
    );
}

#[test]
fn test_breaking_the_cycle_heals_every_member() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "E1", "=E2");
    set(&mut engine, SHEET1, "E2", "=E1");
    set(&mut engine, SHEET1, "E3", "=E1+1");

    let report = set(&mut engine, SHEET1, "E2", "5");
    assert!(report.cycle.is_none());
    assert!(report.errors.is_empty());
    assert!(engine.circular_cells().is_empty());
    assert_eq!(get(&engine, SHEET1, "E1"), Value::Number(5.0));
    assert_eq!(get(&engine, SHEET1, "E3"), Value::Number(6.0));
}

#[test]
fn test_rejected_cell_rejoins_graph_once_cycle_is_broken_elsewhere() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "A1", "=B1");
    set(&mut engine, SHEET1, "B1", "=A1+1");
    assert_eq!(get(&engine, SHEET1, "B1"), CIRCULAR);

    // A1 stops reading B1, so B1's formula is acyclic again.
    set(&mut engine, SHEET1, "A1", "3");
    assert!(engine.circular_cells().is_empty());
    assert_eq!(get(&engine, SHEET1, "B1"), Value::Number(4.0));

    set(&mut engine, SHEET1, "A1", "10");
    assert_eq!(get(&engine, SHEET1, "B1"), Value::Number(11.0));
}

#[test]
fn test_unrelated_edits_keep_cycle_reported() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "E1", "=E2");
    set(&mut engine, SHEET1, "E2", "=E1");
    let report = set(&mut engine, SHEET1, "Z9", "1");
    assert!(report.cycle.is_none());
    assert_eq!(get(&engine, SHEET1, "E1"), CIRCULAR);
    assert_eq!(engine.circular_cells().len(), 2);
}
