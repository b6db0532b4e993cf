use super::common::{SHEET1, SHEET2, addr, engine, get, set};
use crate::engine::{EditError, NameScope};
use sheetcalc_common::{ErrorKind, Value};

#[test]
fn test_reference_to_missing_sheet_binds_when_sheet_is_added() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "C1", "=Sheet3!A1+1");
    assert_eq!(get(&engine, SHEET1, "C1"), Value::Error(ErrorKind::Ref));
    assert_eq!(engine.get_cell_formula(SHEET1, 0, 2), Some("=Sheet3!A1+1"));

    let sheet3 = engine.add_sheet("sheet3").unwrap();
    assert_eq!(get(&engine, SHEET1, "C1"), Value::Number(1.0));

    set(&mut engine, sheet3, "A1", "41");
    assert_eq!(get(&engine, SHEET1, "C1"), Value::Number(42.0));
}

#[test]
fn test_removing_a_sheet_turns_references_into_ref_errors() {
    let mut engine = engine();
    set(&mut engine, SHEET2, "A1", "100");
    set(&mut engine, SHEET1, "C1", "=Sheet2!A1*2");
    set(&mut engine, SHEET1, "C2", "=SUM(Sheet2!A1:A4)");
    set(&mut engine, SHEET1, "C3", "=C1+1");

    let report = engine.remove_sheet(SHEET2).unwrap();
    assert!(report.is_ok());
    for cell in ["C1", "C2", "C3"] {
        assert_eq!(get(&engine, SHEET1, cell), Value::Error(ErrorKind::Ref), "{cell}");
    }
    assert!(engine.sheet_id("Sheet2").is_none());
    assert_eq!(engine.get_cell_value(SHEET2, 0, 0), Value::Empty);
    assert!(matches!(
        engine.set_cell_input(SHEET2, 0, 0, "1"),
        Err(EditError::UnknownSheet(SHEET2))
    ));
    assert!(engine.graph().dependents_of(&addr(SHEET2, "A1")).is_empty());
}

#[test]
fn test_re_adding_a_removed_sheet_name_heals_references() {
    let mut engine = engine();
    set(&mut engine, SHEET2, "A1", "100");
    set(&mut engine, SHEET1, "C1", "=Sheet2!A1*2");
    engine.remove_sheet(SHEET2).unwrap();

    let again = engine.add_sheet("Sheet2").unwrap();
    assert_ne!(again, SHEET2);
    assert_eq!(get(&engine, SHEET1, "C1"), Value::Number(0.0));
    set(&mut engine, again, "A1", "5");
    assert_eq!(get(&engine, SHEET1, "C1"), Value::Number(10.0));
}

#[test]
fn test_removing_a_sheet_breaks_names_that_point_at_it() {
    let mut engine = engine();
    set(&mut engine, SHEET2, "A1", "3");
    engine
        .define_name("Data", NameScope::Workbook, "Sheet2!A1")
        .unwrap();
    engine
        .define_name("Local", NameScope::Sheet(SHEET2), "A1")
        .unwrap();
    set(&mut engine, SHEET1, "B1", "=Data+1");
    assert_eq!(get(&engine, SHEET1, "B1"), Value::Number(4.0));

    engine.remove_sheet(SHEET2).unwrap();
    assert_eq!(get(&engine, SHEET1, "B1"), Value::Error(ErrorKind::Ref));
    assert!(engine.named_range("Local", SHEET2).is_none());
}

#[test]
fn test_removing_a_sheet_clears_cycles_through_it() {
    let mut engine = engine();
    set(&mut engine, SHEET1, "A1", "=Sheet2!A1");
    set(&mut engine, SHEET2, "A1", "=Sheet1!A1");
    assert_eq!(engine.circular_cells().len(), 2);

    engine.remove_sheet(SHEET2).unwrap();
    assert!(engine.circular_cells().is_empty());
    assert_eq!(get(&engine, SHEET1, "A1"), Value::Error(ErrorKind::Ref));
}

#[test]
fn test_sheet_name_rules() {
    let mut engine = engine();
    assert_eq!(
        engine.add_sheet("SHEET1"),
        Err(EditError::DuplicateSheet("SHEET1".to_string()))
    );
    for bad in ["", "   ", "a:b", "x[1]", "'quoted'"] {
        assert_eq!(
            engine.add_sheet(bad),
            Err(EditError::InvalidName(bad.to_string())),
            "{bad:?}"
        );
    }
    assert!(matches!(
        engine.remove_sheet(42),
        Err(EditError::UnknownSheet(42))
    ));
    let names: Vec<&str> = engine.sheets().map(|(_, n)| n).collect();
    assert_eq!(names, vec!["Sheet1", "Sheet2"]);
    assert_eq!(engine.sheet_name(SHEET2), Some("Sheet2"));
}
