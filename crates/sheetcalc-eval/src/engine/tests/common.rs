//! Common test helpers
use crate::engine::{EvalConfig, RecalcReport};
use crate::Engine;
use sheetcalc_common::{CellAddress, SheetId, Value, column_to_number};

pub const SHEET1: SheetId = 0;
pub const SHEET2: SheetId = 1;

/// Engine with `Sheet1` and `Sheet2`.
pub fn engine() -> Engine {
    engine_with(EvalConfig::default())
}

pub fn engine_with(config: EvalConfig) -> Engine {
    let mut engine = Engine::new(config);
    engine.add_sheet("Sheet1").unwrap();
    engine.add_sheet("Sheet2").unwrap();
    engine
}

/// `"B3"` -> `(row 2, col 1)`.
pub fn a1(text: &str) -> (u32, u32) {
    let split = text
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or_else(|| panic!("no row in {text}"));
    let (letters, digits) = text.split_at(split);
    let col = column_to_number(letters).unwrap();
    let row: u32 = digits.parse().unwrap();
    (row - 1, col - 1)
}

pub fn addr(sheet: SheetId, text: &str) -> CellAddress {
    let (row, col) = a1(text);
    CellAddress::new(sheet, row, col)
}

pub fn set(engine: &mut Engine, sheet: SheetId, cell: &str, raw: &str) -> RecalcReport {
    let (row, col) = a1(cell);
    let report = engine
        .set_cell_input(sheet, row, col, raw)
        .unwrap_or_else(|e| panic!("{cell} <- {raw}: {e}"));
    assert!(report.fatal.is_none(), "{cell} <- {raw}: {:?}", report.fatal);
    report
}

pub fn get(engine: &Engine, sheet: SheetId, cell: &str) -> Value {
    let (row, col) = a1(cell);
    engine.get_cell_value(sheet, row, col)
}
