use std::sync::Arc;
use std::thread;

use sheetcalc_workbook::{EditOutcome, Value, Workbook, WorkbookConfig, WorkbookError, WorkbookRegistry};

#[test]
fn queued_edits_apply_in_arrival_order() {
    let wb = Workbook::new(WorkbookConfig::default()).unwrap();
    let a = wb.submit("Sheet1", 1, 1, "1").unwrap();
    let b = wb.submit("Sheet1", 1, 2, "=A1*10").unwrap();
    let c = wb.submit("Sheet1", 1, 1, "2").unwrap();
    assert!(a < b && b < c);
    assert_eq!(wb.get_cell_value("Sheet1", 1, 2), Value::Empty);

    let outcomes = wb.flush().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], (a, EditOutcome::Superseded { by: c }));
    assert!(matches!(outcomes[1], (seq, EditOutcome::Applied(_)) if seq == b));
    assert!(matches!(outcomes[2], (seq, EditOutcome::Applied(_)) if seq == c));
    assert_eq!(wb.get_cell_value("Sheet1", 1, 2), Value::Number(20.0));
}

#[test]
fn rejected_queued_edit_does_not_stop_the_batch() {
    let wb = Workbook::new(WorkbookConfig::default()).unwrap();
    wb.submit("Sheet1", 1, 1, "=(").unwrap();
    wb.submit("Sheet1", 2, 1, "5").unwrap();
    let outcomes = wb.flush().unwrap();
    assert!(matches!(outcomes[0].1, EditOutcome::Rejected(WorkbookError::Edit(_))));
    assert!(matches!(outcomes[1].1, EditOutcome::Applied(_)));
    assert_eq!(wb.get_cell_value("Sheet1", 2, 1), Value::Number(5.0));
}

#[test]
fn queued_rejection_drained_by_another_writer_does_not_leak() {
    let wb = Workbook::new(WorkbookConfig::default()).unwrap();
    wb.submit("Sheet1", 1, 1, "=(").unwrap();
    wb.submit("Nowhere", 1, 1, "1").unwrap();
    let report = wb.set_cell_input("Sheet1", 2, 1, "=1+1").unwrap();
    assert!(report.is_ok());
    assert_eq!(wb.get_cell_value("Sheet1", 2, 1), Value::Number(2.0));
    assert_eq!(wb.get_cell_value("Sheet1", 1, 1), Value::Empty);
    assert!(wb.flush().unwrap().is_empty());
}

#[test]
fn concurrent_writers_on_distinct_cells() {
    let wb = Arc::new(Workbook::new(WorkbookConfig::default()).unwrap());
    wb.set_cell_input("Sheet1", 1, 2, "=SUM(A1:A8)").unwrap();

    let handles: Vec<_> = (1..=8u32)
        .map(|row| {
            let wb = Arc::clone(&wb);
            thread::spawn(move || {
                for v in 1..=row {
                    wb.set_cell_input("Sheet1", row, 1, &v.to_string()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    // Each row ends at its own index: 1 + 2 + ... + 8.
    assert_eq!(wb.get_cell_value("Sheet1", 1, 2), Value::Number(36.0));
}

#[test]
fn concurrent_writers_on_one_cell_keep_the_newest() {
    let wb = Arc::new(Workbook::new(WorkbookConfig::default()).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let wb = Arc::clone(&wb);
            thread::spawn(move || {
                let mut last_applied = None;
                for i in 0..25 {
                    match wb.set_cell_input("Sheet1", 1, 1, &format!("{}", t * 100 + i)) {
                        Ok(_) => last_applied = Some(t * 100 + i),
                        Err(WorkbookError::Superseded { seq, by }) => assert!(by > seq),
                        Err(e) => panic!("{e}"),
                    }
                }
                last_applied
            })
        })
        .collect();
    let finals: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let last = wb.submit("Sheet1", 1, 2, "=A1").unwrap();
    let outcomes = wb.flush().unwrap();
    assert_eq!(outcomes.last().map(|(seq, _)| *seq), Some(last));
    let Value::Number(n) = wb.get_cell_value("Sheet1", 1, 1) else {
        panic!("A1 should be numeric");
    };
    assert!(finals.iter().flatten().any(|v| f64::from(*v) == n));
    assert_eq!(wb.get_cell_value("Sheet1", 1, 2), Value::Number(n));
}

#[test]
fn readers_run_alongside_writers() {
    let wb = Arc::new(Workbook::new(WorkbookConfig::default()).unwrap());
    wb.set_cell_input("Sheet1", 1, 1, "0").unwrap();
    wb.set_cell_input("Sheet1", 1, 2, "=A1*2").unwrap();

    let writer = {
        let wb = Arc::clone(&wb);
        thread::spawn(move || {
            for i in 1..=50 {
                wb.set_cell_input("Sheet1", 1, 1, &i.to_string()).unwrap();
            }
        })
    };
    let reader = {
        let wb = Arc::clone(&wb);
        thread::spawn(move || {
            for _ in 0..200 {
                // B1 is committed together with A1, so it is always even.
                if let Value::Number(n) = wb.get_cell_value("Sheet1", 1, 2) {
                    assert_eq!(n % 2.0, 0.0);
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(wb.get_cell_value("Sheet1", 1, 2), Value::Number(100.0));
}

#[test]
fn registry_keeps_workbooks_independent() {
    let registry = WorkbookRegistry::new();
    let (a, book_a) = registry.open(WorkbookConfig::default()).unwrap();
    let (b, book_b) = registry.open(WorkbookConfig::default()).unwrap();
    assert_ne!(a, b);
    assert_eq!(registry.ids(), vec![a, b]);

    book_a.set_cell_input("Sheet1", 1, 1, "1").unwrap();
    book_b.set_cell_input("Sheet1", 1, 1, "2").unwrap();
    assert_eq!(
        registry.get(a).unwrap().get_cell_value("Sheet1", 1, 1),
        Value::Number(1.0)
    );

    registry.close(a).unwrap();
    assert!(registry.get(a).is_none());
    assert_eq!(registry.len(), 1);
    assert!(book_a.is_closed());
    assert_eq!(
        book_a.set_cell_input("Sheet1", 1, 1, "3"),
        Err(WorkbookError::Closed)
    );
    assert_eq!(registry.close(a), Err(WorkbookError::UnknownWorkbook(a)));
    assert_eq!(book_b.get_cell_value("Sheet1", 1, 1), Value::Number(2.0));
}
