use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use sheetcalc_common::{CellAddress, ErrorKind, SheetId, Value};
use sheetcalc_eval::{Engine, Function, FunctionInfo, NameScope, RecalcReport};

use crate::config::WorkbookConfig;
use crate::error::WorkbookError;
use crate::queue::{EditOutcome, EditQueue, PendingEdit};

/// One workbook: an engine behind a read/write lock plus its edit queue.
///
/// Rows and columns are 1-based, as in A1 text. Reads take the read lock and
/// see committed values only; queued edits become visible once a writer
/// drains the queue. Every method that takes the write lock drains pending
/// edits first, so mutations are applied in arrival order.
pub struct Workbook {
    engine: RwLock<Engine>,
    queue: EditQueue,
    closed: AtomicBool,
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook")
            .field("pending", &self.queue.pending_len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Workbook {
    pub fn new(config: WorkbookConfig) -> Result<Self, WorkbookError> {
        let mut engine = Engine::new(config.eval);
        for name in &config.initial_sheets {
            engine.add_sheet(name)?;
        }
        Ok(Self {
            engine: RwLock::new(engine),
            queue: EditQueue::new(),
            closed: AtomicBool::new(false),
        })
    }

    /* ─────────────── lifecycle ─────────────── */

    /// Refuse further mutations. Pending edits are discarded.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _dropped = self.queue.drain().len();
            #[cfg(feature = "tracing")]
            tracing::debug!(dropped = _dropped, "workbook closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), WorkbookError> {
        if self.is_closed() {
            Err(WorkbookError::Closed)
        } else {
            Ok(())
        }
    }

    /* ─────────────── edits ─────────────── */

    /// Queue an edit without applying it. Returns its sequence number.
    pub fn submit(&self, sheet: &str, row: u32, col: u32, raw: &str) -> Result<u64, WorkbookError> {
        self.ensure_open()?;
        Ok(self.queue.push(sheet, row, col, raw))
    }

    /// Apply every queued edit. Returns the outcome of each, in order.
    pub fn flush(&self) -> Result<Vec<(u64, EditOutcome)>, WorkbookError> {
        self.ensure_open()?;
        let mut engine = self.engine.write();
        Ok(self.drain_into(&mut engine))
    }

    /// Set one cell and wait for its recalculation.
    ///
    /// If a concurrent edit to the same cell arrived before this one was
    /// applied, this edit is dropped and `WorkbookError::Superseded` names
    /// the edit that won.
    pub fn set_cell_input(
        &self,
        sheet: &str,
        row: u32,
        col: u32,
        raw: &str,
    ) -> Result<RecalcReport, WorkbookError> {
        self.ensure_open()?;
        let seq = self.queue.push_awaited(sheet, row, col, raw);
        {
            let mut engine = self.engine.write();
            self.drain_into(&mut engine);
        }
        match self.queue.take_outcome(seq) {
            Some(EditOutcome::Applied(report)) => Ok(report),
            Some(EditOutcome::Superseded { by }) => Err(WorkbookError::Superseded { seq, by }),
            Some(EditOutcome::Rejected(err)) => Err(err),
            // Only a close() racing this call can discard the edit.
            None => Err(WorkbookError::Closed),
        }
    }

    fn drain_into(&self, engine: &mut Engine) -> Vec<(u64, EditOutcome)> {
        let batch = self.queue.drain();
        let mut out = Vec::with_capacity(batch.len());
        for (edit, superseded_by) in batch {
            let outcome = match superseded_by {
                Some(by) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(seq = edit.seq, by, "edit superseded");
                    EditOutcome::Superseded { by }
                }
                None => match apply(engine, &edit) {
                    Ok(report) => EditOutcome::Applied(report),
                    Err(err) => EditOutcome::Rejected(err),
                },
            };
            if edit.awaited {
                self.queue.record(edit.seq, outcome.clone());
            } else if let EditOutcome::Rejected(_err) = &outcome {
                #[cfg(feature = "tracing")]
                tracing::debug!(seq = edit.seq, error = %_err, "queued edit rejected");
            }
            out.push((edit.seq, outcome));
        }
        out
    }

    /// Run `f` with the write lock held and the queue drained.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Engine) -> Result<R, WorkbookError>,
    ) -> Result<R, WorkbookError> {
        self.ensure_open()?;
        let mut engine = self.engine.write();
        self.drain_into(&mut engine);
        f(&mut engine)
    }

    /// Read-only access to the engine.
    pub fn read<R>(&self, f: impl FnOnce(&Engine) -> R) -> R {
        f(&self.engine.read())
    }

    /* ─────────────── reads ─────────────── */

    pub fn get_cell_value(&self, sheet: &str, row: u32, col: u32) -> Value {
        self.read(|e| match locate(e, sheet, row, col) {
            Ok(c) => e.get_cell_value(c.sheet, c.row, c.col),
            Err(_) => Value::Empty,
        })
    }

    pub fn get_cell_error(&self, sheet: &str, row: u32, col: u32) -> Option<ErrorKind> {
        self.get_cell_value(sheet, row, col).error()
    }

    pub fn get_cell_formula(&self, sheet: &str, row: u32, col: u32) -> Option<String> {
        self.read(|e| {
            let c = locate(e, sheet, row, col).ok()?;
            e.get_cell_formula(c.sheet, c.row, c.col).map(str::to_string)
        })
    }

    /// Cells on a detected cycle as `(sheet, row, col)`, 1-based.
    pub fn circular_cells(&self) -> Vec<(String, u32, u32)> {
        self.read(|e| {
            e.circular_cells()
                .into_iter()
                .filter_map(|c| {
                    let name = e.sheet_name(c.sheet)?;
                    Some((name.to_string(), c.row + 1, c.col + 1))
                })
                .collect()
        })
    }

    /* ─────────────── sheets ─────────────── */

    pub fn sheet_names(&self) -> Vec<String> {
        self.read(|e| e.sheets().map(|(_, n)| n.to_string()).collect())
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.read(|e| e.sheet_id(name).is_some())
    }

    pub fn add_sheet(&self, name: &str) -> Result<(), WorkbookError> {
        self.mutate(|e| {
            e.add_sheet(name)?;
            Ok(())
        })
    }

    pub fn remove_sheet(&self, name: &str) -> Result<RecalcReport, WorkbookError> {
        self.mutate(|e| {
            let id = sheet_id(e, name)?;
            Ok(e.remove_sheet(id)?)
        })
    }

    /* ─────────────── names ─────────────── */

    /// Define a name. `scope` is a sheet name, or `None` for workbook scope.
    pub fn define_name(
        &self,
        name: &str,
        scope: Option<&str>,
        reference: &str,
    ) -> Result<RecalcReport, WorkbookError> {
        self.mutate(|e| {
            let scope = name_scope(e, scope)?;
            Ok(e.define_name(name, scope, reference)?)
        })
    }

    pub fn remove_name(&self, name: &str, scope: Option<&str>) -> Result<RecalcReport, WorkbookError> {
        self.mutate(|e| {
            let scope = name_scope(e, scope)?;
            Ok(e.remove_name(name, scope)?)
        })
    }

    /* ─────────────── functions ─────────────── */

    pub fn register_function(&self, f: Arc<dyn Function>) -> Result<RecalcReport, WorkbookError> {
        self.mutate(|e| Ok(e.register_function(f)))
    }

    pub fn list_functions(&self) -> Vec<FunctionInfo> {
        self.read(Engine::list_functions)
    }

    pub fn recalculate_all(&self) -> Result<RecalcReport, WorkbookError> {
        self.mutate(|e| Ok(e.recalculate_all()))
    }
}

fn sheet_id(engine: &Engine, name: &str) -> Result<SheetId, WorkbookError> {
    engine
        .sheet_id(name)
        .ok_or_else(|| WorkbookError::UnknownSheet(name.to_string()))
}

fn name_scope(engine: &Engine, scope: Option<&str>) -> Result<NameScope, WorkbookError> {
    match scope {
        None => Ok(NameScope::Workbook),
        Some(sheet) => Ok(NameScope::Sheet(sheet_id(engine, sheet)?)),
    }
}

/// 1-based workbook coordinates to an engine address.
fn locate(engine: &Engine, sheet: &str, row: u32, col: u32) -> Result<CellAddress, WorkbookError> {
    let id = sheet_id(engine, sheet)?;
    match (row.checked_sub(1), col.checked_sub(1)) {
        (Some(r), Some(c)) => Ok(CellAddress::new(id, r, c)),
        _ => Err(sheetcalc_eval::EditError::OutOfBounds { row, col }.into()),
    }
}

fn apply(engine: &mut Engine, edit: &PendingEdit) -> Result<RecalcReport, WorkbookError> {
    let cell = locate(engine, &edit.sheet, edit.row, edit.col)?;
    Ok(engine.set_cell_input(cell.sheet, cell.row, cell.col, &edit.raw)?)
}
