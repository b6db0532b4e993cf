use super::EvalConfig;
use super::cell::{Cell, CellState, Formula};
use super::error::{EditError, InternalFault};
use super::graph::{CycleError, DependencyGraph, Precedents};
use super::named_range::{NameScope, NamedRangeTable, is_valid_name};
use super::scheduler::Scheduler;
use super::sheet_registry::{SheetRegistry, is_valid_sheet_name};
use crate::function::{Function, FunctionInfo};
use crate::function_registry;
use crate::interpreter::Interpreter;
use crate::resolver::{NamedTarget, RefError, WorkbookView, bind_reference, resolve};
use crate::traits::EvaluationContext;
use rustc_hash::{FxHashMap, FxHashSet};
use sheetcalc_common::{CellAddress, ErrorKind, SheetId, Value};
use sheetcalc_parse::{ASTNode, ReferenceType};
use std::sync::Arc;

/// Outcome of one recalculation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalcReport {
    /// Cells whose value changed, in evaluation order.
    pub updated_cells: Vec<CellAddress>,
    /// Cells of the pass that ended holding an error value.
    pub errors: Vec<(CellAddress, ErrorKind)>,
    /// Cycle closed by the edit that triggered the pass, if any.
    pub cycle: Option<CycleError>,
    /// Set when the pass was abandoned; nothing was committed.
    pub fatal: Option<InternalFault>,
    /// Epoch after the pass. Unchanged when `fatal` is set.
    pub epoch: u64,
    /// Formula cells actually evaluated.
    pub evaluated: usize,
}

impl RecalcReport {
    pub fn is_ok(&self) -> bool {
        self.fatal.is_none()
    }
}

/// A single workbook's cells, dependency graph and recalculation state.
///
/// Cells live in an arena keyed by address; the graph stores addresses only.
/// Formulas that close a cycle are kept out of the graph ("parked") and
/// retried after every later edit, so that breaking the cycle heals them.
pub struct Engine {
    config: EvalConfig,
    sheets: SheetRegistry,
    cells: FxHashMap<CellAddress, Cell>,
    graph: DependencyGraph,
    names: NamedRangeTable,
    custom_functions: FxHashMap<String, Arc<dyn Function>>,
    /// Rejected precedent sets of formulas that would close a cycle.
    parked: FxHashMap<CellAddress, Precedents>,
    /// Every cell on a currently detected cycle.
    circular: FxHashSet<CellAddress>,
    /// Formulas that failed to bind.
    unbound: FxHashSet<CellAddress>,
    /// Formula cells left dirty by an abandoned pass.
    stale: FxHashSet<CellAddress>,
    epoch: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

struct BindView<'a> {
    sheets: &'a SheetRegistry,
    names: &'a NamedRangeTable,
}

impl WorkbookView for BindView<'_> {
    fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets.get_id(name)
    }

    fn sheet_exists(&self, id: SheetId) -> bool {
        self.sheets.is_live(id)
    }

    fn named_range(&self, name: &str, scope: SheetId) -> Option<NamedTarget> {
        self.names.resolve(name, scope)
    }
}

/// Evaluation context for one pass: staged values shadow committed ones.
struct PassContext<'a> {
    cells: &'a FxHashMap<CellAddress, Cell>,
    staged: &'a FxHashMap<CellAddress, Value>,
    custom: &'a FxHashMap<String, Arc<dyn Function>>,
}

impl EvaluationContext for PassContext<'_> {
    fn cell_value(&self, cell: &CellAddress) -> Result<Value, InternalFault> {
        if let Some(v) = self.staged.get(cell) {
            return Ok(v.clone());
        }
        match self.cells.get(cell) {
            None => Ok(Value::Empty),
            Some(c) => match c.state {
                CellState::Clean => Ok(c.value.clone()),
                CellState::Dirty => Err(InternalFault::UnresolvedPrecedent { cell: *cell }),
                CellState::Computing => Err(InternalFault::Reentered { cell: *cell }),
            },
        }
    }

    fn resolve_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.custom
            .get(&name.to_ascii_uppercase())
            .cloned()
            .or_else(|| function_registry::get(name))
    }
}

/// Upper-cased names referenced anywhere in `ast`, first-seen order.
fn ast_names(ast: &ASTNode) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for reference in ast.references() {
        if let ReferenceType::NamedRange(name) = reference {
            let key = name.to_ascii_uppercase();
            if !names.contains(&key) {
                names.push(key);
            }
        }
    }
    names
}

impl Engine {
    pub fn new(config: EvalConfig) -> Self {
        crate::builtins::load_builtins();
        Self {
            config,
            sheets: SheetRegistry::new(),
            cells: FxHashMap::default(),
            graph: DependencyGraph::new(),
            names: NamedRangeTable::new(),
            custom_functions: FxHashMap::default(),
            parked: FxHashMap::default(),
            circular: FxHashSet::default(),
            unbound: FxHashSet::default(),
            stale: FxHashSet::default(),
            epoch: 0,
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /* ===================  sheets  =================== */

    /// Add a sheet. Formulas that referenced it by name are re-bound.
    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId, EditError> {
        if !is_valid_sheet_name(name) {
            return Err(EditError::InvalidName(name.to_string()));
        }
        let id = self
            .sheets
            .add(name)
            .ok_or_else(|| EditError::DuplicateSheet(name.to_string()))?;
        let mut unbound: Vec<CellAddress> = self.unbound.iter().copied().collect();
        unbound.sort_unstable();
        if !unbound.is_empty() {
            let mut seeds = self.rebind(unbound);
            seeds.extend(self.retry_parked());
            self.recalculate(seeds);
        }
        Ok(id)
    }

    /// Remove a sheet and its cells. References to it become `#REF!`.
    pub fn remove_sheet(&mut self, id: SheetId) -> Result<RecalcReport, EditError> {
        let _name = self.sheets.remove(id).ok_or(EditError::UnknownSheet(id))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(sheet = %_name, "removing sheet");

        let doomed: Vec<CellAddress> = self.cells.keys().filter(|c| c.sheet == id).copied().collect();
        for cell in doomed {
            self.detach(cell);
            self.cells.remove(&cell);
            self.stale.remove(&cell);
        }
        self.names.remove_sheet_scope(id);

        let formulas = self.formula_cells();
        self.rebind(formulas);
        self.retry_parked();
        Ok(self.recalculate_all())
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets.get_id(name)
    }

    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.sheets.name(id)
    }

    pub fn sheets(&self) -> impl Iterator<Item = (SheetId, &str)> {
        self.sheets.sheets()
    }

    /* ===================  names  =================== */

    /// Define a name from reference text such as `Sheet1!$A$1:$A$5`.
    /// Unqualified targets need a sheet scope.
    pub fn define_name(
        &mut self,
        name: &str,
        scope: NameScope,
        reference: &str,
    ) -> Result<RecalcReport, EditError> {
        let text = reference.strip_prefix('=').unwrap_or(reference).trim();
        let parsed = ReferenceType::from_string(text).map_err(|reason| RefError::InvalidRange {
            reference: text.to_string(),
            reason,
        })?;
        let current = match (scope, parsed.sheet()) {
            (NameScope::Sheet(id), _) => id,
            (NameScope::Workbook, Some(sheet)) => self
                .sheets
                .get_id(sheet)
                .ok_or_else(|| RefError::UnknownSheet(sheet.to_string()))?,
            (NameScope::Workbook, None) => {
                return Err(EditError::Ref(RefError::InvalidRange {
                    reference: text.to_string(),
                    reason: "workbook-scoped names need a sheet-qualified target".to_string(),
                }));
            }
        };
        let view = BindView {
            sheets: &self.sheets,
            names: &self.names,
        };
        let target = bind_reference(text, &parsed, current, &view, &self.config)?;
        self.define_name_target(name, scope, target)
    }

    pub fn define_name_target(
        &mut self,
        name: &str,
        scope: NameScope,
        target: NamedTarget,
    ) -> Result<RecalcReport, EditError> {
        if !is_valid_name(name) {
            return Err(EditError::InvalidName(name.to_string()));
        }
        if let NameScope::Sheet(id) = scope {
            if !self.sheets.is_live(id) {
                return Err(EditError::UnknownSheet(id));
            }
        }
        if !self.sheets.is_live(target.sheet()) {
            return Err(EditError::UnknownSheet(target.sheet()));
        }
        self.names.define(name, scope, target);
        #[cfg(feature = "tracing")]
        tracing::debug!(name, ?scope, "defined name");
        Ok(self.rebind_name(name))
    }

    pub fn remove_name(&mut self, name: &str, scope: NameScope) -> Result<RecalcReport, EditError> {
        self.names
            .remove(name, scope)
            .ok_or_else(|| RefError::UnknownName(name.to_string()))?;
        Ok(self.rebind_name(name))
    }

    pub fn named_range(&self, name: &str, sheet: SheetId) -> Option<NamedTarget> {
        self.names.resolve(name, sheet)
    }

    fn rebind_name(&mut self, name: &str) -> RecalcReport {
        let dependents = self.names.dependents_of(name);
        let mut seeds = self.rebind(dependents);
        seeds.extend(self.retry_parked());
        self.recalculate(seeds)
    }

    /* ===================  functions  =================== */

    /// Register a workbook-local function. It shadows a builtin of the same
    /// name, and every formula is recalculated.
    pub fn register_function(&mut self, f: Arc<dyn Function>) -> RecalcReport {
        self.custom_functions
            .insert(f.name().to_ascii_uppercase(), f);
        self.recalculate_all()
    }

    /// Builtin and custom functions, sorted by name.
    pub fn list_functions(&self) -> Vec<FunctionInfo> {
        let mut out: Vec<FunctionInfo> = function_registry::all()
            .iter()
            .filter(|f| {
                !self
                    .custom_functions
                    .contains_key(&f.name().to_ascii_uppercase())
            })
            .map(|f| FunctionInfo::of(f.as_ref(), false))
            .collect();
        out.extend(
            self.custom_functions
                .values()
                .map(|f| FunctionInfo::of(f.as_ref(), true)),
        );
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /* ===================  edits  =================== */

    /// Set a cell from user input and recalculate what depends on it.
    ///
    /// Input starting with `=` is a formula; a parse error rejects the edit
    /// and leaves the cell untouched. Anything else is a literal.
    pub fn set_cell_input(
        &mut self,
        sheet: SheetId,
        row: u32,
        col: u32,
        raw: &str,
    ) -> Result<RecalcReport, EditError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("set_cell_input", sheet, row, col).entered();

        if !self.sheets.is_live(sheet) {
            return Err(EditError::UnknownSheet(sheet));
        }
        if row >= self.config.max_rows || col >= self.config.max_cols {
            return Err(EditError::OutOfBounds { row, col });
        }
        let cell = CellAddress::new(sheet, row, col);

        let mut cycle = None;
        let mut literal_changed = false;
        if raw.starts_with('=') {
            let ast = sheetcalc_parse::parse(raw)?;
            cycle = self.install_formula(cell, raw, ast);
        } else {
            let before = self.cells.get(&cell).map(|c| c.value.clone());
            self.install_literal(cell, raw);
            let after = self.cells.get(&cell).map(|c| &c.value);
            literal_changed = before.as_ref().unwrap_or(&Value::Empty)
                != after.unwrap_or(&Value::Empty);
        }

        let mut seeds = vec![cell];
        seeds.extend(self.retry_parked());
        let mut report = self.recalculate(seeds);
        if literal_changed && report.is_ok() {
            report.updated_cells.insert(0, cell);
        }
        report.cycle = cycle;
        Ok(report)
    }

    fn install_formula(&mut self, cell: CellAddress, raw: &str, ast: ASTNode) -> Option<CycleError> {
        self.detach(cell);
        let names = ast_names(&ast);
        for name in &names {
            self.names.add_dependent(name, cell);
        }
        let previous = self.cells.remove(&cell).map(|c| c.value).unwrap_or_default();
        let formula = Formula {
            text: raw.to_string(),
            ast,
            bound: None,
            bind_error: None,
            names,
        };
        self.cells
            .insert(cell, Cell::formula(raw.to_string(), formula, previous));
        self.bind(cell)
    }

    fn install_literal(&mut self, cell: CellAddress, raw: &str) {
        self.detach(cell);
        let value = Value::parse_literal(raw);
        if matches!(value, Value::Empty) {
            self.cells.remove(&cell);
        } else {
            self.cells
                .insert(cell, Cell::literal(raw.to_string(), value, self.epoch));
        }
    }

    /// Forget everything the current formula of `cell` registered.
    fn detach(&mut self, cell: CellAddress) {
        if let Some(formula) = self.cells.get(&cell).and_then(|c| c.formula.as_ref()) {
            for name in &formula.names {
                self.names.remove_dependent(name, &cell);
            }
        }
        self.graph.clear(&cell);
        self.parked.remove(&cell);
        self.unbound.remove(&cell);
        self.stale.remove(&cell);
    }

    /// (Re-)bind the formula at `cell` and install its graph edges.
    fn bind(&mut self, cell: CellAddress) -> Option<CycleError> {
        let formula = self.cells.get_mut(&cell)?.formula.as_mut()?;
        let view = BindView {
            sheets: &self.sheets,
            names: &self.names,
        };
        match resolve(&formula.ast, cell.sheet, &view, &self.config) {
            Ok(resolved) => {
                let precedents = resolved.precedents.clone();
                formula.bound = Some(resolved);
                formula.bind_error = None;
                self.unbound.remove(&cell);
                match self.graph.set_formula(cell, &precedents) {
                    Ok(()) => {
                        self.parked.remove(&cell);
                        None
                    }
                    Err(cycle) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(%cell, len = cycle.cycle.len(), "cycle detected");
                        self.parked.insert(cell, precedents);
                        Some(cycle)
                    }
                }
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%cell, error = %err, "formula did not bind");
                formula.bound = None;
                formula.bind_error = Some(err);
                self.graph.clear(&cell);
                self.parked.remove(&cell);
                self.unbound.insert(cell);
                None
            }
        }
    }

    fn rebind(&mut self, mut cells: Vec<CellAddress>) -> Vec<CellAddress> {
        cells.sort_unstable();
        cells.dedup();
        for &cell in &cells {
            self.bind(cell);
        }
        cells
    }

    /// Retry every parked formula and recompute the set of circular cells.
    /// Returns the cells whose circular status changed.
    fn retry_parked(&mut self) -> Vec<CellAddress> {
        let previous = std::mem::take(&mut self.circular);
        let mut parked: Vec<CellAddress> = self.parked.keys().copied().collect();
        parked.sort_unstable();
        for cell in parked {
            let Some(precedents) = self.parked.get(&cell).cloned() else {
                continue;
            };
            match self.graph.set_formula(cell, &precedents) {
                Ok(()) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(%cell, "cycle healed");
                    self.parked.remove(&cell);
                }
                Err(cycle) => self.circular.extend(cycle.cycle),
            }
        }
        let mut changed: Vec<CellAddress> = previous
            .symmetric_difference(&self.circular)
            .copied()
            .collect();
        changed.sort_unstable();
        changed
    }

    fn formula_cells(&self) -> Vec<CellAddress> {
        let mut cells: Vec<CellAddress> = self
            .cells
            .iter()
            .filter(|(_, c)| c.formula.is_some())
            .map(|(a, _)| *a)
            .collect();
        cells.sort_unstable();
        cells
    }

    /* ===================  recalculation  =================== */

    /// Recompute every formula cell.
    pub fn recalculate_all(&mut self) -> RecalcReport {
        let mut seeds = self.formula_cells();
        seeds.extend(self.retry_parked());
        self.recalculate(seeds)
    }

    /// Recalculate `seeds` and everything downstream of them.
    ///
    /// Values are staged and committed only when the whole pass succeeds. On
    /// an internal fault nothing is committed, the epoch stays put and the
    /// affected formulas stay dirty until the next pass.
    pub fn recalculate(&mut self, seeds: Vec<CellAddress>) -> RecalcReport {
        let mut seeds = seeds;
        seeds.extend(self.stale.drain());
        let forced: FxHashSet<CellAddress> = seeds.iter().copied().collect();
        let closure = self.graph.dirty_closure(seeds);
        let new_epoch = self.epoch + 1;

        #[cfg(feature = "tracing")]
        let _span =
            tracing::info_span!("recalculate", closure = closure.len(), epoch = new_epoch)
                .entered();

        let mut report = RecalcReport {
            epoch: self.epoch,
            ..RecalcReport::default()
        };

        for addr in &closure {
            if let Some(cell) = self.cells.get_mut(addr) {
                if cell.formula.is_some() {
                    cell.state = CellState::Dirty;
                }
            }
        }

        let schedule = match Scheduler::new(&self.graph).create_schedule(&closure) {
            Ok(s) => s,
            Err(fault) => return self.abort(&closure, fault, report),
        };

        let mut staged: FxHashMap<CellAddress, Value> = FxHashMap::default();
        let mut changed: FxHashSet<CellAddress> = FxHashSet::default();

        for addr in schedule.order() {
            let is_formula = self
                .cells
                .get(&addr)
                .is_some_and(|c| c.formula.is_some());
            if !is_formula {
                if forced.contains(&addr) {
                    changed.insert(addr);
                }
                continue;
            }

            let upstream_changed = schedule
                .upstream
                .get(&addr)
                .is_some_and(|ups| ups.iter().any(|u| changed.contains(u)));
            if self.config.prune_unchanged && !forced.contains(&addr) && !upstream_changed {
                if let Some(cell) = self.cells.get_mut(&addr) {
                    cell.state = CellState::Clean;
                }
                continue;
            }

            if let Some(cell) = self.cells.get_mut(&addr) {
                cell.state = CellState::Computing;
            }
            let value = match self.compute(addr, &staged) {
                Ok(v) => v,
                Err(fault) => return self.abort(&closure, fault, report),
            };
            #[cfg(feature = "tracing")]
            tracing::trace!(cell = %addr, value = %value, "evaluated");

            if let Some(cell) = self.cells.get_mut(&addr) {
                if cell.value != value {
                    changed.insert(addr);
                    report.updated_cells.push(addr);
                }
                cell.state = CellState::Clean;
            }
            staged.insert(addr, value);
            report.evaluated += 1;
        }

        for (addr, value) in staged {
            if let Some(cell) = self.cells.get_mut(&addr) {
                cell.value = value;
                cell.epoch = new_epoch;
                cell.state = CellState::Clean;
            }
        }
        self.epoch = new_epoch;
        report.epoch = new_epoch;
        report.errors = closure
            .iter()
            .filter_map(|a| {
                self.cells
                    .get(a)
                    .and_then(|c| c.value.error())
                    .map(|e| (*a, e))
            })
            .collect();
        report
    }

    fn compute(
        &self,
        addr: CellAddress,
        staged: &FxHashMap<CellAddress, Value>,
    ) -> Result<Value, InternalFault> {
        if self.circular.contains(&addr) {
            return Ok(Value::Error(ErrorKind::CircularReference));
        }
        let Some(formula) = self.cells.get(&addr).and_then(|c| c.formula.as_ref()) else {
            return Ok(Value::Empty);
        };
        let Some(bound) = &formula.bound else {
            let kind = formula
                .bind_error
                .as_ref()
                .map_or(ErrorKind::Ref, RefError::error_kind);
            return Ok(Value::Error(kind));
        };
        let ctx = PassContext {
            cells: &self.cells,
            staged,
            custom: &self.custom_functions,
        };
        // A formula cell always has a value; a blank result reads as 0.
        match Interpreter::new_with_cell(&ctx, addr).evaluate(&bound.expr)? {
            Value::Empty => Ok(Value::Number(0.0)),
            value => Ok(value),
        }
    }

    fn abort(
        &mut self,
        closure: &[CellAddress],
        fault: InternalFault,
        mut report: RecalcReport,
    ) -> RecalcReport {
        #[cfg(feature = "tracing")]
        tracing::warn!(%fault, "recalculation abandoned");
        for addr in closure {
            if let Some(cell) = self.cells.get_mut(addr) {
                if cell.formula.is_some() {
                    cell.state = CellState::Dirty;
                    self.stale.insert(*addr);
                }
            }
        }
        report.updated_cells.clear();
        report.evaluated = 0;
        report.fatal = Some(fault);
        report
    }

    /* ===================  reads  =================== */

    pub fn cell(&self, addr: &CellAddress) -> Option<&Cell> {
        self.cells.get(addr)
    }

    /// Committed value; `Value::Empty` for cells never written.
    pub fn get_cell_value(&self, sheet: SheetId, row: u32, col: u32) -> Value {
        self.cells
            .get(&CellAddress::new(sheet, row, col))
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn get_cell_error(&self, sheet: SheetId, row: u32, col: u32) -> Option<ErrorKind> {
        self.cells
            .get(&CellAddress::new(sheet, row, col))
            .and_then(|c| c.value.error())
    }

    /// Formula text including the leading `=`.
    pub fn get_cell_formula(&self, sheet: SheetId, row: u32, col: u32) -> Option<&str> {
        self.cells
            .get(&CellAddress::new(sheet, row, col))
            .and_then(|c| c.formula.as_ref())
            .map(|f| f.text.as_str())
    }

    pub fn get_cell_input(&self, sheet: SheetId, row: u32, col: u32) -> Option<&str> {
        self.cells
            .get(&CellAddress::new(sheet, row, col))
            .map(|c| c.input.as_str())
    }

    pub fn get_cell_epoch(&self, sheet: SheetId, row: u32, col: u32) -> Option<u64> {
        self.cells
            .get(&CellAddress::new(sheet, row, col))
            .map(|c| c.epoch)
    }

    pub fn cell_state(&self, sheet: SheetId, row: u32, col: u32) -> Option<CellState> {
        self.cells
            .get(&CellAddress::new(sheet, row, col))
            .map(|c| c.state)
    }

    /// Cells currently on a detected cycle, sorted.
    pub fn circular_cells(&self) -> Vec<CellAddress> {
        let mut out: Vec<CellAddress> = self.circular.iter().copied().collect();
        out.sort_unstable();
        out
    }

    /// Every stored cell address, sorted.
    pub fn cell_addresses(&self) -> Vec<CellAddress> {
        let mut out: Vec<CellAddress> = self.cells.keys().copied().collect();
        out.sort_unstable();
        out
    }
}
