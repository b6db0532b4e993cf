//! Binds parsed references to sheet ids and grid coordinates.
//!
//! The parser leaves references exactly as written. Binding applies the
//! formula's own sheet to unqualified references, converts 1-based A1
//! coordinates to 0-based addresses, checks them against the grid limits in
//! [`EvalConfig`] and collects the precedent set the dependency graph needs.
//! Ranges are kept as rectangles and never expanded here.

use crate::engine::EvalConfig;
use crate::engine::graph::Precedents;
use sheetcalc_common::{CellAddress, ErrorKind, RangeRef, SheetId, Value};
use sheetcalc_parse::{ASTNode, ASTNodeType, BinaryOp, ReferenceType, UnaryOp};
use thiserror::Error;

/// Read-only view of the workbook structure used while binding.
pub trait WorkbookView {
    fn sheet_id(&self, name: &str) -> Option<SheetId>;

    /// Whether `id` names a sheet that still exists.
    fn sheet_exists(&self, id: SheetId) -> bool;

    /// Look up `name` in `scope`'s sheet scope first, then workbook scope.
    fn named_range(&self, name: &str, scope: SheetId) -> Option<NamedTarget>;
}

/// What a reference or a defined name points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedTarget {
    Cell(CellAddress),
    Range(RangeRef),
}

impl NamedTarget {
    pub fn sheet(&self) -> SheetId {
        match self {
            NamedTarget::Cell(c) => c.sheet,
            NamedTarget::Range(r) => r.sheet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    #[error("unknown sheet '{0}'")]
    UnknownSheet(String),

    #[error("invalid range {reference}: {reason}")]
    InvalidRange { reference: String, reason: String },

    #[error("unknown name '{0}'")]
    UnknownName(String),
}

impl RefError {
    /// The error value a formula that failed to bind evaluates to.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            RefError::UnknownName(_) => ErrorKind::Name,
            RefError::UnknownSheet(_) | RefError::InvalidRange { .. } => ErrorKind::Ref,
        }
    }
}

/// A bound expression. Function names are upper-cased; lookup happens at
/// evaluation time so that custom functions can be registered later.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Cell(CellAddress),
    Range(RangeRef),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFormula {
    pub expr: Expr,
    /// Distinct precedent cells and ranges in source order.
    pub precedents: Precedents,
    /// Upper-cased defined names the formula mentions.
    pub names: Vec<String>,
}

pub fn resolve(
    ast: &ASTNode,
    current_sheet: SheetId,
    view: &dyn WorkbookView,
    config: &EvalConfig,
) -> Result<ResolvedFormula, RefError> {
    let mut binder = Binder {
        current_sheet,
        view,
        config,
        precedents: Precedents::default(),
        names: Vec::new(),
    };
    let expr = binder.bind(ast)?;
    Ok(ResolvedFormula {
        expr,
        precedents: binder.precedents,
        names: binder.names,
    })
}

struct Binder<'a> {
    current_sheet: SheetId,
    view: &'a dyn WorkbookView,
    config: &'a EvalConfig,
    precedents: Precedents,
    names: Vec<String>,
}

impl Binder<'_> {
    fn bind(&mut self, node: &ASTNode) -> Result<Expr, RefError> {
        match &node.node_type {
            ASTNodeType::Literal(v) => Ok(Expr::Literal(v.clone())),
            ASTNodeType::Reference {
                original,
                reference,
            } => {
                let target = match reference {
                    ReferenceType::NamedRange(name) => self.bind_name(name)?,
                    _ => bind_reference(
                        original,
                        reference,
                        self.current_sheet,
                        self.view,
                        self.config,
                    )?,
                };
                Ok(match target {
                    NamedTarget::Cell(cell) => {
                        self.precedents.push_cell(cell);
                        Expr::Cell(cell)
                    }
                    NamedTarget::Range(range) => {
                        self.precedents.push_range(range);
                        Expr::Range(range)
                    }
                })
            }
            ASTNodeType::UnaryOp { op, expr } => Ok(Expr::Unary {
                op: *op,
                expr: Box::new(self.bind(expr)?),
            }),
            ASTNodeType::BinaryOp { op, left, right } => Ok(Expr::Binary {
                op: *op,
                left: Box::new(self.bind(left)?),
                right: Box::new(self.bind(right)?),
            }),
            ASTNodeType::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.bind(a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::Call {
                    name: name.to_ascii_uppercase(),
                    args,
                })
            }
        }
    }

    fn bind_name(&mut self, name: &str) -> Result<NamedTarget, RefError> {
        let key = name.to_ascii_uppercase();
        if !self.names.contains(&key) {
            self.names.push(key);
        }
        let target = self
            .view
            .named_range(name, self.current_sheet)
            .ok_or_else(|| RefError::UnknownName(name.to_string()))?;
        if !self.view.sheet_exists(target.sheet()) {
            return Err(RefError::InvalidRange {
                reference: name.to_string(),
                reason: "target sheet was removed".to_string(),
            });
        }
        Ok(target)
    }
}

/// Bind one cell or range reference. Named references are rejected; the
/// caller resolves those through the name table.
pub(crate) fn bind_reference(
    original: &str,
    reference: &ReferenceType,
    current_sheet: SheetId,
    view: &dyn WorkbookView,
    config: &EvalConfig,
) -> Result<NamedTarget, RefError> {
    let sheet_of = |sheet: &Option<String>| match sheet {
        Some(name) => view
            .sheet_id(name)
            .ok_or_else(|| RefError::UnknownSheet(name.clone())),
        None => Ok(current_sheet),
    };
    let invalid = |reason: String| RefError::InvalidRange {
        reference: original.to_string(),
        reason,
    };
    let check = |row: u32, col: u32| {
        if row == 0 || row > config.max_rows {
            return Err(invalid(format!("row {row} is outside 1..={}", config.max_rows)));
        }
        if col == 0 || col > config.max_cols {
            return Err(invalid(format!(
                "column {col} is outside 1..={}",
                config.max_cols
            )));
        }
        Ok(())
    };

    match reference {
        ReferenceType::Cell { sheet, row, col } => {
            let sheet = sheet_of(sheet)?;
            check(*row, *col)?;
            Ok(NamedTarget::Cell(CellAddress::new(sheet, row - 1, col - 1)))
        }
        ReferenceType::Range {
            sheet,
            start_row,
            start_col,
            end_row,
            end_col,
        } => {
            let sheet = sheet_of(sheet)?;
            check(*start_row, *start_col)?;
            check(*end_row, *end_col)?;
            let range = RangeRef::new(
                sheet,
                start_row - 1,
                start_col - 1,
                end_row - 1,
                end_col - 1,
            );
            if range.area() > config.max_range_cells {
                return Err(invalid(format!(
                    "{} cells exceeds the limit of {}",
                    range.area(),
                    config.max_range_cells
                )));
            }
            Ok(NamedTarget::Range(range))
        }
        ReferenceType::NamedRange(name) => Err(RefError::UnknownName(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use sheetcalc_parse::parse;

    struct View {
        sheets: Vec<&'static str>,
        names: FxHashMap<String, NamedTarget>,
    }

    impl WorkbookView for View {
        fn sheet_id(&self, name: &str) -> Option<SheetId> {
            self.sheets
                .iter()
                .position(|s| s.eq_ignore_ascii_case(name))
                .map(|i| i as SheetId)
        }

        fn sheet_exists(&self, id: SheetId) -> bool {
            (id as usize) < self.sheets.len()
        }

        fn named_range(&self, name: &str, _scope: SheetId) -> Option<NamedTarget> {
            self.names.get(&name.to_ascii_uppercase()).copied()
        }
    }

    fn view() -> View {
        let mut names = FxHashMap::default();
        names.insert(
            "RATE".to_string(),
            NamedTarget::Cell(CellAddress::new(1, 0, 0)),
        );
        View {
            sheets: vec!["Sheet1", "Sheet2"],
            names,
        }
    }

    fn bind(formula: &str) -> Result<ResolvedFormula, RefError> {
        resolve(&parse(formula).unwrap(), 0, &view(), &EvalConfig::default())
    }

    #[test]
    fn unqualified_references_use_the_current_sheet() {
        let r = bind("=B2+Sheet2!A1").unwrap();
        assert_eq!(
            r.precedents.cells.as_slice(),
            &[CellAddress::new(0, 1, 1), CellAddress::new(1, 0, 0)]
        );
    }

    #[test]
    fn range_corners_are_normalised() {
        let a = bind("=SUM(B5:A1)").unwrap();
        let b = bind("=SUM(A1:B5)").unwrap();
        assert_eq!(a.precedents, b.precedents);
        assert_eq!(a.precedents.ranges[0], RangeRef::new(0, 0, 0, 4, 1));
    }

    #[test]
    fn precedents_are_distinct_and_ordered() {
        let r = bind("=C1+A1+C1+SUM(A1:A2)+SUM(A2:A1)").unwrap();
        assert_eq!(
            r.precedents.cells.as_slice(),
            &[CellAddress::new(0, 0, 2), CellAddress::new(0, 0, 0)]
        );
        assert_eq!(r.precedents.ranges.len(), 1);
    }

    #[test]
    fn unknown_sheet_is_a_ref_error() {
        let err = bind("=Nope!A1").unwrap_err();
        assert_eq!(err, RefError::UnknownSheet("Nope".into()));
        assert_eq!(err.error_kind(), ErrorKind::Ref);
    }

    #[test]
    fn grid_limits_are_enforced() {
        let config = EvalConfig {
            max_rows: 10,
            max_cols: 3,
            max_range_cells: 6,
            ..EvalConfig::default()
        };
        let bind_with = |f: &str| resolve(&parse(f).unwrap(), 0, &view(), &config);
        assert!(bind_with("=C10").is_ok());
        assert!(matches!(bind_with("=A11"), Err(RefError::InvalidRange { .. })));
        assert!(matches!(bind_with("=D1"), Err(RefError::InvalidRange { .. })));
        assert!(bind_with("=SUM(A1:C2)").is_ok());
        assert!(matches!(
            bind_with("=SUM(A1:C3)"),
            Err(RefError::InvalidRange { .. })
        ));
    }

    #[test]
    fn names_bind_through_the_view() {
        let r = bind("=rate*2").unwrap();
        assert_eq!(r.names, vec!["RATE".to_string()]);
        assert_eq!(r.precedents.cells[0], CellAddress::new(1, 0, 0));
        let err = bind("=Missing+1").unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::Name);
    }

    #[test]
    fn function_names_are_uppercased() {
        let r = bind("=sum(1)").unwrap();
        assert!(matches!(r.expr, Expr::Call { ref name, .. } if name == "SUM"));
    }
}
