use crate::resolver::NamedTarget;
use rustc_hash::{FxHashMap, FxHashSet};
use sheetcalc_common::{CellAddress, SheetId};
use sheetcalc_parse::ReferenceType;

/// Scope of a named range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Available throughout workbook
    Workbook,
    /// Only available in specific sheet
    Sheet(SheetId),
}

/// Complete named range entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRange {
    /// Name as first defined.
    pub name: String,
    pub scope: NameScope,
    pub target: NamedTarget,
}

/// Defined names plus the formulas that mention each one, so that defining,
/// redefining or removing a name can re-bind exactly those formulas.
#[derive(Debug, Default)]
pub struct NamedRangeTable {
    names: FxHashMap<(NameScope, String), NamedRange>,
    // Keyed by upper-case name; includes names that are not defined yet.
    dependents: FxHashMap<String, FxHashSet<CellAddress>>,
}

/// A valid name starts with a letter or `_`, continues with letters, digits,
/// `_` or `.`, and cannot be read as a cell reference or boolean.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return false;
    }
    if name.eq_ignore_ascii_case("TRUE") || name.eq_ignore_ascii_case("FALSE") {
        return false;
    }
    matches!(
        ReferenceType::from_string(name),
        Ok(ReferenceType::NamedRange(_))
    )
}

impl NamedRangeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or replace a name. Returns the previous definition.
    pub fn define(
        &mut self,
        name: &str,
        scope: NameScope,
        target: NamedTarget,
    ) -> Option<NamedRange> {
        self.names.insert(
            (scope, name.to_ascii_uppercase()),
            NamedRange {
                name: name.to_string(),
                scope,
                target,
            },
        )
    }

    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.names.remove(&(scope, name.to_ascii_uppercase()))
    }

    pub fn get(&self, name: &str, scope: NameScope) -> Option<&NamedRange> {
        self.names.get(&(scope, name.to_ascii_uppercase()))
    }

    /// Sheet scope first, then workbook scope.
    pub fn resolve(&self, name: &str, sheet: SheetId) -> Option<NamedTarget> {
        let upper = name.to_ascii_uppercase();
        self.names
            .get(&(NameScope::Sheet(sheet), upper.clone()))
            .or_else(|| self.names.get(&(NameScope::Workbook, upper)))
            .map(|n| n.target)
    }

    /// Drop every name scoped to `sheet`; returns their upper-case keys.
    pub fn remove_sheet_scope(&mut self, sheet: SheetId) -> Vec<String> {
        let keys: Vec<(NameScope, String)> = self
            .names
            .keys()
            .filter(|(scope, _)| *scope == NameScope::Sheet(sheet))
            .cloned()
            .collect();
        keys.into_iter()
            .map(|k| {
                self.names.remove(&k);
                k.1
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.names.values()
    }

    pub fn add_dependent(&mut self, name: &str, cell: CellAddress) {
        self.dependents
            .entry(name.to_ascii_uppercase())
            .or_default()
            .insert(cell);
    }

    pub fn remove_dependent(&mut self, name: &str, cell: &CellAddress) {
        let key = name.to_ascii_uppercase();
        if let Some(deps) = self.dependents.get_mut(&key) {
            deps.remove(cell);
            if deps.is_empty() {
                self.dependents.remove(&key);
            }
        }
    }

    /// Formulas mentioning `name`, sorted.
    pub fn dependents_of(&self, name: &str) -> Vec<CellAddress> {
        let mut out: Vec<CellAddress> = self
            .dependents
            .get(&name.to_ascii_uppercase())
            .map(|d| d.iter().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_scope_shadows_workbook_scope() {
        let mut t = NamedRangeTable::new();
        let wb = NamedTarget::Cell(CellAddress::new(0, 0, 0));
        let local = NamedTarget::Cell(CellAddress::new(1, 0, 0));
        t.define("Rate", NameScope::Workbook, wb);
        t.define("RATE", NameScope::Sheet(1), local);
        assert_eq!(t.resolve("rate", 1), Some(local));
        assert_eq!(t.resolve("rate", 0), Some(wb));
        assert_eq!(t.remove_sheet_scope(1), vec!["RATE".to_string()]);
        assert_eq!(t.resolve("rate", 1), Some(wb));
    }

    #[test]
    fn name_validity() {
        assert!(is_valid_name("TaxRate"));
        assert!(is_valid_name("_q1.total"));
        assert!(!is_valid_name("A1"));
        assert!(!is_valid_name("XFD10"));
        assert!(!is_valid_name("true"));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("has space"));
    }
}
