//! Precedent/dependent adjacency keyed by cell address.
//!
//! A range precedent is stored once, as an edge to the rectangle, rather than
//! as one edge per covered cell. Dependents of a cell are the cells that name
//! it directly plus the dependents of every range rectangle that contains it.
//! Ranges are indexed by the 256×256 blocks they overlap, so a lookup only
//! tests the ranges registered on the cell's own block.
//! Both directions are updated together in one mutation, and the graph never
//! holds a cycle: `set_formula` rolls back edges that would close one.

use rustc_hash::{FxHashMap, FxHashSet};
use sheetcalc_common::{CellAddress, RangeRef, SheetId};
use smallvec::SmallVec;
use std::fmt::Write as _;
use thiserror::Error;

/// Distinct precedents of one formula, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precedents {
    pub cells: SmallVec<[CellAddress; 4]>,
    pub ranges: SmallVec<[RangeRef; 2]>,
}

impl Precedents {
    pub fn push_cell(&mut self, cell: CellAddress) {
        if !self.cells.contains(&cell) {
            self.cells.push(cell);
        }
    }

    pub fn push_range(&mut self, range: RangeRef) {
        if !self.ranges.contains(&range) {
            self.ranges.push(range);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.ranges.is_empty()
    }

    /// Whether any precedent cell or range lies on `sheet`.
    pub fn touches_sheet(&self, sheet: SheetId) -> bool {
        self.cells.iter().any(|c| c.sheet == sheet) || self.ranges.iter().any(|r| r.sheet == sheet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circular reference detected: {}", render_cycle(.cycle))]
pub struct CycleError {
    /// Cells on the cycle, starting at the cell whose edit closed it. Each
    /// cell is a precedent of the next; the last is a precedent of the first.
    pub cycle: Vec<CellAddress>,
}

fn render_cycle(cycle: &[CellAddress]) -> String {
    let mut out = String::new();
    for cell in cycle {
        let _ = write!(out, "{cell} -> ");
    }
    if let Some(first) = cycle.first() {
        let _ = write!(out, "{first}");
    }
    out
}

const BLOCK_H: u32 = 256;
const BLOCK_W: u32 = 256;

/// One 256×256 block of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StripeKey {
    sheet: SheetId,
    block_row: u32,
    block_col: u32,
}

impl StripeKey {
    fn of(cell: &CellAddress) -> Self {
        Self {
            sheet: cell.sheet,
            block_row: cell.row / BLOCK_H,
            block_col: cell.col / BLOCK_W,
        }
    }

    fn covering(range: &RangeRef) -> impl Iterator<Item = StripeKey> + '_ {
        (range.start_row / BLOCK_H..=range.end_row / BLOCK_H).flat_map(move |block_row| {
            (range.start_col / BLOCK_W..=range.end_col / BLOCK_W).map(move |block_col| StripeKey {
                sheet: range.sheet,
                block_row,
                block_col,
            })
        })
    }
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    precedents: FxHashMap<CellAddress, Precedents>,
    cell_dependents: FxHashMap<CellAddress, FxHashSet<CellAddress>>,
    range_dependents: FxHashMap<RangeRef, FxHashSet<CellAddress>>,
    stripes: FxHashMap<StripeKey, FxHashSet<RangeRef>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn precedents_of(&self, cell: &CellAddress) -> Option<&Precedents> {
        self.precedents.get(cell)
    }

    /// Direct dependents of `cell`, sorted and distinct.
    pub fn dependents_of(&self, cell: &CellAddress) -> Vec<CellAddress> {
        let mut out: Vec<CellAddress> = self
            .cell_dependents
            .get(cell)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default();
        if let Some(ranges) = self.stripes.get(&StripeKey::of(cell)) {
            for range in ranges.iter().filter(|r| r.contains(cell)) {
                if let Some(deps) = self.range_dependents.get(range) {
                    out.extend(deps.iter().copied());
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Replace the precedent set of `cell`.
    ///
    /// On a cycle the new edges are removed again, leaving `cell` with no
    /// precedents, and the cycle is returned.
    pub fn set_formula(
        &mut self,
        cell: CellAddress,
        precedents: &Precedents,
    ) -> Result<(), CycleError> {
        self.remove_edges(&cell);
        if precedents.is_empty() {
            return Ok(());
        }
        self.insert_edges(cell, precedents);
        if let Some(cycle) = self.find_cycle(cell) {
            self.remove_edges(&cell);
            return Err(CycleError { cycle });
        }
        Ok(())
    }

    /// Drop every edge where `cell` is the dependent.
    pub fn clear(&mut self, cell: &CellAddress) {
        self.remove_edges(cell);
    }

    /// `seeds` plus everything transitively downstream, in discovery order.
    pub fn dirty_closure(&self, seeds: impl IntoIterator<Item = CellAddress>) -> Vec<CellAddress> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        for seed in seeds {
            if seen.insert(seed) {
                queue.push_back(seed);
            }
        }
        while let Some(cell) = queue.pop_front() {
            order.push(cell);
            for dep in self.dependents_of(&cell) {
                if seen.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }
        order
    }

    /// Cells with at least one precedent edge.
    pub fn formula_count(&self) -> usize {
        self.precedents.len()
    }

    pub fn edge_count(&self) -> usize {
        self.precedents
            .values()
            .map(|p| p.cells.len() + p.ranges.len())
            .sum()
    }

    /// Cells currently holding edges, for consistency checks.
    pub fn cells_with_precedents(&self) -> impl Iterator<Item = &CellAddress> {
        self.precedents.keys()
    }

    fn insert_edges(&mut self, cell: CellAddress, precedents: &Precedents) {
        for p in &precedents.cells {
            self.cell_dependents.entry(*p).or_default().insert(cell);
        }
        for r in &precedents.ranges {
            let deps = self.range_dependents.entry(*r).or_default();
            if deps.is_empty() {
                for key in StripeKey::covering(r) {
                    self.stripes.entry(key).or_default().insert(*r);
                }
            }
            deps.insert(cell);
        }
        self.precedents.insert(cell, precedents.clone());
    }

    fn remove_edges(&mut self, cell: &CellAddress) {
        let Some(old) = self.precedents.remove(cell) else {
            return;
        };
        for p in &old.cells {
            if let Some(deps) = self.cell_dependents.get_mut(p) {
                deps.remove(cell);
                if deps.is_empty() {
                    self.cell_dependents.remove(p);
                }
            }
        }
        for r in &old.ranges {
            let Some(deps) = self.range_dependents.get_mut(r) else {
                continue;
            };
            deps.remove(cell);
            if deps.is_empty() {
                self.range_dependents.remove(r);
                for key in StripeKey::covering(r) {
                    if let Some(ranges) = self.stripes.get_mut(&key) {
                        ranges.remove(r);
                        if ranges.is_empty() {
                            self.stripes.remove(&key);
                        }
                    }
                }
            }
        }
    }

    /// Iterative DFS forward through dependents looking for `start`.
    fn find_cycle(&self, start: CellAddress) -> Option<Vec<CellAddress>> {
        let mut parent: FxHashMap<CellAddress, CellAddress> = FxHashMap::default();
        let mut visited: FxHashSet<CellAddress> = FxHashSet::default();
        visited.insert(start);
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            for dep in self.dependents_of(&node) {
                if dep == start {
                    let mut path = vec![node];
                    let mut cur = node;
                    while cur != start {
                        match parent.get(&cur) {
                            Some(&p) => {
                                path.push(p);
                                cur = p;
                            }
                            None => break,
                        }
                    }
                    path.reverse();
                    return Some(path);
                }
                if visited.insert(dep) {
                    parent.insert(dep, node);
                    stack.push(dep);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(row: u32, col: u32) -> CellAddress {
        CellAddress::new(0, row, col)
    }

    fn on(cells: &[CellAddress]) -> Precedents {
        let mut p = Precedents::default();
        for c in cells {
            p.push_cell(*c);
        }
        p
    }

    #[test]
    fn edges_are_mirrored_and_replaced() {
        let mut g = DependencyGraph::new();
        g.set_formula(a(0, 2), &on(&[a(0, 0), a(0, 1)])).unwrap();
        assert_eq!(g.dependents_of(&a(0, 0)), vec![a(0, 2)]);
        g.set_formula(a(0, 2), &on(&[a(0, 1)])).unwrap();
        assert!(g.dependents_of(&a(0, 0)).is_empty());
        assert_eq!(g.dependents_of(&a(0, 1)), vec![a(0, 2)]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn range_dependents_cover_contained_cells() {
        let mut g = DependencyGraph::new();
        let mut p = Precedents::default();
        p.push_range(RangeRef::new(0, 0, 0, 4, 0));
        g.set_formula(a(5, 0), &p).unwrap();
        assert_eq!(g.dependents_of(&a(3, 0)), vec![a(5, 0)]);
        assert!(g.dependents_of(&a(3, 1)).is_empty());
    }

    #[test]
    fn ranges_across_block_boundaries_are_found_from_every_block() {
        let mut g = DependencyGraph::new();
        let mut p = Precedents::default();
        p.push_range(RangeRef::new(0, 250, 250, 600, 260));
        g.set_formula(a(0, 0), &p).unwrap();
        for cell in [a(250, 250), a(255, 260), a(256, 256), a(599, 251), a(600, 260)] {
            assert_eq!(g.dependents_of(&cell), vec![a(0, 0)], "{cell}");
        }
        assert!(g.dependents_of(&a(601, 260)).is_empty());
        assert!(g.dependents_of(&a(300, 261)).is_empty());
        assert!(g.dependents_of(&CellAddress::new(1, 300, 255)).is_empty());
    }

    #[test]
    fn stripes_are_released_with_the_last_dependent() {
        let mut g = DependencyGraph::new();
        let range = RangeRef::new(0, 0, 0, 300, 0);
        let mut p = Precedents::default();
        p.push_range(range);
        g.set_formula(a(0, 5), &p).unwrap();
        g.set_formula(a(1, 5), &p).unwrap();

        g.clear(&a(0, 5));
        assert_eq!(g.dependents_of(&a(280, 0)), vec![a(1, 5)]);
        g.clear(&a(1, 5));
        assert!(g.dependents_of(&a(280, 0)).is_empty());
        assert!(g.stripes.is_empty());
        assert!(g.range_dependents.is_empty());
    }

    #[test]
    fn cycle_is_rolled_back_and_reported_from_the_edited_cell() {
        let mut g = DependencyGraph::new();
        g.set_formula(a(0, 0), &on(&[a(1, 0)])).unwrap();
        let err = g.set_formula(a(1, 0), &on(&[a(0, 0)])).unwrap_err();
        assert_eq!(err.cycle, vec![a(1, 0), a(0, 0)]);
        assert!(g.precedents_of(&a(1, 0)).is_none());
        assert!(err.to_string().starts_with("Circular reference detected"));
    }

    #[test]
    fn self_reference_is_a_cycle_of_one() {
        let mut g = DependencyGraph::new();
        let err = g.set_formula(a(0, 0), &on(&[a(0, 0)])).unwrap_err();
        assert_eq!(err.cycle, vec![a(0, 0)]);
        assert_eq!(g.formula_count(), 0);
    }

    #[test]
    fn closure_includes_transitive_dependents() {
        let mut g = DependencyGraph::new();
        g.set_formula(a(1, 0), &on(&[a(0, 0)])).unwrap();
        g.set_formula(a(2, 0), &on(&[a(1, 0)])).unwrap();
        g.set_formula(a(3, 0), &on(&[a(9, 9)])).unwrap();
        let closure = g.dirty_closure([a(0, 0)]);
        assert_eq!(closure, vec![a(0, 0), a(1, 0), a(2, 0)]);
    }
}
