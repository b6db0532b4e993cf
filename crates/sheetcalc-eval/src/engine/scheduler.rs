use super::error::InternalFault;
use super::graph::DependencyGraph;
use rustc_hash::{FxHashMap, FxHashSet};
use sheetcalc_common::CellAddress;
use smallvec::SmallVec;

pub struct Scheduler<'a> {
    graph: &'a DependencyGraph,
}

/// Cells whose in-closure precedents are all in earlier layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub cells: Vec<CellAddress>,
}

#[derive(Debug, Default)]
pub struct Schedule {
    pub layers: Vec<Layer>,
    /// In-closure precedents of each scheduled cell.
    pub upstream: FxHashMap<CellAddress, SmallVec<[CellAddress; 4]>>,
}

impl Schedule {
    /// Evaluation order: layers in sequence, cells sorted within a layer.
    pub fn order(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.layers.iter().flat_map(|l| l.cells.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.layers.iter().map(|l| l.cells.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Kahn's algorithm over the sub-graph induced by `cells`.
    pub fn create_schedule(&self, cells: &[CellAddress]) -> Result<Schedule, InternalFault> {
        let mut members: Vec<CellAddress> = cells.to_vec();
        members.sort_unstable();
        members.dedup();
        let member_set: FxHashSet<CellAddress> = members.iter().copied().collect();

        let mut in_degree: FxHashMap<CellAddress, usize> =
            members.iter().map(|c| (*c, 0)).collect();
        let mut downstream: FxHashMap<CellAddress, Vec<CellAddress>> = FxHashMap::default();
        let mut upstream: FxHashMap<CellAddress, SmallVec<[CellAddress; 4]>> =
            FxHashMap::default();

        for &u in &members {
            for v in self.graph.dependents_of(&u) {
                if !member_set.contains(&v) {
                    continue;
                }
                downstream.entry(u).or_default().push(v);
                upstream.entry(v).or_default().push(u);
                if let Some(d) = in_degree.get_mut(&v) {
                    *d += 1;
                }
            }
        }

        let mut current: Vec<CellAddress> = members
            .iter()
            .copied()
            .filter(|c| in_degree.get(c).copied() == Some(0))
            .collect();
        let mut layers = Vec::new();
        let mut scheduled = 0usize;

        while !current.is_empty() {
            let mut next = Vec::new();
            for u in &current {
                let Some(vs) = downstream.get(u) else {
                    continue;
                };
                for v in vs {
                    if let Some(d) = in_degree.get_mut(v) {
                        *d -= 1;
                        if *d == 0 {
                            next.push(*v);
                        }
                    }
                }
            }
            scheduled += current.len();
            layers.push(Layer { cells: current });
            next.sort_unstable();
            current = next;
        }

        if scheduled != members.len() {
            return Err(InternalFault::UnorderedResidual {
                remaining: members.len() - scheduled,
            });
        }
        Ok(Schedule { layers, upstream })
    }
}
