//! Sequence-stamped edit queue.
//!
//! Writers push edits without holding the engine lock. Whoever next holds
//! the write lock drains the queue in arrival order; within one drained
//! batch an edit followed by a later edit to the same cell is skipped, so
//! a stale write never lands after a newer one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sheetcalc_eval::RecalcReport;

use crate::error::WorkbookError;

/// A cell edit waiting for the engine. `row` and `col` are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub seq: u64,
    pub sheet: String,
    pub row: u32,
    pub col: u32,
    pub raw: String,
    /// A caller is blocked on this edit and collects its outcome by `seq`.
    pub(crate) awaited: bool,
}

impl PendingEdit {
    fn target(&self) -> (String, u32, u32) {
        (self.sheet.to_lowercase(), self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied(RecalcReport),
    /// A later edit to the same cell was queued before this one was applied.
    Superseded { by: u64 },
    Rejected(WorkbookError),
}

#[derive(Debug, Default)]
pub struct EditQueue {
    last_seq: AtomicU64,
    pending: Mutex<VecDeque<PendingEdit>>,
    outcomes: Mutex<FxHashMap<u64, EditOutcome>>,
}

impl EditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and enqueue an edit. Sequence numbers start at 1 and follow
    /// arrival order.
    pub fn push(&self, sheet: &str, row: u32, col: u32, raw: &str) -> u64 {
        self.push_edit(sheet, row, col, raw, false)
    }

    pub(crate) fn push_awaited(&self, sheet: &str, row: u32, col: u32, raw: &str) -> u64 {
        self.push_edit(sheet, row, col, raw, true)
    }

    fn push_edit(&self, sheet: &str, row: u32, col: u32, raw: &str, awaited: bool) -> u64 {
        let mut pending = self.pending.lock();
        let seq = self.last_seq.fetch_add(1, Ordering::Relaxed) + 1;
        pending.push_back(PendingEdit {
            seq,
            sheet: sheet.to_string(),
            row,
            col,
            raw: raw.to_string(),
            awaited,
        });
        seq
    }

    /// Take every queued edit. Each comes paired with the sequence number
    /// of the later edit in the batch that overwrites it, if any.
    pub(crate) fn drain(&self) -> Vec<(PendingEdit, Option<u64>)> {
        let batch: Vec<PendingEdit> = self.pending.lock().drain(..).collect();
        let mut latest: FxHashMap<(String, u32, u32), u64> = FxHashMap::default();
        for edit in &batch {
            latest.insert(edit.target(), edit.seq);
        }
        batch
            .into_iter()
            .map(|edit| {
                let by = latest
                    .get(&edit.target())
                    .copied()
                    .filter(|&last| last != edit.seq);
                (edit, by)
            })
            .collect()
    }

    pub(crate) fn record(&self, seq: u64, outcome: EditOutcome) {
        self.outcomes.lock().insert(seq, outcome);
    }

    pub(crate) fn take_outcome(&self, seq: u64) -> Option<EditOutcome> {
        self.outcomes.lock().remove(&seq)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Most recently issued sequence number; 0 before the first edit.
    pub fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_follow_arrival() {
        let q = EditQueue::new();
        assert_eq!(q.last_seq(), 0);
        assert_eq!(q.push("Sheet1", 1, 1, "1"), 1);
        assert_eq!(q.push("Sheet1", 1, 2, "2"), 2);
        assert_eq!(q.pending_len(), 2);
        assert_eq!(q.last_seq(), 2);
    }

    #[test]
    fn later_edit_to_same_cell_supersedes() {
        let q = EditQueue::new();
        q.push("Sheet1", 1, 1, "old");
        q.push("Sheet1", 2, 1, "other");
        q.push("SHEET1", 1, 1, "new");

        let batch = q.drain();
        let marks: Vec<(u64, Option<u64>)> = batch.iter().map(|(e, by)| (e.seq, *by)).collect();
        assert_eq!(marks, vec![(1, Some(3)), (2, None), (3, None)]);
        assert_eq!(q.pending_len(), 0);
        assert!(q.drain().is_empty());
    }

    #[test]
    fn outcomes_are_taken_once() {
        let q = EditQueue::new();
        q.record(4, EditOutcome::Superseded { by: 5 });
        assert_eq!(q.take_outcome(4), Some(EditOutcome::Superseded { by: 5 }));
        assert_eq!(q.take_outcome(4), None);
    }
}
