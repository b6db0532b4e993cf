use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::WorkbookConfig;
use crate::error::WorkbookError;
use crate::workbook::Workbook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkbookId(pub u64);

impl fmt::Display for WorkbookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wb#{}", self.0)
    }
}

/// Open workbooks by id. Workbooks share no state with each other; closing
/// one removes it here and refuses further edits through any live handle.
#[derive(Debug, Default)]
pub struct WorkbookRegistry {
    books: DashMap<WorkbookId, Arc<Workbook>>,
    last_id: AtomicU64,
}

impl WorkbookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, config: WorkbookConfig) -> Result<(WorkbookId, Arc<Workbook>), WorkbookError> {
        let book = Arc::new(Workbook::new(config)?);
        let id = WorkbookId(self.last_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.books.insert(id, Arc::clone(&book));
        #[cfg(feature = "tracing")]
        tracing::debug!(%id, "workbook opened");
        Ok((id, book))
    }

    pub fn get(&self, id: WorkbookId) -> Option<Arc<Workbook>> {
        self.books.get(&id).map(|b| Arc::clone(b.value()))
    }

    pub fn close(&self, id: WorkbookId) -> Result<(), WorkbookError> {
        let (_, book) = self
            .books
            .remove(&id)
            .ok_or(WorkbookError::UnknownWorkbook(id))?;
        book.close();
        #[cfg(feature = "tracing")]
        tracing::debug!(%id, "workbook removed from registry");
        Ok(())
    }

    /// Open workbook ids, sorted.
    pub fn ids(&self) -> Vec<WorkbookId> {
        let mut ids: Vec<WorkbookId> = self.books.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
