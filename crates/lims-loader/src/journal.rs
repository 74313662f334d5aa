use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A loader operation, as recorded in the [`Journal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderOp {
    LoadQueryInfo,
    LoadRows,
    LoadSelections,
    SetSelections,
    ReplaceSelections,
    ClearSelections,
    SelectAllRows,
    LoadCharts,
}

impl LoaderOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::LoadQueryInfo => "load_query_info",
            Self::LoadRows => "load_rows",
            Self::LoadSelections => "load_selections",
            Self::SetSelections => "set_selections",
            Self::ReplaceSelections => "replace_selections",
            Self::ClearSelections => "clear_selections",
            Self::SelectAllRows => "select_all_rows",
            Self::LoadCharts => "load_charts",
        }
    }
}

impl fmt::Display for LoaderOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Started,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub op: LoaderOp,
    pub model_id: String,
    pub phase: Phase,
}

/// Shared, append-only record of loader calls in the order they started
/// and finished.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    fn lock(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record(&self, op: LoaderOp, model_id: &str, phase: Phase) {
        self.lock().push(JournalEntry {
            op,
            model_id: model_id.to_string(),
            phase,
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    /// Number of calls to `op` that started.
    pub fn count(&self, op: LoaderOp) -> usize {
        self.lock()
            .iter()
            .filter(|entry| entry.op == op && entry.phase == Phase::Started)
            .count()
    }

    /// Index of the first matching entry.
    pub fn position(&self, op: LoaderOp, model_id: &str, phase: Phase) -> Option<usize> {
        self.lock()
            .iter()
            .position(|entry| entry.op == op && entry.phase == phase && entry.model_id == model_id)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
