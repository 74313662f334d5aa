//! Loading lifecycle of the independently loaded parts of a model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `Initialized -> Loading -> Loaded`. Failures also end in `Loaded`, with
/// the slice error set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingState {
    #[default]
    Initialized,
    Loading,
    Loaded,
}

impl LoadingState {
    pub fn is_loading(self) -> bool {
        self == Self::Loading
    }

    pub fn is_loaded(self) -> bool {
        self == Self::Loaded
    }
}

/// The four independently loaded parts of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slice {
    QueryInfo,
    Rows,
    Selections,
    Charts,
}

impl Slice {
    pub const ALL: [Self; 4] = [Self::QueryInfo, Self::Rows, Self::Selections, Self::Charts];

    pub fn label(self) -> &'static str {
        match self {
            Self::QueryInfo => "query info",
            Self::Rows => "rows",
            Self::Selections => "selections",
            Self::Charts => "charts",
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Loading state, last error and request sequence of one slice.
///
/// Every dispatched request takes the next sequence number; a response is
/// only applied while its number is still the latest one.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceStatus {
    pub loading_state: LoadingState,
    pub error: Option<String>,
    pub request_seq: u64,
}

impl SliceStatus {
    /// Start a load: `Loading` plus a fresh sequence number. A previous
    /// error stays visible until the load succeeds.
    pub fn begin(&mut self) -> u64 {
        self.loading_state = LoadingState::Loading;
        self.next_request()
    }

    /// Take a fresh sequence number without touching the loading state.
    pub fn next_request(&mut self) -> u64 {
        self.request_seq += 1;
        self.request_seq
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.request_seq
    }

    pub fn succeed(&mut self) {
        self.loading_state = LoadingState::Loaded;
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading_state = LoadingState::Loaded;
        self.error = Some(message.into());
    }

    /// Back to `Initialized`; outstanding requests become stale.
    pub fn invalidate(&mut self) {
        self.loading_state = LoadingState::Initialized;
        self.request_seq += 1;
    }

    /// Like [`invalidate`](Self::invalidate), also dropping the error.
    pub fn reset(&mut self) {
        self.invalidate();
        self.error = None;
    }

    /// Continue numbering after `previous` so its in-flight responses stay stale.
    pub fn supersede(&mut self, previous: &Self) {
        self.request_seq = self.request_seq.max(previous.request_seq + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_survives_reload_until_success() {
        let mut status = SliceStatus::default();
        let first = status.begin();
        status.fail("boom");
        let second = status.begin();
        assert!(second > first);
        assert_eq!(status.loading_state, LoadingState::Loading);
        assert_eq!(status.error.as_deref(), Some("boom"));
        status.succeed();
        assert_eq!(status.error, None);
    }

    #[test]
    fn invalidate_makes_outstanding_request_stale() {
        let mut status = SliceStatus::default();
        let seq = status.begin();
        status.invalidate();
        assert!(!status.is_current(seq));
        assert_eq!(status.loading_state, LoadingState::Initialized);
    }
}
