//! In-memory backend for the query model store.
//!
//! [`MemoryLoader`] serves [`TableSource`]s loaded from CSV, evaluating
//! filters, sorts and paging the way a LabKey server would. It records every
//! call in a [`Journal`] and can inject latency or failures per operation.

pub mod eval;
pub mod journal;
pub mod memory;
pub mod table;

pub use eval::{compare_rows, matches, matches_all};
pub use journal::{Journal, JournalEntry, LoaderOp, Phase};
pub use memory::MemoryLoader;
pub use table::TableSource;
