//! The loader contract: every server interaction the store depends on.
//!
//! Implementations receive a snapshot of the model taken when the request
//! was dispatched. Each operation must be safe to call again after a failure.

use std::collections::BTreeSet;

use async_trait::async_trait;
use lims_model::{Chart, QueryInfo, QueryModel, RowMap, Slice};
use thiserror::Error;

/// Failure reported by a loader.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoaderError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }
}

/// One page of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowsResponse {
    pub rows: RowMap,
    /// Row keys in display order.
    pub ordered_rows: Vec<String>,
    /// Total rows matching the model's filters, across all pages.
    pub row_count: usize,
    pub messages: Vec<String>,
}

#[async_trait]
pub trait QueryModelLoader: Send + Sync {
    async fn load_query_info(&self, model: &QueryModel) -> Result<QueryInfo, LoaderError>;

    /// Load the page at `model.offset` of size `model.max_rows`, honouring
    /// the model's filters and sorts.
    async fn load_rows(&self, model: &QueryModel) -> Result<RowsResponse, LoaderError>;

    async fn load_selections(&self, model: &QueryModel) -> Result<BTreeSet<String>, LoaderError>;

    async fn set_selections(
        &self,
        model: &QueryModel,
        checked: bool,
        keys: &[String],
    ) -> Result<(), LoaderError>;

    async fn replace_selections(
        &self,
        model: &QueryModel,
        keys: &[String],
    ) -> Result<(), LoaderError>;

    async fn clear_selections(&self, model: &QueryModel) -> Result<(), LoaderError>;

    /// Select every row matching the model's filters; returns the full
    /// selection afterwards.
    async fn select_all_rows(&self, model: &QueryModel) -> Result<BTreeSet<String>, LoaderError>;

    async fn load_charts(
        &self,
        model: &QueryModel,
        include_sample_comparison: bool,
    ) -> Result<Vec<Chart>, LoaderError>;
}

/// Turn a loader failure into the message stored on the slice.
///
/// The original error is only logged.
pub fn resolve_error_message(slice: Slice, model_id: &str, error: &LoaderError) -> String {
    tracing::error!(model = model_id, slice = %slice, error = ?error, "Loader request failed");
    error.to_string()
}
