//! A [`QueryModelLoader`] that answers from tables held in memory.
//!
//! Selections live per model id, as a server keeps them per selection key.
//! Failures and latency can be injected per operation, which makes the
//! loader usable as a stand-in server for store tests and demos.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lims_model::{Chart, QueryInfo, QueryModel, Row, RowMap, SchemaQuery};
use lims_store::{LoaderError, QueryModelLoader, RowsResponse};

use crate::eval::{compare_rows, matches_all};
use crate::journal::{Journal, LoaderOp, Phase};
use crate::table::TableSource;

fn table_key(schema_query: &SchemaQuery) -> String {
    format!(
        "{}.{}",
        schema_query.schema_name().to_lowercase(),
        schema_query.query_name().to_lowercase()
    )
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, TableSource>,
    charts: HashMap<String, Vec<Chart>>,
    selections: HashMap<String, BTreeSet<String>>,
    failures: HashMap<LoaderOp, String>,
    latency: HashMap<LoaderOp, Duration>,
}

#[derive(Debug, Default)]
pub struct MemoryLoader {
    state: Mutex<MemoryState>,
    journal: Journal,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(self, table: TableSource) -> Self {
        self.add_table(table);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_table(&self, table: TableSource) {
        let key = table_key(table.schema_query());
        tracing::debug!(table = %key, rows = table.len(), "Registered table");
        self.lock().tables.insert(key, table);
    }

    pub fn add_chart(&self, chart: Chart) {
        let key = table_key(&chart.schema_query);
        self.lock().charts.entry(key).or_default().push(chart);
    }

    /// Make every later call to `op` fail with a server error.
    pub fn fail(&self, op: LoaderOp, message: impl Into<String>) {
        self.lock().failures.insert(op, message.into());
    }

    pub fn recover(&self, op: LoaderOp) {
        self.lock().failures.remove(&op);
    }

    pub fn set_latency(&self, op: LoaderOp, latency: Duration) {
        self.lock().latency.insert(op, latency);
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Selections held for `model_id`.
    pub fn selections(&self, model_id: &str) -> BTreeSet<String> {
        self.lock()
            .selections
            .get(model_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed_selections<I, S>(&self, model_id: &str, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .selections
            .insert(model_id.to_string(), keys.into_iter().map(Into::into).collect());
    }

    /// Run `answer` against the state after any injected latency, recording
    /// the call in the journal.
    async fn call<T>(
        &self,
        op: LoaderOp,
        model: &QueryModel,
        answer: impl FnOnce(&mut MemoryState) -> Result<T, LoaderError>,
    ) -> Result<T, LoaderError> {
        self.journal.record(op, &model.id, Phase::Started);
        let latency = self.lock().latency.get(&op).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let result = {
            let mut state = self.lock();
            match state.failures.get(&op).cloned() {
                Some(message) => Err(LoaderError::Server {
                    status: 500,
                    message,
                }),
                None => answer(&mut *state),
            }
        };
        match &result {
            Ok(_) => tracing::debug!(op = %op, model_id = %model.id, "Loader call finished"),
            Err(error) => {
                tracing::debug!(op = %op, model_id = %model.id, %error, "Loader call failed");
            }
        }
        self.journal.record(op, &model.id, Phase::Finished);
        result
    }
}

impl MemoryState {
    fn table(&self, schema_query: &SchemaQuery) -> Result<&TableSource, LoaderError> {
        self.tables
            .get(&table_key(schema_query))
            .ok_or_else(|| LoaderError::not_found(format!("query {schema_query}")))
    }

    fn query_info(&self, model: &QueryModel) -> Result<QueryInfo, LoaderError> {
        let info = self.table(&model.schema_query)?.query_info();
        if let Some(view) = model.view_name()
            && info.view(Some(view)).is_none()
        {
            return Err(LoaderError::not_found(format!("view {view}")));
        }
        Ok(info)
    }

    /// Keys and rows matching the model's filters and its view's filters,
    /// in sort order.
    fn filtered_rows<'a>(
        &'a self,
        model: &QueryModel,
    ) -> Result<Vec<(String, &'a Row)>, LoaderError> {
        let table = self.table(&model.schema_query)?;
        let info = self.query_info(model)?;
        let view = info.view(model.view_name());
        let mut filters = model.load_rows_filters();
        if let Some(view) = view {
            filters.extend(view.filters.iter().cloned());
        }
        let sorts = match (model.sorts.is_empty(), view) {
            (true, Some(view)) => view.sorts.clone(),
            _ => model.sorts.clone(),
        };

        let mut rows: Vec<_> = table
            .rows()
            .iter()
            .filter(|row| matches_all(row, &filters))
            .filter_map(|row| table.row_key(row).map(|key| (key, row)))
            .collect();
        rows.sort_by(|(_, a), (_, b)| compare_rows(a, b, &sorts));
        Ok(rows)
    }

    fn selection_mut(&mut self, model: &QueryModel) -> &mut BTreeSet<String> {
        self.selections.entry(model.id.clone()).or_default()
    }
}

#[async_trait]
impl QueryModelLoader for MemoryLoader {
    async fn load_query_info(&self, model: &QueryModel) -> Result<QueryInfo, LoaderError> {
        self.call(LoaderOp::LoadQueryInfo, model, |state| state.query_info(model))
            .await
    }

    async fn load_rows(&self, model: &QueryModel) -> Result<RowsResponse, LoaderError> {
        self.call(LoaderOp::LoadRows, model, |state| {
            let matching = state.filtered_rows(model)?;
            let row_count = matching.len();
            let page_size = if model.is_paged() {
                model.max_rows
            } else {
                row_count
            };
            let mut rows = RowMap::new();
            let mut ordered_rows = Vec::new();
            for (key, row) in matching.into_iter().skip(model.offset).take(page_size) {
                ordered_rows.push(key.clone());
                rows.insert(key, row.clone());
            }
            Ok(RowsResponse {
                rows,
                ordered_rows,
                row_count,
                messages: Vec::new(),
            })
        })
        .await
    }

    async fn load_selections(&self, model: &QueryModel) -> Result<BTreeSet<String>, LoaderError> {
        self.call(LoaderOp::LoadSelections, model, |state| {
            Ok(state.selections.get(&model.id).cloned().unwrap_or_default())
        })
        .await
    }

    async fn set_selections(
        &self,
        model: &QueryModel,
        checked: bool,
        keys: &[String],
    ) -> Result<(), LoaderError> {
        self.call(LoaderOp::SetSelections, model, |state| {
            let selections = state.selection_mut(model);
            for key in keys {
                if checked {
                    selections.insert(key.clone());
                } else {
                    selections.remove(key);
                }
            }
            Ok(())
        })
        .await
    }

    async fn replace_selections(
        &self,
        model: &QueryModel,
        keys: &[String],
    ) -> Result<(), LoaderError> {
        self.call(LoaderOp::ReplaceSelections, model, |state| {
            *state.selection_mut(model) = keys.iter().cloned().collect();
            Ok(())
        })
        .await
    }

    async fn clear_selections(&self, model: &QueryModel) -> Result<(), LoaderError> {
        self.call(LoaderOp::ClearSelections, model, |state| {
            state.selections.remove(&model.id);
            Ok(())
        })
        .await
    }

    async fn select_all_rows(&self, model: &QueryModel) -> Result<BTreeSet<String>, LoaderError> {
        self.call(LoaderOp::SelectAllRows, model, |state| {
            let keys: Vec<String> = state
                .filtered_rows(model)?
                .into_iter()
                .map(|(key, _)| key)
                .collect();
            let selections = state.selection_mut(model);
            selections.extend(keys);
            Ok(selections.clone())
        })
        .await
    }

    async fn load_charts(
        &self,
        model: &QueryModel,
        include_sample_comparison: bool,
    ) -> Result<Vec<Chart>, LoaderError> {
        self.call(LoaderOp::LoadCharts, model, |state| {
            state.table(&model.schema_query)?;
            Ok(state
                .charts
                .get(&table_key(&model.schema_query))
                .into_iter()
                .flatten()
                .filter(|chart| include_sample_comparison || !chart.is_sample_comparison)
                .cloned()
                .collect())
        })
        .await
    }
}
