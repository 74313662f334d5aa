//! The query model: one grid's query configuration plus its loaded state.
//!
//! Models are plain values. The store owns them behind `Arc`s and replaces
//! them copy-on-write, so a snapshot handed to a consumer never changes
//! under it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::chart::Chart;
use crate::config::{ContainerFilter, ModelDefaults, QueryConfig};
use crate::filter::Filter;
use crate::loading::{LoadingState, Slice, SliceStatus};
use crate::query_info::{QueryColumn, QueryInfo};
use crate::row::{Row, RowMap};
use crate::schema_query::SchemaQuery;
use crate::sort::{Sort, sorts_to_string};

/// How much of the current page is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedState {
    /// No rows on the page (or rows not loaded).
    NoRows,
    NoneSelected,
    SomeSelected,
    AllSelected,
}

#[derive(Debug, Clone)]
pub struct QueryModel {
    pub id: String,
    pub schema_query: SchemaQuery,
    pub base_filters: Vec<Filter>,
    /// User filters, replaced by `set_filters` and URL changes.
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
    pub required_columns: Vec<String>,
    pub omitted_columns: Vec<String>,
    pub container_filter: Option<ContainerFilter>,
    pub container_path: Option<String>,
    pub key_value: Option<String>,
    pub title: Option<String>,
    pub include_details_column: bool,
    pub include_update_column: bool,
    pub use_saved_settings: bool,
    pub query_parameters: BTreeMap<String, String>,
    pub max_rows: usize,
    /// Page size the model was configured with; `maxRows` is only written to
    /// the URL when it differs.
    pub default_max_rows: usize,
    pub offset: usize,
    pub bind_url: bool,
    pub url_prefix: String,
    pub selected_report_id: Option<String>,

    pub query_info: Option<Arc<QueryInfo>>,
    pub rows: Option<Arc<RowMap>>,
    pub ordered_rows: Option<Vec<String>>,
    pub row_count: Option<usize>,
    pub messages: Vec<String>,
    pub selections: BTreeSet<String>,
    pub charts: Option<Vec<Chart>>,

    pub query_info_status: SliceStatus,
    pub rows_status: SliceStatus,
    pub selections_status: SliceStatus,
    pub charts_status: SliceStatus,
}

impl QueryModel {
    pub fn from_config(
        id: impl Into<String>,
        config: QueryConfig,
        defaults: &ModelDefaults,
    ) -> Self {
        let max_rows = config.max_rows.unwrap_or(defaults.max_rows);
        Self {
            id: id.into(),
            schema_query: config.schema_query,
            base_filters: config.base_filters,
            filters: Vec::new(),
            sorts: config.sorts,
            required_columns: config.required_columns,
            omitted_columns: config.omitted_columns,
            container_filter: config.container_filter,
            container_path: config.container_path,
            key_value: config.key_value,
            title: config.title,
            include_details_column: config.include_details_column,
            include_update_column: config.include_update_column,
            use_saved_settings: config.use_saved_settings,
            query_parameters: config.query_parameters,
            max_rows,
            default_max_rows: max_rows,
            offset: config.offset,
            bind_url: config.bind_url,
            url_prefix: config
                .url_prefix
                .unwrap_or_else(|| defaults.url_prefix.clone()),
            selected_report_id: None,
            query_info: None,
            rows: None,
            ordered_rows: None,
            row_count: None,
            messages: Vec::new(),
            selections: BTreeSet::new(),
            charts: None,
            query_info_status: SliceStatus::default(),
            rows_status: SliceStatus::default(),
            selections_status: SliceStatus::default(),
            charts_status: SliceStatus::default(),
        }
    }

    // =========================================================================
    // SLICE ACCESS
    // =========================================================================

    pub fn status(&self, slice: Slice) -> &SliceStatus {
        match slice {
            Slice::QueryInfo => &self.query_info_status,
            Slice::Rows => &self.rows_status,
            Slice::Selections => &self.selections_status,
            Slice::Charts => &self.charts_status,
        }
    }

    pub fn status_mut(&mut self, slice: Slice) -> &mut SliceStatus {
        match slice {
            Slice::QueryInfo => &mut self.query_info_status,
            Slice::Rows => &mut self.rows_status,
            Slice::Selections => &mut self.selections_status,
            Slice::Charts => &mut self.charts_status,
        }
    }

    pub fn loading_state(&self, slice: Slice) -> LoadingState {
        self.status(slice).loading_state
    }

    pub fn error(&self, slice: Slice) -> Option<&str> {
        self.status(slice).error.as_deref()
    }

    pub fn query_info_loading_state(&self) -> LoadingState {
        self.query_info_status.loading_state
    }

    pub fn rows_loading_state(&self) -> LoadingState {
        self.rows_status.loading_state
    }

    pub fn selections_loading_state(&self) -> LoadingState {
        self.selections_status.loading_state
    }

    pub fn charts_loading_state(&self) -> LoadingState {
        self.charts_status.loading_state
    }

    /// Carry request numbering over from the model this one replaces.
    pub fn supersede(&mut self, previous: &Self) {
        for slice in Slice::ALL {
            self.status_mut(slice).supersede(previous.status(slice));
        }
    }

    // =========================================================================
    // RESETS
    // =========================================================================

    pub fn reset_query_info(&mut self) {
        self.query_info = None;
        self.query_info_status.reset();
    }

    /// Drop loaded rows and go back to the first page.
    pub fn reset_rows(&mut self) {
        self.rows = None;
        self.ordered_rows = None;
        self.row_count = None;
        self.messages.clear();
        self.offset = 0;
        self.rows_status.reset();
    }

    pub fn reset_selections(&mut self) {
        self.selections.clear();
        self.selections_status.reset();
    }

    pub fn reset_charts(&mut self) {
        self.charts = None;
        self.charts_status.reset();
    }

    // =========================================================================
    // DERIVED STATE
    // =========================================================================

    pub fn view_name(&self) -> Option<&str> {
        self.schema_query.view_name()
    }

    pub fn is_paged(&self) -> bool {
        self.max_rows > 0
    }

    pub fn has_rows(&self) -> bool {
        self.rows_status.loading_state.is_loaded() && self.rows.is_some()
    }

    /// Rows are loaded and at least one is present.
    pub fn has_data(&self) -> bool {
        self.has_rows() && self.rows.as_ref().is_some_and(|rows| !rows.is_empty())
    }

    pub fn has_charts(&self) -> bool {
        self.charts.as_ref().is_some_and(|charts| !charts.is_empty())
    }

    pub fn is_loading(&self) -> bool {
        self.query_info_status.loading_state.is_loading()
            || self.rows_status.loading_state.is_loading()
    }

    pub fn is_loading_selections(&self) -> bool {
        self.selections_status.loading_state.is_loading()
    }

    pub fn has_selections(&self) -> bool {
        !self.selections.is_empty()
    }

    pub fn selected_state(&self) -> SelectedState {
        let Some(ordered) = self.ordered_rows.as_ref().filter(|rows| !rows.is_empty()) else {
            return SelectedState::NoRows;
        };
        let selected = ordered
            .iter()
            .filter(|key| self.selections.contains(*key))
            .count();
        if selected == 0 {
            SelectedState::NoneSelected
        } else if selected == ordered.len() {
            SelectedState::AllSelected
        } else {
            SelectedState::SomeSelected
        }
    }

    /// Number of pages; `0` until the row count is known.
    pub fn page_count(&self) -> usize {
        match self.row_count {
            None => 0,
            Some(_) if !self.is_paged() => 1,
            Some(count) => count.div_ceil(self.max_rows),
        }
    }

    pub fn current_page(&self) -> usize {
        if self.is_paged() {
            self.offset / self.max_rows
        } else {
            0
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.offset == 0
    }

    /// True when there is no later page to move to, including when the row
    /// count is not known yet.
    pub fn is_last_page(&self) -> bool {
        if !self.is_paged() || self.row_count.is_none() {
            return true;
        }
        self.current_page() + 1 >= self.page_count()
    }

    /// Offset of the first row of the last page.
    pub fn last_page_offset(&self) -> usize {
        self.page_count().saturating_sub(1) * self.max_rows
    }

    pub fn key_columns(&self) -> Vec<&QueryColumn> {
        self.query_info
            .as_deref()
            .map(QueryInfo::pk_columns)
            .unwrap_or_default()
    }

    pub fn display_columns(&self) -> Vec<&QueryColumn> {
        self.query_info
            .as_deref()
            .map(|info| {
                info.display_columns(
                    self.view_name(),
                    &self.omitted_columns,
                    &self.required_columns,
                )
            })
            .unwrap_or_default()
    }

    pub fn search_filters(&self) -> Vec<&Filter> {
        self.filters.iter().filter(|f| f.is_search()).collect()
    }

    /// Filter on the single primary key when the model targets one row.
    pub fn key_filter(&self) -> Option<Filter> {
        let key_value = self.key_value.as_ref()?;
        match self.key_columns().as_slice() {
            [pk] => Some(Filter::equal(pk.name.clone(), key_value.clone())),
            _ => None,
        }
    }

    /// Every filter a rows request must honour: base, key and user filters.
    pub fn load_rows_filters(&self) -> Vec<Filter> {
        let mut filters = self.base_filters.clone();
        filters.extend(self.key_filter());
        filters.extend(self.filters.iter().cloned());
        filters
    }

    pub fn row(&self, key: &str) -> Option<&Row> {
        self.rows.as_ref()?.get(key)
    }

    /// Rows of the loaded page in display order.
    pub fn page_rows(&self) -> Vec<&Row> {
        let (Some(rows), Some(ordered)) = (self.rows.as_ref(), self.ordered_rows.as_ref()) else {
            return Vec::new();
        };
        ordered.iter().filter_map(|key| rows.get(key)).collect()
    }

    /// URL parameters describing this model's offset, page size, view,
    /// sorts, search, report and filters, all namespaced by `url_prefix`.
    /// Sorted by name; filters on the same column and operator keep their
    /// order.
    pub fn url_query_params(&self) -> Vec<(String, String)> {
        let prefix = &self.url_prefix;
        let mut params = Vec::new();

        if self.offset != 0 {
            params.push((format!("{prefix}.offset"), self.offset.to_string()));
        }
        if self.max_rows != self.default_max_rows {
            params.push((format!("{prefix}.maxRows"), self.max_rows.to_string()));
        }
        if let Some(view) = self.view_name() {
            params.push((format!("{prefix}.viewName"), view.to_string()));
        }
        if !self.sorts.is_empty() {
            params.push((format!("{prefix}.sort"), sorts_to_string(&self.sorts)));
        }
        let searches: Vec<&str> = self
            .search_filters()
            .into_iter()
            .filter_map(|f| f.value.as_deref())
            .collect();
        if !searches.is_empty() {
            params.push((format!("{prefix}.q"), searches.join(";")));
        }
        if let Some(report) = &self.selected_report_id {
            params.push((format!("{prefix}.reportId"), report.clone()));
        }
        for filter in self.filters.iter().filter(|f| !f.is_search()) {
            params.push((filter.url_param_name(prefix), filter.url_param_value()));
        }
        params.sort_by(|(a, _), (b, _)| a.cmp(b));
        params
    }
}
