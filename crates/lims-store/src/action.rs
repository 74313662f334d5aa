use lims_model::{Filter, QueryConfig, Row, SchemaQuery, Sort};

use crate::url::UrlQuery;

/// Every store action as a value, for callers that go through the runtime.
#[derive(Debug, Clone)]
pub enum Action {
    AddModel {
        config: QueryConfig,
        load: bool,
        load_selections: bool,
    },
    RemoveModel {
        id: String,
    },
    LoadModel {
        id: String,
        load_selections: bool,
    },
    LoadAllModels {
        load_selections: bool,
    },
    LoadQueryInfo {
        id: String,
    },
    LoadRows {
        id: String,
        load_selections: bool,
    },
    LoadSelections {
        id: String,
    },
    LoadCharts {
        id: String,
        include_sample_comparison: bool,
    },
    LoadNextPage {
        id: String,
    },
    LoadPreviousPage {
        id: String,
    },
    LoadFirstPage {
        id: String,
    },
    LoadLastPage {
        id: String,
    },
    SetOffset {
        id: String,
        offset: usize,
    },
    SetMaxRows {
        id: String,
        max_rows: usize,
    },
    SetFilters {
        id: String,
        filters: Vec<Filter>,
        load_selections: bool,
    },
    SetSorts {
        id: String,
        sorts: Vec<Sort>,
    },
    SetSchemaQuery {
        id: String,
        schema_query: SchemaQuery,
        load_selections: bool,
    },
    SetView {
        id: String,
        view_name: Option<String>,
        load_selections: bool,
    },
    SetSelections {
        id: String,
        checked: bool,
        keys: Vec<String>,
    },
    ReplaceSelections {
        id: String,
        keys: Vec<String>,
    },
    SelectAllRows {
        id: String,
    },
    SelectRow {
        id: String,
        checked: bool,
        row: Row,
    },
    SelectPage {
        id: String,
        checked: bool,
    },
    ClearSelections {
        id: String,
    },
    SelectReport {
        id: String,
        report_id: Option<String>,
    },
    SetLocation {
        query: UrlQuery,
    },
}

impl Action {
    /// Target model, for actions that have one.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            Self::AddModel { config, .. } => config.id.as_deref(),
            Self::LoadAllModels { .. } | Self::SetLocation { .. } => None,
            Self::RemoveModel { id }
            | Self::LoadModel { id, .. }
            | Self::LoadQueryInfo { id }
            | Self::LoadRows { id, .. }
            | Self::LoadSelections { id }
            | Self::LoadCharts { id, .. }
            | Self::LoadNextPage { id }
            | Self::LoadPreviousPage { id }
            | Self::LoadFirstPage { id }
            | Self::LoadLastPage { id }
            | Self::SetOffset { id, .. }
            | Self::SetMaxRows { id, .. }
            | Self::SetFilters { id, .. }
            | Self::SetSorts { id, .. }
            | Self::SetSchemaQuery { id, .. }
            | Self::SetView { id, .. }
            | Self::SetSelections { id, .. }
            | Self::ReplaceSelections { id, .. }
            | Self::SelectAllRows { id }
            | Self::SelectRow { id, .. }
            | Self::SelectPage { id, .. }
            | Self::ClearSelections { id }
            | Self::SelectReport { id, .. } => Some(id),
        }
    }
}
