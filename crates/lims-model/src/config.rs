//! Caller-supplied configuration for a new query model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::schema_query::SchemaQuery;
use crate::sort::Sort;

pub const DEFAULT_MAX_ROWS: usize = 20;
pub const DEFAULT_URL_PREFIX: &str = "query";

/// Folder scope applied to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerFilter {
    Current,
    CurrentAndSubfolders,
    CurrentPlusProject,
    CurrentAndParents,
    AllFolders,
}

/// Store-wide defaults filled into configs that leave them unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefaults {
    pub max_rows: usize,
    pub url_prefix: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Stable model id. Generated by the store when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub schema_query: SchemaQuery,
    /// Fixed filters that user filter changes never touch.
    #[serde(default)]
    pub base_filters: Vec<Filter>,
    #[serde(default)]
    pub required_columns: Vec<String>,
    #[serde(default)]
    pub omitted_columns: Vec<String>,
    #[serde(default)]
    pub sorts: Vec<Sort>,
    #[serde(default)]
    pub container_filter: Option<ContainerFilter>,
    #[serde(default)]
    pub container_path: Option<String>,
    /// Page size; `0` disables paging.
    #[serde(default)]
    pub max_rows: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub bind_url: bool,
    #[serde(default)]
    pub url_prefix: Option<String>,
    /// Restricts the model to the row whose primary key equals this value.
    #[serde(default)]
    pub key_value: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub include_details_column: bool,
    #[serde(default)]
    pub include_update_column: bool,
    #[serde(default)]
    pub use_saved_settings: bool,
    #[serde(default)]
    pub query_parameters: BTreeMap<String, String>,
}

impl QueryConfig {
    pub fn new(schema_query: SchemaQuery) -> Self {
        Self {
            id: None,
            schema_query,
            base_filters: Vec::new(),
            required_columns: Vec::new(),
            omitted_columns: Vec::new(),
            sorts: Vec::new(),
            container_filter: None,
            container_path: None,
            max_rows: None,
            offset: 0,
            bind_url: false,
            url_prefix: None,
            key_value: None,
            title: None,
            include_details_column: false,
            include_update_column: false,
            use_saved_settings: false,
            query_parameters: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_base_filters(mut self, filters: Vec<Filter>) -> Self {
        self.base_filters = filters;
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<Sort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Bind the model to the URL under `prefix`.
    pub fn bound_to_url(mut self, prefix: impl Into<String>) -> Self {
        self.bind_url = true;
        self.url_prefix = Some(prefix.into());
        self
    }

    pub fn with_required_columns(mut self, columns: Vec<String>) -> Self {
        self.required_columns = columns;
        self
    }

    pub fn with_omitted_columns(mut self, columns: Vec<String>) -> Self {
        self.omitted_columns = columns;
        self
    }

    pub fn with_key_value(mut self, key_value: impl Into<String>) -> Self {
        self.key_value = Some(key_value.into());
        self
    }

    pub fn with_container_filter(mut self, container_filter: ContainerFilter) -> Self {
        self.container_filter = Some(container_filter);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
