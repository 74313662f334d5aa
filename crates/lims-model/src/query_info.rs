//! Schema metadata for a query: columns, primary keys and saved views.

use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::schema_query::SchemaQuery;
use crate::sort::Sort;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    #[default]
    String,
    Int,
    Float,
    Boolean,
    Date,
}

/// Foreign-key target of a lookup column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupInfo {
    pub schema_name: String,
    pub query_name: String,
    pub key_column: String,
    pub display_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryColumn {
    pub name: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub json_type: JsonType,
    #[serde(default)]
    pub is_key_field: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub lookup: Option<LookupInfo>,
}

impl QueryColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            caption: None,
            json_type: JsonType::default(),
            is_key_field: false,
            hidden: false,
            lookup: None,
        }
    }

    /// A primary-key column.
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            is_key_field: true,
            ..Self::new(name)
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_type(mut self, json_type: JsonType) -> Self {
        self.json_type = json_type;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn caption_or_name(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.name)
    }
}

/// A saved view over a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewInfo {
    /// Empty for the default view.
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Explicit column list; empty means every visible column.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub sorts: Vec<Sort>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl ViewInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            is_default: false,
            columns: Vec::new(),
            sorts: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn default_view() -> Self {
        Self {
            is_default: true,
            ..Self::named("")
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<Sort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryInfo {
    pub schema_query: SchemaQuery,
    #[serde(default)]
    pub title: Option<String>,
    pub columns: Vec<QueryColumn>,
    #[serde(default)]
    pub views: Vec<ViewInfo>,
}

impl QueryInfo {
    pub fn new(schema_query: SchemaQuery, columns: Vec<QueryColumn>) -> Self {
        Self {
            schema_query,
            title: None,
            columns,
            views: vec![ViewInfo::default_view()],
        }
    }

    pub fn with_view(mut self, view: ViewInfo) -> Self {
        self.views.retain(|existing| existing.name != view.name);
        self.views.push(view);
        self
    }

    pub fn pk_columns(&self) -> Vec<&QueryColumn> {
        self.columns.iter().filter(|c| c.is_key_field).collect()
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&QueryColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The named view, or the default view when `name` is `None`.
    pub fn view(&self, name: Option<&str>) -> Option<&ViewInfo> {
        match name {
            Some(name) => self
                .views
                .iter()
                .find(|v| v.name.eq_ignore_ascii_case(name)),
            None => self
                .views
                .iter()
                .find(|v| v.is_default || v.name.is_empty()),
        }
    }

    /// Columns shown for a view after removing `omitted` and appending any
    /// `required` columns the view does not already include.
    pub fn display_columns(
        &self,
        view_name: Option<&str>,
        omitted: &[String],
        required: &[String],
    ) -> Vec<&QueryColumn> {
        let is_omitted = |name: &str| omitted.iter().any(|o| o.eq_ignore_ascii_case(name));

        let mut columns: Vec<&QueryColumn> = match self.view(view_name) {
            Some(view) if !view.columns.is_empty() => view
                .columns
                .iter()
                .filter_map(|name| self.column(name))
                .collect(),
            _ => self.columns.iter().filter(|c| !c.hidden).collect(),
        };
        columns.retain(|c| !is_omitted(&c.name));

        for name in required {
            if columns.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            if let Some(column) = self.column(name) {
                columns.push(column);
            }
        }
        columns
    }
}
