use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Identifies a queryable dataset: schema, query and an optional saved view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaQuery {
    schema_name: String,
    query_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    view_name: Option<String>,
}

impl SchemaQuery {
    pub fn new(schema_name: impl Into<String>, query_name: impl Into<String>) -> Result<Self> {
        let schema_name = schema_name.into();
        let query_name = query_name.into();
        let schema_name = schema_name.trim();
        let query_name = query_name.trim();
        if schema_name.is_empty() {
            return Err(ModelError::EmptySchemaName);
        }
        if query_name.is_empty() {
            return Err(ModelError::EmptyQueryName);
        }
        Ok(Self {
            schema_name: schema_name.to_string(),
            query_name: query_name.to_string(),
            view_name: None,
        })
    }

    pub fn with_view_name(
        schema_name: impl Into<String>,
        query_name: impl Into<String>,
        view_name: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::new(schema_name, query_name)?.with_view(Some(view_name.into())))
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn view_name(&self) -> Option<&str> {
        self.view_name.as_deref()
    }

    /// Copy of this schema query with only the view replaced.
    ///
    /// A blank view name selects the default view.
    pub fn with_view(&self, view_name: Option<String>) -> Self {
        let view_name = view_name
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self {
            schema_name: self.schema_name.clone(),
            query_name: self.query_name.clone(),
            view_name,
        }
    }

    /// True when both point at the same schema and query, whatever the view.
    pub fn is_same_query(&self, other: &Self) -> bool {
        self.schema_name.eq_ignore_ascii_case(&other.schema_name)
            && self.query_name.eq_ignore_ascii_case(&other.query_name)
    }
}

impl fmt::Display for SchemaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.query_name)?;
        if let Some(view) = &self.view_name {
            write!(f, ".{view}")?;
        }
        Ok(())
    }
}
