use serde::{Deserialize, Serialize};

use crate::schema_query::SchemaQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Box,
    Line,
    Pie,
    Scatter,
}

/// A saved chart report attached to a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chart {
    pub report_id: String,
    pub name: String,
    pub kind: ChartKind,
    pub schema_query: SchemaQuery,
    /// Sample comparison charts are only returned when explicitly requested.
    #[serde(default)]
    pub is_sample_comparison: bool,
}
