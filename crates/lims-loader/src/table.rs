use std::io;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use lims_model::{
    CellValue, FieldValue, JsonType, QueryColumn, QueryInfo, Row, SchemaQuery, ViewInfo,
};

/// A queryable table: typed rows plus the metadata a loader reports for it.
#[derive(Debug, Clone)]
pub struct TableSource {
    schema_query: SchemaQuery,
    columns: Vec<QueryColumn>,
    views: Vec<ViewInfo>,
    key_column: String,
    rows: Vec<Row>,
}

fn trim_cell(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

fn normalize_header(raw: &str) -> String {
    trim_cell(raw).to_string()
}

fn parse_cell(raw: &str) -> FieldValue {
    let trimmed = trim_cell(raw);
    if trimmed.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return FieldValue::Integer(integer);
    }
    if let Ok(number) = trimmed.parse::<f64>() {
        return FieldValue::Number(number);
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return FieldValue::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return FieldValue::Boolean(false);
    }
    FieldValue::Text(trimmed.to_string())
}

/// Narrowest type covering every non-null value in the column.
fn infer_type<'a>(values: impl Iterator<Item = &'a FieldValue>) -> JsonType {
    let mut inferred: Option<JsonType> = None;
    for value in values {
        let current = match value {
            FieldValue::Null => continue,
            FieldValue::Integer(_) => JsonType::Int,
            FieldValue::Number(_) => JsonType::Float,
            FieldValue::Boolean(_) => JsonType::Boolean,
            FieldValue::Text(_) => JsonType::String,
        };
        inferred = Some(match (inferred, current) {
            (None, current) => current,
            (Some(previous), current) if previous == current => previous,
            (Some(JsonType::Int | JsonType::Float), JsonType::Int | JsonType::Float) => {
                JsonType::Float
            }
            _ => JsonType::String,
        });
    }
    inferred.unwrap_or_default()
}

impl TableSource {
    /// Build a table from rows already in memory.
    pub fn new(
        schema_query: SchemaQuery,
        columns: Vec<QueryColumn>,
        rows: Vec<Row>,
    ) -> Result<Self> {
        let Some(key_column) = columns.iter().find(|column| column.is_key_field) else {
            bail!("table {schema_query} has no key column");
        };
        Ok(Self {
            key_column: key_column.name.clone(),
            schema_query: schema_query.with_view(None),
            columns,
            views: Vec::new(),
            rows,
        })
    }

    pub fn from_csv_path(schema_query: SchemaQuery, path: &Path, key_column: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("open csv: {}", path.display()))?;
        Self::from_csv_reader(schema_query, file, key_column)
            .with_context(|| format!("read csv: {}", path.display()))
    }

    pub fn from_csv_str(schema_query: SchemaQuery, content: &str, key_column: &str) -> Result<Self> {
        Self::from_csv_reader(schema_query, content.as_bytes(), key_column)
    }

    /// Read a CSV whose first row holds the column names. Cells are typed
    /// as integer, number, boolean or text; empty cells become nulls.
    pub fn from_csv_reader<R: io::Read>(
        schema_query: SchemaQuery,
        reader: R,
        key_column: &str,
    ) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .context("read csv header")?
            .iter()
            .map(normalize_header)
            .collect();
        let Some(key_index) = headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(key_column))
        else {
            bail!("key column '{key_column}' not found in {headers:?}");
        };

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("read record {}", line + 1))?;
            if record.iter().all(|value| value.trim().is_empty()) {
                continue;
            }
            let row: Row = headers
                .iter()
                .enumerate()
                .map(|(index, header)| {
                    let raw = record.get(index).unwrap_or("");
                    (header.clone(), CellValue::new(parse_cell(raw)))
                })
                .collect();
            if row
                .value(&headers[key_index])
                .is_none_or(FieldValue::is_null)
            {
                bail!("record {} has no value for key column '{key_column}'", line + 1);
            }
            rows.push(row);
        }

        let columns = headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let json_type = infer_type(rows.iter().filter_map(|row| row.value(header)));
                let column = if index == key_index {
                    QueryColumn::key(header.clone())
                } else {
                    QueryColumn::new(header.clone())
                };
                column.with_type(json_type)
            })
            .collect();

        tracing::debug!(table = %schema_query, rows = rows.len(), "Loaded csv table");
        Self::new(schema_query, columns, rows)
    }

    /// Register a saved view; replaces a view of the same name.
    #[must_use]
    pub fn with_view(mut self, view: ViewInfo) -> Self {
        self.views.retain(|existing| !existing.name.eq_ignore_ascii_case(&view.name));
        self.views.push(view);
        self
    }

    pub fn schema_query(&self) -> &SchemaQuery {
        &self.schema_query
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_key(&self, row: &Row) -> Option<String> {
        row.value(&self.key_column)
            .and_then(FieldValue::to_key_string)
    }

    pub fn query_info(&self) -> QueryInfo {
        self.views.iter().cloned().fold(
            QueryInfo::new(self.schema_query.clone(), self.columns.clone()),
            QueryInfo::with_view,
        )
    }
}
