use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw value of a single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Boolean(_) | Self::Null => None,
        }
    }

    /// String form used for row keys and selection keys. `None` for nulls.
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// A cell: raw value plus optional display text and link.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellValue {
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CellValue {
    pub fn new(value: impl Into<FieldValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_display_value(mut self, display: impl Into<String>) -> Self {
        self.display_value = Some(display.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Text shown to users: display value, then formatted value, then raw value.
    pub fn display_text(&self) -> String {
        self.display_value
            .clone()
            .or_else(|| self.formatted_value.clone())
            .unwrap_or_else(|| self.value.to_string())
    }
}

/// One data row keyed by column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, column: impl Into<String>, cell: CellValue) -> Self {
        self.insert(column, cell);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, cell: CellValue) {
        self.cells.insert(column.into(), cell);
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column).or_else(|| {
            self.cells
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, cell)| cell)
        })
    }

    pub fn value(&self, column: &str) -> Option<&FieldValue> {
        self.get(column).map(|cell| &cell.value)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, CellValue)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Rows of one loaded page keyed by row key.
pub type RowMap = BTreeMap<String, Row>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_prefers_display_value() {
        let cell = CellValue::new(7_i64).with_display_value("Seven");
        assert_eq!(cell.display_text(), "Seven");
        assert_eq!(CellValue::new(7_i64).display_text(), "7");
        assert_eq!(CellValue::default().display_text(), "");
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let row = Row::new().with_cell("RowId", CellValue::new(1_i64));
        assert_eq!(row.value("rowid"), Some(&FieldValue::Integer(1)));
        assert_eq!(row.value("missing"), None);
    }

    #[test]
    fn null_has_no_key() {
        assert_eq!(FieldValue::Null.to_key_string(), None);
        assert_eq!(FieldValue::from("S-1").to_key_string().as_deref(), Some("S-1"));
    }

    #[test]
    fn cell_serializes_as_tagged_record() {
        let cell = CellValue::new("S-1").with_url("/samples/1");
        let json = serde_json::to_value(&cell).expect("serialize cell");
        assert_eq!(json["value"]["kind"], "text");
        assert_eq!(json["url"], "/samples/1");
        assert!(json.get("display_value").is_none());
    }
}
