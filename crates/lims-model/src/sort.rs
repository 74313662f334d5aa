use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }

    /// `column` for ascending, `-column` for descending.
    pub fn to_request_string(&self) -> String {
        match self.direction {
            SortDirection::Ascending => self.column.clone(),
            SortDirection::Descending => format!("-{}", self.column),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (column, direction) = match s.strip_prefix('-') {
            Some(rest) => (rest.trim(), SortDirection::Descending),
            None => (s.strip_prefix('+').unwrap_or(s).trim(), SortDirection::Ascending),
        };
        if column.is_empty() {
            return Err(ModelError::InvalidSort(s.to_string()));
        }
        Ok(Self {
            column: column.to_string(),
            direction,
        })
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_request_string())
    }
}

/// Comma-joined request form of a sort list.
pub fn sorts_to_string(sorts: &[Sort]) -> String {
    sorts
        .iter()
        .map(Sort::to_request_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a comma-joined sort list. Empty segments are skipped.
pub fn parse_sorts(s: &str) -> Result<Vec<Sort>> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(Sort::parse)
        .collect()
}
