//! Column filters and their URL parameter form.
//!
//! A filter serialises onto the URL as `<prefix>.<column>~<operator>=<value>`.
//! Full-text search filters use the reserved column `*` and are written as a
//! single `<prefix>.q` parameter by the model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "eq")]
    Equal,
    #[serde(rename = "neqornull")]
    NotEqualOrNull,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterThanOrEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessThanOrEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "doesnotcontain")]
    DoesNotContain,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "isblank")]
    IsBlank,
    #[serde(rename = "isnonblank")]
    IsNotBlank,
    #[serde(rename = "q")]
    Search,
}

impl FilterOperator {
    pub const ALL: [Self; 13] = [
        Self::Equal,
        Self::NotEqualOrNull,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Contains,
        Self::DoesNotContain,
        Self::StartsWith,
        Self::In,
        Self::IsBlank,
        Self::IsNotBlank,
        Self::Search,
    ];

    /// Suffix used after `~` in URL parameter names.
    pub fn url_suffix(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqualOrNull => "neqornull",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "gte",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "lte",
            Self::Contains => "contains",
            Self::DoesNotContain => "doesnotcontain",
            Self::StartsWith => "startswith",
            Self::In => "in",
            Self::IsBlank => "isblank",
            Self::IsNotBlank => "isnonblank",
            Self::Search => "q",
        }
    }

    /// Whether the operator compares against a value.
    pub fn takes_value(self) -> bool {
        !matches!(self, Self::IsBlank | Self::IsNotBlank)
    }
}

impl FromStr for FilterOperator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.url_suffix().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ModelError::UnknownFilterOperator(s.to_string()))
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url_suffix())
    }
}

/// A single column predicate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Filter {
    /// Column name used by full-text search filters.
    pub const SEARCH_COLUMN: &'static str = "*";

    pub fn new(
        column: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// Filter for operators that carry no value, such as `isblank`.
    pub fn without_value(column: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            column: column.into(),
            operator,
            value: None,
        }
    }

    pub fn equal(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(column, FilterOperator::Equal, value)
    }

    pub fn search(value: impl Into<String>) -> Self {
        Self::new(Self::SEARCH_COLUMN, FilterOperator::Search, value)
    }

    pub fn is_search(&self) -> bool {
        self.column == Self::SEARCH_COLUMN
    }

    /// Values of an `in` filter (`;` separated); a single value otherwise.
    pub fn values(&self) -> Vec<&str> {
        match (&self.value, self.operator) {
            (None, _) => Vec::new(),
            (Some(value), FilterOperator::In) => value
                .split(';')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect(),
            (Some(value), _) => vec![value.as_str()],
        }
    }

    pub fn url_param_name(&self, prefix: &str) -> String {
        format!("{prefix}.{}~{}", self.column, self.operator.url_suffix())
    }

    pub fn url_param_value(&self) -> String {
        self.value.clone().unwrap_or_default()
    }

    /// Parse a `<prefix>.<column>~<op>` parameter back into a filter.
    ///
    /// Returns `None` when the parameter does not belong to `prefix` or is
    /// not a filter parameter at all.
    pub fn from_url_param(prefix: &str, name: &str, value: &str) -> Option<Result<Self>> {
        let rest = name.strip_prefix(prefix)?.strip_prefix('.')?;
        let (column, op) = rest.rsplit_once('~')?;
        Some(Self::parse_param_parts(name, column, op, value))
    }

    fn parse_param_parts(name: &str, column: &str, op: &str, value: &str) -> Result<Self> {
        if column.trim().is_empty() {
            return Err(ModelError::InvalidFilterParam {
                name: name.to_string(),
                reason: "missing column name".to_string(),
            });
        }
        let operator = op.parse::<FilterOperator>()?;
        if operator.takes_value() {
            Ok(Self::new(column, operator, value))
        } else {
            Ok(Self::without_value(column, operator))
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.column, self.operator)?;
        if let Some(value) = &self.value {
            write!(f, "={value}")?;
        }
        Ok(())
    }
}

/// Order-insensitive equality of two filter lists.
pub fn filters_equal(a: &[Filter], b: &[Filter]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<&Filter> = a.iter().collect();
    let mut right: Vec<&Filter> = b.iter().collect();
    left.sort();
    right.sort();
    left == right
}
