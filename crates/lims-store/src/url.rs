//! Query-string codec and per-model URL state.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use lims_model::{Filter, ModelError, QueryModel, Sort, filters_equal, parse_sorts};
use tracing::warn;

/// An ordered list of query-string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlQuery {
    params: Vec<(String, String)>,
}

impl UrlQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a=1&b=2`, with or without a leading `?`. Never fails: pairs
    /// without `=` get an empty value, bad escapes are kept literally.
    pub fn parse(query: &str) -> Self {
        let query = query.trim();
        let query = query.strip_prefix('?').unwrap_or(query);
        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(name), decode_component(value))
            })
            .collect();
        Self { params }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set `name`, replacing every existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.params.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.params.retain(|(key, _)| key != name);
    }

    /// Drop every parameter namespaced under `prefix.`.
    pub fn remove_prefixed(&mut self, prefix: &str) {
        let namespace = format!("{prefix}.");
        self.params.retain(|(key, _)| !key.starts_with(&namespace));
    }

    /// Replace everything under `prefix.` with `params`.
    pub fn replace_prefixed(
        &mut self,
        prefix: &str,
        params: impl IntoIterator<Item = (String, String)>,
    ) {
        self.remove_prefixed(prefix);
        self.params.extend(params);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for UrlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", encode_component(name), encode_component(value))?;
        }
        Ok(())
    }
}

impl FromStr for UrlQuery {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UrlQuery {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

const UNESCAPED: &[u8] = b"-_.~!*'(),;:@/";

fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || UNESCAPED.contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn decode_component(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            b'%' => match (
                bytes.get(index + 1).copied().and_then(hex_value),
                bytes.get(index + 2).copied().and_then(hex_value),
            ) {
                (Some(high), Some(low)) => {
                    decoded.push((high << 4) | low);
                    index += 3;
                }
                _ => {
                    decoded.push(b'%');
                    index += 1;
                }
            },
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// The state one model's prefixed parameters describe. Absent parameters
/// stay `None` (or empty for filters).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    pub offset: Option<usize>,
    pub max_rows: Option<usize>,
    pub sorts: Option<Vec<Sort>>,
    pub view_name: Option<String>,
    pub report_id: Option<String>,
    /// Column filters and search terms.
    pub filters: Vec<Filter>,
}

impl UrlState {
    /// Read the parameters under `prefix.`. A malformed parameter is logged
    /// and skipped; the others still apply.
    pub fn parse(query: &UrlQuery, prefix: &str) -> Self {
        let namespace = format!("{prefix}.");
        let mut state = Self::default();
        for (name, value) in query.iter() {
            let Some(attribute) = name.strip_prefix(&namespace) else {
                continue;
            };
            if let Err(error) = state.read_param(prefix, name, attribute, value) {
                warn!(prefix, param = name, %error, "Ignoring malformed URL parameter");
            }
        }
        state
    }

    fn read_param(
        &mut self,
        prefix: &str,
        name: &str,
        attribute: &str,
        value: &str,
    ) -> Result<(), ModelError> {
        match attribute {
            "offset" => {
                let offset = value
                    .trim()
                    .parse()
                    .map_err(|_| ModelError::InvalidOffset(value.to_string()))?;
                self.offset = Some(offset);
            }
            "maxRows" => {
                let max_rows = value
                    .trim()
                    .parse()
                    .map_err(|_| ModelError::InvalidMaxRows(value.to_string()))?;
                self.max_rows = Some(max_rows);
            }
            "sort" => self.sorts = Some(parse_sorts(value)?),
            "viewName" => self.view_name = non_blank(value),
            "reportId" => self.report_id = non_blank(value),
            "q" => self.filters.extend(
                value
                    .split(';')
                    .map(str::trim)
                    .filter(|term| !term.is_empty())
                    .map(Filter::search),
            ),
            _ => {
                if let Some(filter) = Filter::from_url_param(prefix, name, value) {
                    self.filters.push(filter?);
                }
            }
        }
        Ok(())
    }

    /// Apply only the parameters that are present. Used when a model is
    /// first registered, so configured values survive an empty URL.
    pub fn apply_present(&self, model: &mut QueryModel) {
        if let Some(max_rows) = self.max_rows {
            model.max_rows = max_rows;
        }
        if let Some(offset) = self.offset {
            model.offset = offset;
        }
        if let Some(sorts) = &self.sorts {
            model.sorts = sorts.clone();
        }
        if self.view_name.is_some() {
            model.schema_query = model.schema_query.with_view(self.view_name.clone());
        }
        if self.report_id.is_some() {
            model.selected_report_id = self.report_id.clone();
        }
        if !self.filters.is_empty() {
            model.filters = self.filters.clone();
        }
    }

    /// Resolve against `model`: absent parameters mean their defaults.
    pub fn target_for(&self, model: &QueryModel) -> UrlTarget {
        UrlTarget {
            offset: self.offset.unwrap_or(0),
            max_rows: self.max_rows.unwrap_or(model.default_max_rows),
            sorts: self.sorts.clone().unwrap_or_default(),
            view_name: self.view_name.clone(),
            report_id: self.report_id.clone(),
            filters: self.filters.clone(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Fully resolved URL state for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTarget {
    pub offset: usize,
    pub max_rows: usize,
    pub sorts: Vec<Sort>,
    pub view_name: Option<String>,
    pub report_id: Option<String>,
    pub filters: Vec<Filter>,
}

impl UrlTarget {
    pub fn differs_from(&self, model: &QueryModel) -> bool {
        self.offset != model.offset
            || self.max_rows != model.max_rows
            || self.sorts != model.sorts
            || self.view_name.as_deref() != model.view_name()
            || self.report_id != model.selected_report_id
            || !filters_equal(&self.filters, &model.filters)
    }

    /// Move `model` to this state. Rows become stale; a view or filter
    /// change also drops the loaded rows and row count. Returns whether the
    /// view changed.
    pub fn apply_to(self, model: &mut QueryModel) -> bool {
        let view_changed = self.view_name.as_deref() != model.view_name();
        let filters_changed = !filters_equal(&self.filters, &model.filters);
        if view_changed {
            model.schema_query = model.schema_query.with_view(self.view_name);
        }
        if view_changed || filters_changed {
            model.reset_rows();
        } else {
            model.rows_status.invalidate();
        }
        model.offset = self.offset;
        model.max_rows = self.max_rows;
        model.sorts = self.sorts;
        model.filters = self.filters;
        model.selected_report_id = self.report_id;
        view_changed
    }
}
