//! Filter and sort evaluation over in-memory rows.

use std::cmp::Ordering;

use lims_model::{FieldValue, Filter, FilterOperator, Row, Sort, SortDirection};

fn text_of(value: &FieldValue) -> String {
    value.to_string().to_lowercase()
}

fn is_blank(value: Option<&FieldValue>) -> bool {
    match value {
        None | Some(FieldValue::Null) => true,
        Some(FieldValue::Text(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

/// Compare a cell against a filter value: numerically when both sides are
/// numbers, otherwise as case-insensitive text.
fn compare_value(cell: &FieldValue, value: &str) -> Option<Ordering> {
    if cell.is_null() {
        return None;
    }
    let numeric = match cell {
        FieldValue::Integer(_) | FieldValue::Number(_) => cell.as_f64(),
        _ => None,
    };
    if let (Some(left), Ok(right)) = (numeric, value.trim().parse::<f64>()) {
        return left.partial_cmp(&right);
    }
    Some(text_of(cell).cmp(&value.trim().to_lowercase()))
}

fn equals(cell: Option<&FieldValue>, value: &str) -> bool {
    cell.and_then(|cell| compare_value(cell, value)) == Some(Ordering::Equal)
}

/// Any cell containing `term`, ignoring case.
fn search(row: &Row, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    needle.is_empty()
        || row
            .cells()
            .any(|(_, cell)| text_of(&cell.value).contains(&needle))
}

/// Whether `row` satisfies `filter`.
pub fn matches(row: &Row, filter: &Filter) -> bool {
    let value = filter.value.as_deref().unwrap_or("");
    if filter.is_search() {
        return search(row, value);
    }

    let cell = row.value(&filter.column);
    let ordering = || cell.and_then(|cell| compare_value(cell, value));
    let text = || cell.map(text_of).unwrap_or_default();
    let needle = value.trim().to_lowercase();

    match filter.operator {
        FilterOperator::Equal => equals(cell, value),
        FilterOperator::NotEqualOrNull => is_blank(cell) || !equals(cell, value),
        FilterOperator::GreaterThan => ordering() == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => {
            matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
        }
        FilterOperator::LessThan => ordering() == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => {
            matches!(ordering(), Some(Ordering::Less | Ordering::Equal))
        }
        FilterOperator::Contains => !is_blank(cell) && text().contains(&needle),
        FilterOperator::DoesNotContain => is_blank(cell) || !text().contains(&needle),
        FilterOperator::StartsWith => !is_blank(cell) && text().starts_with(&needle),
        FilterOperator::In => filter
            .values()
            .into_iter()
            .any(|candidate| equals(cell, candidate)),
        FilterOperator::IsBlank => is_blank(cell),
        FilterOperator::IsNotBlank => !is_blank(cell),
        FilterOperator::Search => search(row, value),
    }
}

pub fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches(row, filter))
}

fn compare_fields(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    let a = a.filter(|value| !value.is_null());
    let b = b.filter(|value| !value.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let numeric = |value: &FieldValue| match value {
                FieldValue::Integer(_) | FieldValue::Number(_) => value.as_f64(),
                _ => None,
            };
            match (numeric(a), numeric(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => text_of(a).cmp(&text_of(b)),
            }
        }
    }
}

/// Order two rows by `sorts`. Nulls sort first and numbers before text.
pub fn compare_rows(a: &Row, b: &Row, sorts: &[Sort]) -> Ordering {
    for sort in sorts {
        let ordering = compare_fields(a.value(&sort.column), b.value(&sort.column));
        let ordering = match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
