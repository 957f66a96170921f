//! In-memory evaluation of a filter tree against a single record.
//!
//! Used by backends that stream records sequentially and cannot push the
//! filter into a query language. Evaluation walks the tree per record;
//! comparison values are coerced with the entity's field metadata so that
//! `"42"` in a filter compares numerically against a numeric field.

use crate::metadata::FieldMetadata;
use crate::params::{FilterLogic, FilterOperator, RestFilter};
use crate::value::{record_value, FieldValue, Record};
use std::cmp::Ordering;

/// Returns whether `record` satisfies `filter`.
///
/// Composite nodes combine only their first two children; any further
/// children are ignored. A composite with a single child evaluates as that
/// child. Malformed leaves (missing field or operator) never match.
#[must_use]
pub fn matches(filter: &RestFilter, fields: &[FieldMetadata], record: &Record) -> bool {
    if filter.is_composite() {
        let Some(first) = filter.filters.first() else {
            return true;
        };
        let left = matches(first, fields, record);
        let Some(second) = filter.filters.get(1) else {
            return left;
        };
        return match filter.logic.unwrap_or(FilterLogic::And) {
            FilterLogic::And => left && matches(second, fields, record),
            FilterLogic::Or => left || matches(second, fields, record),
        };
    }

    let (Some(field), Some(operator)) = (filter.field.as_deref(), filter.operator) else {
        return false;
    };

    let actual = record_value(record, field)
        .cloned()
        .unwrap_or(FieldValue::Null);

    match operator {
        FilterOperator::IsNull => return actual.is_null(),
        FilterOperator::IsNotNull => return !actual.is_null(),
        FilterOperator::IsEmpty => {
            return matches!(&actual, FieldValue::String(s) if s.is_empty());
        }
        FilterOperator::IsNotEmpty => {
            return !matches!(&actual, FieldValue::String(s) if s.is_empty());
        }
        _ => {}
    }

    let expected = coerce_comparison(filter, fields, field);

    match operator {
        FilterOperator::IsEqual => actual.loose_eq(&expected),
        FilterOperator::IsNotEqual => !actual.loose_eq(&expected),
        FilterOperator::IsLessThan => ordered(&actual, &expected, Ordering::is_lt),
        FilterOperator::IsLessThanOrEqual => ordered(&actual, &expected, Ordering::is_le),
        FilterOperator::IsGreaterThan => ordered(&actual, &expected, Ordering::is_gt),
        FilterOperator::IsGreaterThanOrEqual => ordered(&actual, &expected, Ordering::is_ge),
        FilterOperator::Contains => {
            string_test(&actual, filter, |hay, needle| hay.contains(needle))
        }
        FilterOperator::DoesNotContain => {
            !string_test(&actual, filter, |hay, needle| hay.contains(needle))
        }
        FilterOperator::StartsWith => {
            string_test(&actual, filter, |hay, needle| hay.starts_with(needle))
        }
        FilterOperator::EndsWith => {
            string_test(&actual, filter, |hay, needle| hay.ends_with(needle))
        }
        FilterOperator::IsNull
        | FilterOperator::IsNotNull
        | FilterOperator::IsEmpty
        | FilterOperator::IsNotEmpty => unreachable!("handled above"),
    }
}

fn coerce_comparison(filter: &RestFilter, fields: &[FieldMetadata], field: &str) -> FieldValue {
    let meta = fields.iter().find(|f| f.name.eq_ignore_ascii_case(field));
    match meta {
        Some(meta) => FieldValue::coerce(&filter.value, meta).unwrap_or(FieldValue::Null),
        None => FieldValue::from_json_untyped(&filter.value),
    }
}

fn ordered(actual: &FieldValue, expected: &FieldValue, test: fn(Ordering) -> bool) -> bool {
    actual.compare(expected).is_some_and(test)
}

// Pattern operators take the filter value's text form directly, the same
// way the SQL compiler builds its LIKE pattern.
fn string_test(actual: &FieldValue, filter: &RestFilter, test: fn(&str, &str) -> bool) -> bool {
    let hay = actual.as_str_or_empty();
    let needle = match &filter.value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    if filter.ignore_case {
        test(&hay.to_lowercase(), &needle.to_lowercase())
    } else {
        test(hay, &needle)
    }
}
