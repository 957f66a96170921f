//! Record ordering for backends that sort in memory.

use crate::params::{RestSort, SortDirection};
use crate::value::{record_value, FieldValue, Record};
use std::cmp::Ordering;

/// Compares two records under a multi-field sort. Fields are consulted in
/// order; the first non-equal comparison decides. Null sorts after any value
/// in ascending order, and values of incomparable types count as equal so
/// later sort fields can still break the tie.
#[must_use]
pub fn compare_records(sort: &RestSort, a: &Record, b: &Record) -> Ordering {
    for field in &sort.fields {
        let x = record_value(a, &field.field).unwrap_or(&FieldValue::Null);
        let y = record_value(b, &field.field).unwrap_or(&FieldValue::Null);

        let ordering = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.compare(y).unwrap_or(Ordering::Equal),
        };

        let ordering = match field.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Sorts records in place under `sort`. The sort is stable, so records equal
/// under every sort field keep their arrival order.
pub fn sort_records(sort: &RestSort, records: &mut [Record]) {
    records.sort_by(|a, b| compare_records(sort, a, b));
}
