//! Filter-tree compilation into backend-native query forms.
//!
//! The same [`RestFilter`](crate::params::RestFilter) tree compiles two ways:
//! [`predicate`] produces an in-memory predicate for backends that can only
//! stream rows, [`sql`] produces a parameterized WHERE fragment for backends
//! with a query language. Both are pure computations over an immutable tree
//! and safe to run concurrently.

pub mod predicate;
pub mod sort;
pub mod sql;

use crate::metadata::FieldMetadata;
use crate::params::{FilterLogic, RestFilter, RestParameters};

/// Combine the explicit filter with the expanded smart filter. When both are
/// present they are joined with `and`; either alone passes through unwrapped.
#[must_use]
pub fn compose_filter(
    parameters: &RestParameters,
    fields: &[FieldMetadata],
) -> Option<RestFilter> {
    let smart = parameters
        .smart_filter
        .as_ref()
        .and_then(|s| s.compose_filter(fields));

    match (parameters.filter.clone(), smart) {
        (None, None) => None,
        (Some(filter), None) => Some(filter),
        (None, Some(smart)) => Some(smart),
        (Some(filter), Some(smart)) => {
            Some(RestFilter::composite(FilterLogic::And, vec![filter, smart]))
        }
    }
}
