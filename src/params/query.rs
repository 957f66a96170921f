//! Query-string DSL → [`RestParameters`].
//!
//! Flat key/value pairs with case-insensitive keys; `sort` and `filter`
//! carry JSON payloads. Unrecognized keys are ignored. An absent or empty
//! query string yields no parameters at all, which callers must read as
//! "no parameters", not as an error.

use crate::errors::RestError;
use crate::params::{RestFilter, RestParameters, RestSort, RestSortField, SmartFilter};

/// Parse a raw query string (without the leading `?`).
///
/// # Errors
///
/// Returns [`RestError::BadRequest`] when the `sort` or `filter` payload is
/// malformed JSON rather than swallowing the caller's mistake.
pub fn parse_query(query: Option<&str>) -> Result<Option<RestParameters>, RestError> {
    let query = match query {
        Some(q) if !q.is_empty() => q,
        _ => return Ok(None),
    };

    let mut result = RestParameters::default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.to_ascii_lowercase().as_str() {
            "take" => {
                if let Ok(take) = value.parse::<usize>() {
                    result.take = take;
                }
            }
            "skip" => {
                if let Ok(skip) = value.parse::<usize>() {
                    result.skip = skip;
                }
            }
            "withcount" => {
                if let Ok(with_count) = value.parse::<bool>() {
                    result.with_count = with_count;
                }
            }
            "sort" => {
                if !value.is_empty() {
                    let fields: Vec<RestSortField> =
                        serde_json::from_str(&value).map_err(|e| {
                            RestError::bad_request(format!("malformed sort parameter: {e}"))
                        })?;
                    result.sort = Some(RestSort { fields });
                }
            }
            "filter" => {
                if !value.is_empty() {
                    let filter: RestFilter = serde_json::from_str(&value).map_err(|e| {
                        RestError::bad_request(format!("malformed filter parameter: {e}"))
                    })?;
                    result.filter = Some(filter);
                }
            }
            "smartfilter" => {
                if !value.is_empty() {
                    result.smart_filter = Some(SmartFilter::new(value.into_owned()));
                }
            }
            _ => {}
        }
    }

    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FilterOperator, SortDirection};

    #[test]
    fn empty_query_yields_no_parameters() {
        assert_eq!(parse_query(None).unwrap(), None);
        assert_eq!(parse_query(Some("")).unwrap(), None);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let params = parse_query(Some("TAKE=5&Skip=10&WithCount=true"))
            .unwrap()
            .unwrap();
        assert_eq!(params.take, 5);
        assert_eq!(params.skip, 10);
        assert!(params.with_count);
    }

    #[test]
    fn unknown_and_malformed_scalar_keys_are_ignored() {
        let params = parse_query(Some("take=abc&color=red&skip=2"))
            .unwrap()
            .unwrap();
        assert_eq!(params.take, 0);
        assert_eq!(params.skip, 2);
    }

    #[test]
    fn sort_and_filter_parse_from_json() {
        let query = "sort=%5B%7B%22field%22%3A%22Id%22%2C%22direction%22%3A%22Ascending%22%7D%5D\
                     &filter=%7B%22field%22%3A%22Name%22%2C%22operator%22%3A%22eq%22%2C%22value%22%3A%22x%22%7D";
        let params = parse_query(Some(query)).unwrap().unwrap();
        let sort = params.sort.unwrap();
        assert_eq!(sort.fields[0].field, "Id");
        assert_eq!(sort.fields[0].direction, SortDirection::Ascending);
        assert_eq!(params.filter.unwrap().operator, Some(FilterOperator::IsEqual));
    }

    #[test]
    fn malformed_filter_json_is_a_caller_error() {
        assert!(parse_query(Some("filter=%7Bnot-json")).is_err());
        assert!(parse_query(Some("sort=%5B%7B%7D%5D")).is_err()); // missing field name
    }

    #[test]
    fn smart_filter_is_taken_verbatim() {
        let params = parse_query(Some("smartfilter=10%20-%2020")).unwrap().unwrap();
        assert_eq!(params.smart_filter.unwrap().value, "10 - 20");
    }
}
