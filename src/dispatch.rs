//! Verb dispatch: path resolution, body field extraction and response
//! shaping over the mounted data sources.
//!
//! The dispatcher is transport-agnostic. It answers with `Ok(None)` for
//! requests it does not recognize, leaving the final status to whatever
//! layer sits in front of it (see [`crate::http`] for the axum binding).

use crate::cache::{self, MetadataCache};
use crate::errors::RestError;
use crate::manager::{DataSource, EntityManager};
use crate::metadata::{EntityMetadata, EntitySummary};
use crate::params::parse_query;
use crate::value::{FieldValue, Record};
use axum::http::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Dispatcher tunables.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Sliding validity of discovered metadata, per mounted root.
    pub metadata_cache_ttl: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            metadata_cache_ttl: cache::DEFAULT_TTL,
        }
    }
}

/// Transport-neutral request form.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    /// Path below the server root, e.g. `/hr/Employee/$metadata`.
    pub path: String,
    pub query: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Transport-neutral response form. `body` serializes as JSON when present.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: StatusCode,
    pub body: Option<serde_json::Value>,
}

impl RestResponse {
    #[must_use]
    pub fn ok_json(body: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    #[must_use]
    pub fn ok_empty() -> Self {
        Self {
            status: StatusCode::OK,
            body: None,
        }
    }
}

/// Routes requests to entity managers discovered under mounted roots.
pub struct Dispatcher {
    options: DispatchOptions,
    roots: HashMap<String, MetadataCache>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(options: DispatchOptions) -> Self {
        Self {
            options,
            roots: HashMap::new(),
        }
    }

    /// Mount a data source under a root path segment. Root matching is
    /// case-insensitive.
    #[must_use]
    pub fn mount(mut self, root: impl Into<String>, source: Arc<dyn DataSource>) -> Self {
        let cache = MetadataCache::new(source, self.options.metadata_cache_ttl);
        self.roots.insert(root.into().to_ascii_lowercase(), cache);
        self
    }

    /// Handle one request. `Ok(None)` means the request did not address a
    /// mounted root or a known entity and the caller decides the outcome.
    ///
    /// # Errors
    ///
    /// Client errors (malformed query-string payloads, conflicting or
    /// incomplete writes) and storage failures, each carrying its status.
    pub async fn handle(&self, request: &RestRequest) -> Result<Option<RestResponse>, RestError> {
        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((root, rest)) = segments.split_first() else {
            return Ok(None);
        };
        let Some(cache) = self.roots.get(&root.to_ascii_lowercase()) else {
            return Ok(None);
        };
        let managers = cache.managers().await?;

        match rest {
            ["$metadata"] if request.method == Method::GET => {
                let listing: Vec<EntitySummary> = managers
                    .iter()
                    .map(|m| EntitySummary::from(m.metadata()))
                    .collect();
                Ok(Some(RestResponse::ok_json(serde_json::to_value(listing)?)))
            }
            [entity, "$metadata"] if request.method == Method::GET => {
                match resolve_entity(&managers, entity) {
                    Some(manager) => Ok(Some(RestResponse::ok_json(serde_json::to_value(
                        manager.metadata(),
                    )?))),
                    None => Ok(None),
                }
            }
            [entity] => {
                let Some(manager) = resolve_entity(&managers, entity) else {
                    return Ok(None);
                };
                self.dispatch_verb(request, manager).await
            }
            _ => Ok(None),
        }
    }

    async fn dispatch_verb(
        &self,
        request: &RestRequest,
        manager: &Arc<dyn EntityManager>,
    ) -> Result<Option<RestResponse>, RestError> {
        let metadata = manager.metadata();
        let method = &request.method;

        if *method == Method::GET {
            let parameters = parse_query(request.query.as_deref())?.unwrap_or_default();
            let response = manager.fetch_entities(&parameters).await?;
            let count = if parameters.with_count {
                response.total_count
            } else {
                0
            };
            return Ok(Some(RestResponse::ok_json(serde_json::json!({
                "data": response.records,
                "count": count,
            }))));
        }

        // Write verbs need the write capability; a read-only entity leaves
        // the request unhandled.
        let is_write = *method == Method::POST
            || *method == Method::PUT
            || *method == Method::PATCH
            || *method == Method::DELETE;
        if !is_write {
            return Ok(None);
        }
        let Some(writer) = manager.writer() else {
            return Ok(None);
        };

        if *method == Method::POST {
            let fields = extract_fields(metadata, request.body.as_ref(), false);
            let created = writer.insert_entity(fields).await?;
            return Ok(Some(RestResponse::ok_json(serde_json::to_value(created)?)));
        }
        if *method == Method::PUT || *method == Method::PATCH {
            // PUT replaces: fields the body omits are set to null.
            let replace = *method == Method::PUT;
            let fields = extract_fields(metadata, request.body.as_ref(), replace);
            let issues = writer.update_entity(fields).await?;
            return Ok(Some(issue_response(issues)?));
        }
        let fields = extract_fields(metadata, request.body.as_ref(), false);
        let issues = writer.delete_entity(fields).await?;
        Ok(Some(issue_response(issues)?))
    }
}

fn issue_response(
    issues: Vec<crate::manager::ValidationIssue>,
) -> Result<RestResponse, RestError> {
    if issues.is_empty() {
        Ok(RestResponse::ok_empty())
    } else {
        Ok(RestResponse {
            status: StatusCode::BAD_REQUEST,
            body: Some(serde_json::to_value(issues)?),
        })
    }
}

/// Exact case-insensitive name match first; failing that, retry with `-`
/// and `_` stripped from both sides so `UserAccount` finds `USER_ACCOUNT`.
fn resolve_entity<'a>(
    managers: &'a [Arc<dyn EntityManager>],
    name: &str,
) -> Option<&'a Arc<dyn EntityManager>> {
    managers
        .iter()
        .find(|m| m.metadata().name.eq_ignore_ascii_case(name))
        .or_else(|| {
            let wanted = fold_entity_name(name);
            managers
                .iter()
                .find(|m| fold_entity_name(&m.metadata().name) == wanted)
        })
}

fn fold_entity_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Coerce body fields against the declared metadata. Values that fail
/// coercion are dropped, not reported. With `set_missing_null`, fields the
/// body omits come back as explicit nulls (full-replace semantics).
fn extract_fields(
    metadata: &EntityMetadata,
    body: Option<&serde_json::Value>,
    set_missing_null: bool,
) -> Record {
    let mut record = Record::new();
    let object = body.and_then(serde_json::Value::as_object);
    for field in &metadata.fields {
        let entry = object.and_then(|o| {
            o.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&field.name))
        });
        match entry {
            Some((_, value)) => match FieldValue::coerce(value, field) {
                Some(coerced) => {
                    record.insert(field.name.clone(), coerced);
                }
                None => {
                    debug!(field = %field.name, "body value failed type coercion, dropped");
                }
            },
            None if set_missing_null => {
                record.insert(field.name.clone(), FieldValue::Null);
            }
            None => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FieldDataType, FieldMetadata};
    use crate::sequential::{MemoryStore, SequentialDataSource, SequentialManager};
    use chrono::NaiveDate;
    use serde_json::json;

    fn employee_metadata() -> EntityMetadata {
        EntityMetadata::new(
            "USER_ACCOUNT",
            vec![
                FieldMetadata::new("Id", FieldDataType::Numeric).primary_key(),
                FieldMetadata::new("Name", FieldDataType::String),
                FieldMetadata::new("HireDate", FieldDataType::Date),
            ],
        )
    }

    fn source_with(records: Vec<Record>) -> Arc<dyn DataSource> {
        let store = Arc::new(MemoryStore::with_records(employee_metadata(), records));
        Arc::new(SequentialDataSource::new(vec![store]))
    }

    fn managers_for(records: Vec<Record>) -> Vec<Arc<dyn EntityManager>> {
        let store = Arc::new(MemoryStore::with_records(employee_metadata(), records));
        vec![Arc::new(SequentialManager::new(store))]
    }

    fn request(method: Method, path: &str) -> RestRequest {
        RestRequest {
            method,
            path: path.to_owned(),
            query: None,
            body: None,
        }
    }

    #[test]
    fn resolution_strips_separators() {
        let managers = managers_for(Vec::new());
        assert!(resolve_entity(&managers, "UserAccount").is_some());
        assert!(resolve_entity(&managers, "user_account").is_some());
        assert!(resolve_entity(&managers, "Unknown").is_none());
    }

    #[test]
    fn extraction_drops_uncoercible_values() {
        let metadata = employee_metadata();
        let body = json!({"Id": 1, "Name": 42, "HireDate": "2024-01-15"});
        let record = extract_fields(&metadata, Some(&body), false);
        assert_eq!(record.get("Id"), Some(&FieldValue::Integer(1)));
        assert!(!record.contains_key("Name"));
        assert_eq!(
            record.get("HireDate"),
            Some(&FieldValue::Date(
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
            ))
        );
    }

    #[test]
    fn replace_extraction_nulls_omitted_fields() {
        let metadata = employee_metadata();
        let body = json!({"Id": 1, "Name": "Ann"});
        let record = extract_fields(&metadata, Some(&body), true);
        assert_eq!(record.get("HireDate"), Some(&FieldValue::Null));

        let partial = extract_fields(&metadata, Some(&body), false);
        assert!(!partial.contains_key("HireDate"));
    }

    #[tokio::test]
    async fn unknown_root_and_entity_are_unhandled() {
        let dispatcher =
            Dispatcher::new(DispatchOptions::default()).mount("hr", source_with(Vec::new()));
        assert!(dispatcher
            .handle(&request(Method::GET, "/crm/Employee"))
            .await
            .unwrap()
            .is_none());
        assert!(dispatcher
            .handle(&request(Method::GET, "/hr/Unknown"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn metadata_listing_and_entity_metadata() {
        let dispatcher =
            Dispatcher::new(DispatchOptions::default()).mount("hr", source_with(Vec::new()));

        let listing = dispatcher
            .handle(&request(Method::GET, "/hr/$metadata"))
            .await
            .unwrap()
            .unwrap();
        let body = listing.body.unwrap();
        assert_eq!(body[0]["name"], "USER_ACCOUNT");
        assert!(body[0].get("fields").is_none());

        let full = dispatcher
            .handle(&request(Method::GET, "/hr/UserAccount/$metadata"))
            .await
            .unwrap()
            .unwrap();
        let body = full.body.unwrap();
        assert_eq!(body["fields"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fetch_wraps_data_and_count() {
        let mut record = Record::new();
        record.insert("Id".into(), FieldValue::Integer(1));
        record.insert("Name".into(), FieldValue::String("Ann".into()));
        let dispatcher =
            Dispatcher::new(DispatchOptions::default()).mount("hr", source_with(vec![record]));

        let mut req = request(Method::GET, "/hr/UserAccount");
        req.query = Some("withcount=true".to_owned());
        let response = dispatcher.handle(&req).await.unwrap().unwrap();
        let body = response.body.unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["Name"], "Ann");
    }

    #[tokio::test]
    async fn count_is_zero_when_not_requested() {
        let mut record = Record::new();
        record.insert("Id".into(), FieldValue::Integer(1));
        let dispatcher =
            Dispatcher::new(DispatchOptions::default()).mount("hr", source_with(vec![record]));

        let response = dispatcher
            .handle(&request(Method::GET, "/hr/UserAccount"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.body.unwrap()["count"], 0);
    }

    #[tokio::test]
    async fn malformed_filter_is_a_client_error() {
        let dispatcher =
            Dispatcher::new(DispatchOptions::default()).mount("hr", source_with(Vec::new()));
        let mut req = request(Method::GET, "/hr/UserAccount");
        req.query = Some("filter=notjson".to_owned());
        let err = dispatcher.handle(&req).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_missing_record_is_a_validation_response() {
        let dispatcher =
            Dispatcher::new(DispatchOptions::default()).mount("hr", source_with(Vec::new()));
        let mut req = request(Method::DELETE, "/hr/UserAccount");
        req.body = Some(json!({"Id": 9}));
        let response = dispatcher.handle(&req).await.unwrap().unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body.unwrap()[0]["message"], "record not found");
    }
}
