//! The uniform CRUD facade every backend adapter implements, plus the
//! discovery contract a storage adapter exposes to the dispatcher.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::metadata::EntityMetadata;
use crate::params::RestParameters;
use crate::value::Record;

/// Result of a fetch: the page of records plus (optionally) the count of the
/// filtered-but-unpaginated set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchEntitiesResponse {
    /// Meaningful only when the request asked `with_count`; 0 otherwise.
    pub total_count: usize,
    pub records: Vec<Record>,
}

/// One validation failure reported by update/delete. Serialized as
/// `{"fields": [...], "message": "..."}` in 400 responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub fields: Vec<String>,
    pub message: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(fields: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            fields,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![field.into()], message)
    }
}

/// Storage-level failure. Distinct from the validation list: these are
/// conditions the contract treats as errors, not as reportable issues.
#[derive(Debug)]
pub enum StoreError {
    /// Insert hit an existing record with the same primary key.
    DuplicateKey { entity: String },
    /// A primary-key field required by the operation was absent.
    MissingKey { entity: String, field: String },
    /// A filter or sort named a field the entity does not declare.
    UnknownField { entity: String, field: String },
    /// Relational backend failure; propagated unmodified, never retried.
    Db(sea_orm::DbErr),
    /// Adapter-specific failure (I/O, malformed discovery payload).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { entity } => write!(f, "duplicate key on entity '{entity}'"),
            Self::MissingKey { entity, field } => {
                write!(f, "missing key field '{field}' on entity '{entity}'")
            }
            Self::UnknownField { entity, field } => {
                write!(f, "unknown field '{field}' on entity '{entity}'")
            }
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Db(err)
    }
}

/// Write half of the entity-manager capability set. Read-only entities
/// (views) simply do not expose one; callers check [`EntityManager::writer`]
/// before routing a write verb.
#[async_trait]
pub trait EntityWriter: Send + Sync {
    /// Insert a new record. Returns the primary-key field values of the
    /// created record, including backend-generated key values.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] when a record with the same primary key
    /// exists; [`StoreError::MissingKey`] when key fields are absent and the
    /// backend cannot generate them.
    async fn insert_entity(&self, fields: Record) -> Result<Record, StoreError>;

    /// Update an existing record. All primary-key fields must be present;
    /// key fields are never mutated. An empty issue list means success; a
    /// missing target record is an issue, not an error.
    ///
    /// # Errors
    ///
    /// Only for storage failures; validation outcomes travel in the list.
    async fn update_entity(&self, fields: Record) -> Result<Vec<ValidationIssue>, StoreError>;

    /// Delete a record by its primary-key fields. Same issue-list convention
    /// as update.
    ///
    /// # Errors
    ///
    /// Only for storage failures.
    async fn delete_entity(&self, fields: Record) -> Result<Vec<ValidationIssue>, StoreError>;
}

/// Uniform facade over one addressable entity, whatever the storage
/// technology behind it.
#[async_trait]
pub trait EntityManager: Send + Sync {
    fn metadata(&self) -> &EntityMetadata;

    /// Apply filter (explicit and smart, `and`-combined when both present),
    /// then sort, then pagination; compute `total_count` only when asked.
    ///
    /// # Errors
    ///
    /// Storage failures propagate as-is.
    async fn fetch_entities(
        &self,
        parameters: &RestParameters,
    ) -> Result<FetchEntitiesResponse, StoreError>;

    /// Write capability, absent on read-only entities.
    fn writer(&self) -> Option<&dyn EntityWriter> {
        None
    }
}

/// Discovery contract of a storage adapter: enumerate the entity managers
/// for everything the backend exposes. Called once per metadata cache
/// refresh.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_entity_managers(&self) -> Result<Vec<Arc<dyn EntityManager>>, StoreError>;
}
