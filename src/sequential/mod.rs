//! Entity management over sequential record stores.
//!
//! A sequential store can only stream its records in storage order and
//! address single records by primary key. Filtering and sorting therefore
//! happen here, record by record, with the in-memory predicate and sorter.

pub mod memory;

use crate::filtering::{compose_filter, predicate, sort};
use crate::manager::{
    EntityManager, EntityWriter, FetchEntitiesResponse, StoreError, ValidationIssue,
};
use crate::metadata::EntityMetadata;
use crate::params::RestParameters;
use crate::value::{record_value, Record};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub use memory::MemoryStore;

/// Storage contract for one sequentially accessible entity. Scans yield
/// records in storage order; keyed operations address a single record by its
/// primary-key fields.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn metadata(&self) -> &EntityMetadata;

    /// Stream every record in storage order.
    async fn scan(&self) -> Result<Box<dyn Iterator<Item = Record> + Send>, StoreError>;

    /// Read the record matching the primary-key fields of `key`, if any.
    async fn read(&self, key: &Record) -> Result<Option<Record>, StoreError>;

    /// Append a new record.
    async fn write(&self, record: Record) -> Result<(), StoreError>;

    /// Replace the record with the same primary key. Returns `false` when no
    /// such record exists.
    async fn rewrite(&self, record: Record) -> Result<bool, StoreError>;

    /// Remove the record matching the primary-key fields of `key`. Returns
    /// `false` when no such record exists.
    async fn delete(&self, key: &Record) -> Result<bool, StoreError>;
}

/// [`EntityManager`] over any [`RecordStore`].
pub struct SequentialManager {
    store: Arc<dyn RecordStore>,
}

impl SequentialManager {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn key_record(&self, fields: &Record) -> Result<Record, Vec<ValidationIssue>> {
        let mut key = Record::new();
        let mut issues = Vec::new();
        for field in self.store.metadata().key_fields() {
            match record_value(fields, &field.name) {
                Some(value) if !value.is_null() => {
                    key.insert(field.name.clone(), value.clone());
                }
                _ => issues.push(ValidationIssue::field(
                    &field.name,
                    "primary key field is required",
                )),
            }
        }
        if issues.is_empty() { Ok(key) } else { Err(issues) }
    }
}

#[async_trait]
impl EntityManager for SequentialManager {
    fn metadata(&self) -> &EntityMetadata {
        self.store.metadata()
    }

    async fn fetch_entities(
        &self,
        parameters: &RestParameters,
    ) -> Result<FetchEntitiesResponse, StoreError> {
        let metadata = self.store.metadata();
        let filter = compose_filter(parameters, &metadata.fields);
        let keep = |record: &Record| {
            filter
                .as_ref()
                .is_none_or(|f| predicate::matches(f, &metadata.fields, record))
        };

        // A sort forces a full pass; the whole matching set is collected
        // before pagination is applied.
        if let Some(rest_sort) = parameters.sort.as_ref().filter(|s| !s.is_empty()) {
            let mut matched: Vec<Record> = self.store.scan().await?.filter(keep).collect();
            let total_count = matched.len();
            sort::sort_records(rest_sort, &mut matched);
            let records: Vec<Record> = matched
                .into_iter()
                .skip(parameters.skip)
                .take(if parameters.take == 0 {
                    usize::MAX
                } else {
                    parameters.take
                })
                .collect();
            return Ok(FetchEntitiesResponse {
                total_count,
                records,
            });
        }

        // Unsorted scans stream: once the page is full the scan stops early,
        // unless the caller asked for a count, in which case the remaining
        // records are still visited to tally them.
        let mut records = Vec::new();
        let mut total_count = 0usize;
        let mut skipped = 0usize;
        for record in self.store.scan().await? {
            if !keep(&record) {
                continue;
            }
            total_count += 1;
            if skipped < parameters.skip {
                skipped += 1;
                continue;
            }
            if parameters.take > 0 && records.len() >= parameters.take {
                if parameters.with_count {
                    continue;
                }
                total_count -= 1;
                break;
            }
            records.push(record);
        }
        Ok(FetchEntitiesResponse {
            total_count,
            records,
        })
    }

    fn writer(&self) -> Option<&dyn EntityWriter> {
        if self.store.metadata().is_read_only {
            None
        } else {
            Some(self)
        }
    }
}

#[async_trait]
impl EntityWriter for SequentialManager {
    async fn insert_entity(&self, fields: Record) -> Result<Record, StoreError> {
        let metadata = self.store.metadata();
        let key = self.key_record(&fields).map_err(|issues| {
            debug!(entity = %metadata.name, ?issues, "insert rejected, key incomplete");
            StoreError::MissingKey {
                entity: metadata.name.clone(),
                field: issues
                    .first()
                    .and_then(|i| i.fields.first().cloned())
                    .unwrap_or_default(),
            }
        })?;
        if self.store.read(&key).await?.is_some() {
            return Err(StoreError::DuplicateKey {
                entity: metadata.name.clone(),
            });
        }
        self.store.write(fields).await?;
        Ok(key)
    }

    async fn update_entity(&self, fields: Record) -> Result<Vec<ValidationIssue>, StoreError> {
        let key = match self.key_record(&fields) {
            Ok(key) => key,
            Err(issues) => return Ok(issues),
        };
        let Some(mut existing) = self.store.read(&key).await? else {
            return Ok(vec![ValidationIssue::new(Vec::new(), "record not found")]);
        };
        let key_fields: Vec<&str> = self
            .store
            .metadata()
            .key_fields()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect();
        for (name, value) in fields {
            if key_fields.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
                continue;
            }
            existing.insert(name, value);
        }
        if self.store.rewrite(existing).await? {
            Ok(Vec::new())
        } else {
            Ok(vec![ValidationIssue::new(Vec::new(), "record not found")])
        }
    }

    async fn delete_entity(&self, fields: Record) -> Result<Vec<ValidationIssue>, StoreError> {
        let key = match self.key_record(&fields) {
            Ok(key) => key,
            Err(issues) => return Ok(issues),
        };
        if self.store.delete(&key).await? {
            Ok(Vec::new())
        } else {
            Ok(vec![ValidationIssue::new(Vec::new(), "record not found")])
        }
    }
}

/// [`crate::manager::DataSource`] over a fixed set of sequential stores.
pub struct SequentialDataSource {
    stores: Vec<Arc<dyn RecordStore>>,
}

impl SequentialDataSource {
    #[must_use]
    pub fn new(stores: Vec<Arc<dyn RecordStore>>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl crate::manager::DataSource for SequentialDataSource {
    async fn fetch_entity_managers(
        &self,
    ) -> Result<Vec<Arc<dyn EntityManager>>, StoreError> {
        Ok(self
            .stores
            .iter()
            .map(|store| {
                Arc::new(SequentialManager::new(Arc::clone(store))) as Arc<dyn EntityManager>
            })
            .collect())
    }
}
