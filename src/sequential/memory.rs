//! In-memory [`RecordStore`], used by tests and as the reference store
//! implementation for file-backed adapters.

use super::RecordStore;
use crate::manager::StoreError;
use crate::metadata::EntityMetadata;
use crate::value::{record_value, FieldValue, Record};
use async_trait::async_trait;
use base64::Engine as _;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Records keyed by an encoding of their primary-key values. Insertion order
/// is not preserved; scans yield key order, which is stable across calls.
pub struct MemoryStore {
    metadata: EntityMetadata,
    records: RwLock<BTreeMap<String, Record>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(metadata: EntityMetadata) -> Self {
        Self {
            metadata,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seed the store. Records without complete key values are dropped.
    #[must_use]
    pub fn with_records(metadata: EntityMetadata, records: Vec<Record>) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            if let Some(key) = key_of(&metadata, &record) {
                map.insert(key, record);
            }
        }
        Self {
            metadata,
            records: RwLock::new(map),
        }
    }
}

fn key_of(metadata: &EntityMetadata, record: &Record) -> Option<String> {
    let mut parts = Vec::new();
    for field in metadata.key_fields() {
        let value = record_value(record, &field.name)?;
        parts.push(encode_key_part(value)?);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\u{1f}"))
    }
}

// Canonical text form so that e.g. a key written as Integer(7) is found by a
// later lookup with the same coerced value.
fn encode_key_part(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => None,
        FieldValue::String(s) => Some(s.clone()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Decimal(d) => Some(d.normalize().to_string()),
        FieldValue::Date(d) => Some(d.to_string()),
        FieldValue::Time(t) => Some(t.to_string()),
        FieldValue::DateTime(dt) => Some(dt.to_string()),
        FieldValue::Bool(b) => Some(b.to_string()),
        FieldValue::Bytes(b) => Some(base64::engine::general_purpose::STANDARD.encode(b)),
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    async fn scan(&self) -> Result<Box<dyn Iterator<Item = Record> + Send>, StoreError> {
        let records: Vec<Record> = self.records.read().await.values().cloned().collect();
        Ok(Box::new(records.into_iter()))
    }

    async fn read(&self, key: &Record) -> Result<Option<Record>, StoreError> {
        let Some(key) = key_of(&self.metadata, key) else {
            return Ok(None);
        };
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn write(&self, record: Record) -> Result<(), StoreError> {
        let Some(key) = key_of(&self.metadata, &record) else {
            return Err(StoreError::Backend(
                "record has no complete primary key".to_owned(),
            ));
        };
        self.records.write().await.insert(key, record);
        Ok(())
    }

    async fn rewrite(&self, record: Record) -> Result<bool, StoreError> {
        let Some(key) = key_of(&self.metadata, &record) else {
            return Ok(false);
        };
        let mut map = self.records.write().await;
        if map.contains_key(&key) {
            map.insert(key, record);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete(&self, key: &Record) -> Result<bool, StoreError> {
        let Some(key) = key_of(&self.metadata, key) else {
            return Ok(false);
        };
        Ok(self.records.write().await.remove(&key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FieldDataType, FieldMetadata};

    fn metadata() -> EntityMetadata {
        EntityMetadata::new(
            "ORDER_LINE",
            vec![
                FieldMetadata::new("OrderId", FieldDataType::Numeric).primary_key(),
                FieldMetadata::new("LineNo", FieldDataType::Numeric).primary_key(),
                FieldMetadata::new("Qty", FieldDataType::Numeric),
            ],
        )
    }

    fn line(order: i64, line: i64, qty: i64) -> Record {
        let mut r = Record::new();
        r.insert("OrderId".into(), FieldValue::Integer(order));
        r.insert("LineNo".into(), FieldValue::Integer(line));
        r.insert("Qty".into(), FieldValue::Integer(qty));
        r
    }

    #[tokio::test]
    async fn composite_key_round_trip() {
        let store = MemoryStore::new(metadata());
        store.write(line(1, 2, 10)).await.unwrap();

        let mut key = Record::new();
        key.insert("orderid".into(), FieldValue::Integer(1));
        key.insert("lineno".into(), FieldValue::Integer(2));
        let found = store.read(&key).await.unwrap().unwrap();
        assert_eq!(found["Qty"], FieldValue::Integer(10));

        assert!(store.delete(&key).await.unwrap());
        assert!(store.read(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rewrite_requires_existing_record() {
        let store = MemoryStore::new(metadata());
        assert!(!store.rewrite(line(1, 1, 5)).await.unwrap());
        store.write(line(1, 1, 5)).await.unwrap();
        assert!(store.rewrite(line(1, 1, 6)).await.unwrap());
    }

    #[tokio::test]
    async fn incomplete_key_reads_nothing() {
        let store = MemoryStore::new(metadata());
        store.write(line(1, 1, 5)).await.unwrap();
        let mut partial = Record::new();
        partial.insert("OrderId".into(), FieldValue::Integer(1));
        assert!(store.read(&partial).await.unwrap().is_none());
    }
}
