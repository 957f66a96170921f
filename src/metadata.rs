//! Entity and field metadata: the runtime-discovered description of every
//! addressable resource.
//!
//! Metadata is produced once per discovery cycle by a [`crate::manager::DataSource`]
//! and treated as immutable afterwards; the dispatcher shares it through the
//! metadata cache as `Arc<EntityMetadata>`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Data type of a single entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum FieldDataType {
    String,
    Date,
    Time,
    DateTime,
    Numeric,
    ByteArray,
}

/// Metadata of one field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    /// Field name as the backend declares it.
    pub name: String,
    /// Human readable description, empty when the backend has none.
    #[serde(default)]
    pub description: String,
    /// Declared size (characters for strings, precision for numerics).
    #[serde(default)]
    pub size: u32,
    /// Decimal digits; meaningful for numeric fields only. A numeric field
    /// with `scale == 0` carries integer values.
    #[serde(default)]
    pub scale: u32,
    #[serde(rename = "type")]
    pub field_type: FieldDataType,
    #[serde(default)]
    pub is_required: bool,
    /// Primary-key membership. A key can span several fields.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Read-only fields (computed, identity) are never written back.
    #[serde(default)]
    pub is_read_only: bool,
}

impl FieldMetadata {
    /// Shorthand used by discovery code and tests.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldDataType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            size: 0,
            scale: 0,
            field_type,
            is_required: false,
            is_primary_key: false,
            is_read_only: false,
        }
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_required = true;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }
}

/// Metadata of one addressable entity (table, view or sequential file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Read-only entities (e.g. views) expose no write operations.
    #[serde(default)]
    pub is_read_only: bool,
    /// Fields in backend declaration order.
    pub fields: Vec<FieldMetadata>,
}

impl EntityMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldMetadata>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            is_read_only: false,
            fields,
        }
    }

    /// Look a field up by name, case-insensitively. Filter fields and body
    /// keys may not match the backend's casing.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Fields that form the primary key, in declaration order.
    #[must_use]
    pub fn key_fields(&self) -> Vec<&FieldMetadata> {
        self.fields.iter().filter(|f| f.is_primary_key).collect()
    }
}

/// Reduced shape served by the root `$metadata` listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub name: String,
    pub description: String,
    pub is_read_only: bool,
}

impl From<&EntityMetadata> for EntitySummary {
    fn from(meta: &EntityMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            description: meta.description.clone(),
            is_read_only: meta.is_read_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> EntityMetadata {
        EntityMetadata::new(
            "EMPLOYEE",
            vec![
                FieldMetadata::new("Id", FieldDataType::Numeric).primary_key(),
                FieldMetadata::new("Name", FieldDataType::String),
            ],
        )
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        let meta = employee();
        assert!(meta.field("id").is_some());
        assert!(meta.field("NAME").is_some());
        assert!(meta.field("missing").is_none());
    }

    #[test]
    fn key_fields_keep_declaration_order() {
        let meta = EntityMetadata::new(
            "ORDER_LINE",
            vec![
                FieldMetadata::new("OrderId", FieldDataType::Numeric).primary_key(),
                FieldMetadata::new("LineNo", FieldDataType::Numeric).primary_key(),
                FieldMetadata::new("Qty", FieldDataType::Numeric),
            ],
        );
        let keys: Vec<_> = meta.key_fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(keys, ["OrderId", "LineNo"]);
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let json = serde_json::to_value(&employee()).unwrap();
        assert_eq!(json["isReadOnly"], false);
        assert_eq!(json["fields"][0]["isPrimaryKey"], true);
        assert_eq!(json["fields"][0]["type"], "numeric");
    }
}
