//! Runtime schema discovery for sqlite databases.
//!
//! Tables and views come from `sqlite_master`; per-entity columns from
//! `PRAGMA table_info`. Views are published read-only.

use super::RelationalManager;
use crate::manager::{DataSource, EntityManager, StoreError};
use crate::metadata::{EntityMetadata, FieldDataType, FieldMetadata};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use std::sync::Arc;
use tracing::debug;

pub struct SqliteDataSource {
    db: DatabaseConnection,
}

impl SqliteDataSource {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn entity_metadata(
        &self,
        name: &str,
        is_view: bool,
    ) -> Result<EntityMetadata, StoreError> {
        let pragma = Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\"")),
        );
        let rows = self.db.query_all(pragma).await?;

        let mut fields = Vec::with_capacity(rows.len());
        for row in rows {
            let column: String = row.try_get("", "name")?;
            let declared: String = row.try_get("", "type")?;
            let not_null: i32 = row.try_get("", "notnull")?;
            let pk: i32 = row.try_get("", "pk")?;

            let (field_type, size, scale) = map_declared_type(&declared);
            fields.push(FieldMetadata {
                name: column,
                description: String::new(),
                size,
                scale,
                field_type,
                is_required: not_null != 0 || pk != 0,
                is_primary_key: pk != 0,
                is_read_only: is_view,
            });
        }

        let mut metadata = EntityMetadata::new(name, fields);
        // Rows in a keyless table cannot be addressed individually, so such
        // tables are published read-only alongside views.
        metadata.is_read_only = is_view || metadata.key_fields().is_empty();
        Ok(metadata)
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    async fn fetch_entity_managers(
        &self,
    ) -> Result<Vec<Arc<dyn EntityManager>>, StoreError> {
        let listing = Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name"
                .to_owned(),
        );
        let rows = self.db.query_all(listing).await?;

        let mut managers: Vec<Arc<dyn EntityManager>> = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("", "name")?;
            let kind: String = row.try_get("", "type")?;
            let metadata = self.entity_metadata(&name, kind == "view").await?;
            debug!(entity = %metadata.name, fields = metadata.fields.len(), "discovered");
            managers.push(Arc::new(RelationalManager::new(
                self.db.clone(),
                metadata,
            )));
        }
        Ok(managers)
    }
}

/// Map a sqlite column declaration to a field type, following sqlite's own
/// affinity rules, plus declared precision and scale when present.
fn map_declared_type(declared: &str) -> (FieldDataType, u32, u32) {
    let upper = declared.to_ascii_uppercase();
    let base = upper.split('(').next().unwrap_or("").trim().to_owned();
    let (size, scale) = parse_precision(&upper);

    let field_type = if base.contains("INT") || base == "BOOLEAN" || base == "BOOL" {
        return (FieldDataType::Numeric, size, 0);
    } else if base == "DATETIME" || base == "TIMESTAMP" {
        FieldDataType::DateTime
    } else if base == "DATE" {
        FieldDataType::Date
    } else if base == "TIME" {
        FieldDataType::Time
    } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
        FieldDataType::String
    } else if base.contains("BLOB") || base.is_empty() {
        FieldDataType::ByteArray
    } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
        // No declared scale on floating columns; report a nominal one so
        // values stay decimal.
        return (FieldDataType::Numeric, size, if scale == 0 { 2 } else { scale });
    } else if base.contains("DEC") || base.contains("NUM") {
        return (FieldDataType::Numeric, size, scale);
    } else {
        // Unknown declarations get sqlite's numeric affinity.
        return (FieldDataType::Numeric, size, scale);
    };
    (field_type, size, scale)
}

fn parse_precision(declared: &str) -> (u32, u32) {
    let Some(open) = declared.find('(') else {
        return (0, 0);
    };
    let Some(close) = declared[open..].find(')') else {
        return (0, 0);
    };
    let inner = &declared[open + 1..open + close];
    let mut parts = inner.split(',').map(str::trim);
    let size = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let scale = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (size, scale)
}
