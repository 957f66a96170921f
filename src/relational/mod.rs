//! Entity management over relational databases.
//!
//! Statements are composed by [`crate::filtering::sql`] and executed through
//! `sea_orm`'s raw statement interface, so one manager serves any table or
//! view discovered at runtime without generated entity types.

pub mod discovery;

use crate::filtering::sql::{SqlDialect, SqlQueryBuilder};
use crate::manager::{
    EntityManager, EntityWriter, FetchEntitiesResponse, StoreError, ValidationIssue,
};
use crate::metadata::{EntityMetadata, FieldDataType, FieldMetadata};
use crate::params::RestParameters;
use crate::value::{record_value, FieldValue, Record};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, QueryResult, Statement};
use std::fmt::Write as _;
use tracing::debug;

pub use discovery::SqliteDataSource;

/// [`EntityManager`] for one discovered table or view.
pub struct RelationalManager {
    db: DatabaseConnection,
    metadata: EntityMetadata,
}

impl RelationalManager {
    #[must_use]
    pub fn new(db: DatabaseConnection, metadata: EntityMetadata) -> Self {
        Self { db, metadata }
    }

    fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    fn dialect(&self) -> SqlDialect {
        match self.backend() {
            DatabaseBackend::Postgres => SqlDialect::Postgres,
            DatabaseBackend::MySql => SqlDialect::MySql,
            _ => SqlDialect::Sqlite,
        }
    }

    fn statement(&self, sql: String, params: Vec<FieldValue>) -> Statement {
        Statement::from_sql_and_values(self.backend(), sql, params.iter().map(to_db_value))
    }

    fn decode_row(&self, row: &QueryResult) -> Record {
        let mut record = Record::new();
        for field in &self.metadata.fields {
            record.insert(field.name.clone(), decode_column(row, field));
        }
        record
    }

    fn key_record(&self, fields: &Record) -> Result<Record, Vec<ValidationIssue>> {
        let mut key = Record::new();
        let mut issues = Vec::new();
        for field in self.metadata.key_fields() {
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

    /// `WHERE` clause over the key fields, with parameters appended to
    /// `params`. Placeholders continue numbering from the current length.
    fn key_clause(&self, key: &Record, params: &mut Vec<FieldValue>) -> String {
        let dialect = self.dialect();
        let mut clause = String::new();
        for field in self.metadata.key_fields() {
            if let Some(value) = record_value(key, &field.name) {
                if !clause.is_empty() {
                    clause.push_str(" AND ");
                }
                params.push(value.clone());
                let marker = match dialect {
                    SqlDialect::Postgres => format!("${}", params.len()),
                    SqlDialect::Sqlite | SqlDialect::MySql => "?".to_owned(),
                };
                let _ = write!(clause, "{} = {marker}", dialect.quote(&field.name));
            }
        }
        clause
    }

    async fn key_exists(&self, key: &Record) -> Result<bool, StoreError> {
        let mut params = Vec::new();
        let clause = self.key_clause(key, &mut params);
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM {} WHERE {clause}",
            self.dialect().quote(&self.metadata.name)
        );
        let row = self.db.query_one(self.statement(sql, params)).await?;
        Ok(row.is_some_and(|r| r.try_get::<i64>("", "cnt").unwrap_or(0) > 0))
    }

    /// Whether the key is a single numeric column the backend can generate.
    fn generated_key_field(&self) -> Option<&FieldMetadata> {
        let keys = self.metadata.key_fields();
        match keys.as_slice() {
            [only] if only.field_type == FieldDataType::Numeric && only.scale == 0 => Some(only),
            _ => None,
        }
    }
}

#[async_trait]
impl EntityManager for RelationalManager {
    fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    async fn fetch_entities(
        &self,
        parameters: &RestParameters,
    ) -> Result<FetchEntitiesResponse, StoreError> {
        let builder = SqlQueryBuilder::new(self.dialect(), &self.metadata);

        let select = builder.select(parameters)?;
        debug!(entity = %self.metadata.name, sql = %select.sql, "fetch");
        let rows = self
            .db
            .query_all(self.statement(select.sql, select.params))
            .await?;
        let records: Vec<Record> = rows.iter().map(|row| self.decode_row(row)).collect();

        let total_count = if parameters.with_count {
            let count = builder.count(parameters)?;
            let row = self.db.query_one(self.statement(count.sql, count.params)).await?;
            row.and_then(|r| r.try_get::<i64>("", "cnt").ok())
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(records.len())
        } else {
            records.len()
        };

        Ok(FetchEntitiesResponse {
            total_count,
            records,
        })
    }

    fn writer(&self) -> Option<&dyn EntityWriter> {
        if self.metadata.is_read_only {
            None
        } else {
            Some(self)
        }
    }
}

#[async_trait]
impl EntityWriter for RelationalManager {
    async fn insert_entity(&self, fields: Record) -> Result<Record, StoreError> {
        let dialect = self.dialect();
        let generated = match self.key_record(&fields) {
            Ok(key) => {
                if self.key_exists(&key).await? {
                    return Err(StoreError::DuplicateKey {
                        entity: self.metadata.name.clone(),
                    });
                }
                None
            }
            Err(issues) => {
                // An incomplete key is acceptable only when the backend can
                // generate it.
                let Some(field) = self.generated_key_field() else {
                    return Err(StoreError::MissingKey {
                        entity: self.metadata.name.clone(),
                        field: issues
                            .first()
                            .and_then(|i| i.fields.first().cloned())
                            .unwrap_or_default(),
                    });
                };
                Some(field.name.clone())
            }
        };

        let mut columns = Vec::new();
        let mut params = Vec::new();
        for field in &self.metadata.fields {
            if let Some(value) = record_value(&fields, &field.name) {
                columns.push(dialect.quote(&field.name));
                params.push(value.clone());
            }
        }
        let markers: Vec<String> = (1..=params.len())
            .map(|i| match dialect {
                SqlDialect::Postgres => format!("${i}"),
                SqlDialect::Sqlite | SqlDialect::MySql => "?".to_owned(),
            })
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote(&self.metadata.name),
            columns.join(", "),
            markers.join(", ")
        );

        match generated {
            Some(key_field) => {
                let id = match returning_clause(dialect, &key_field) {
                    Some(returning) => {
                        let sql = format!("{sql}{returning}");
                        let row = self.db.query_one(self.statement(sql, params)).await?;
                        row.ok_or_else(|| {
                            StoreError::Backend("insert returned no generated key".to_owned())
                        })?
                        .try_get::<i64>("", &key_field)?
                    }
                    None => {
                        let result = self.db.execute(self.statement(sql, params)).await?;
                        i64::try_from(result.last_insert_id()).unwrap_or(i64::MAX)
                    }
                };
                let mut key = Record::new();
                key.insert(key_field, FieldValue::Integer(id));
                Ok(key)
            }
            None => {
                self.db.execute(self.statement(sql, params)).await?;
                self.key_record(&fields).map_err(|_| {
                    StoreError::Backend("key fields vanished during insert".to_owned())
                })
            }
        }
    }

    async fn update_entity(&self, fields: Record) -> Result<Vec<ValidationIssue>, StoreError> {
        let key = match self.key_record(&fields) {
            Ok(key) => key,
            Err(issues) => return Ok(issues),
        };
        let dialect = self.dialect();

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for field in &self.metadata.fields {
            if field.is_primary_key {
                continue;
            }
            if let Some(value) = record_value(&fields, &field.name) {
                params.push(value.clone());
                let marker = match dialect {
                    SqlDialect::Postgres => format!("${}", params.len()),
                    SqlDialect::Sqlite | SqlDialect::MySql => "?".to_owned(),
                };
                assignments.push(format!("{} = {marker}", dialect.quote(&field.name)));
            }
        }
        if assignments.is_empty() {
            return if self.key_exists(&key).await? {
                Ok(Vec::new())
            } else {
                Ok(vec![ValidationIssue::new(Vec::new(), "record not found")])
            };
        }

        let clause = self.key_clause(&key, &mut params);
        let sql = format!(
            "UPDATE {} SET {} WHERE {clause}",
            dialect.quote(&self.metadata.name),
            assignments.join(", ")
        );
        let result = self.db.execute(self.statement(sql, params)).await?;
        if result.rows_affected() == 0 {
            Ok(vec![ValidationIssue::new(Vec::new(), "record not found")])
        } else {
            Ok(Vec::new())
        }
    }

    async fn delete_entity(&self, fields: Record) -> Result<Vec<ValidationIssue>, StoreError> {
        let key = match self.key_record(&fields) {
            Ok(key) => key,
            Err(issues) => return Ok(issues),
        };
        let mut params = Vec::new();
        let clause = self.key_clause(&key, &mut params);
        let sql = format!(
            "DELETE FROM {} WHERE {clause}",
            self.dialect().quote(&self.metadata.name)
        );
        let result = self.db.execute(self.statement(sql, params)).await?;
        if result.rows_affected() == 0 {
            Ok(vec![ValidationIssue::new(Vec::new(), "record not found")])
        } else {
            Ok(Vec::new())
        }
    }
}

/// How a generated key is read back after insert. Postgres has no
/// driver-level last-insert-id (`ExecResult` panics if asked), so inserts
/// there carry a `RETURNING` clause and go through `query_one` instead.
fn returning_clause(dialect: SqlDialect, key_field: &str) -> Option<String> {
    (dialect == SqlDialect::Postgres).then(|| format!(" RETURNING {}", dialect.quote(key_field)))
}

fn to_db_value(value: &FieldValue) -> sea_orm::Value {
    match value {
        FieldValue::Null => sea_orm::Value::String(None),
        FieldValue::String(s) => sea_orm::Value::String(Some(Box::new(s.clone()))),
        FieldValue::Integer(i) => sea_orm::Value::BigInt(Some(*i)),
        FieldValue::Decimal(d) => sea_orm::Value::Decimal(Some(Box::new(*d))),
        FieldValue::Date(d) => sea_orm::Value::ChronoDate(Some(Box::new(*d))),
        FieldValue::Time(t) => sea_orm::Value::ChronoTime(Some(Box::new(*t))),
        FieldValue::DateTime(dt) => sea_orm::Value::ChronoDateTime(Some(Box::new(*dt))),
        FieldValue::Bool(b) => sea_orm::Value::Bool(Some(*b)),
        FieldValue::Bytes(b) => sea_orm::Value::Bytes(Some(Box::new(b.clone()))),
    }
}

fn decode_column(row: &QueryResult, field: &FieldMetadata) -> FieldValue {
    let name = field.name.as_str();
    match field.field_type {
        FieldDataType::String => row
            .try_get::<Option<String>>("", name)
            .ok()
            .flatten()
            .map_or(FieldValue::Null, FieldValue::String),
        FieldDataType::Numeric => decode_numeric(row, name, field.scale),
        FieldDataType::Date => row
            .try_get::<Option<NaiveDate>>("", name)
            .ok()
            .flatten()
            .map_or(FieldValue::Null, FieldValue::Date),
        FieldDataType::Time => row
            .try_get::<Option<NaiveTime>>("", name)
            .ok()
            .flatten()
            .map_or(FieldValue::Null, FieldValue::Time),
        FieldDataType::DateTime => row
            .try_get::<Option<NaiveDateTime>>("", name)
            .ok()
            .flatten()
            .map_or(FieldValue::Null, FieldValue::DateTime),
        FieldDataType::ByteArray => row
            .try_get::<Option<Vec<u8>>>("", name)
            .ok()
            .flatten()
            .map_or(FieldValue::Null, FieldValue::Bytes),
    }
}

// Numeric columns surface differently per backend: sqlite integers and
// reals, postgres NUMERIC as Decimal. Try the declared shape first and fall
// back before giving up.
fn decode_numeric(row: &QueryResult, name: &str, scale: u32) -> FieldValue {
    if scale == 0 {
        if let Ok(Some(i)) = row.try_get::<Option<i64>>("", name) {
            return FieldValue::Integer(i);
        }
        if let Ok(Some(f)) = row.try_get::<Option<f64>>("", name) {
            return Decimal::try_from(f)
                .ok()
                .and_then(|d| {
                    use rust_decimal::prelude::ToPrimitive;
                    d.to_i64()
                })
                .map_or(FieldValue::Null, FieldValue::Integer);
        }
        return FieldValue::Null;
    }
    if let Ok(Some(d)) = row.try_get::<Option<Decimal>>("", name) {
        return FieldValue::Decimal(d);
    }
    if let Ok(Some(f)) = row.try_get::<Option<f64>>("", name) {
        return Decimal::try_from(f).map_or(FieldValue::Null, FieldValue::Decimal);
    }
    if let Ok(Some(i)) = row.try_get::<Option<i64>>("", name) {
        return FieldValue::Decimal(Decimal::from(i));
    }
    FieldValue::Null
}
