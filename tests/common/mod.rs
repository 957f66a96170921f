use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use restgate::dispatch::{DispatchOptions, Dispatcher};
use restgate::metadata::{EntityMetadata, FieldDataType, FieldMetadata};
use restgate::relational::SqliteDataSource;
use restgate::sequential::{MemoryStore, SequentialDataSource};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub fn employee_metadata() -> EntityMetadata {
    EntityMetadata::new(
        "EMPLOYEE",
        vec![
            FieldMetadata::new("Id", FieldDataType::Numeric).primary_key(),
            FieldMetadata::new("Name", FieldDataType::String),
            FieldMetadata::new("HireDate", FieldDataType::Date),
        ],
    )
}

/// Router over an in-memory sequential store for the `hr` root.
pub fn setup_sequential_app() -> Router {
    let store = Arc::new(MemoryStore::new(employee_metadata()));
    let source = Arc::new(SequentialDataSource::new(vec![store]));
    let dispatcher = Dispatcher::new(DispatchOptions::default()).mount("hr", source);
    restgate::http::router(Arc::new(dispatcher))
}

pub async fn setup_sqlite_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    for ddl in [
        "CREATE TABLE EMPLOYEE (
            Id INTEGER NOT NULL PRIMARY KEY,
            Name TEXT,
            HireDate DATE
        )",
        "CREATE VIEW EMPLOYEE_NAMES AS SELECT Id, Name FROM EMPLOYEE",
    ] {
        db.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            ddl.to_owned(),
        ))
        .await?;
    }
    Ok(db)
}

/// Router over a discovered sqlite schema for the `hr` root.
pub fn setup_sqlite_app(db: DatabaseConnection) -> Router {
    let source = Arc::new(SqliteDataSource::new(db));
    let dispatcher = Dispatcher::new(DispatchOptions::default()).mount("hr", source);
    restgate::http::router(Arc::new(dispatcher))
}

pub async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
