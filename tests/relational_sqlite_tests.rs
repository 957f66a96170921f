use axum::http::StatusCode;
use axum::Router;
use serde_json::json;

mod common;
use common::{send_json, setup_sqlite_app, setup_sqlite_db};

async fn seeded_app() -> Router {
    let db = setup_sqlite_db().await.expect("sqlite setup failed");
    let app = setup_sqlite_app(db);
    for employee in [
        json!({"Id": 1, "Name": "Joanna", "HireDate": "2020-03-01"}),
        json!({"Id": 2, "Name": "Bruno", "HireDate": "2021-07-15"}),
        json!({"Id": 3, "Name": "Anselm", "HireDate": "2019-01-20"}),
    ] {
        let (status, _) = send_json(&app, "POST", "/hr/Employee", Some(employee)).await;
        assert_eq!(status, StatusCode::OK);
    }
    app
}

#[tokio::test]
async fn discovery_lists_tables_and_views() {
    let db = setup_sqlite_db().await.expect("sqlite setup failed");
    let app = setup_sqlite_app(db);

    let (status, body) = send_json(&app, "GET", "/hr/$metadata", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["EMPLOYEE", "EMPLOYEE_NAMES"]);
    assert_eq!(body[0]["isReadOnly"], false);
    assert_eq!(body[1]["isReadOnly"], true);
}

#[tokio::test]
async fn discovered_column_types() {
    let db = setup_sqlite_db().await.expect("sqlite setup failed");
    let app = setup_sqlite_app(db);

    let (_, body) = send_json(&app, "GET", "/hr/Employee/$metadata", None).await;
    let fields = body["fields"].as_array().unwrap();
    assert_eq!(fields[0]["name"], "Id");
    assert_eq!(fields[0]["type"], "numeric");
    assert_eq!(fields[0]["isPrimaryKey"], true);
    assert_eq!(fields[1]["type"], "string");
    assert_eq!(fields[2]["type"], "date");
}

#[tokio::test]
async fn filtered_sorted_fetch_with_count() {
    let app = seeded_app().await;

    let filter = r#"{"field":"Name","operator":"contains","value":"an","ignoreCase":true}"#;
    let sort = r#"[{"field":"Id","direction":"Descending"}]"#;
    let uri = format!(
        "/hr/Employee?filter={}&sort={}&withcount=true",
        urlencode(filter),
        urlencode(sort)
    );
    let (status, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data[0]["Name"], "Anselm");
    assert_eq!(data[1]["Name"], "Joanna");
}

#[tokio::test]
async fn date_range_filter() {
    let app = seeded_app().await;

    let filter = r#"{"logic":"and","filters":[
        {"field":"HireDate","operator":"gte","value":"2020-01-01"},
        {"field":"HireDate","operator":"lte","value":"2021-12-31"}]}"#;
    let uri = format!("/hr/Employee?filter={}&withcount=true", urlencode(filter));
    let (_, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn pagination_window() {
    let app = seeded_app().await;

    let sort = r#"[{"field":"Id","direction":"Ascending"}]"#;
    let uri = format!("/hr/Employee?sort={}&skip=1&take=1", urlencode(sort));
    let (_, body) = send_json(&app, "GET", &uri, None).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["Id"], 2);
}

#[tokio::test]
async fn insert_generates_missing_integer_key() {
    let app = seeded_app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/hr/Employee",
        Some(json!({"Name": "Newcomer"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Id"], 4);
}

#[tokio::test]
async fn duplicate_insert_conflicts() {
    let app = seeded_app().await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/hr/Employee",
        Some(json!({"Id": 1, "Name": "Shadow"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let app = seeded_app().await;

    let (status, _) = send_json(
        &app,
        "PATCH",
        "/hr/Employee",
        Some(json!({"Id": 2, "Name": "Bruno II"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let filter = r#"{"field":"Id","operator":"eq","value":2}"#;
    let uri = format!("/hr/Employee?filter={}", urlencode(filter));
    let (_, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(body["data"][0]["Name"], "Bruno II");
    assert_eq!(body["data"][0]["HireDate"], "2021-07-15");

    let (status, _) = send_json(&app, "DELETE", "/hr/Employee", Some(json!({"Id": 2}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(&app, "DELETE", "/hr/Employee", Some(json!({"Id": 2}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body[0]["message"], "record not found");
}

#[tokio::test]
async fn put_nulls_omitted_columns() {
    let app = seeded_app().await;

    let (status, _) = send_json(
        &app,
        "PUT",
        "/hr/Employee",
        Some(json!({"Id": 3, "Name": "Anselm"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let filter = r#"{"field":"Id","operator":"eq","value":3}"#;
    let uri = format!("/hr/Employee?filter={}", urlencode(filter));
    let (status, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["Name"], "Anselm");
    assert_eq!(body["data"][0]["HireDate"], serde_json::Value::Null);
}

#[tokio::test]
async fn filter_on_unknown_field_is_a_client_error() {
    let app = seeded_app().await;

    let filter = r#"{"field":"Typo","operator":"eq","value":1}"#;
    let uri = format!("/hr/Employee?filter={}", urlencode(filter));
    let (status, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown field 'Typo' on entity 'EMPLOYEE'");
}

#[tokio::test]
async fn views_reject_writes_as_unhandled() {
    let app = seeded_app().await;

    let (_, body) = send_json(&app, "GET", "/hr/EmployeeNames?withcount=true", None).await;
    assert_eq!(body["count"], 3);

    let (status, _) = send_json(
        &app,
        "POST",
        "/hr/EmployeeNames",
        Some(json!({"Id": 9, "Name": "Ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn smart_filter_over_sql() {
    let app = seeded_app().await;

    let (_, body) = send_json(
        &app,
        "GET",
        "/hr/Employee?smartfilter=joanna&withcount=true",
        None,
    )
    .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["Name"], "Joanna");
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
