//! Axum binding for the dispatcher.
//!
//! The whole surface is a fallback handler: the dispatcher owns path
//! resolution, so no per-entity routes exist. Requests the dispatcher
//! declines come back as plain 404s.

use crate::dispatch::{Dispatcher, RestRequest, RestResponse};
use crate::errors::RestError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::debug;

/// Build a router serving every mounted root of `dispatcher`.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(dispatch_handler)
        .with_state(dispatcher)
}

async fn dispatch_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    bytes: Bytes,
) -> Response {
    let body = if bytes.is_empty() {
        None
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(_) => {
                return RestError::bad_request("request body is not valid JSON").into_response();
            }
        }
    };

    let request = RestRequest {
        method,
        path: uri.path().to_owned(),
        query: uri.query().map(ToOwned::to_owned),
        body,
    };

    match dispatcher.handle(&request).await {
        Ok(Some(response)) => rest_response(response),
        Ok(None) => {
            debug!(path = %request.path, "unhandled request");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(error) => error.into_response(),
    }
}

fn rest_response(response: RestResponse) -> Response {
    match response.body {
        Some(body) => (response.status, Json(body)).into_response(),
        None => response.status.into_response(),
    }
}
