//! Error type for the REST surface.
//!
//! Internal detail (database errors, adapter failures) is logged through
//! `tracing` and never serialized into a response body; clients get the
//! sanitized message and status only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::manager::{StoreError, ValidationIssue};

#[derive(Debug)]
pub enum RestError {
    /// 400 - malformed parameters or an unusable request body.
    BadRequest { message: String },

    /// 400 - update/delete validation failures, serialized as the issue list.
    ValidationFailed { issues: Vec<ValidationIssue> },

    /// 409 - duplicate primary key on insert.
    Conflict { message: String },

    /// 500 - backend failure (detail logged, not exposed).
    Storage { internal: StoreError },

    /// 500 - anything else that should never reach a client verbatim.
    Internal { message: String },
}

impl RestError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation_failed(issues: Vec<ValidationIssue>) -> Self {
        Self::ValidationFailed { issues }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } | Self::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Storage { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message } | Self::Internal { message } => message.clone(),
            Self::Conflict { message } => message.clone(),
            Self::ValidationFailed { issues } => issues
                .iter()
                .map(|i| i.message.clone())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Storage { .. } => "A storage error occurred".to_owned(),
        }
    }
}

/// Sanitized body for non-validation errors.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        if let Self::Storage { internal } = &self {
            tracing::error!(error = %internal, "storage error");
        } else {
            tracing::debug!(error = %self.user_message(), status = %self.status_code(), "request error");
        }

        match self {
            // The contract: 400 with the raw issue array, not a wrapper.
            Self::ValidationFailed { issues } => {
                (StatusCode::BAD_REQUEST, Json(issues)).into_response()
            }
            other => {
                let status = other.status_code();
                let body = ErrorBody {
                    error: other.user_message(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for RestError {}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("serialization failed: {err}"),
        }
    }
}

impl From<StoreError> for RestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { entity } => {
                Self::conflict(format!("duplicate key on entity '{entity}'"))
            }
            StoreError::MissingKey { entity, field } => {
                Self::bad_request(format!("missing key field '{field}' on entity '{entity}'"))
            }
            StoreError::UnknownField { entity, field } => {
                Self::bad_request(format!("unknown field '{field}' on entity '{entity}'"))
            }
            internal @ (StoreError::Db(_) | StoreError::Backend(_)) => Self::Storage { internal },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_the_response_contract() {
        let conflict: RestError = StoreError::DuplicateKey {
            entity: "EMPLOYEE".into(),
        }
        .into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let missing: RestError = StoreError::MissingKey {
            entity: "EMPLOYEE".into(),
            field: "Id".into(),
        }
        .into();
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

        let unknown: RestError = StoreError::UnknownField {
            entity: "EMPLOYEE".into(),
            field: "Typo".into(),
        }
        .into();
        assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);

        let backend: RestError = StoreError::Backend("boom".into()).into();
        assert_eq!(backend.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // Internal detail never reaches the user message.
        assert_eq!(backend.user_message(), "A storage error occurred");
    }

    #[test]
    fn validation_failure_is_bad_request() {
        let err = RestError::validation_failed(vec![ValidationIssue::field("Id", "Key field missing")]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "Key field missing");
    }
}
