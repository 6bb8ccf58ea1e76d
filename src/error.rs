//! # Error Handling
//!
//! Domain error taxonomy for the sync engine plus the problem+json response
//! mapping used by the HTTP trigger surface.
//!
//! Failures below the job level (one entity type, one backfill chunk) are
//! recovered locally and recorded into job statistics; only job-level fatal
//! conditions propagate out of a job as [`SyncError`].

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::sync::JobKind;

/// Errors surfaced by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Timeout, connect failure, 5xx, or 429 that survived all retries.
    #[error("transient network error: {message}")]
    TransientNetwork {
        message: String,
        /// Server-provided Retry-After hint, when one was seen.
        retry_after_secs: Option<u64>,
    },

    /// Non-retryable 4xx from the upstream API (auth failure, bad request).
    #[error("fatal upstream request error (status {status}): {message}")]
    FatalRequest { status: u16, message: String },

    /// Response body that could not be decoded into the expected shape.
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    /// Local table is missing an expected column; requires a migration.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A job of this kind is already running; triggers are rejected, not queued.
    #[error("a {0} job is already running")]
    JobAlreadyRunning(JobKind),

    /// Invalid backfill date range supplied by the caller.
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl SyncError {
    /// Build a transient error from a reqwest failure (timeout, connect, body).
    pub fn from_transport(err: reqwest::Error) -> Self {
        SyncError::TransientNetwork {
            message: err.to_string(),
            retry_after_secs: None,
        }
    }

    /// Promote a missing-column database failure to
    /// [`SyncError::SchemaMismatch`].
    ///
    /// Applied on write paths: an unmigrated table fails every later write
    /// the same way, so the run aborts instead of grinding through it.
    pub fn promote_schema_mismatch(self) -> Self {
        match self {
            SyncError::Database(err) => {
                let message = err.to_string();
                let lowered = message.to_lowercase();
                let missing_column = lowered.contains("no such column")
                    || (lowered.contains("column") && lowered.contains("does not exist"));
                if missing_column {
                    SyncError::SchemaMismatch(message)
                } else {
                    SyncError::Database(err)
                }
            }
            other => other,
        }
    }

    /// Whether this error should abort the entire run rather than be isolated
    /// to the failing entity type or chunk.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::FatalRequest { .. }
                | SyncError::MalformedPayload(_)
                | SyncError::SchemaMismatch(_)
                | SyncError::JobAlreadyRunning(_)
                | SyncError::InvalidRange(_)
        )
    }
}

/// Unified API error response structure for the trigger endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Suggested retry delay in seconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<C: Into<String>, M: Into<String>>(status: StatusCode, code: C, message: M) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            retry_after: None,
        }
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        match &error {
            SyncError::JobAlreadyRunning(kind) => Self::new(
                StatusCode::CONFLICT,
                "JOB_ALREADY_RUNNING",
                &format!("a {kind} job is already running"),
            ),
            SyncError::InvalidRange(message) => Self::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                &format!("invalid date range: {message}"),
            ),
            SyncError::FatalRequest { status, message } => Self::new(
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                &format!("upstream returned status {status}: {message}"),
            ),
            SyncError::TransientNetwork {
                message,
                retry_after_secs,
            } => {
                let api = Self::new(
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_UNAVAILABLE",
                    message.as_str(),
                );
                match retry_after_secs {
                    Some(secs) => api.with_retry_after(*secs),
                    None => api,
                }
            }
            _ => {
                tracing::error!("Internal error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                )
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        tracing::error!("Database error: {:?}", error);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Database error occurred",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_not_fatal() {
        let err = SyncError::TransientNetwork {
            message: "connection reset".into(),
            retry_after_secs: None,
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn fatal_request_aborts_the_run() {
        let err = SyncError::FatalRequest {
            status: 401,
            message: "bad token".into(),
        };
        assert!(err.is_fatal());
        assert!(SyncError::MalformedPayload("truncated".into()).is_fatal());
        assert!(SyncError::SchemaMismatch("missing column".into()).is_fatal());
    }

    #[test]
    fn missing_column_write_errors_become_schema_mismatch() {
        // sqlite phrasing
        let err = SyncError::Database(sea_orm::DbErr::Custom(
            "no such column: is_deleted".into(),
        ))
        .promote_schema_mismatch();
        assert!(matches!(err, SyncError::SchemaMismatch(_)));
        assert!(err.is_fatal());

        // postgres phrasing
        let err = SyncError::Database(sea_orm::DbErr::Custom(
            "column \"is_deleted\" of relation \"orders\" does not exist".into(),
        ))
        .promote_schema_mismatch();
        assert!(matches!(err, SyncError::SchemaMismatch(_)));

        let err = SyncError::Database(sea_orm::DbErr::Custom("connection reset".into()))
            .promote_schema_mismatch();
        assert!(matches!(err, SyncError::Database(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn already_running_maps_to_conflict() {
        let api: ApiError = SyncError::JobAlreadyRunning(JobKind::HistoricalBackfill).into();
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.code, Box::from("JOB_ALREADY_RUNNING"));
        assert!(api.message.contains("backfill"));
    }

    #[test]
    fn invalid_range_maps_to_bad_request() {
        let api: ApiError = SyncError::InvalidRange("end before start".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, Box::from("VALIDATION_FAILED"));
    }

    #[test]
    fn retry_after_header_is_set() {
        let api: ApiError = SyncError::TransientNetwork {
            message: "rate limited".into(),
            retry_after_secs: Some(30),
        }
        .into();
        let response = api.into_response();
        assert_eq!(response.headers().get("retry-after").unwrap(), "30");
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }
}
