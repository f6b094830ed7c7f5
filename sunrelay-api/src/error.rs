use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::control::RelayError;
use crate::remote::{FetchError, PollError, WriteError};
use crate::store::TelemetryStoreError;

/// An error response, rendered as `{"error": "<message>"}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn fetch_status(err: &FetchError) -> StatusCode {
    match err {
        FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FetchError::NotFound => StatusCode::NOT_FOUND,
        FetchError::MalformedResponse(_) => StatusCode::BAD_REQUEST,
        FetchError::ExhaustedRetries { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn write_status(err: &WriteError) -> StatusCode {
    match err {
        WriteError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        WriteError::Rejected { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        ApiError::new(fetch_status(&err), err.to_string())
    }
}

impl From<TelemetryStoreError> for ApiError {
    fn from(err: TelemetryStoreError) -> Self {
        let status = match err {
            TelemetryStoreError::NoData(_) => StatusCode::NOT_FOUND,
            TelemetryStoreError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<PollError> for ApiError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Fetch(err) => err.into(),
            PollError::Store(err) => err.into(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = match &err {
            RelayError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
            RelayError::CommandInProgress => StatusCode::CONFLICT,
            RelayError::UpstreamUnavailable(FetchError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            RelayError::CommandFailed(err) => write_status(err),
            RelayError::Interrupted => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}
