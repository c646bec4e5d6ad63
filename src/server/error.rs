use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::error::VendError;

/// Error returned by handlers.
///
/// Every failure renders as an empty JSON object. The status code is the only
/// signal a client gets, so nothing about the request leaks back out.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request")]
    BadRequest,

    #[error(transparent)]
    Vend(#[from] VendError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::Vend(e) => e.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({}))).into_response()
    }
}
