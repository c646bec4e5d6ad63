use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use super::error::ApiError;
use crate::api::{CallbackResponse, CredentialRequest, CredentialResponse};

/// Cookie carrying the CSRF nonce between /auth/login and /auth/callback
pub const STATE_COOKIE: &str = "gsuite_aws_sso_state";

/// Lifetime of the login nonce cookie
const STATE_COOKIE_MAX_AGE_SECS: u32 = 600;

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({}))
}

/// POST /credentials
pub async fn vend_credentials(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialRequest>, JsonRejection>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(status = %rejection.status(), "Rejected credential request body");
        ApiError::BadRequest
    })?;

    let outcome = state.orchestrator.vend(&request.credential_file).await;
    let document = outcome.result?;

    Ok(Json(CredentialResponse {
        credential_file_path: document.target_path.to_string_lossy().into_owned(),
        credential_file: document.contents.into_bytes(),
    }))
}

/// GET /auth/login
pub async fn login(State(state): State<Arc<AppState>>) -> Response {
    let nonce = Uuid::new_v4().to_string();
    let location = state.identity.login_url(&nonce);
    let cookie = state_cookie(&nonce, STATE_COOKIE_MAX_AGE_SECS, state.secure_cookies);

    (
        StatusCode::FOUND,
        [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /auth/callback
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(error) = &params.error {
        warn!(error = %error, "Authorization was not granted");
        return Err(ApiError::BadRequest);
    }

    let expected = cookie_value(&headers, STATE_COOKIE);
    if !states_match(expected, params.state.as_deref()) {
        warn!("OAuth callback state is missing or does not match");
        return Err(ApiError::BadRequest);
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(ApiError::BadRequest)?;

    let identity = state.identity.verify_code(&code).await?;
    info!(email = %identity.email, "Completed OAuth login");

    let clear = state_cookie("", 0, state.secure_cookies);
    Ok((
        [(header::SET_COOKIE, clear)],
        Json(CallbackResponse {
            email: identity.email,
        }),
    ))
}

/// `Set-Cookie` value for the login nonce. `secure` adds the `Secure` flag.
fn state_cookie(value: &str, max_age: u32, secure: bool) -> String {
    let mut cookie =
        format!("{STATE_COOKIE}={value}; Path=/auth; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Value of cookie `name` across all Cookie headers
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Compare without short-circuiting on the first differing byte
fn states_match(expected: Option<&str>, received: Option<&str>) -> bool {
    match (expected, received) {
        (Some(expected), Some(received)) if !expected.is_empty() => {
            expected.len() == received.len()
                && expected
                    .bytes()
                    .zip(received.bytes())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        }
        _ => false,
    }
}
