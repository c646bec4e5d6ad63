//! Local stand-in for Google's token, tokeninfo and directory endpoints.

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

use crate::config::OAuthConfig;
use crate::identity::{IdTokenClaims, token::encode_unsigned};

pub const TEST_KEY: &str = include_str!("../../tests/fixtures/test_service_account_key.pem");

pub const FAKE_ACCESS_TOKEN: &str = "ya29.fake-access-token";

pub struct FakeGoogle {
    pub token_status: StatusCode,
    pub id_token: Option<String>,
    pub tokeninfo_status: StatusCode,
    pub tokeninfo_email: Option<String>,
    /// Served verbatim by tokeninfo in place of the JSON body
    pub tokeninfo_raw_body: Option<String>,
    pub users: HashMap<String, Value>,
    pub directory_status: Option<StatusCode>,
    pub grants: Mutex<Vec<HashMap<String, String>>>,
    pub tokeninfo_calls: Mutex<usize>,
    pub bearer_tokens: Mutex<Vec<String>>,
}

impl Default for FakeGoogle {
    fn default() -> Self {
        Self {
            token_status: StatusCode::OK,
            id_token: None,
            tokeninfo_status: StatusCode::OK,
            tokeninfo_email: None,
            tokeninfo_raw_body: None,
            users: HashMap::new(),
            directory_status: None,
            grants: Mutex::new(Vec::new()),
            tokeninfo_calls: Mutex::new(0),
            bearer_tokens: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGoogle {
    pub fn with_id_token(id_token: String) -> Self {
        Self {
            id_token: Some(id_token),
            ..Self::default()
        }
    }
}

async fn token(
    State(fake): State<Arc<FakeGoogle>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    fake.grants.lock().unwrap().push(form);

    if !fake.token_status.is_success() {
        return (fake.token_status, Json(json!({"error": "invalid_grant"})));
    }

    let mut body = json!({
        "access_token": FAKE_ACCESS_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer"
    });
    if let Some(id_token) = &fake.id_token {
        body["id_token"] = json!(id_token);
    }
    (StatusCode::OK, Json(body))
}

async fn tokeninfo(
    State(fake): State<Arc<FakeGoogle>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    *fake.tokeninfo_calls.lock().unwrap() += 1;

    if !query.contains_key("id_token") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_token"}))).into_response();
    }
    if let Some(raw) = &fake.tokeninfo_raw_body {
        return (fake.tokeninfo_status, raw.clone()).into_response();
    }
    let body = match &fake.tokeninfo_email {
        Some(email) => json!({"email": email}),
        None => json!({}),
    };
    (fake.tokeninfo_status, Json(body)).into_response()
}

async fn user(
    State(fake): State<Arc<FakeGoogle>>,
    Path(user_key): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    fake.bearer_tokens.lock().unwrap().push(bearer);

    if let Some(status) = fake.directory_status {
        return (status, Json(json!({})));
    }
    match fake.users.get(&user_key) {
        Some(user) => (StatusCode::OK, Json(user.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": {"code": 404}}))),
    }
}

/// Serve `fake` on an ephemeral local port and return its base URL.
pub async fn serve(fake: Arc<FakeGoogle>) -> Url {
    let app = Router::new()
        .route("/token", post(token))
        .route("/tokeninfo", get(tokeninfo))
        .route("/admin/directory/v1/users/{user_key}", get(user))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Url::parse(&format!("http://{addr}")).unwrap()
}

pub fn oauth_config(base: &Url) -> OAuthConfig {
    OAuthConfig {
        client_id: "server-client-id".into(),
        client_secret: "server-secret".into(),
        redirect_url: "http://localhost:3030/auth/callback".into(),
        auth_url: base.join("/auth").unwrap(),
        token_url: base.join("/token").unwrap(),
        tokeninfo_url: base.join("/tokeninfo").unwrap(),
        allowed_audiences: Vec::new(),
    }
}

/// Unsigned identity token for `email`, valid for the next hour
pub fn id_token_for(email: &str) -> String {
    let now = Utc::now();
    encode_unsigned(&IdTokenClaims {
        iss: "https://accounts.google.com".into(),
        aud: "server-client-id".into(),
        sub: "1000".into(),
        hd: None,
        email: email.into(),
        email_verified: true,
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    })
}

pub fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "vending",
        "private_key_id": "key-1",
        "private_key": TEST_KEY,
        "client_email": "vending@vending.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri
    })
    .to_string()
}
