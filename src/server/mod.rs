//! HTTP surface of the vending server

pub mod error;
pub mod handlers;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::identity::IdentityVerifier;
use crate::vending::VendingOrchestrator;

/// Read-only state shared by every request
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: VendingOrchestrator,
    pub identity: IdentityVerifier,
    /// Mark the login state cookie `Secure`; set when the OAuth redirect is https
    pub secure_cookies: bool,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/credentials", post(handlers::vend_credentials))
        .route("/auth/login", get(handlers::login))
        .route("/auth/callback", get(handlers::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
