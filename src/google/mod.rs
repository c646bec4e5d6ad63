//! Google OAuth2 and Admin Directory clients.

pub mod credentials;
pub mod directory;
pub mod oauth;

#[cfg(test)]
pub(crate) mod testing;

use serde::Deserialize;

use crate::error::VendError;

pub use credentials::{AssertionGrant, AuthorizedUser, ServiceAccountKey, TokenSource};
pub use directory::GoogleDirectory;
pub use oauth::GoogleOAuth;

/// Token endpoint response. Which fields are present depends on the grant.
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

/// Build the shared HTTP client; every call it makes is bounded by `timeout`.
pub fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, VendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| VendError::Internal(format!("failed to build HTTP client: {e}")))
}
