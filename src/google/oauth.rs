use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AssertionGrant, ServiceAccountKey, TokenResponse, TokenSource};
use crate::config::OAuthConfig;
use crate::error::{Result, VendError};
use crate::identity::{IdentityToken, OAuthService};

/// Scope requested from the authorization endpoint
const LOGIN_SCOPE: &str = "email";

/// Google OAuth2 client backing [`OAuthService`].
///
/// Identity tokens are obtained from the configured token endpoint and
/// confirmed with `tokeninfo`. The `token_uri` carried inside a client's
/// credential blob is never contacted.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    config: OAuthConfig,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    email: Option<String>,
}

impl GoogleOAuth {
    pub fn new(config: OAuthConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client(timeout)?,
            config,
        })
    }

    async fn request_id_token(&self, form: &[(&str, &str)]) -> Result<IdentityToken> {
        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(VendError::IntrospectionUnreachable(format!(
                "token endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(VendError::CredentialInvalid(format!(
                "token endpoint rejected the grant with {status}"
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            VendError::CredentialInvalid(format!("unexpected token response: {}", e.without_url()))
        })?;
        let raw = body.id_token.ok_or_else(|| {
            VendError::CredentialInvalid("token response carries no id_token".into())
        })?;

        IdentityToken::parse(&raw)
    }

    /// Ask `tokeninfo` whether Google still considers the token valid.
    async fn introspect(&self, token: &IdentityToken) -> Result<()> {
        let response = self
            .http
            .get(self.config.tokeninfo_url.clone())
            .query(&[("id_token", token.as_str())])
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(VendError::IntrospectionUnreachable(format!(
                "tokeninfo returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(VendError::CredentialInvalid(format!(
                "tokeninfo rejected the identity token with {status}"
            )));
        }

        let info: TokenInfo = response.json().await.map_err(|e| {
            VendError::IntrospectionUnreachable(format!(
                "unexpected tokeninfo response: {}",
                e.without_url()
            ))
        })?;
        match info.email.as_deref() {
            Some(email) if !email.is_empty() && email != token.claims().email => {
                warn!(email = %email, "tokeninfo email does not match identity token");
                Err(VendError::CredentialInvalid(
                    "tokeninfo email does not match identity token".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Transport failures drop the request URL, which may carry a token.
fn unreachable(e: reqwest::Error) -> VendError {
    VendError::IntrospectionUnreachable(e.without_url().to_string())
}

#[async_trait]
impl OAuthService for GoogleOAuth {
    fn login_url(&self, state: &str) -> String {
        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("scope", LOGIN_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true")
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("state", state);
        url.into()
    }

    async fn exchange(&self, code: &str) -> Result<IdentityToken> {
        debug!("Exchanging authorization code");
        self.request_id_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ])
        .await
    }

    fn token_source_from_credentials(&self, credentials: &[u8]) -> Result<TokenSource> {
        TokenSource::from_json(credentials)
    }

    async fn id_token(&self, source: &TokenSource) -> Result<IdentityToken> {
        let token = match source {
            TokenSource::AuthorizedUser(user) => {
                debug!(client_id = %user.client_id, "Refreshing authorized user token");
                self.request_id_token(&user.refresh_form()).await?
            }
            TokenSource::ServiceAccount(key) => {
                debug!(client_email = %key.client_email, "Requesting service account identity token");
                let assertion = key.sign_assertion(
                    None,
                    AssertionGrant::TargetAudience(&self.config.client_id),
                    Utc::now(),
                )?;
                self.request_id_token(&ServiceAccountKey::assertion_form(&assertion))
                    .await?
            }
        };

        self.introspect(&token).await?;
        Ok(token)
    }
}
