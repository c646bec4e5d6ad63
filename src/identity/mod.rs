//! Turns a Google credential blob into a verified end-user identity.

pub mod token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::constants::GOOGLE_ISSUERS;
use crate::error::{Result, VendError};
use crate::google::TokenSource;

pub use token::{IdTokenClaims, IdentityToken};

/// OAuth capability the verifier relies on.
///
/// Implemented against Google by [`crate::google::GoogleOAuth`] and by
/// in-memory fakes in tests.
#[async_trait]
pub trait OAuthService: Send + Sync {
    /// Authorization endpoint URL carrying `state` as the CSRF nonce
    fn login_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an identity token
    async fn exchange(&self, code: &str) -> Result<IdentityToken>;

    /// Derive a token source from a credential blob
    fn token_source_from_credentials(&self, credentials: &[u8]) -> Result<TokenSource>;

    /// Fetch an identity token from `source` and confirm it with the provider
    async fn id_token(&self, source: &TokenSource) -> Result<IdentityToken>;
}

/// End-user identity established from a validated identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub issuer: String,
    pub audience: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct IdentityVerifier {
    oauth: Arc<dyn OAuthService>,
    allowed_audiences: Vec<String>,
}

impl IdentityVerifier {
    /// An empty `allowed_audiences` accepts any audience.
    pub fn new(oauth: Arc<dyn OAuthService>, allowed_audiences: Vec<String>) -> Self {
        Self {
            oauth,
            allowed_audiences,
        }
    }

    pub fn login_url(&self, state: &str) -> String {
        self.oauth.login_url(state)
    }

    /// Verify the identity behind a Google credential blob.
    pub async fn verify_identity(&self, credentials: &[u8]) -> Result<VerifiedIdentity> {
        let source = self.oauth.token_source_from_credentials(credentials)?;
        debug!(source = source.kind(), "Derived token source from credentials");

        let token = self.oauth.id_token(&source).await?;
        self.validate(token.claims(), Utc::now())
    }

    /// Verify the identity behind an OAuth authorization code.
    pub async fn verify_code(&self, code: &str) -> Result<VerifiedIdentity> {
        let token = self.oauth.exchange(code).await?;
        self.validate(token.claims(), Utc::now())
    }

    /// Check decoded claims against the identity invariants at instant `now`.
    pub fn validate(&self, claims: &IdTokenClaims, now: DateTime<Utc>) -> Result<VerifiedIdentity> {
        if claims.iss.is_empty() {
            return Err(VendError::CredentialInvalid("token has no issuer".into()));
        }
        if !GOOGLE_ISSUERS.contains(&claims.iss.as_str()) {
            return Err(VendError::CredentialInvalid(format!(
                "unrecognized issuer '{}'",
                claims.iss
            )));
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| VendError::MalformedToken("exp is out of range".into()))?;
        if expires_at <= now {
            return Err(VendError::TokenExpired);
        }
        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| VendError::MalformedToken("iat is out of range".into()))?;

        if claims.email.is_empty() {
            return Err(VendError::CredentialInvalid("token carries no email".into()));
        }
        if !claims.email_verified {
            return Err(VendError::CredentialInvalid(format!(
                "email '{}' is not verified",
                claims.email
            )));
        }

        if !self.allowed_audiences.is_empty() && !self.allowed_audiences.contains(&claims.aud) {
            return Err(VendError::CredentialInvalid(format!(
                "audience '{}' is not allowed",
                claims.aud
            )));
        }

        Ok(VerifiedIdentity {
            email: claims.email.clone(),
            issuer: claims.iss.clone(),
            audience: claims.aud.clone(),
            issued_at,
            expires_at,
        })
    }
}
