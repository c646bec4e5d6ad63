use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::GOOGLE_TOKEN_URL;
use crate::error::{Result, VendError};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of a signed JWT-bearer assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// Google credential file, dispatched on its `type` field.
///
/// Each variant holds the provider-specific material needed to ask Google's
/// token endpoint for an identity token.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenSource {
    /// `gcloud auth application-default login` output
    AuthorizedUser(AuthorizedUser),
    /// Service account key file
    ServiceAccount(ServiceAccountKey),
}

impl TokenSource {
    /// Parse a credential blob. Parser messages are reduced to a position so
    /// that no fragment of the blob leaks into errors or logs.
    pub fn from_json(credentials: &[u8]) -> Result<Self> {
        serde_json::from_slice(credentials).map_err(|e| {
            VendError::CredentialInvalid(format!(
                "unsupported or malformed credential file (line {} column {})",
                e.line(),
                e.column()
            ))
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TokenSource::AuthorizedUser(_) => "authorized_user",
            TokenSource::ServiceAccount(_) => "service_account",
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl AuthorizedUser {
    /// Form body for the refresh-token grant
    pub fn refresh_form(&self) -> [(&'static str, &str); 4] {
        [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
        ]
    }
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// What a service account asks the token endpoint for.
#[derive(Debug, Clone, Copy)]
pub enum AssertionGrant<'a> {
    /// An access token carrying these space-separated scopes
    Scope(&'a str),
    /// An identity token whose `aud` is this value
    TargetAudience(&'a str),
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_audience: Option<&'a str>,
}

impl ServiceAccountKey {
    pub fn from_json(key: &[u8]) -> Result<Self> {
        match TokenSource::from_json(key)? {
            TokenSource::ServiceAccount(key) => Ok(key),
            other => Err(VendError::CredentialInvalid(format!(
                "expected a service_account key, found {}",
                other.kind()
            ))),
        }
    }

    /// Sign an RS256 JWT-bearer assertion for the token endpoint.
    ///
    /// `subject` is the user to impersonate under domain-wide delegation.
    pub fn sign_assertion(
        &self,
        subject: Option<&str>,
        grant: AssertionGrant<'_>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let iat = now.timestamp();
        let (scope, target_audience) = match grant {
            AssertionGrant::Scope(scope) => (Some(scope), None),
            AssertionGrant::TargetAudience(audience) => (None, Some(audience)),
        };

        let claims = AssertionClaims {
            iss: &self.client_email,
            sub: subject,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
            scope,
            target_audience,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|_| {
            VendError::CredentialInvalid("service account private key is not valid PEM".into())
        })?;

        encode(&header, &claims, &key)
            .map_err(|e| VendError::CredentialInvalid(format!("failed to sign assertion: {e}")))
    }

    /// Form body exchanging a signed assertion at the token endpoint
    pub fn assertion_form(assertion: &str) -> [(&'static str, &str); 2] {
        [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)]
    }
}
