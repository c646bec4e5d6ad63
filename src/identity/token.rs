use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, VendError};

/// Compact token segments are base64url (RFC 7519). Padding is accepted but
/// never required; the standard alphabet (`+`, `/`) is rejected.
pub const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims Google places in an identity token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hd: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub iat: i64,
    pub exp: i64,
}

/// A compact identity token together with its decoded claims.
///
/// The signature segment is not checked locally; authenticity comes from the
/// token having been fetched over TLS from Google and confirmed by the
/// introspection endpoint.
#[derive(Clone)]
pub struct IdentityToken {
    raw: String,
    claims: IdTokenClaims,
}

impl IdentityToken {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 {
            return Err(VendError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        let payload = segments[1];
        if payload.is_empty() {
            return Err(VendError::MalformedToken("empty claims segment".into()));
        }

        let decoded = SEGMENT_ENGINE
            .decode(payload)
            .map_err(|e| VendError::MalformedToken(format!("claims segment: {e}")))?;

        let claims = serde_json::from_slice(&decoded).map_err(|e| {
            VendError::MalformedToken(format!(
                "claims are not a JSON object (line {} column {})",
                e.line(),
                e.column()
            ))
        })?;

        Ok(Self {
            raw: raw.to_string(),
            claims,
        })
    }

    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityToken")
            .field("raw", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}

/// Build an unsigned compact token (`alg: none`) carrying `claims`.
///
/// Only useful to stand in for the identity provider in tests and fakes.
pub fn encode_unsigned(claims: &IdTokenClaims) -> String {
    let header = SEGMENT_ENGINE.encode(br#"{"alg":"none","typ":"JWT"}"#);
    // IdTokenClaims only holds strings, integers and booleans
    let body = serde_json::to_vec(claims).unwrap_or_default();
    format!("{header}.{}.", SEGMENT_ENGINE.encode(body))
}
