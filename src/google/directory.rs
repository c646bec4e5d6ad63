use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::{AssertionGrant, ServiceAccountKey, TokenResponse};
use crate::config::DirectoryConfig;
use crate::constants::DIRECTORY_SCOPE;
use crate::directory::{DirectoryRecord, DirectoryService, RoleAttribute};
use crate::error::{Result, VendError};

/// Admin SDK `users.get` client authenticated as a domain-wide delegated
/// service account impersonating an administrator.
#[derive(Debug, Clone)]
pub struct GoogleDirectory {
    http: reqwest::Client,
    key: ServiceAccountKey,
    impersonation_email: String,
    schema: String,
    base_url: Url,
}

/// Subset of the Admin SDK user resource
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminUser {
    primary_email: String,
    #[serde(default)]
    custom_schemas: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RoleSchema {
    #[serde(rename = "IAM_Role", default)]
    iam_role: Vec<RoleEntry>,
    #[serde(rename = "SessionDuration", default)]
    session_duration: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RoleEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: String,
}

impl GoogleDirectory {
    pub fn new(config: DirectoryConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client(timeout)?,
            key: config.service_account,
            impersonation_email: config.impersonation_email,
            schema: config.custom_schema,
            base_url: config.base_url,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let assertion = self
            .key
            .sign_assertion(
                Some(&self.impersonation_email),
                AssertionGrant::Scope(DIRECTORY_SCOPE),
                Utc::now(),
            )
            .map_err(|e| VendError::Internal(format!("directory credentials: {e}")))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&ServiceAccountKey::assertion_form(&assertion))
            .send()
            .await
            .map_err(|e| VendError::Internal(format!("directory token request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Directory service account token request rejected");
            return Err(VendError::Internal(format!("directory token endpoint returned {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| VendError::Internal(format!("unexpected token response: {}", e.without_url())))?;
        body.access_token
            .ok_or_else(|| VendError::Internal("token response carries no access_token".into()))
    }

    fn user_url(&self, email: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| VendError::Internal("directory base URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(["admin", "directory", "v1", "users", email]);
        url.query_pairs_mut().append_pair("projection", "full");
        Ok(url)
    }
}

#[async_trait]
impl DirectoryService for GoogleDirectory {
    async fn get_user(&self, email: &str) -> Result<DirectoryRecord> {
        let token = self.access_token().await?;
        let url = self.user_url(email)?;
        debug!(email = %email, "Fetching directory user");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| VendError::Internal(format!("directory request failed: {}", e.without_url())))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(VendError::UserNotFound(email.to_string())),
            status if !status.is_success() => {
                error!(email = %email, status = %status, "Directory lookup failed");
                return Err(VendError::Internal(format!("directory returned {status}")));
            }
            _ => {}
        }

        let user: AdminUser = response
            .json()
            .await
            .map_err(|e| VendError::Internal(format!("unexpected directory response: {}", e.without_url())))?;

        record_from_admin_user(user, &self.schema)
    }
}

/// Pull the role mapping out of a user's custom schema.
///
/// A missing schema yields an empty attribute list; a schema that does not
/// have the expected shape is `AttributeMalformed`.
fn record_from_admin_user(user: AdminUser, schema: &str) -> Result<DirectoryRecord> {
    let email = user.primary_email;

    let Some(raw) = user.custom_schemas.get(schema) else {
        return Ok(DirectoryRecord {
            email,
            role_attributes: Vec::new(),
            session_duration: None,
        });
    };

    let parsed: RoleSchema = serde_json::from_value(raw.clone()).map_err(|e| {
        warn!(email = %email, schema = %schema, error = %e, "Custom schema has an unexpected shape");
        VendError::AttributeMalformed(email.clone())
    })?;

    let session_duration = parsed.session_duration.as_ref().and_then(|value| {
        let seconds = parse_session_duration(value);
        if seconds.is_none() {
            warn!(email = %email, "Ignoring unparsable SessionDuration");
        }
        seconds
    });

    Ok(DirectoryRecord {
        email,
        role_attributes: parsed
            .iam_role
            .into_iter()
            .map(|entry| RoleAttribute::new(entry.kind, entry.value))
            .collect(),
        session_duration,
    })
}

/// Admin SDK serializes INT64 fields as strings
fn parse_session_duration(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_ROLE_SCHEMA;
    use crate::google::testing::{FAKE_ACCESS_TOKEN, FakeGoogle, serve, service_account_json};
    use serde_json::json;
    use std::sync::Arc;

    fn admin_user(custom_schemas: Value) -> AdminUser {
        serde_json::from_value(json!({
            "primaryEmail": "user@example.com",
            "customSchemas": custom_schemas
        }))
        .unwrap()
    }

    async fn directory(fake: FakeGoogle) -> (GoogleDirectory, Arc<FakeGoogle>) {
        let fake = Arc::new(fake);
        let base = serve(fake.clone()).await;
        let token_uri = base.join("/token").unwrap();
        let key = ServiceAccountKey::from_json(service_account_json(token_uri.as_str()).as_bytes()).unwrap();

        let config = DirectoryConfig {
            impersonation_email: "admin@example.com".into(),
            service_account: key,
            custom_schema: DEFAULT_ROLE_SCHEMA.into(),
            base_url: base,
        };
        (GoogleDirectory::new(config, Duration::from_secs(5)).unwrap(), fake)
    }

    #[test]
    fn test_record_from_admin_user() {
        let user = admin_user(json!({
            "AWS_SAML": {
                "IAM_Role": [
                    {"type": "work", "value": "arn:aws:iam::1:role/Analyst,arn:aws:iam::1:saml-provider/Google"},
                    {"type": "work", "value": "arn:aws:iam::1:role/Other,arn:aws:iam::1:saml-provider/Google"}
                ],
                "SessionDuration": "7200"
            }
        }));

        let record = record_from_admin_user(user, "AWS_SAML").unwrap();
        assert_eq!(record.email, "user@example.com");
        assert_eq!(record.role_attributes.len(), 2);
        assert_eq!(record.role_attributes[0].kind, "work");
        assert_eq!(
            record.role_attributes[0].role_identifier(),
            Some("arn:aws:iam::1:role/Analyst")
        );
        assert_eq!(record.session_duration, Some(7200));
    }

    #[test]
    fn test_record_without_schema_has_no_attributes() {
        let record = record_from_admin_user(admin_user(json!({})), "AWS_SAML").unwrap();
        assert!(record.role_attributes.is_empty());
        assert_eq!(record.session_duration, None);
    }

    #[test]
    fn test_record_with_other_schema_only() {
        let user = admin_user(json!({"Employment": {"costCenter": "42"}}));
        let record = record_from_admin_user(user, "AWS_SAML").unwrap();
        assert!(record.role_attributes.is_empty());
    }

    #[test]
    fn test_record_with_misshapen_schema_is_malformed() {
        let user = admin_user(json!({"AWS_SAML": {"IAM_Role": "arn:aws:iam::1:role/Analyst"}}));
        let err = record_from_admin_user(user, "AWS_SAML").unwrap_err();
        assert!(matches!(err, VendError::AttributeMalformed(_)));
    }

    #[test]
    fn test_parse_session_duration() {
        assert_eq!(parse_session_duration(&json!(3600)), Some(3600));
        assert_eq!(parse_session_duration(&json!("43200")), Some(43200));
        assert_eq!(parse_session_duration(&json!("one hour")), None);
        assert_eq!(parse_session_duration(&json!(-1)), None);
    }

    #[test]
    fn test_user_url_escapes_email() {
        let config = DirectoryConfig {
            impersonation_email: "admin@example.com".into(),
            service_account: ServiceAccountKey::from_json(
                service_account_json("https://oauth2.googleapis.com/token").as_bytes(),
            )
            .unwrap(),
            custom_schema: DEFAULT_ROLE_SCHEMA.into(),
            base_url: Url::parse("https://admin.googleapis.com").unwrap(),
        };
        let directory = GoogleDirectory::new(config, Duration::from_secs(1)).unwrap();

        let url = directory.user_url("a/b?c@example.com").unwrap();
        assert_eq!(url.path(), "/admin/directory/v1/users/a%2Fb%3Fc@example.com");
        assert_eq!(url.query(), Some("projection=full"));
    }

    #[tokio::test]
    async fn test_get_user_impersonates_admin() {
        let mut fake = FakeGoogle::default();
        fake.users.insert(
            "user@example.com".into(),
            json!({
                "primaryEmail": "user@example.com",
                "customSchemas": {"AWS_SAML": {"IAM_Role": [{"type": "work", "value": "Analyst"}]}}
            }),
        );
        let (directory, fake) = directory(fake).await;

        let record = directory.get_user("user@example.com").await.unwrap();
        assert_eq!(record.role_attributes[0].role_identifier(), Some("Analyst"));

        let grants = fake.grants.lock().unwrap();
        assert_eq!(grants[0]["grant_type"], "urn:ietf:params:oauth:grant-type:jwt-bearer");
        let bearers = fake.bearer_tokens.lock().unwrap();
        assert_eq!(bearers[0], format!("Bearer {FAKE_ACCESS_TOKEN}"));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let (directory, _) = directory(FakeGoogle::default()).await;
        let err = directory.get_user("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, VendError::UserNotFound(ref email) if email == "ghost@example.com"));
    }

    #[tokio::test]
    async fn test_get_user_upstream_failure_is_internal() {
        let fake = FakeGoogle {
            directory_status: Some(StatusCode::FORBIDDEN),
            ..FakeGoogle::default()
        };
        let (directory, _) = directory(fake).await;
        let err = directory.get_user("user@example.com").await.unwrap_err();
        assert!(matches!(err, VendError::Internal(_)));
    }

    #[tokio::test]
    async fn test_rejected_service_account_is_internal() {
        let fake = FakeGoogle {
            token_status: StatusCode::UNAUTHORIZED,
            ..FakeGoogle::default()
        };
        let (directory, fake) = directory(fake).await;
        let err = directory.get_user("user@example.com").await.unwrap_err();
        assert!(matches!(err, VendError::Internal(_)));
        assert!(fake.bearer_tokens.lock().unwrap().is_empty());
    }
}
