//! Directory records and the role mapping stored on them.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, VendError};

/// One entry of the role mapping custom attribute.
///
/// `encoded_value` is a comma-separated list whose first element is the role
/// ARN or bare role name, usually followed by the identity provider ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAttribute {
    pub kind: String,
    pub encoded_value: String,
}

impl RoleAttribute {
    pub fn new(kind: impl Into<String>, encoded_value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            encoded_value: encoded_value.into(),
        }
    }

    /// First comma-separated field, trimmed. Remaining fields are ignored.
    pub fn role_identifier(&self) -> Option<&str> {
        self.encoded_value
            .split(',')
            .next()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Directory user as seen by the resolver. Fetched fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub email: String,
    pub role_attributes: Vec<RoleAttribute>,
    pub session_duration: Option<u32>,
}

#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Fetch the user with custom schemas. A missing user is `UserNotFound`.
    async fn get_user(&self, email: &str) -> Result<DirectoryRecord>;
}

/// Role picked for a user.
///
/// `role_arn` is set when the directory already stores a full ARN and is
/// only reported in logs. The minter receives `role_identifier` and resolves
/// a bare role name through IAM itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub role_identifier: String,
    pub role_arn: Option<String>,
}

impl ResolvedRole {
    pub fn from_identifier(identifier: &str) -> Self {
        let role_arn = is_role_arn(identifier).then(|| identifier.to_string());
        Self {
            role_identifier: identifier.to_string(),
            role_arn,
        }
    }
}

/// `arn:<partition>:iam::<account>:role/<path/>name`
pub fn is_role_arn(identifier: &str) -> bool {
    identifier.starts_with("arn:") && identifier.contains(":role/")
}

#[derive(Clone)]
pub struct RoleResolver {
    directory: Arc<dyn DirectoryService>,
}

impl RoleResolver {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    /// Resolve the single role mapped to `email`. The first attribute wins.
    pub async fn resolve_role(&self, email: &str) -> Result<ResolvedRole> {
        let record = self.directory.get_user(email).await?;
        debug!(
            email = %record.email,
            attributes = record.role_attributes.len(),
            "Fetched directory record"
        );

        if let Some(duration) = record.session_duration {
            info!(email = %record.email, session_duration = duration, "Directory requests a session duration");
        }

        let attribute = record
            .role_attributes
            .first()
            .ok_or_else(|| VendError::RoleNotConfigured(email.to_string()))?;

        let identifier = attribute
            .role_identifier()
            .ok_or_else(|| VendError::AttributeMalformed(email.to_string()))?;

        Ok(ResolvedRole::from_identifier(identifier))
    }
}
