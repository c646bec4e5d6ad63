use async_trait::async_trait;
use aws_smithy_types::date_time::Format;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::credentials::{CredentialDocument, ProfileFields, credentials_path};
use super::{AwsRoleApi, RoleService};
use crate::directory::is_role_arn;
use crate::error::Result;

/// Read-only settings for minting, taken from the `[aws]` server section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinterConfig {
    pub region: String,
    pub session_name: String,
    pub session_duration_secs: i32,
    pub credentials_dir: PathBuf,
}

/// Turns a role identifier into a rendered credentials document.
#[derive(Clone)]
pub struct CredentialMinter {
    api: Arc<dyn AwsRoleApi>,
    config: Arc<MinterConfig>,
}

impl CredentialMinter {
    pub fn new(api: Arc<dyn AwsRoleApi>, config: MinterConfig) -> Self {
        Self {
            api,
            config: Arc::new(config),
        }
    }

    pub async fn mint_credential(&self, role_identifier: &str) -> Result<CredentialDocument> {
        let role_arn = if is_role_arn(role_identifier) {
            role_identifier.to_string()
        } else {
            debug!(role_name = %role_identifier, "Resolving role name through IAM");
            self.api.get_role_arn(role_identifier).await?
        };

        let credential = self
            .api
            .assume_role(
                &role_arn,
                &self.config.session_name,
                self.config.session_duration_secs,
            )
            .await?;

        info!(
            role_arn = %role_arn,
            expiration = %credential
                .expiration
                .fmt(Format::DateTime)
                .unwrap_or_else(|_| "unknown".to_string()),
            "Minted temporary credentials"
        );

        Ok(CredentialDocument {
            contents: ProfileFields::from_credential(&credential, &self.config.region).render(),
            target_path: credentials_path(&self.config.credentials_dir),
        })
    }
}

#[async_trait]
impl RoleService for CredentialMinter {
    async fn get_credential(&self, role_identifier: &str) -> Result<CredentialDocument> {
        self.mint_credential(role_identifier).await
    }
}
