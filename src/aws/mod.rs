use async_trait::async_trait;
use aws_smithy_types::DateTime;
use std::fmt;

use crate::error::Result;

pub mod credentials;
pub mod minter;
pub mod sts;

pub use credentials::{CredentialDocument, ProfileFields};
pub use minter::{CredentialMinter, MinterConfig};

/// AWS temporary credentials returned by STS
#[derive(Clone)]
pub struct TemporaryCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

impl fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// The IAM and STS calls the minter needs.
#[async_trait]
pub trait AwsRoleApi: Send + Sync {
    /// Full ARN of the role called `role_name`. A missing role is `RoleNotFound`.
    async fn get_role_arn(&self, role_name: &str) -> Result<String>;

    /// Assume `role_arn`. Any refusal is `AssumeRoleDenied`.
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<TemporaryCredential>;
}

/// Role credential capability consumed by the vending orchestrator.
#[async_trait]
pub trait RoleService: Send + Sync {
    async fn get_credential(&self, role_identifier: &str) -> Result<CredentialDocument>;
}
