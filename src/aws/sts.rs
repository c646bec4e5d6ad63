use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, timeout::TimeoutConfig};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::{Client as StsClient, error::ProvideErrorMetadata};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{AwsRoleApi, TemporaryCredential};
use crate::error::{Result, VendError};

/// [`AwsRoleApi`] backed by the AWS SDK.
///
/// Server credentials come from the default provider chain (environment,
/// shared profile, instance metadata).
#[derive(Debug, Clone)]
pub struct SdkRoleApi {
    iam: IamClient,
    sts: StsClient,
}

impl SdkRoleApi {
    pub async fn new(region: &str, timeout: Duration) -> Self {
        info!("Using region: {}", region);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
            .load()
            .await;

        Self {
            iam: IamClient::new(&config),
            sts: StsClient::new(&config),
        }
    }
}

#[async_trait]
impl AwsRoleApi for SdkRoleApi {
    async fn get_role_arn(&self, role_name: &str) -> Result<String> {
        debug!(role_name = %role_name, "Calling AWS IAM GetRole");

        let output = self
            .iam
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                if e.is_no_such_entity_exception() {
                    return VendError::RoleNotFound(role_name.to_string());
                }
                let code = e.code().unwrap_or("unknown");
                error!(role_name = %role_name, code = %code, "IAM GetRole failed");
                VendError::Internal(format!("IAM GetRole failed with {code}"))
            })?;

        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| VendError::Internal("IAM GetRole returned no role".into()))
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<TemporaryCredential> {
        info!(role_arn = %role_arn, "Calling AWS STS AssumeRole");
        debug!("Duration: {} seconds", duration_seconds);

        let denied = || VendError::AssumeRoleDenied {
            role_arn: role_arn.to_string(),
        };

        let response = self
            .sts
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                error!(
                    role_arn = %role_arn,
                    code = e.code().unwrap_or("unknown"),
                    "STS AssumeRole failed"
                );
                denied()
            })?;

        let sts_creds = response.credentials().ok_or_else(|| {
            error!(role_arn = %role_arn, "AWS STS returned no credentials");
            denied()
        })?;

        Ok(TemporaryCredential {
            access_key_id: sts_creds.access_key_id().to_string(),
            secret_access_key: sts_creds.secret_access_key().to_string(),
            session_token: sts_creds.session_token().to_string(),
            expiration: *sts_creds.expiration(),
        })
    }
}
