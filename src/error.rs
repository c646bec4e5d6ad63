use axum::http::StatusCode;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VendError>;

/// Failures raised while vending a credential.
///
/// Messages carry only safe context (emails, role identifiers, upstream status
/// codes). Credential blobs, identity tokens and minted secrets never end up in
/// an error value.
#[derive(Error, Debug)]
pub enum VendError {
    #[error("credential is invalid: {0}")]
    CredentialInvalid(String),

    #[error("identity token is malformed: {0}")]
    MalformedToken(String),

    #[error("identity token has expired")]
    TokenExpired,

    #[error("identity provider unreachable: {0}")]
    IntrospectionUnreachable(String),

    #[error("user '{0}' not found in directory")]
    UserNotFound(String),

    #[error("no AWS role configured for '{0}'")]
    RoleNotConfigured(String),

    #[error("AWS role attribute for '{0}' is malformed")]
    AttributeMalformed(String),

    #[error("role '{0}' does not exist in AWS")]
    RoleNotFound(String),

    #[error("assume role denied for {role_arn}")]
    AssumeRoleDenied { role_arn: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl VendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            VendError::CredentialInvalid(_) => FailureKind::CredentialInvalid,
            VendError::MalformedToken(_) => FailureKind::MalformedToken,
            VendError::TokenExpired => FailureKind::TokenExpired,
            VendError::IntrospectionUnreachable(_) => FailureKind::IntrospectionUnreachable,
            VendError::UserNotFound(_) => FailureKind::UserNotFound,
            VendError::RoleNotConfigured(_) => FailureKind::RoleNotConfigured,
            VendError::AttributeMalformed(_) => FailureKind::AttributeMalformed,
            VendError::RoleNotFound(_) => FailureKind::RoleNotFound,
            VendError::AssumeRoleDenied { .. } => FailureKind::AssumeRoleDenied,
            VendError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }
}

/// Discriminant of [`VendError`], small enough to live inside the vending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    CredentialInvalid,
    MalformedToken,
    TokenExpired,
    IntrospectionUnreachable,
    UserNotFound,
    RoleNotConfigured,
    AttributeMalformed,
    RoleNotFound,
    AssumeRoleDenied,
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::CredentialInvalid => "credential_invalid",
            FailureKind::MalformedToken => "malformed_token",
            FailureKind::TokenExpired => "token_expired",
            FailureKind::IntrospectionUnreachable => "introspection_unreachable",
            FailureKind::UserNotFound => "user_not_found",
            FailureKind::RoleNotConfigured => "role_not_configured",
            FailureKind::AttributeMalformed => "attribute_malformed",
            FailureKind::RoleNotFound => "role_not_found",
            FailureKind::AssumeRoleDenied => "assume_role_denied",
            FailureKind::Internal => "internal",
        }
    }

    /// HTTP status returned to the client for this failure.
    pub fn status(self) -> StatusCode {
        match self {
            FailureKind::CredentialInvalid
            | FailureKind::MalformedToken
            | FailureKind::TokenExpired
            | FailureKind::IntrospectionUnreachable => StatusCode::UNAUTHORIZED,
            FailureKind::UserNotFound
            | FailureKind::RoleNotConfigured
            | FailureKind::AttributeMalformed
            | FailureKind::RoleNotFound => StatusCode::BAD_REQUEST,
            FailureKind::AssumeRoleDenied => StatusCode::FORBIDDEN,
            FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
