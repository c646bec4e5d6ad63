//! Request-scoped sequencing of identity, role and credential steps.

use std::sync::Arc;
use tracing::{info, warn};

use crate::aws::{CredentialDocument, RoleService};
use crate::directory::RoleResolver;
use crate::error::{FailureKind, Result, VendError};
use crate::identity::IdentityVerifier;

/// Progress of a single vending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendingState {
    Received,
    Verifying,
    Resolving,
    Minting,
    Succeeded,
    Failed(FailureKind),
}

impl VendingState {
    /// Next state on success. Terminal states stay where they are.
    pub fn advance(self) -> Self {
        match self {
            VendingState::Received => VendingState::Verifying,
            VendingState::Verifying => VendingState::Resolving,
            VendingState::Resolving => VendingState::Minting,
            VendingState::Minting => VendingState::Succeeded,
            terminal => terminal,
        }
    }

    pub fn fail(self, kind: FailureKind) -> Self {
        match self {
            VendingState::Succeeded | VendingState::Failed(_) => self,
            _ => VendingState::Failed(kind),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, VendingState::Succeeded | VendingState::Failed(_))
    }
}

/// Final state of a request together with its result
#[derive(Debug)]
pub struct VendOutcome {
    pub state: VendingState,
    pub result: Result<CredentialDocument>,
}

/// Runs verify, resolve and mint strictly in order. No retries, no caching.
#[derive(Clone)]
pub struct VendingOrchestrator {
    identity: IdentityVerifier,
    roles: RoleResolver,
    credentials: Arc<dyn RoleService>,
}

impl VendingOrchestrator {
    pub fn new(
        identity: IdentityVerifier,
        roles: RoleResolver,
        credentials: Arc<dyn RoleService>,
    ) -> Self {
        Self {
            identity,
            roles,
            credentials,
        }
    }

    pub async fn vend(&self, credentials: &[u8]) -> VendOutcome {
        let mut state = VendingState::Received;
        let result = self.run(credentials, &mut state).await;

        match &result {
            Ok(document) => {
                state = state.advance();
                info!(target_path = %document.target_path.display(), "Vended credentials");
            }
            Err(e) => {
                state = state.fail(e.kind());
                log_failure(e);
            }
        }

        VendOutcome { state, result }
    }

    async fn run(&self, credentials: &[u8], state: &mut VendingState) -> Result<CredentialDocument> {
        *state = state.advance();
        let identity = self.identity.verify_identity(credentials).await?;
        info!(email = %identity.email, "Verified identity");

        *state = state.advance();
        let role = self.roles.resolve_role(&identity.email).await?;
        info!(
            email = %identity.email,
            role = %role.role_identifier,
            iam_lookup = role.role_arn.is_none(),
            "Resolved role"
        );

        *state = state.advance();
        self.credentials.get_credential(&role.role_identifier).await
    }
}

fn log_failure(e: &VendError) {
    let kind = e.kind();
    match e {
        VendError::AssumeRoleDenied { role_arn } => {
            warn!(kind = %kind, role_arn = %role_arn, "Vending failed")
        }
        VendError::UserNotFound(email)
        | VendError::RoleNotConfigured(email)
        | VendError::AttributeMalformed(email) => {
            warn!(kind = %kind, email = %email, "Vending failed")
        }
        VendError::RoleNotFound(role) => warn!(kind = %kind, role = %role, "Vending failed"),
        other => warn!(kind = %kind, error = %other, "Vending failed"),
    }
}
