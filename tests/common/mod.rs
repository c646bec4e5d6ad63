#![allow(dead_code)]

use async_trait::async_trait;
use aws_smithy_types::DateTime as AwsDateTime;
use chrono::Utc;
use gsuite_aws_sso::{
    aws::{AwsRoleApi, CredentialMinter, MinterConfig, TemporaryCredential},
    directory::{DirectoryRecord, DirectoryService, RoleAttribute, RoleResolver},
    error::{Result, VendError},
    google::TokenSource,
    identity::{IdTokenClaims, IdentityToken, IdentityVerifier, OAuthService, token::encode_unsigned},
    server::AppState,
    vending::VendingOrchestrator,
};
use serde_json::json;
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Barrier;

pub const REGION: &str = "us-west-2";
pub const CLIENT_ID: &str = "server-client-id";
pub const ACCOUNT: &str = "123456789012";

pub fn role_arn(name: &str) -> String {
    format!("arn:aws:iam::{ACCOUNT}:role/{name}")
}

/// `authorized_user` blob whose refresh token the fake maps to an email
pub fn credential_blob(refresh_token: &str) -> Vec<u8> {
    json!({
        "type": "authorized_user",
        "client_id": "gcloud-client-id",
        "client_secret": "gcloud-secret",
        "refresh_token": refresh_token,
    })
    .to_string()
    .into_bytes()
}

/// Identity provider keyed by refresh token (blobs) and by authorization code.
#[derive(Default)]
pub struct FakeOAuth {
    pub refresh_tokens: HashMap<String, String>,
    pub codes: HashMap<String, String>,
    pub unverified: HashSet<String>,
    pub issued: AtomicUsize,
}

impl FakeOAuth {
    fn token_for(&self, email: &str) -> Result<IdentityToken> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now().timestamp();
        let claims = IdTokenClaims {
            iss: "https://accounts.google.com".into(),
            aud: CLIENT_ID.into(),
            sub: format!("subject-{n}"),
            hd: Some("example.com".into()),
            email: email.into(),
            email_verified: !self.unverified.contains(email),
            iat: now,
            exp: now + 3600,
        };
        IdentityToken::parse(&encode_unsigned(&claims))
    }
}

#[async_trait]
impl OAuthService for FakeOAuth {
    fn login_url(&self, state: &str) -> String {
        format!("https://accounts.example.test/o/oauth2/auth?client_id={CLIENT_ID}&state={state}")
    }

    async fn exchange(&self, code: &str) -> Result<IdentityToken> {
        let email = self
            .codes
            .get(code)
            .ok_or_else(|| VendError::CredentialInvalid("unknown authorization code".into()))?;
        self.token_for(email)
    }

    fn token_source_from_credentials(&self, credentials: &[u8]) -> Result<TokenSource> {
        TokenSource::from_json(credentials)
    }

    async fn id_token(&self, source: &TokenSource) -> Result<IdentityToken> {
        let TokenSource::AuthorizedUser(user) = source else {
            return Err(VendError::CredentialInvalid("fake only knows authorized users".into()));
        };
        let email = self
            .refresh_tokens
            .get(&user.refresh_token)
            .ok_or_else(|| VendError::CredentialInvalid("refresh token revoked".into()))?;
        self.token_for(email)
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub users: HashMap<String, DirectoryRecord>,
    pub lookups: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_user(mut self, email: &str, attributes: &[&str]) -> Self {
        self.users.insert(
            email.to_string(),
            DirectoryRecord {
                email: email.to_string(),
                role_attributes: attributes
                    .iter()
                    .map(|value| RoleAttribute::new("work", *value))
                    .collect(),
                session_duration: None,
            },
        );
        self
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn get_user(&self, email: &str) -> Result<DirectoryRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(email)
            .cloned()
            .ok_or_else(|| VendError::UserNotFound(email.to_string()))
    }
}

/// IAM and STS stand-in. A barrier, when set, holds every AssumeRole call
/// until the expected number of callers are in flight at once.
#[derive(Default)]
pub struct FakeAws {
    pub roles: HashMap<String, String>,
    pub denied: HashSet<String>,
    pub barrier: Option<Arc<Barrier>>,
    pub role_lookups: AtomicUsize,
    pub assumed: Mutex<Vec<(String, String, i32)>>,
}

impl FakeAws {
    pub fn with_role(mut self, name: &str) -> Self {
        self.roles.insert(name.to_string(), role_arn(name));
        self
    }

    pub fn deny(mut self, arn: &str) -> Self {
        self.denied.insert(arn.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst) + self.assumed.lock().unwrap().len()
    }
}

#[async_trait]
impl AwsRoleApi for FakeAws {
    async fn get_role_arn(&self, role_name: &str) -> Result<String> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.roles
            .get(role_name)
            .cloned()
            .ok_or_else(|| VendError::RoleNotFound(role_name.to_string()))
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<TemporaryCredential> {
        let n = {
            let mut assumed = self.assumed.lock().unwrap();
            assumed.push((role_arn.to_string(), session_name.to_string(), duration_seconds));
            assumed.len()
        };

        if let Some(barrier) = &self.barrier {
            tokio::time::timeout(Duration::from_secs(5), barrier.wait())
                .await
                .expect("AssumeRole calls were serialized");
        }

        if self.denied.contains(role_arn) {
            return Err(VendError::AssumeRoleDenied {
                role_arn: role_arn.to_string(),
            });
        }

        Ok(TemporaryCredential {
            access_key_id: format!("ASIAFAKE{n:04}"),
            secret_access_key: format!("secret-{n}"),
            session_token: format!("session-{n}"),
            expiration: AwsDateTime::from_secs(Utc::now().timestamp() + 3600),
        })
    }
}

pub fn minter_config() -> MinterConfig {
    MinterConfig {
        region: REGION.to_string(),
        session_name: "gsuite-aws-sso".to_string(),
        session_duration_secs: 3600,
        credentials_dir: PathBuf::from("/home/user/.aws"),
    }
}

pub fn build_state(oauth: FakeOAuth, directory: Arc<FakeDirectory>, aws: Arc<FakeAws>) -> AppState {
    let identity = IdentityVerifier::new(Arc::new(oauth), vec![CLIENT_ID.to_string()]);
    let roles = RoleResolver::new(directory);
    let minter = Arc::new(CredentialMinter::new(aws, minter_config()));

    AppState {
        orchestrator: VendingOrchestrator::new(identity.clone(), roles, minter),
        identity,
        secure_cookies: true,
    }
}

/// Alice maps to an ARN, Bob to a bare role name, Carol to nothing, and
/// Dave to a role AWS refuses to assume.
pub fn standard_fixture() -> (FakeOAuth, Arc<FakeDirectory>, FakeAws) {
    let mut oauth = FakeOAuth::default();
    for (token, email) in [
        ("alice-refresh", "alice@example.com"),
        ("bob-refresh", "bob@example.com"),
        ("carol-refresh", "carol@example.com"),
        ("dave-refresh", "dave@example.com"),
        ("erin-refresh", "erin@example.com"),
        ("mallory-refresh", "mallory@example.com"),
    ] {
        oauth.refresh_tokens.insert(token.into(), email.into());
    }
    oauth.codes.insert("alice-code".into(), "alice@example.com".into());
    oauth.unverified.insert("mallory@example.com".into());

    let saml_provider = format!("arn:aws:iam::{ACCOUNT}:saml-provider/Google");
    let directory = FakeDirectory::default()
        .with_user(
            "alice@example.com",
            &[&format!("{},{saml_provider}", role_arn("Developer"))],
        )
        .with_user("bob@example.com", &["ReadOnly"])
        .with_user("carol@example.com", &[])
        .with_user("dave@example.com", &[&role_arn("Restricted")])
        .with_user("mallory@example.com", &[&role_arn("Developer")]);

    let aws = FakeAws::default()
        .with_role("ReadOnly")
        .deny(&role_arn("Restricted"));

    (oauth, Arc::new(directory), aws)
}
