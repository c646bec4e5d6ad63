use anyhow::Context;
use ini::Ini;
use std::{
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use super::TemporaryCredential;
use crate::constants::AWS_CREDENTIALS_FILE_NAME;

/// Section written into a vended credentials document
pub const PROFILE_SECTION: &str = "default";

const KEY_ACCESS_KEY_ID: &str = "aws_access_key_id";
const KEY_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const KEY_SESSION_TOKEN: &str = "aws_session_token";
const KEY_REGION: &str = "region";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProfileError {
    #[error("credentials document is not valid INI: {0}")]
    Syntax(String),

    #[error("credentials document has no [default] section")]
    MissingSection,

    #[error("credentials document is missing {0}")]
    MissingKey(&'static str),
}

/// Fields of the `[default]` profile in a shared credentials file
#[derive(Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub region: String,
}

impl fmt::Debug for ProfileFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileFields")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl ProfileFields {
    pub fn from_credential(credential: &TemporaryCredential, region: &str) -> Self {
        Self {
            access_key_id: credential.access_key_id.clone(),
            secret_access_key: credential.secret_access_key.clone(),
            session_token: credential.session_token.clone(),
            region: region.to_string(),
        }
    }

    /// Serialize as a single `[default]` section, keys in fixed order.
    pub fn render(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some(PROFILE_SECTION))
            .set(KEY_ACCESS_KEY_ID, &self.access_key_id)
            .set(KEY_SECRET_ACCESS_KEY, &self.secret_access_key)
            .set(KEY_SESSION_TOKEN, &self.session_token)
            .set(KEY_REGION, &self.region);

        let mut buf = Vec::new();
        ini.write_to(&mut buf)
            .expect("writing to a Vec cannot fail");
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn parse(contents: &str) -> Result<Self, ProfileError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ProfileError::Syntax(e.to_string()))?;
        let section = ini
            .section(Some(PROFILE_SECTION))
            .ok_or(ProfileError::MissingSection)?;

        let field = |key: &'static str| {
            section
                .get(key)
                .map(str::to_string)
                .ok_or(ProfileError::MissingKey(key))
        };

        Ok(Self {
            access_key_id: field(KEY_ACCESS_KEY_ID)?,
            secret_access_key: field(KEY_SECRET_ACCESS_KEY)?,
            session_token: field(KEY_SESSION_TOKEN)?,
            region: field(KEY_REGION)?,
        })
    }
}

/// Rendered credentials file plus the path it is meant to be written to.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialDocument {
    pub contents: String,
    pub target_path: PathBuf,
}

impl fmt::Debug for CredentialDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDocument")
            .field("target_path", &self.target_path)
            .field("contents", &"<redacted>")
            .finish()
    }
}

/// `<base_dir>/credentials`
pub fn credentials_path(base_dir: &Path) -> PathBuf {
    base_dir.join(AWS_CREDENTIALS_FILE_NAME)
}

/// Replace the file at `path` with `contents`, readable only by the owner.
pub async fn write_credentials_file(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write credentials file: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path).await?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions).await?;
    }

    info!("Credentials saved to {}", path.display());
    Ok(())
}
