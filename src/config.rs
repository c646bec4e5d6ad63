use crate::aws::MinterConfig;
use crate::constants::{
    self, DEFAULT_AWS_REGION, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ROLE_SCHEMA,
    DEFAULT_SERVER_URL, DEFAULT_SESSION_DURATION_SECS, DEFAULT_SESSION_NAME, DIRECTORY_BASE_URL,
    GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GOOGLE_TOKENINFO_URL, MAX_SESSION_DURATION_SECS,
    MIN_SESSION_DURATION_SECS,
};
use crate::google::ServiceAccountKey;
use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use dialoguer::{Input, theme::ColorfulTheme};
use ini::{Ini, Properties};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::fs;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("missing required setting '{key}' in [{section}]")]
    Missing {
        section: &'static str,
        key: &'static str,
    },

    #[error("invalid value for '{key}' in [{section}]: {reason}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        reason: String,
    },
}

/// `[oauth]`: the server's own OAuth client registration
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: Url,
    pub token_url: Url,
    pub tokeninfo_url: Url,
    /// Empty accepts any audience
    pub allowed_audiences: Vec<String>,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url)
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("tokeninfo_url", &self.tokeninfo_url.as_str())
            .field("allowed_audiences", &self.allowed_audiences)
            .finish_non_exhaustive()
    }
}

/// `[directory]`: domain-wide delegated access to the Admin SDK
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub impersonation_email: String,
    pub service_account: ServiceAccountKey,
    pub custom_schema: String,
    pub base_url: Url,
}

/// Everything the vending server needs, validated once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout: Duration,
    pub oauth: OAuthConfig,
    pub directory: DirectoryConfig,
    pub aws: MinterConfig,
}

struct Sections<'a>(&'a Ini);

impl<'a> Sections<'a> {
    fn get(&self, section: &'static str, key: &'static str) -> Option<&'a str> {
        self.0
            .section(Some(section))
            .and_then(|props| props.get(key))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn required(&self, section: &'static str, key: &'static str) -> Result<&'a str, ConfigError> {
        self.get(section, key)
            .ok_or(ConfigError::Missing { section, key })
    }

    fn url(&self, section: &'static str, key: &'static str, default: &str) -> Result<Url, ConfigError> {
        let value = self.get(section, key).unwrap_or(default);
        Url::parse(value).map_err(|e| ConfigError::Invalid {
            section,
            key,
            reason: e.to_string(),
        })
    }

    fn number<T: std::str::FromStr>(
        &self,
        section: &'static str,
        key: &'static str,
        default: T,
    ) -> Result<T, ConfigError>
    where
        T::Err: fmt::Display,
    {
        match self.get(section, key) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                section,
                key,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let s = Sections(ini);

        let port = s.number("server", "port", DEFAULT_PORT)?;
        let timeout_secs: u64 = s.number("server", "request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                section: "server",
                key: "request_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }

        let oauth = OAuthConfig {
            client_id: s.required("oauth", "client_id")?.to_string(),
            client_secret: s.required("oauth", "client_secret")?.to_string(),
            redirect_url: s.required("oauth", "redirect_url")?.to_string(),
            auth_url: s.url("oauth", "auth_url", GOOGLE_AUTH_URL)?,
            token_url: s.url("oauth", "token_url", GOOGLE_TOKEN_URL)?,
            tokeninfo_url: s.url("oauth", "tokeninfo_url", GOOGLE_TOKENINFO_URL)?,
            allowed_audiences: s
                .get("oauth", "allowed_audiences")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|aud| !aud.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        let directory = DirectoryConfig {
            impersonation_email: s.required("directory", "impersonation_email")?.to_string(),
            service_account: load_service_account(&s)?,
            custom_schema: s
                .get("directory", "custom_schema")
                .unwrap_or(DEFAULT_ROLE_SCHEMA)
                .to_string(),
            base_url: s.url("directory", "base_url", DIRECTORY_BASE_URL)?,
        };

        let session_duration_secs =
            s.number("aws", "session_duration_secs", DEFAULT_SESSION_DURATION_SECS)?;
        if !(MIN_SESSION_DURATION_SECS..=MAX_SESSION_DURATION_SECS).contains(&session_duration_secs) {
            return Err(ConfigError::Invalid {
                section: "aws",
                key: "session_duration_secs",
                reason: format!(
                    "{session_duration_secs} is outside {MIN_SESSION_DURATION_SECS}..={MAX_SESSION_DURATION_SECS}"
                ),
            });
        }

        let credentials_dir = match s.get("aws", "credentials_dir") {
            Some(dir) => expand_home(dir),
            None => constants::default_aws_dir().ok_or(ConfigError::Missing {
                section: "aws",
                key: "credentials_dir",
            })?,
        };

        let aws = MinterConfig {
            region: s.get("aws", "region").unwrap_or(DEFAULT_AWS_REGION).to_string(),
            session_name: s
                .get("aws", "session_name")
                .unwrap_or(DEFAULT_SESSION_NAME)
                .to_string(),
            session_duration_secs,
            credentials_dir,
        };

        Ok(Self {
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            oauth,
            directory,
            aws,
        })
    }
}

/// The directory key comes from a file or inline base64, file first.
fn load_service_account(s: &Sections<'_>) -> Result<ServiceAccountKey, ConfigError> {
    let (key, bytes) = if let Some(path) = s.get("directory", "service_account_file") {
        let bytes = std::fs::read(expand_home(path)).map_err(|e| ConfigError::Invalid {
            section: "directory",
            key: "service_account_file",
            reason: e.to_string(),
        })?;
        ("service_account_file", bytes)
    } else if let Some(encoded) = s.get("directory", "service_account_base64") {
        let bytes = STANDARD.decode(encoded).map_err(|e| ConfigError::Invalid {
            section: "directory",
            key: "service_account_base64",
            reason: e.to_string(),
        })?;
        ("service_account_base64", bytes)
    } else {
        return Err(ConfigError::Missing {
            section: "directory",
            key: "service_account_file",
        });
    };

    ServiceAccountKey::from_json(&bytes).map_err(|e| ConfigError::Invalid {
        section: "directory",
        key,
        reason: e.to_string(),
    })
}

/// Settings for the `login` client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    pub gcloud_credentials_path: PathBuf,
    pub aws_credentials_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            gcloud_credentials_path: constants::default_gcloud_credentials_path()
                .unwrap_or_default(),
            aws_credentials_path: constants::default_aws_credentials_path().unwrap_or_default(),
        }
    }
}

impl ClientConfig {
    fn from_ini_section(section: &Properties) -> Self {
        let defaults = Self::default();
        Self {
            server_url: section
                .get("server_url")
                .map_or(defaults.server_url, String::from),
            gcloud_credentials_path: section
                .get("gcloud_credentials_path")
                .map_or(defaults.gcloud_credentials_path, expand_home),
            aws_credentials_path: section
                .get("aws_credentials_path")
                .map_or(defaults.aws_credentials_path, expand_home),
        }
    }

    fn save_to_ini(&self, ini: &mut Ini) {
        ini.with_general_section()
            .set("server_url", &self.server_url)
            .set(
                "gcloud_credentials_path",
                self.gcloud_credentials_path.to_string_lossy(),
            )
            .set(
                "aws_credentials_path",
                self.aws_credentials_path.to_string_lossy(),
            );
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        Ok(Self::from_ini_section(ini.general_section()))
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut ini = Ini::new();
        self.save_to_ini(&mut ini);

        ini.write_to_file(path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    pub async fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?).await
    }

    pub async fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?).await
    }
}

pub async fn configure_interactive() -> Result<()> {
    let path = get_config_path()?;
    println!("Configuring gsuite-aws-sso client ({})", path.display());
    println!("Press Enter to keep current values, or type new values.");
    println!();

    let current = ClientConfig::load_from(&path).await?;
    let theme = ColorfulTheme::default();

    let server_url = Input::<String>::with_theme(&theme)
        .with_prompt("Vending server URL")
        .default(current.server_url)
        .validate_with(|input: &String| validate_server_url(input))
        .interact_text()
        .context("Failed to read server URL")?;

    let gcloud_credentials_path = Input::<String>::with_theme(&theme)
        .with_prompt("Google credentials file")
        .default(current.gcloud_credentials_path.to_string_lossy().to_string())
        .interact_text()
        .context("Failed to read Google credentials path")?;

    let aws_credentials_path = Input::<String>::with_theme(&theme)
        .with_prompt("AWS credentials file to write")
        .default(current.aws_credentials_path.to_string_lossy().to_string())
        .interact_text()
        .context("Failed to read AWS credentials path")?;

    let config = ClientConfig {
        server_url,
        gcloud_credentials_path: expand_home(&gcloud_credentials_path),
        aws_credentials_path: expand_home(&aws_credentials_path),
    };

    config.save_to(&path).await?;

    println!("\nConfiguration saved successfully.");
    Ok(())
}

fn get_config_path() -> Result<PathBuf> {
    constants::client_config_path().context("Failed to determine client config path")
}

fn validate_server_url(input: &str) -> Result<(), String> {
    let url = Url::parse(input).map_err(|e| format!("Not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("Unsupported scheme '{other}', use http or https")),
    }
}
