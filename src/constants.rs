use std::{env, path::PathBuf};

use dirs;

/// Configuration directory name under `~/.config`
pub const CONFIG_DIR_NAME: &str = "gsuite-aws-sso";

/// Client configuration file name
pub const CLIENT_CONFIG_FILE_NAME: &str = "config";

/// Server configuration file name
pub const SERVER_CONFIG_FILE_NAME: &str = "server.ini";

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS shared credentials file name
pub const AWS_CREDENTIALS_FILE_NAME: &str = "credentials";

/// Port the vending server listens on when none is configured
pub const DEFAULT_PORT: u16 = 3030;

/// Per-call timeout for every upstream request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Default AWS region written into vended profiles
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Role session name passed to AssumeRole
pub const DEFAULT_SESSION_NAME: &str = "default";

/// Default AssumeRole duration in seconds
pub const DEFAULT_SESSION_DURATION_SECS: i32 = 3600;

/// STS lower bound for DurationSeconds
pub const MIN_SESSION_DURATION_SECS: i32 = 900;

/// STS upper bound for DurationSeconds
pub const MAX_SESSION_DURATION_SECS: i32 = 43200;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Issuers Google stamps into identity tokens
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

pub const DIRECTORY_BASE_URL: &str = "https://admin.googleapis.com";

/// Scope requested by the directory service account
pub const DIRECTORY_SCOPE: &str = "https://www.googleapis.com/auth/admin.directory.user.readonly";

/// Custom schema holding the AWS role mapping on directory users
pub const DEFAULT_ROLE_SCHEMA: &str = "AWS_SAML";

/// Vending endpoint used by `login` when the client is not configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3030/credentials";

fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join(CONFIG_DIR_NAME))
}

/// Client configuration path: ~/.config/gsuite-aws-sso/config
pub fn client_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CLIENT_CONFIG_FILE_NAME))
}

/// Server configuration path: ~/.config/gsuite-aws-sso/server.ini
pub fn default_server_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(SERVER_CONFIG_FILE_NAME))
}

/// Credential file written by `gcloud auth application-default login`
pub fn default_gcloud_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join("gcloud")
            .join("application_default_credentials.json")
    })
}

/// Directory vended profiles are placed in: ~/.aws
pub fn default_aws_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME))
}

/// Get the AWS credentials file path
/// Respects AWS_SHARED_CREDENTIALS_FILE environment variable if set
pub fn default_aws_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }

    default_aws_dir().map(|dir| dir.join(AWS_CREDENTIALS_FILE_NAME))
}
