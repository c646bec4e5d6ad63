use anyhow::{Context, Result, bail};
use clap::Args;
use dialoguer::{Confirm, theme::ColorfulTheme};
use reqwest::StatusCode;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::fs;
use tracing::info;

use crate::{
    api::{CredentialRequest, CredentialResponse},
    aws::{ProfileFields, credentials::write_credentials_file},
    config::ClientConfig,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, Args)]
pub struct LoginCommand {
    #[arg(short = 'c', long, help = "Google credentials file to present to the server")]
    pub credential: Option<PathBuf>,

    #[arg(short = 's', long, help = "Vending server URL")]
    pub server: Option<String>,

    #[arg(short = 'f', long, help = "Overwrite existing AWS credentials without asking")]
    pub force: bool,
}

impl LoginCommand {
    pub async fn execute(self) -> Result<()> {
        let config = ClientConfig::load()
            .await
            .context("Failed to load client configuration. Please run 'gsuite-aws-sso configure' first.")?;

        let credential_path = self.credential.unwrap_or(config.gcloud_credentials_path);
        let server_url = self.server.unwrap_or(config.server_url);
        let target = config.aws_credentials_path;

        let credential_file = fs::read(&credential_path).await.with_context(|| {
            format!(
                "Failed to read Google credentials from {}. Run 'gcloud auth application-default login' first.",
                credential_path.display()
            )
        })?;

        if !self.force && fs::try_exists(&target).await.unwrap_or(false) && !confirm_overwrite(&target)? {
            println!("Keeping existing AWS credentials.");
            return Ok(());
        }

        info!("Requesting credentials from {}", server_url);
        let response = request_credentials(&server_url, credential_file).await?;
        let (contents, fields) = accept_document(response)?;

        write_credentials_file(&target, contents.as_bytes())
            .await
            .context("Failed to save AWS credentials")?;

        println!("\nAWS credentials saved to {}", target.display());
        println!("Region: {}", fields.region);
        Ok(())
    }
}

fn confirm_overwrite(target: &Path) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("{} already exists. Overwrite?", target.display()))
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// POST the credential blob and insist on a 200 with a well-formed body.
pub async fn request_credentials(server_url: &str, credential_file: Vec<u8>) -> Result<CredentialResponse> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .post(server_url)
        .json(&CredentialRequest { credential_file })
        .send()
        .await
        .with_context(|| format!("Failed to reach the vending server at {server_url}"))?;

    let status = response.status();
    if status != StatusCode::OK {
        bail!("{}", describe_status(status));
    }

    response
        .json::<CredentialResponse>()
        .await
        .context("Vending server returned a malformed response")
}

/// The returned document must parse before it is allowed near the disk.
fn accept_document(response: CredentialResponse) -> Result<(String, ProfileFields)> {
    let contents = String::from_utf8(response.credential_file)
        .context("Vending server returned a credentials document that is not UTF-8")?;
    let fields = ProfileFields::parse(&contents)
        .context("Vending server returned a malformed credentials document")?;
    Ok((contents, fields))
}

fn describe_status(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => format!(
            "The server could not verify your Google identity ({status}). \
             Try 'gcloud auth application-default login' again."
        ),
        StatusCode::BAD_REQUEST => format!(
            "The server rejected the request ({status}). Your account may have no AWS role configured."
        ),
        StatusCode::FORBIDDEN => format!("AWS refused to assume your role ({status})."),
        _ => format!("Vending server returned {status}"),
    }
}
