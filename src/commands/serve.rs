use anyhow::{Context, Result};
use clap::Args;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    aws::{CredentialMinter, sts::SdkRoleApi},
    config::ServerConfig,
    constants,
    directory::RoleResolver,
    google::{GoogleDirectory, GoogleOAuth},
    identity::IdentityVerifier,
    server::{self, AppState},
    vending::VendingOrchestrator,
};

#[derive(Debug, Clone, Args)]
pub struct ServeCommand {
    #[arg(short = 'c', long, help = "Server configuration file (default ~/.config/gsuite-aws-sso/server.ini)")]
    pub config: Option<PathBuf>,
}

impl ServeCommand {
    pub async fn execute(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => constants::default_server_config_path()
                .context("Failed to determine server config path")?,
        };

        let config = ServerConfig::load(&path)
            .with_context(|| format!("Failed to load server configuration from {}", path.display()))?;
        info!(
            port = config.port,
            region = %config.aws.region,
            schema = %config.directory.custom_schema,
            "Loaded server configuration"
        );

        let state = build_state(&config).await?;
        let app = server::create_router(Arc::new(state));

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {addr}"))?;

        info!(addr = %addr, "Vending server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        Ok(())
    }
}

/// Wire the Google and AWS clients into the request pipeline.
pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let oauth = Arc::new(GoogleOAuth::new(config.oauth.clone(), config.request_timeout)?);
    let identity = IdentityVerifier::new(oauth, config.oauth.allowed_audiences.clone());

    let directory = Arc::new(GoogleDirectory::new(
        config.directory.clone(),
        config.request_timeout,
    )?);
    let roles = RoleResolver::new(directory);

    let api = Arc::new(SdkRoleApi::new(&config.aws.region, config.request_timeout).await);
    let minter = Arc::new(CredentialMinter::new(api, config.aws.clone()));

    Ok(AppState {
        orchestrator: VendingOrchestrator::new(identity.clone(), roles, minter),
        identity,
        secure_cookies: config.oauth.redirect_url.starts_with("https://"),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
