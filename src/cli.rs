use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{ConfigureCommand, LoginCommand, ServeCommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "gsuite-aws-sso", version, about = "Trade a Google Workspace identity for temporary AWS credentials", long_about = None, arg_required_else_help = false)]
pub struct Cli {
    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Run the credential vending server")]
    Serve(ServeCommand),
    #[command(about = "Fetch AWS credentials from the vending server")]
    Login(LoginCommand),
    #[command(about = "Configure the login client")]
    Configure(ConfigureCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let command = self
            .command
            .unwrap_or(Commands::Login(LoginCommand::default()));

        match command {
            Commands::Serve(cmd) => cmd.execute().await,
            Commands::Login(cmd) => cmd.execute().await,
            Commands::Configure(cmd) => cmd.execute().await,
        }
    }
}
