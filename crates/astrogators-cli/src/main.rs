/*
[INPUT]:  CLI arguments, optional YAML configuration file
[OUTPUT]: Account and ally-code operations against the Astrogator's Table API
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands or startup flow
*/

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use astrogators_client::{AllyCodeStorage, ApiClientConfig, FileTokenStore, Session};

use crate::config::{CliConfig, ResolvedConfig};

#[derive(Parser, Debug)]
#[command(name = "astrogators", version, about = "Astrogator's Table account and ally-code client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: String,
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    api_base_url: Option<String>,
    #[arg(long = "data-dir", value_name = "PATH", global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show API, account and token status
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget stored credentials
    Logout,
    /// Print the signed-in user
    Whoami,
    /// Create an account
    Register {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Request a password reset email
    ForgotPassword {
        #[arg(long)]
        email: Option<String>,
    },
    /// Set a new password using a reset token
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Send the verification email again
    ResendVerification {
        #[arg(long)]
        email: Option<String>,
    },
    /// Confirm an email address using a verification token
    VerifyEmail {
        #[arg(long)]
        token: String,
    },
    /// Manage ally codes
    #[command(subcommand)]
    AllyCodes(AllyCodesCommand),
}

#[derive(Subcommand, Debug)]
enum AllyCodesCommand {
    /// List ally codes for the current identity
    List,
    /// Add an ally code (dashes allowed)
    Add { ally_code: String },
    /// Remove an ally code
    Remove { ally_code: String },
    /// Select the active ally code
    Select {
        ally_code: Option<String>,
        /// Clear the current selection
        #[arg(long, conflicts_with = "ally_code")]
        clear: bool,
    },
    /// Move locally stored ally codes into the signed-in account
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = load_config(args.config_path.as_deref())?
        .resolve(args.api_base_url, args.data_dir)
        .context("resolve configuration")?;
    debug!(
        api_base_url = %config.api_base_url,
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );

    let session = build_session(&config)?;
    session.initialize().await;

    commands::run(&session, &config, args.command).await
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<CliConfig> {
    match path {
        Some(path) => CliConfig::from_file(path).context("load config"),
        None => Ok(CliConfig::default()),
    }
}

fn build_session(config: &ResolvedConfig) -> Result<Session> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("create data dir {}", config.data_dir.display()))?;

    let tokens = FileTokenStore::open(&config.data_dir).context("open token store")?;
    let ally_storage = AllyCodeStorage::new(&config.data_dir);

    let mut client_config = ApiClientConfig::new(config.api_base_url.clone())
        .with_on_unauthorized(|| warn!("session expired; log in again"));
    if let Some(timeout) = config.timeout {
        client_config = client_config.with_timeout(timeout);
    }

    Session::new(client_config, Arc::new(tokens), ally_storage).context("create session")
}
