use anyhow::{Context, Result};
use artifact_auth::auth::AuthOption;
use artifact_auth::settings::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::credentials::{fetch_credentials, TokenSource};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the providers compiled into this binary
    Providers,
    /// Print the audience a federated OIDC token must carry
    Audience {
        /// Provider name (e.g. azure, aws)
        #[arg(long, short)]
        provider: Option<String>,
    },
    /// Print the cloud identity annotated on a service account manifest
    Identity {
        #[arg(long, short)]
        provider: Option<String>,
        /// Path to a ServiceAccount manifest (YAML or JSON)
        #[arg(long)]
        service_account: PathBuf,
    },
    /// Get registry credentials and print them as a Docker config
    #[command(visible_alias = "creds")]
    Credentials {
        #[arg(long, short)]
        provider: Option<String>,
        /// Artifact repository, e.g. myacr.azurecr.io/app:v1 or oci://myacr.azurecr.io/charts
        #[arg(long, short)]
        repository: String,
        /// Federate this service account instead of using the ambient identity
        #[arg(long, requires = "token_file")]
        service_account: Option<PathBuf>,
        /// File holding the service account's OIDC token
        #[arg(long, requires = "service_account")]
        token_file: Option<PathBuf>,
        /// Scope to request for the cloud access token (repeatable)
        #[arg(long = "scope")]
        scopes: Vec<String>,
        /// Allow credential sources that run local CLIs such as `az`
        #[arg(long)]
        allow_shell_out: bool,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::new().context("Failed to load settings")?;
    debug!("Loaded settings: {:?}", settings);

    match cli.command {
        Commands::Providers => cli::list_providers(),
        Commands::Audience { provider } => {
            let provider = cli::resolve_provider(provider.as_deref(), &settings)?;
            cli::show_audience(provider.as_ref());
        }
        Commands::Identity {
            provider,
            service_account,
        } => {
            let provider = cli::resolve_provider(provider.as_deref(), &settings)?;
            cli::show_identity(provider.as_ref(), &service_account)?;
        }
        Commands::Credentials {
            provider,
            repository,
            service_account,
            token_file,
            scopes,
            allow_shell_out,
            timeout,
        } => {
            let provider = cli::resolve_provider(provider.as_deref(), &settings)?;

            // Flags extend what settings configured
            let mut opts = settings.options();
            if !scopes.is_empty() {
                opts = opts.with(AuthOption::Scopes(scopes));
            }
            if allow_shell_out {
                opts = opts.with(AuthOption::AllowShellOut);
            }

            let source = match (service_account, token_file) {
                (Some(service_account), Some(token_file)) => TokenSource::ServiceAccount {
                    service_account,
                    token_file,
                },
                _ => TokenSource::Ambient,
            };

            let cancel = CancellationToken::new();
            let timeout = Duration::from_secs(timeout.unwrap_or(settings.timeout_secs));
            let watchdog = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => warn!("Interrupted, cancelling"),
                    _ = tokio::time::sleep(timeout) => warn!("Timed out after {:?}, cancelling", timeout),
                    _ = watchdog.cancelled() => return,
                }
                watchdog.cancel();
            });

            let result =
                fetch_credentials(provider.as_ref(), &repository, source, &opts, &cancel).await;
            cancel.cancel();
            result?;
        }
    }

    Ok(())
}
