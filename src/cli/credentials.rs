use anyhow::{Context, Result};
use artifact_auth::auth::{with_cancellation, Options, Provider, Token};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Where the cloud access token comes from
pub enum TokenSource {
    /// The identity the process runs as
    Ambient,
    /// Federate a service account token read from `token_file`
    ServiceAccount {
        service_account: PathBuf,
        token_file: PathBuf,
    },
}

/// Read a projected service account token, trimming the trailing newline
pub fn read_oidc_token(path: &Path) -> Result<String> {
    let token = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file {}", path.display()))?;
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("Token file {} is empty", path.display());
    }
    Ok(token.to_string())
}

/// Fetch registry credentials for `repository` and print them as a Docker config
pub async fn fetch_credentials(
    provider: &dyn Provider,
    repository: &str,
    source: TokenSource,
    opts: &Options,
    cancel: &CancellationToken,
) -> Result<()> {
    // Validate first so foreign registries never cost a token request
    let registry = provider
        .parse_artifact_repository(repository)
        .context("Invalid artifact repository")?;
    debug!("Resolved registry '{}' from '{}'", registry, repository);

    let token = acquire_token(provider, source, opts, cancel).await?;

    let credentials = with_cancellation(
        cancel,
        provider.artifact_registry_credentials(&registry, &token, opts),
    )
    .await
    .with_context(|| format!("Failed to get credentials for registry '{}'", registry))?;

    info!(
        "Got {} credentials for {} valid until {}",
        provider.name(),
        registry,
        credentials.expires_at
    );

    let config = credentials.to_docker_config(&registry);
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to encode docker config")?
    );
    Ok(())
}

async fn acquire_token(
    provider: &dyn Provider,
    source: TokenSource,
    opts: &Options,
    cancel: &CancellationToken,
) -> Result<Token> {
    match source {
        TokenSource::Ambient => with_cancellation(cancel, provider.controller_token(opts))
            .await
            .context("Failed to get controller token"),
        TokenSource::ServiceAccount {
            service_account,
            token_file,
        } => {
            let service_account = super::load_service_account(&service_account)?;
            let oidc_token = read_oidc_token(&token_file)?;
            with_cancellation(
                cancel,
                provider.token_for_service_account(&oidc_token, &service_account, opts),
            )
            .await
            .context("Failed to get token for service account")
        }
    }
}
