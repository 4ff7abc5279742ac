pub mod credentials;

use anyhow::{Context, Result};
use artifact_auth::auth::{provider_by_name, provider_names, Provider};
use artifact_auth::settings::Settings;
use k8s_openapi::api::core::v1::ServiceAccount;
use std::path::Path;
use std::sync::Arc;

/// Pick the provider from the flag, falling back to settings
pub fn resolve_provider(flag: Option<&str>, settings: &Settings) -> Result<Arc<dyn Provider>> {
    let name = flag
        .or(settings.provider.as_deref())
        .context("No provider given. Pass --provider or set ARTIFACT_AUTH__PROVIDER")?;

    provider_by_name(name).with_context(|| {
        format!(
            "Unknown provider '{}'. Available providers: {}",
            name,
            provider_names().join(", ")
        )
    })
}

/// Read a Kubernetes ServiceAccount manifest (YAML or JSON)
pub fn load_service_account(path: &Path) -> Result<ServiceAccount> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read service account file {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse service account file {}", path.display()))
}

pub fn list_providers() {
    for name in provider_names() {
        println!("{}", name);
    }
}

pub fn show_audience(provider: &dyn Provider) {
    println!("{}", provider.audience());
}

pub fn show_identity(provider: &dyn Provider, service_account_path: &Path) -> Result<()> {
    let service_account = load_service_account(service_account_path)?;
    let identity = provider
        .identity(&service_account)
        .context("Failed to resolve identity")?;
    println!("{}", identity);
    Ok(())
}
