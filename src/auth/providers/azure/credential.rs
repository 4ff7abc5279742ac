use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_core::http::{ClientMethodOptions, ClientOptions, Transport};
use azure_identity::{ClientAssertion, UserAssignedId};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::auth::{AccessToken, AuthError, Result};

/// Produces the client assertion presented to Entra ID.
pub type Assertion = Arc<dyn Fn() -> String + Send + Sync>;

/// Something that can mint Azure access tokens for a set of scopes.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken>;
}

pub(crate) fn client_options(http_client: Option<&reqwest::Client>) -> ClientOptions {
    match http_client {
        Some(client) => ClientOptions {
            transport: Some(Transport::new(Arc::new(client.clone()))),
            ..Default::default()
        },
        None => ClientOptions::default(),
    }
}

fn access_token(token: azure_core::credentials::AccessToken) -> Result<AccessToken> {
    let expires_at = DateTime::<Utc>::from_timestamp(
        token.expires_on.unix_timestamp(),
        token.expires_on.nanosecond(),
    )
    .ok_or_else(|| AuthError::TokenAcquisition("token expiry out of range".into()))?;
    Ok(AccessToken {
        token: token.token.secret().to_string(),
        expires_at,
    })
}

/// A single SDK credential.
pub struct SdkTokenSource(pub Arc<dyn TokenCredential>);

#[async_trait]
impl TokenSource for SdkTokenSource {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let token = self
            .0
            .get_token(scopes, None)
            .await
            .map_err(|e| AuthError::TokenAcquisition(Box::new(e)))?;
        access_token(token)
    }
}

/// Hands the externally issued OIDC token to the SDK as-is.
struct CallbackAssertion(Assertion);

impl fmt::Debug for CallbackAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallbackAssertion")
    }
}

#[async_trait]
impl ClientAssertion for CallbackAssertion {
    async fn secret(&self, _options: Option<ClientMethodOptions<'_>>) -> azure_core::Result<String> {
        Ok((self.0)())
    }
}

/// Build a client-assertion (workload identity federation) credential.
pub fn client_assertion_credential(
    tenant_id: &str,
    client_id: &str,
    assertion: Assertion,
    http_client: Option<&reqwest::Client>,
) -> Result<SdkTokenSource> {
    let credential = azure_identity::ClientAssertionCredential::new(
        tenant_id.to_string(),
        client_id.to_string(),
        CallbackAssertion(assertion),
        Some(azure_identity::ClientAssertionCredentialOptions {
            client_options: client_options(http_client),
        }),
    )
    .map_err(|e| AuthError::CredentialChain(Box::new(e)))?;
    Ok(SdkTokenSource(credential))
}

/// The IMDS endpoint used by ManagedIdentityCredential when no other
/// managed-identity source is detected via environment variables.
const IMDS_ADDR: &str = "169.254.169.254:80";

/// Quick TCP probe timeout. Without it the SDK retries an unreachable IMDS
/// for well over a minute before giving up.
const IMDS_PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

async fn imds_is_reachable() -> bool {
    tokio::time::timeout(
        IMDS_PROBE_TIMEOUT,
        tokio::net::TcpStream::connect(IMDS_ADDR),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false)
}

/// App Service, Service Fabric, Cloud Shell and Arc expose their own endpoint.
fn has_managed_identity_env_vars() -> bool {
    std::env::var_os("IDENTITY_ENDPOINT").is_some() || std::env::var_os("MSI_ENDPOINT").is_some()
}

/// Ambient credential chain.
///
/// Tries, in order:
///
/// 1. **Environment** - service principal from `AZURE_TENANT_ID`,
///    `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
/// 2. **Workload identity** - federated token file mounted by the AKS webhook.
/// 3. **Managed identity** - App Service, VMs via IMDS, etc.
/// 4. **Developer tools** - `az` / `azd`, only when shelling out is allowed.
///
/// The chain is rebuilt for every operation, so no source is remembered
/// between calls.
pub struct CredentialChain {
    sources: Vec<(&'static str, Arc<dyn TokenCredential>)>,
}

impl CredentialChain {
    pub async fn new(http_client: Option<&reqwest::Client>, allow_shell_out: bool) -> Result<Self> {
        let client_options = client_options(http_client);
        let mut sources: Vec<(&'static str, Arc<dyn TokenCredential>)> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        if let (Ok(tenant_id), Ok(client_id), Ok(client_secret)) = (
            std::env::var("AZURE_TENANT_ID"),
            std::env::var("AZURE_CLIENT_ID"),
            std::env::var("AZURE_CLIENT_SECRET"),
        ) {
            match azure_identity::ClientSecretCredential::new(
                &tenant_id,
                client_id,
                azure_core::credentials::Secret::new(client_secret),
                Some(azure_identity::ClientSecretCredentialOptions {
                    client_options: client_options.clone(),
                }),
            ) {
                Ok(cred) => sources.push(("EnvironmentCredential", cred)),
                Err(e) => errors.push(format!("EnvironmentCredential: {e}")),
            }
        }

        // Reads AZURE_FEDERATED_TOKEN_FILE, AZURE_TENANT_ID and AZURE_CLIENT_ID itself
        match azure_identity::WorkloadIdentityCredential::new(Some(
            azure_identity::WorkloadIdentityCredentialOptions {
                credential_options: azure_identity::ClientAssertionCredentialOptions {
                    client_options: client_options.clone(),
                },
                ..Default::default()
            },
        )) {
            Ok(cred) => sources.push(("WorkloadIdentityCredential", cred)),
            Err(e) => errors.push(format!("WorkloadIdentityCredential: {e}")),
        }

        if has_managed_identity_env_vars() || imds_is_reachable().await {
            let mi_options = azure_identity::ManagedIdentityCredentialOptions {
                user_assigned_id: std::env::var("AZURE_CLIENT_ID")
                    .ok()
                    .map(UserAssignedId::ClientId),
                client_options: client_options.clone(),
            };
            match azure_identity::ManagedIdentityCredential::new(Some(mi_options)) {
                Ok(cred) => sources.push(("ManagedIdentityCredential", cred)),
                Err(e) => errors.push(format!("ManagedIdentityCredential: {e}")),
            }
        } else {
            errors.push(format!(
                "ManagedIdentityCredential: IMDS not reachable within {IMDS_PROBE_TIMEOUT:?}"
            ));
        }

        if allow_shell_out {
            match azure_identity::DeveloperToolsCredential::new(None) {
                Ok(cred) => sources.push(("DeveloperToolsCredential", cred)),
                Err(e) => errors.push(format!("DeveloperToolsCredential: {e}")),
            }
        }

        if sources.is_empty() {
            return Err(AuthError::CredentialChain(
                format!(
                    "no Azure credentials could be constructed:\n{}",
                    errors.join("\n")
                )
                .into(),
            ));
        }

        if !errors.is_empty() {
            trace!(
                "some Azure credentials are unavailable:\n{}",
                errors.join("\n")
            );
        }

        Ok(Self { sources })
    }
}

#[async_trait]
impl TokenSource for CredentialChain {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let mut errors = Vec::new();
        for (name, source) in &self.sources {
            match source.get_token(scopes, None).await {
                Ok(token) => {
                    debug!("authenticated with {}", name);
                    return access_token(token);
                }
                Err(e) => {
                    trace!("{} failed: {}", name, e);
                    errors.push(format!("{name}: {}", format_error_chain(&e)));
                }
            }
        }

        Err(AuthError::TokenAcquisition(
            format!("all Azure credentials failed:\n{}", errors.join("\n")).into(),
        ))
    }
}

fn format_error_chain(err: &dyn std::error::Error) -> String {
    let mut current = Some(err);
    let mut stack = vec![];
    while let Some(e) = current.take() {
        stack.push(e.to_string());
        current = e.source();
    }
    stack.join(" - ")
}
