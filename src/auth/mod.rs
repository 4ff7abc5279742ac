pub mod error;
pub mod jwt;
pub mod options;
pub mod providers;
pub mod registry;
pub mod token;

pub use error::{AuthError, BoxError, Result};
pub use options::{AuthOption, Options};
pub use providers::{provider_by_name, provider_names};
pub use token::{AccessToken, ArtifactRegistryCredentials, AwsCredentials, Token};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ServiceAccount;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Trait for cloud providers that issue container registry credentials
///
/// Every operation is stateless. Network-bound operations are cancelled by
/// dropping their future; see [`with_cancellation`] for an explicit token.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used to select the provider (e.g. "azure")
    fn name(&self) -> &'static str;

    /// Get an access token for the identity the process itself runs as
    async fn controller_token(&self, opts: &Options) -> Result<Token>;

    /// Audience an externally issued OIDC token must carry for federation
    fn audience(&self) -> &'static str;

    /// Get the provider-native identity configured on a service account
    ///
    /// Pure: reads annotations only, never touches the network.
    fn identity(&self, service_account: &ServiceAccount) -> Result<String>;

    /// Get an access token on behalf of a service account
    ///
    /// # Arguments
    /// * `oidc_token` - Token issued for the service account by the cluster's OIDC issuer
    /// * `service_account` - The service account whose annotations name the cloud identity
    async fn token_for_service_account(
        &self,
        oidc_token: &str,
        service_account: &ServiceAccount,
        opts: &Options,
    ) -> Result<Token>;

    /// Validate an artifact repository and return the registry to exchange against
    ///
    /// Rejects registries outside the provider's domains before any network call.
    fn parse_artifact_repository(&self, artifact_repository: &str) -> Result<String>;

    /// Exchange a cloud access token for registry credentials
    ///
    /// `registry` must be a value returned by [`Provider::parse_artifact_repository`].
    async fn artifact_registry_credentials(
        &self,
        registry: &str,
        token: &Token,
        opts: &Options,
    ) -> Result<ArtifactRegistryCredentials>;
}

/// Run `fut` until it completes or `cancel` fires, whichever comes first.
///
/// On cancellation the in-flight future is dropped, aborting its request.
pub async fn with_cancellation<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        res = fut => res,
    }
}

/// `namespace/name` of a service account, for error messages and logs.
pub(crate) fn service_account_key(service_account: &ServiceAccount) -> String {
    format!(
        "{}/{}",
        service_account.metadata.namespace.as_deref().unwrap_or_default(),
        service_account.metadata.name.as_deref().unwrap_or_default()
    )
}

/// Look up an annotation on a service account.
pub(crate) fn annotation<'a>(service_account: &'a ServiceAccount, key: &str) -> Option<&'a str> {
    service_account
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}
