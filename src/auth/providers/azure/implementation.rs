use async_trait::async_trait;
use std::sync::Arc;

use super::credential::{self, Assertion, CredentialChain, TokenSource};
use crate::auth::{AuthError, Result};

/// Low-level calls made by the Azure provider.
///
/// The default [`SdkImplementation`] talks to Entra ID and the registry;
/// tests substitute their own to observe what the provider asks for.
#[async_trait]
pub trait Implementation: Send + Sync {
    /// Build the ambient credential chain.
    async fn default_credential(
        &self,
        http_client: Option<&reqwest::Client>,
        allow_shell_out: bool,
    ) -> Result<Arc<dyn TokenSource>>;

    /// Build a federated credential whose assertion comes from `assertion`.
    fn client_assertion_credential(
        &self,
        tenant_id: &str,
        client_id: &str,
        assertion: Assertion,
        http_client: Option<&reqwest::Client>,
    ) -> Result<Arc<dyn TokenSource>>;

    /// Send a request to the registry.
    async fn send_request(
        &self,
        client: &reqwest::Client,
        request: reqwest::Request,
    ) -> Result<reqwest::Response>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SdkImplementation;

#[async_trait]
impl Implementation for SdkImplementation {
    async fn default_credential(
        &self,
        http_client: Option<&reqwest::Client>,
        allow_shell_out: bool,
    ) -> Result<Arc<dyn TokenSource>> {
        Ok(Arc::new(
            CredentialChain::new(http_client, allow_shell_out).await?,
        ))
    }

    fn client_assertion_credential(
        &self,
        tenant_id: &str,
        client_id: &str,
        assertion: Assertion,
        http_client: Option<&reqwest::Client>,
    ) -> Result<Arc<dyn TokenSource>> {
        Ok(Arc::new(credential::client_assertion_credential(
            tenant_id,
            client_id,
            assertion,
            http_client,
        )?))
    }

    async fn send_request(
        &self,
        client: &reqwest::Client,
        request: reqwest::Request,
    ) -> Result<reqwest::Response> {
        client
            .execute(request)
            .await
            .map_err(|e| AuthError::ExchangeTransport(Box::new(e)))
    }
}
