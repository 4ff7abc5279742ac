//! Azure Container Registry (ACR) credentials via Microsoft Entra ID.
//!
//! An Entra access token is exchanged at `https://<registry>/oauth2/exchange`
//! for an ACR refresh token, which registries accept as a password.

pub mod credential;
pub mod implementation;

pub use credential::{Assertion, TokenSource};
pub use implementation::{Implementation, SdkImplementation};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ServiceAccount;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::auth::{
    annotation, jwt, registry, service_account_key, AccessToken, ArtifactRegistryCredentials,
    AuthError, Options, Provider, Result, Token,
};

pub const PROVIDER_NAME: &str = "azure";

const AUDIENCE: &str = "api://AzureADTokenExchange";

/// Azure Resource Manager, the audience ACR accepts for token exchange.
const DEFAULT_SCOPE: &str = "https://management.core.windows.net//.default";

pub const TENANT_ID_ANNOTATION: &str = "azure.workload.identity/tenant-id";
pub const CLIENT_ID_ANNOTATION: &str = "azure.workload.identity/client-id";

// https://github.com/kubernetes/kubernetes/blob/v1.23.1/pkg/credentialprovider/azure/azure_credentials.go#L55
const REGISTRY_PATTERN: &str = r"^.+\.(azurecr\.io|azurecr\.cn|azurecr\.de|azurecr\.us)$";

const EXCHANGE_PATH: &str = "oauth2/exchange";

// https://learn.microsoft.com/azure/container-registry/container-registry-authentication#az-acr-login-with---expose-token
const TOKEN_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

lazy_static! {
    static ref REGISTRY_REGEX: Regex = Regex::new(REGISTRY_PATTERN).unwrap();
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    refresh_token: String,
}

/// Azure provider
#[derive(Clone, Default)]
pub struct AzureProvider {
    implementation: Option<Arc<dyn Implementation>>,
}

impl AzureProvider {
    /// Create a provider that routes low-level calls through `implementation`
    pub fn with_implementation(implementation: Arc<dyn Implementation>) -> Self {
        Self {
            implementation: Some(implementation),
        }
    }

    fn implementation(&self) -> &dyn Implementation {
        match &self.implementation {
            Some(implementation) => implementation.as_ref(),
            None => &SdkImplementation,
        }
    }

    async fn exchange(
        &self,
        registry_url: &str,
        token: &AccessToken,
        opts: &Options,
    ) -> Result<ArtifactRegistryCredentials> {
        let mut exchange_url = Url::parse(registry_url).map_err(|e| AuthError::InvalidReference {
            reference: registry_url.to_string(),
            reason: e.to_string(),
        })?;
        let path = format!(
            "{}/{}",
            exchange_url.path().trim_end_matches('/'),
            EXCHANGE_PATH
        );
        exchange_url.set_path(&path);
        let service = exchange_url
            .host_str()
            .ok_or_else(|| AuthError::InvalidReference {
                reference: registry_url.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        let default_client;
        let client = match opts.http_client() {
            Some(client) => client,
            None => {
                default_client = reqwest::Client::new();
                &default_client
            }
        };

        let request = client
            .post(exchange_url)
            .form(&[
                ("grant_type", "access_token"),
                ("service", service.as_str()),
                ("access_token", token.token.as_str()),
            ])
            .build()
            .map_err(|e| AuthError::ExchangeTransport(Box::new(e)))?;

        debug!("Exchanging access token with ACR {}", service);
        let response = self.implementation().send_request(client, request).await?;

        // The response owns its body; every return below releases it
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AuthError::ExchangeStatus(status.as_u16()));
        }

        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ExchangeDecode(e.to_string()))?;
        let expires_at =
            jwt::expiry_unverified(&body.refresh_token).map_err(AuthError::ExchangeDecode)?;

        info!(
            "Issued ACR credentials for {} valid until {}",
            service, expires_at
        );

        Ok(ArtifactRegistryCredentials::basic(
            TOKEN_USERNAME,
            body.refresh_token,
            expires_at,
        ))
    }
}

/// Split a `<tenant-id>/<client-id>` identity into its two parts.
pub fn parse_identity(identity: &str) -> std::result::Result<(&str, &str), String> {
    let mut parts = identity.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(tenant_id), Some(client_id), None)
            if !tenant_id.is_empty() && !client_id.is_empty() =>
        {
            Ok((tenant_id, client_id))
        }
        _ => Err(format!(
            "invalid identity '{}': must be of the form <tenant-id>/<client-id>",
            identity
        )),
    }
}

fn identity(service_account: &ServiceAccount) -> Result<String> {
    let key = service_account_key(service_account);
    let tenant_id = annotation(service_account, TENANT_ID_ANNOTATION).ok_or_else(|| {
        AuthError::identity(
            &key,
            format!("annotation {} is not set", TENANT_ID_ANNOTATION),
        )
    })?;
    let client_id = annotation(service_account, CLIENT_ID_ANNOTATION).ok_or_else(|| {
        AuthError::identity(
            &key,
            format!("annotation {} is not set", CLIENT_ID_ANNOTATION),
        )
    })?;

    let identity = format!("{}/{}", tenant_id, client_id);
    parse_identity(&identity).map_err(|reason| AuthError::identity(&key, reason))?;
    Ok(identity)
}

#[async_trait]
impl Provider for AzureProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn controller_token(&self, opts: &Options) -> Result<Token> {
        let credential = self
            .implementation()
            .default_credential(opts.http_client(), opts.allow_shell_out())
            .await?;
        let token = credential.get_token(&opts.scopes_or(DEFAULT_SCOPE)).await?;
        Ok(Token::Access(token))
    }

    fn audience(&self) -> &'static str {
        AUDIENCE
    }

    fn identity(&self, service_account: &ServiceAccount) -> Result<String> {
        identity(service_account)
    }

    async fn token_for_service_account(
        &self,
        oidc_token: &str,
        service_account: &ServiceAccount,
        opts: &Options,
    ) -> Result<Token> {
        let identity = identity(service_account)?;
        let (tenant_id, client_id) = parse_identity(&identity)
            .map_err(|reason| AuthError::identity(service_account_key(service_account), reason))?;

        debug!(
            "Requesting federated Azure token for tenant {} client {}",
            tenant_id, client_id
        );

        let oidc_token = oidc_token.to_string();
        let assertion: Assertion = Arc::new(move || oidc_token.clone());
        let credential = self.implementation().client_assertion_credential(
            tenant_id,
            client_id,
            assertion,
            opts.http_client(),
        )?;
        let token = credential.get_token(&opts.scopes_or(DEFAULT_SCOPE)).await?;
        Ok(Token::Access(token))
    }

    fn parse_artifact_repository(&self, artifact_repository: &str) -> Result<String> {
        let registry = registry::registry_from_artifact_repository(artifact_repository)?;

        if !REGISTRY_REGEX.is_match(&registry) {
            return Err(AuthError::InvalidRegistry {
                provider: PROVIDER_NAME,
                registry,
                pattern: REGISTRY_PATTERN,
            });
        }

        // For issuing Azure registry credentials the registry URL is required
        Ok(format!("https://{}", registry))
    }

    async fn artifact_registry_credentials(
        &self,
        registry: &str,
        token: &Token,
        opts: &Options,
    ) -> Result<ArtifactRegistryCredentials> {
        match token {
            Token::Access(token) => self.exchange(registry, token, opts).await,
            other => Err(AuthError::TokenMismatch {
                provider: PROVIDER_NAME,
                kind: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::make_token;
    use crate::auth::tests::service_account;
    use crate::auth::{AuthOption, AwsCredentials};
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use futures::Stream;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    /// Observes whether a response body was read and whether it was released.
    #[derive(Clone, Default)]
    struct BodyTracker {
        polled: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    struct TrackedBody {
        chunk: Option<Bytes>,
        tracker: BodyTracker,
    }

    impl Stream for TrackedBody {
        type Item = std::result::Result<Bytes, std::io::Error>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.tracker.polled.store(true, Ordering::SeqCst);
            Poll::Ready(self.chunk.take().map(Ok))
        }
    }

    impl Drop for TrackedBody {
        fn drop(&mut self) {
            self.tracker.dropped.store(true, Ordering::SeqCst);
        }
    }

    struct StubTokenSource {
        scopes: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    impl StubTokenSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                scopes: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl TokenSource for StubTokenSource {
        async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
            self.scopes
                .lock()
                .unwrap()
                .push(scopes.iter().map(|s| s.to_string()).collect());
            if self.fail {
                return Err(AuthError::TokenAcquisition("federation not configured".into()));
            }
            Ok(AccessToken {
                token: "entra-token".to_string(),
                expires_at: Utc.timestamp_opt(1800000000, 0).unwrap(),
            })
        }
    }

    const OVERRIDE_USER_AGENT: &str = "artifact-auth-override-client";

    /// A client distinguishable from `reqwest::Client::new()`.
    fn override_client() -> reqwest::Client {
        reqwest::Client::builder()
            .user_agent(OVERRIDE_USER_AGENT)
            .build()
            .unwrap()
    }

    fn is_override(client: &reqwest::Client) -> bool {
        format!("{:?}", client).contains(OVERRIDE_USER_AGENT)
    }

    struct StubImplementation {
        token_source: Arc<StubTokenSource>,
        response: Mutex<Option<(u16, String)>>,
        tracker: BodyTracker,
        requests: Mutex<Vec<reqwest::Request>>,
        sends: AtomicUsize,
        /// Per call: (received the override client, allow_shell_out)
        default_calls: Mutex<Vec<(bool, bool)>>,
        assertion_calls: Mutex<Vec<(String, String, Assertion)>>,
        /// Per call: `None` without a client, otherwise whether it was the override.
        assertion_clients: Mutex<Vec<Option<bool>>>,
        send_clients: Mutex<Vec<bool>>,
    }

    impl StubImplementation {
        fn new(token_source: Arc<StubTokenSource>) -> Arc<Self> {
            Arc::new(Self {
                token_source,
                response: Mutex::new(None),
                tracker: BodyTracker::default(),
                requests: Mutex::new(Vec::new()),
                sends: AtomicUsize::new(0),
                default_calls: Mutex::new(Vec::new()),
                assertion_calls: Mutex::new(Vec::new()),
                assertion_clients: Mutex::new(Vec::new()),
                send_clients: Mutex::new(Vec::new()),
            })
        }

        fn responding(status: u16, body: impl Into<String>) -> Arc<Self> {
            let stub = Self::new(StubTokenSource::new(false));
            *stub.response.lock().unwrap() = Some((status, body.into()));
            stub
        }
    }

    #[async_trait]
    impl Implementation for StubImplementation {
        async fn default_credential(
            &self,
            http_client: Option<&reqwest::Client>,
            allow_shell_out: bool,
        ) -> Result<Arc<dyn TokenSource>> {
            self.default_calls
                .lock()
                .unwrap()
                .push((http_client.is_some_and(is_override), allow_shell_out));
            Ok(self.token_source.clone())
        }

        fn client_assertion_credential(
            &self,
            tenant_id: &str,
            client_id: &str,
            assertion: Assertion,
            http_client: Option<&reqwest::Client>,
        ) -> Result<Arc<dyn TokenSource>> {
            self.assertion_clients
                .lock()
                .unwrap()
                .push(http_client.map(is_override));
            self.assertion_calls.lock().unwrap().push((
                tenant_id.to_string(),
                client_id.to_string(),
                assertion,
            ));
            Ok(self.token_source.clone())
        }

        async fn send_request(
            &self,
            client: &reqwest::Client,
            request: reqwest::Request,
        ) -> Result<reqwest::Response> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.send_clients.lock().unwrap().push(is_override(client));
            self.requests.lock().unwrap().push(request);
            let (status, body) = self
                .response
                .lock()
                .unwrap()
                .take()
                .expect("unexpected request");
            let body = TrackedBody {
                chunk: Some(Bytes::from(body)),
                tracker: self.tracker.clone(),
            };
            let response = http::Response::builder()
                .status(status)
                .body(reqwest::Body::wrap_stream(body))
                .unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    fn access_token() -> Token {
        Token::Access(AccessToken {
            token: "entra-token".to_string(),
            expires_at: Utc::now(),
        })
    }

    fn annotated(tenant_id: &str, client_id: &str) -> ServiceAccount {
        service_account(&[
            (TENANT_ID_ANNOTATION, tenant_id),
            (CLIENT_ID_ANNOTATION, client_id),
        ])
    }

    #[test]
    fn test_parse_identity() {
        assert_eq!(parse_identity("T/C").unwrap(), ("T", "C"));
        assert_eq!(
            parse_identity("72f988bf-86f1-41af-91ab-2d7cd011db47/1b9e7e4c-0000-0000-0000-000000000000")
                .unwrap(),
            (
                "72f988bf-86f1-41af-91ab-2d7cd011db47",
                "1b9e7e4c-0000-0000-0000-000000000000"
            )
        );

        for invalid in ["", "abc", "/", "abc/", "/def", "a/b/c", "a//b"] {
            assert!(parse_identity(invalid).is_err(), "input: {:?}", invalid);
        }
    }

    #[test]
    fn test_identity_from_service_account() {
        let provider = AzureProvider::default();
        assert_eq!(provider.identity(&annotated("abc", "def")).unwrap(), "abc/def");
    }

    #[test]
    fn test_identity_errors() {
        let provider = AzureProvider::default();
        let cases = [
            service_account(&[(CLIENT_ID_ANNOTATION, "def")]),
            service_account(&[(TENANT_ID_ANNOTATION, "abc")]),
            service_account(&[]),
            annotated("", "def"),
            annotated("abc", ""),
            annotated("a/b", "def"),
        ];
        for sa in cases {
            let err = provider.identity(&sa).unwrap_err();
            assert!(
                matches!(err, AuthError::IdentityInvalid { ref service_account, .. } if service_account == "default/app"),
                "unexpected error: {:?}",
                err
            );
        }
    }

    #[test]
    fn test_audience() {
        assert_eq!(AzureProvider::default().audience(), "api://AzureADTokenExchange");
    }

    #[test]
    fn test_parse_artifact_repository() {
        let stub = StubImplementation::new(StubTokenSource::new(false));
        let provider = AzureProvider::with_implementation(stub.clone());

        let accepted = [
            ("myacr.azurecr.io", "https://myacr.azurecr.io"),
            ("myacr.azurecr.io/app:v1", "https://myacr.azurecr.io"),
            ("oci://myacr.azurecr.cn/charts/app", "https://myacr.azurecr.cn"),
            ("myacr.azurecr.de/app", "https://myacr.azurecr.de"),
            ("myacr.azurecr.us/org/app@sha256:0000000000000000000000000000000000000000000000000000000000000000", "https://myacr.azurecr.us"),
        ];
        for (input, expected) in accepted {
            assert_eq!(
                provider.parse_artifact_repository(input).unwrap(),
                expected,
                "input: {}",
                input
            );
        }

        let rejected = [
            "azurecr.io/app",
            "myacr.azurecr.com/app",
            "ghcr.io/org/app",
            "012345678901.dkr.ecr.us-east-1.amazonaws.com/app",
            "nginx",
        ];
        for input in rejected {
            let err = provider.parse_artifact_repository(input).unwrap_err();
            match err {
                AuthError::InvalidRegistry { pattern, .. } => assert_eq!(pattern, REGISTRY_PATTERN),
                other => panic!("input {}: unexpected error {:?}", input, other),
            }
        }

        assert_eq!(stub.sends.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_registry_error_names_host() {
        let err = AzureProvider::default()
            .parse_artifact_repository("ghcr.io/org/app")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'ghcr.io'"), "{}", message);
        assert!(message.contains(REGISTRY_PATTERN), "{}", message);

        let err = AzureProvider::default()
            .parse_artifact_repository("myacr.azurecr.io:443")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'myacr.azurecr.io:443'"), "{}", message);
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let refresh_token = make_token(serde_json::json!({ "exp": 1700000000 }));
        let stub = StubImplementation::responding(
            200,
            serde_json::json!({ "refresh_token": refresh_token }).to_string(),
        );
        let provider = AzureProvider::with_implementation(stub.clone());

        let creds = provider
            .artifact_registry_credentials(
                "https://myacr.azurecr.io",
                &access_token(),
                &Options::default(),
            )
            .await
            .unwrap();

        let (username, password) = creds.username_password().unwrap();
        assert_eq!(username, "00000000-0000-0000-0000-000000000000");
        assert_eq!(password, refresh_token);
        assert_eq!(creds.expires_at.timestamp(), 1700000000);
        assert!(stub.tracker.dropped.load(Ordering::SeqCst));
        assert_eq!(*stub.send_clients.lock().unwrap(), vec![false]);

        let requests = stub.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://myacr.azurecr.io/oauth2/exchange"
        );
        assert_eq!(
            request.headers()[reqwest::header::CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        let body = std::str::from_utf8(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(
            body,
            "grant_type=access_token&service=myacr.azurecr.io&access_token=entra-token"
        );
    }

    #[tokio::test]
    async fn test_exchange_uses_http_client_override() {
        let refresh_token = make_token(serde_json::json!({ "exp": 1700000000 }));
        let stub = StubImplementation::responding(
            200,
            serde_json::json!({ "refresh_token": refresh_token }).to_string(),
        );
        let provider = AzureProvider::with_implementation(stub.clone());
        let opts = Options::apply([AuthOption::HttpClient(override_client())]);

        provider
            .artifact_registry_credentials("https://myacr.azurecr.io", &access_token(), &opts)
            .await
            .unwrap();

        assert_eq!(*stub.send_clients.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_exchange_non_200_status() {
        let stub = StubImplementation::responding(401, r#"{"errors":[]}"#);
        let provider = AzureProvider::with_implementation(stub.clone());

        let err = provider
            .artifact_registry_credentials(
                "https://myacr.azurecr.io",
                &access_token(),
                &Options::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::ExchangeStatus(401)), "{:?}", err);
        assert!(!stub.tracker.polled.load(Ordering::SeqCst), "body was decoded");
        assert!(stub.tracker.dropped.load(Ordering::SeqCst), "body was not released");
    }

    #[tokio::test]
    async fn test_exchange_decode_errors() {
        let no_exp = make_token(serde_json::json!({ "sub": "x" }));
        let bodies = [
            "not json".to_string(),
            r#"{"access_token":"x"}"#.to_string(),
            r#"{"refresh_token":"not-a-jwt"}"#.to_string(),
            serde_json::json!({ "refresh_token": no_exp }).to_string(),
        ];

        for body in bodies {
            let stub = StubImplementation::responding(200, body.clone());
            let provider = AzureProvider::with_implementation(stub.clone());

            let err = provider
                .artifact_registry_credentials(
                    "https://myacr.azurecr.io",
                    &access_token(),
                    &Options::default(),
                )
                .await
                .unwrap_err();

            assert!(
                matches!(err, AuthError::ExchangeDecode(_)),
                "body {}: {:?}",
                body,
                err
            );
            assert!(stub.tracker.dropped.load(Ordering::SeqCst), "body {}", body);
        }
    }

    #[tokio::test]
    async fn test_exchange_rejects_foreign_token() {
        let stub = StubImplementation::new(StubTokenSource::new(false));
        let provider = AzureProvider::with_implementation(stub.clone());
        let token = Token::Aws(AwsCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
            expires_at: Utc::now(),
        });

        let err = provider
            .artifact_registry_credentials("https://myacr.azurecr.io", &token, &Options::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::TokenMismatch { .. }));
        assert_eq!(stub.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_for_service_account() {
        let token_source = StubTokenSource::new(false);
        let stub = StubImplementation::new(token_source.clone());
        let provider = AzureProvider::with_implementation(stub.clone());
        let opts = Options::apply([AuthOption::Scopes(vec![
            "https://containerregistry.azure.net/.default".to_string(),
        ])]);

        let token = provider
            .token_for_service_account("ext-token", &annotated("abc", "def"), &opts)
            .await
            .unwrap();

        match token {
            Token::Access(t) => assert_eq!(t.token, "entra-token"),
            other => panic!("unexpected token {:?}", other),
        }

        let calls = stub.assertion_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (tenant_id, client_id, assertion) = &calls[0];
        assert_eq!(tenant_id, "abc");
        assert_eq!(client_id, "def");
        assert_eq!(assertion(), "ext-token");
        // The assertion must be reusable for SDK retries
        assert_eq!(assertion(), "ext-token");

        assert_eq!(
            *token_source.scopes.lock().unwrap(),
            vec![vec!["https://containerregistry.azure.net/.default".to_string()]]
        );
        assert_eq!(*stub.assertion_clients.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_token_for_service_account_uses_http_client_override() {
        let stub = StubImplementation::new(StubTokenSource::new(false));
        let provider = AzureProvider::with_implementation(stub.clone());
        let opts = Options::apply([AuthOption::HttpClient(override_client())]);

        provider
            .token_for_service_account("ext-token", &annotated("abc", "def"), &opts)
            .await
            .unwrap();

        assert_eq!(*stub.assertion_clients.lock().unwrap(), vec![Some(true)]);
    }

    #[tokio::test]
    async fn test_token_for_service_account_invalid_identity() {
        let stub = StubImplementation::new(StubTokenSource::new(false));
        let provider = AzureProvider::with_implementation(stub.clone());

        let err = provider
            .token_for_service_account("ext-token", &service_account(&[]), &Options::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::IdentityInvalid { .. }));
        assert!(stub.assertion_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_for_service_account_propagates_failure() {
        let stub = StubImplementation::new(StubTokenSource::new(true));
        let provider = AzureProvider::with_implementation(stub);

        let err = provider
            .token_for_service_account("ext-token", &annotated("abc", "def"), &Options::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::TokenAcquisition(_)));
        assert!(err.to_string().contains("federation not configured"));
    }

    #[tokio::test]
    async fn test_controller_token_defaults() {
        let token_source = StubTokenSource::new(false);
        let stub = StubImplementation::new(token_source.clone());
        let provider = AzureProvider::with_implementation(stub.clone());

        let token = provider.controller_token(&Options::default()).await.unwrap();
        assert_eq!(token.expires_at().timestamp(), 1800000000);

        assert_eq!(*stub.default_calls.lock().unwrap(), vec![(false, false)]);
        assert_eq!(
            *token_source.scopes.lock().unwrap(),
            vec![vec![DEFAULT_SCOPE.to_string()]]
        );
    }

    #[tokio::test]
    async fn test_controller_token_options() {
        let token_source = StubTokenSource::new(false);
        let stub = StubImplementation::new(token_source.clone());
        let provider = AzureProvider::with_implementation(stub.clone());
        let opts = Options::apply([
            AuthOption::HttpClient(override_client()),
            AuthOption::AllowShellOut,
        ]);

        provider.controller_token(&opts).await.unwrap();

        assert_eq!(*stub.default_calls.lock().unwrap(), vec![(true, true)]);
    }
}
