//! AWS Elastic Container Registry (ECR) credentials.
//!
//! Service accounts assume an IAM role through STS `AssumeRoleWithWebIdentity`
//! (the EKS "IRSA" pattern); the resulting credentials call ECR
//! `GetAuthorizationToken` in the registry's own region.

pub mod implementation;

pub use implementation::{EcrAuthorization, Implementation, SdkImplementation};

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use chrono::{Duration, Utc};
use k8s_openapi::api::core::v1::ServiceAccount;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{
    annotation, registry, service_account_key, ArtifactRegistryCredentials, AuthError,
    AwsCredentials, Options, Provider, Result, Token,
};

pub const PROVIDER_NAME: &str = "aws";

const AUDIENCE: &str = "sts.amazonaws.com";

pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

const ROLE_ARN_PATTERN: &str = r"^arn:aws[\w-]*:iam::[0-9]{1,30}:role/.{1,200}$";

const REGISTRY_PATTERN: &str = r"^([0-9+]*)\.dkr\.ecr(?:-fips)?\.([^/.]*)\.(amazonaws\.com[.cn]*)$";

/// Longest role session name STS accepts.
const MAX_SESSION_NAME_LEN: usize = 64;

lazy_static! {
    static ref ROLE_ARN_REGEX: Regex = Regex::new(ROLE_ARN_PATTERN).unwrap();
    static ref REGISTRY_REGEX: Regex = Regex::new(REGISTRY_PATTERN).unwrap();
}

/// AWS provider
#[derive(Clone, Default)]
pub struct AwsProvider {
    implementation: Option<Arc<dyn Implementation>>,
}

impl AwsProvider {
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
        registry: &str,
        credentials: &AwsCredentials,
    ) -> Result<ArtifactRegistryCredentials> {
        let region = registry_region(registry).ok_or_else(|| AuthError::InvalidRegistry {
            provider: PROVIDER_NAME,
            registry: registry.to_string(),
            pattern: REGISTRY_PATTERN,
        })?;

        debug!("Requesting ECR authorization token in {}", region);
        let authorization = self
            .implementation()
            .authorization_token(region, credentials)
            .await?;

        let (username, password) =
            decode_authorization_token(&authorization.token).map_err(|e| {
                AuthError::ExchangeDecode(format!("{:#}", e))
            })?;

        // ECR tokens are valid for 12 hours
        let expires_at = authorization
            .expires_at
            .unwrap_or_else(|| Utc::now() + Duration::hours(12));

        info!(
            "Issued ECR credentials for {} valid until {}",
            registry, expires_at
        );

        Ok(ArtifactRegistryCredentials::basic(
            username, password, expires_at,
        ))
    }
}

/// Decode an ECR authorization token (base64 of `AWS:password`)
fn decode_authorization_token(token: &str) -> anyhow::Result<(String, String)> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token)
        .context("Failed to decode ECR token")?;

    let decoded_str = String::from_utf8(decoded).context("ECR token is not valid UTF-8")?;

    let parts: Vec<&str> = decoded_str.splitn(2, ':').collect();
    if parts.len() != 2 {
        anyhow::bail!("Invalid ECR token format");
    }

    Ok((parts[0].to_string(), parts[1].to_string()))
}

fn registry_region(registry: &str) -> Option<&str> {
    REGISTRY_REGEX
        .captures(registry)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
        .filter(|r| !r.is_empty())
}

fn identity(service_account: &ServiceAccount) -> Result<String> {
    let key = service_account_key(service_account);
    let role_arn = annotation(service_account, ROLE_ARN_ANNOTATION).ok_or_else(|| {
        AuthError::identity(&key, format!("annotation {} is not set", ROLE_ARN_ANNOTATION))
    })?;

    if !ROLE_ARN_REGEX.is_match(role_arn) {
        return Err(AuthError::identity(
            &key,
            format!(
                "invalid role ARN '{}': must match {}",
                role_arn, ROLE_ARN_PATTERN
            ),
        ));
    }

    Ok(role_arn.to_string())
}

/// `<name>.<namespace>`, restricted to the characters STS allows.
fn role_session_name(service_account: &ServiceAccount) -> String {
    let name = format!(
        "{}.{}",
        service_account.metadata.name.as_deref().unwrap_or_default(),
        service_account.metadata.namespace.as_deref().unwrap_or_default()
    );
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "+=,.@_-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .take(MAX_SESSION_NAME_LEN)
        .collect()
}

#[async_trait]
impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// The HTTP client override is not applied: the AWS SDK brings its own transport.
    async fn controller_token(&self, _opts: &Options) -> Result<Token> {
        let credentials = self.implementation().default_credentials().await?;
        Ok(Token::Aws(credentials))
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
        _opts: &Options,
    ) -> Result<Token> {
        let role_arn = identity(service_account)?;
        let session_name = role_session_name(service_account);

        debug!(
            "Assuming role {} with web identity as session {}",
            role_arn, session_name
        );

        let credentials = self
            .implementation()
            .assume_role_with_web_identity(&role_arn, &session_name, oidc_token)
            .await?;
        Ok(Token::Aws(credentials))
    }

    fn parse_artifact_repository(&self, artifact_repository: &str) -> Result<String> {
        let registry = registry::registry_from_artifact_repository(artifact_repository)?;

        if registry_region(&registry).is_none() {
            return Err(AuthError::InvalidRegistry {
                provider: PROVIDER_NAME,
                registry,
                pattern: REGISTRY_PATTERN,
            });
        }

        Ok(registry)
    }

    async fn artifact_registry_credentials(
        &self,
        registry: &str,
        token: &Token,
        _opts: &Options,
    ) -> Result<ArtifactRegistryCredentials> {
        match token {
            Token::Aws(credentials) => self.exchange(registry, credentials).await,
            other => Err(AuthError::TokenMismatch {
                provider: PROVIDER_NAME,
                kind: other.kind(),
            }),
        }
    }
}
