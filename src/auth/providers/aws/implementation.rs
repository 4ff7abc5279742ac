use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_ecr::Client as EcrClient;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::auth::{AuthError, AwsCredentials, Result};

/// Region used for STS when none is configured in the environment.
const DEFAULT_STS_REGION: &str = "us-east-1";

/// Authorization token returned by ECR, still base64 encoded.
#[derive(Clone)]
pub struct EcrAuthorization {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Low-level calls made by the AWS provider.
#[async_trait]
pub trait Implementation: Send + Sync {
    /// Resolve credentials from the default chain (env, profile, IMDS, ...).
    async fn default_credentials(&self) -> Result<AwsCredentials>;

    /// Call STS `AssumeRoleWithWebIdentity`.
    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        role_session_name: &str,
        web_identity_token: &str,
    ) -> Result<AwsCredentials>;

    /// Call ECR `GetAuthorizationToken` in `region` with `credentials`.
    async fn authorization_token(
        &self,
        region: &str,
        credentials: &AwsCredentials,
    ) -> Result<EcrAuthorization>;
}

/// Extract a clean error message from an AWS SDK error's Debug output
///
/// The AWS SDK errors have verbose Debug output, but we can extract just the
/// meaningful message by parsing for the `message: Some("...")` pattern.
pub(crate) fn format_sdk_error<E: std::fmt::Debug>(err: &E) -> String {
    let debug_str = format!("{:?}", err);

    if let Some(start) = debug_str.find("message: Some(\"") {
        let start = start + 15; // length of 'message: Some("'
        if let Some(end) = debug_str[start..].find("\")") {
            return debug_str[start..start + end].to_string();
        }
    }

    // Last resort: return a truncated debug string
    if debug_str.len() > 200 {
        let mut end = 200;
        while !debug_str.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &debug_str[..end])
    } else {
        debug_str
    }
}

fn smithy_time(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SdkImplementation;

#[async_trait]
impl Implementation for SdkImplementation {
    async fn default_credentials(&self) -> Result<AwsCredentials> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let provider = config.credentials_provider().ok_or_else(|| {
            AuthError::CredentialChain("no AWS credentials provider configured".into())
        })?;
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| AuthError::TokenAcquisition(Box::new(e)))?;

        // Static keys carry no expiry; report a conservative refresh point instead
        let expires_at = credentials
            .expiry()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Ok(AwsCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().map(str::to_string),
            expires_at,
        })
    }

    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        role_session_name: &str,
        web_identity_token: &str,
    ) -> Result<AwsCredentials> {
        // AssumeRoleWithWebIdentity is unsigned, the web identity token is the credential
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(RegionProviderChain::default_provider().or_else(DEFAULT_STS_REGION))
            .no_credentials()
            .load()
            .await;
        let client = StsClient::new(&config);

        let response = client
            .assume_role_with_web_identity()
            .role_arn(role_arn)
            .role_session_name(role_session_name)
            .web_identity_token(web_identity_token)
            .send()
            .await
            .map_err(|e| AuthError::TokenAcquisition(format_sdk_error(&e).into()))?;

        let credentials = response.credentials().ok_or_else(|| {
            AuthError::TokenAcquisition("no credentials returned from STS".into())
        })?;
        let expiration = credentials.expiration();
        let expires_at = smithy_time(expiration.secs(), expiration.subsec_nanos())
            .ok_or_else(|| AuthError::TokenAcquisition("STS expiration out of range".into()))?;

        Ok(AwsCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: Some(credentials.session_token().to_string()),
            expires_at,
        })
    }

    async fn authorization_token(
        &self,
        region: &str,
        credentials: &AwsCredentials,
    ) -> Result<EcrAuthorization> {
        let static_credentials = aws_sdk_ecr::config::Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            credentials.session_token.clone(),
            None,
            "artifact-auth",
        );
        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(static_credentials)
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        let client = EcrClient::new(&config);

        let response = match client.get_authorization_token().send().await {
            Ok(response) => response,
            Err(err) => {
                let message = format_sdk_error(&err);
                return Err(match err.raw_response() {
                    Some(raw) => {
                        warn!("ECR rejected authorization token request: {}", message);
                        AuthError::ExchangeStatus(raw.status().as_u16())
                    }
                    None => AuthError::ExchangeTransport(message.into()),
                });
            }
        };

        let auth_data = response
            .authorization_data()
            .first()
            .ok_or_else(|| {
                AuthError::ExchangeDecode("no authorization data returned from ECR".to_string())
            })?;
        let token = auth_data.authorization_token().ok_or_else(|| {
            AuthError::ExchangeDecode("no authorization token in ECR response".to_string())
        })?;

        Ok(EcrAuthorization {
            token: token.to_string(),
            expires_at: auth_data
                .expires_at()
                .and_then(|t| smithy_time(t.secs(), t.subsec_nanos())),
        })
    }
}
