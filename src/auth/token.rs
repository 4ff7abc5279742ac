use base64::Engine;
use chrono::{DateTime, Utc};
use oci_distribution::secrets::RegistryAuth;
use std::fmt;

/// A bearer access token issued by a cloud identity provider.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Temporary AWS security credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Cloud credentials handed from token acquisition to the registry exchange.
///
/// The variant is provider-specific; passing a token to a provider that did
/// not issue it fails with [`AuthError::TokenMismatch`](super::AuthError::TokenMismatch).
#[derive(Debug, Clone)]
pub enum Token {
    Access(AccessToken),
    Aws(AwsCredentials),
}

impl Token {
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            Token::Access(t) => t.expires_at,
            Token::Aws(c) => c.expires_at,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Token::Access(_) => "access",
            Token::Aws(_) => "aws",
        }
    }
}

/// Registry credentials produced by an exchange, valid until `expires_at`.
pub struct ArtifactRegistryCredentials {
    pub authenticator: RegistryAuth,
    pub expires_at: DateTime<Utc>,
}

impl ArtifactRegistryCredentials {
    pub fn basic(
        username: impl Into<String>,
        password: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            authenticator: RegistryAuth::Basic(username.into(), password.into()),
            expires_at,
        }
    }

    /// Username and password, if the authenticator carries any.
    pub fn username_password(&self) -> Option<(&str, &str)> {
        match &self.authenticator {
            RegistryAuth::Basic(username, password) => Some((username, password)),
            _ => None,
        }
    }

    /// Render as a Docker `config.json` document for `registry_host`.
    pub fn to_docker_config(&self, registry_host: &str) -> serde_json::Value {
        let mut auths = serde_json::Map::new();
        if let Some((username, password)) = self.username_password() {
            let auth = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, password));
            auths.insert(
                registry_host.to_string(),
                serde_json::json!({
                    "username": username,
                    "password": password,
                    "auth": auth,
                }),
            );
        }
        serde_json::json!({ "auths": auths })
    }
}

impl fmt::Debug for ArtifactRegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRegistryCredentials")
            .field("username", &self.username_password().map(|(u, _)| u))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
