use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = AuthError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid identity for service account '{service_account}': {reason}")]
    IdentityInvalid {
        service_account: String,
        reason: String,
    },

    #[error("failed to build credential source: {0}")]
    CredentialChain(#[source] BoxError),

    #[error("failed to acquire access token: {0}")]
    TokenAcquisition(#[source] BoxError),

    #[error("invalid artifact repository '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("invalid {provider} registry: '{registry}'. must match {pattern}")]
    InvalidRegistry {
        provider: &'static str,
        registry: String,
        pattern: &'static str,
    },

    #[error("failed to send registry exchange request: {0}")]
    ExchangeTransport(#[source] BoxError),

    #[error("unexpected status from registry exchange request: {0}")]
    ExchangeStatus(u16),

    #[error("failed to decode registry exchange response: {0}")]
    ExchangeDecode(String),

    #[error("{provider} provider cannot use a {kind} token")]
    TokenMismatch {
        provider: &'static str,
        kind: &'static str,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl AuthError {
    pub(crate) fn identity(
        service_account: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::IdentityInvalid {
            service_account: service_account.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may reasonably retry the operation.
    ///
    /// Only failures that happened on the far side of a network call qualify;
    /// validation failures will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TokenAcquisition(_) | Self::ExchangeTransport(_) | Self::ExchangeStatus(_)
        )
    }
}
