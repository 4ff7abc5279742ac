//! Short-lived container registry credentials for cloud workload identities.
//!
//! A workload authenticates to its cloud (ambiently, or by federating a
//! Kubernetes service account token), then trades the cloud access token for
//! registry credentials. Providers are selected by name at runtime:
//!
//! ```rust,no_run
//! # async fn run() -> artifact_auth::auth::Result<()> {
//! use artifact_auth::auth::{provider_by_name, Options};
//!
//! let provider = provider_by_name("azure").expect("azure provider compiled in");
//! let opts = Options::default();
//! let registry = provider.parse_artifact_repository("myacr.azurecr.io/app:v1")?;
//! let token = provider.controller_token(&opts).await?;
//! let creds = provider
//!     .artifact_registry_credentials(&registry, &token, &opts)
//!     .await?;
//! println!("valid until {}", creds.expires_at);
//! # Ok(())
//! # }
//! ```
//!
//! Tokens returned by registries are decoded without signature verification
//! to read their expiry. The issuing endpoint is trusted through TLS; see
//! [`auth::jwt`].

pub mod auth;
#[cfg(feature = "cli")]
pub mod settings;
