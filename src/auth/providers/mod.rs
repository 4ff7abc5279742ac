#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "azure")]
pub mod azure;

#[cfg(feature = "aws")]
pub use aws::AwsProvider;
#[cfg(feature = "azure")]
pub use azure::AzureProvider;

use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::Provider;

lazy_static! {
    static ref PROVIDERS: BTreeMap<&'static str, Arc<dyn Provider>> = {
        #[allow(unused_mut)]
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
        #[cfg(feature = "aws")]
        providers.push(Arc::new(AwsProvider::default()));
        #[cfg(feature = "azure")]
        providers.push(Arc::new(AzureProvider::default()));
        providers.into_iter().map(|p| (p.name(), p)).collect()
    };
}

/// Look up a provider by name.
///
/// Returns `None` for unknown names so callers can tell "not configured"
/// apart from a provider that failed.
pub fn provider_by_name(name: &str) -> Option<Arc<dyn Provider>> {
    PROVIDERS.get(name).cloned()
}

/// Names of all compiled-in providers, sorted.
pub fn provider_names() -> Vec<&'static str> {
    PROVIDERS.keys().copied().collect()
}
