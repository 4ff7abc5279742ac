use oci_distribution::Reference;

use super::error::{AuthError, Result};

/// Extract the registry host from an artifact repository reference.
///
/// Accepts `host`, `host/path`, `host/path:tag` and `host/path@digest`, with
/// or without an `oci://` scheme. References without an explicit registry
/// resolve to Docker Hub, exactly as a container runtime would.
pub fn registry_from_artifact_repository(artifact_repository: &str) -> Result<String> {
    let reference = artifact_repository
        .trim()
        .trim_start_matches("oci://")
        .trim_end_matches('/');

    if reference.is_empty() {
        return Err(AuthError::InvalidReference {
            reference: artifact_repository.to_string(),
            reason: "empty reference".to_string(),
        });
    }

    // A bare registry host has no repository part for the parser to work with
    if is_bare_host(reference) {
        return Ok(reference.to_string());
    }

    let parsed = Reference::try_from(reference).map_err(|e| AuthError::InvalidReference {
        reference: artifact_repository.to_string(),
        reason: e.to_string(),
    })?;

    Ok(parsed.registry().to_string())
}

/// `host` or `host:port` with no repository part.
///
/// A dotless name without a port (`nginx`, `nginx:latest`) is an image on
/// Docker Hub, not a registry.
fn is_bare_host(reference: &str) -> bool {
    if reference.contains(['/', '@']) {
        return false;
    }
    match reference.split_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && (host.contains('.') || host == "localhost")
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
        }
        None => reference.contains('.'),
    }
}
