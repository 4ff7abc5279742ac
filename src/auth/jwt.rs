//! Reading claims out of tokens we did not sign.
//!
//! Registry refresh tokens arrive over TLS from an endpoint we already trust,
//! so their signatures are NOT verified here. Only the `exp` claim is read, to
//! report when the credential stops working. Do not use this for anything that
//! makes an authorization decision.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    // NumericDate may carry a fractional part
    exp: f64,
}

fn numeric_date(exp: f64) -> Option<DateTime<Utc>> {
    if !exp.is_finite() || exp < i64::MIN as f64 || exp >= i64::MAX as f64 {
        return None;
    }
    let secs = exp.floor();
    let nanos = (((exp - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
}

/// Extract the expiration time from a JWT without validating its signature.
pub fn expiry_unverified(token: &str) -> Result<DateTime<Utc>, String> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    // The library's own required-claim check only accepts integer `exp`
    validation.required_spec_claims.clear();

    // Use a dummy decoding key since we're not validating the signature
    let dummy_key = DecodingKey::from_secret(&[]);

    let token_data = decode::<ExpiryClaims>(token, &dummy_key, &validation)
        .map_err(|e| format!("failed to parse token claims: {}", e))?;

    numeric_date(token_data.claims.exp)
        .ok_or_else(|| format!("invalid expiration timestamp {}", token_data.claims.exp))
}
