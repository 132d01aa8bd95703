// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-id extraction from OAuth bearer credentials.
//!
//! SECURITY: the credential is only checked for JWT *shape*. The signature is
//! never verified, so the extracted session id is exactly as trustworthy as
//! the channel that delivered the token (the TLS token endpoint). Do not
//! make trust decisions on payload claims beyond using `jti` as the session
//! bearer for the same control plane.

use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;

use crate::error::GatewayError;

/// URL-safe base64 that accepts payloads with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Extract the session id (`jti` claim) from an authorization header value.
///
/// Accepts `Bearer <jwt>` or a bare `<jwt>`.
pub fn extract_session_id(authorization: &str) -> Result<String, GatewayError> {
    let token = authorization.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(GatewayError::malformed_credential(format!(
            "expected 3 token segments, got {}",
            parts.len()
        )));
    }

    let payload = URL_SAFE_LENIENT
        .decode(parts[1].as_bytes())
        .map_err(|e| GatewayError::malformed_credential(format!("payload is not base64: {e}")))?;
    let claims: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| GatewayError::malformed_credential(format!("payload is not JSON: {e}")))?;

    match claims.get("jti") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(GatewayError::malformed_credential("payload has no jti claim")),
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
