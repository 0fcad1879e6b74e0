/*
[INPUT]:  Compact JWT access tokens
[OUTPUT]: Decoded (unverified) claims and expiration status
[POS]:    Auth layer - token inspection for display and diagnostics
[UPDATE]: When the backend adds claims worth surfacing
*/

use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::http::{ApiError, Result};

/// Claims read from a JWT payload.
///
/// The signature is not verified; the server remains the authority.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,
}

impl TokenClaims {
    /// Decode the payload segment of `token`
    pub fn decode(token: &str) -> Result<Self> {
        let payload_b64 = token
            .trim()
            .split('.')
            .nth(1)
            .ok_or_else(|| ApiError::Validation("token is not a valid JWT".to_string()))?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .or_else(|_| URL_SAFE.decode(payload_b64))
            .map_err(|e| ApiError::Validation(format!("invalid JWT payload base64: {e}")))?;

        Ok(serde_json::from_slice(&payload_bytes)?)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Tokens without an `exp` claim never expire locally
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now >= expires_at)
    }
}
