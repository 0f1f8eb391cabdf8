//! Identity record decoded from a backend-issued session token.
//!
//! SYSTEM CONTEXT
//! ==============
//! The backend signs a JWT whose payload carries the user's claims. The
//! client never verifies the signature: trust comes from the backend's
//! `/jwt` validation endpoint, so decoding here only extracts the scope and
//! a few informational claims for UI gating.
//!
//! WIRE SHAPE
//! ==========
//! Only the raw token crosses the wire or lands in storage (`{"token": ...}`,
//! with the legacy `jwt` field name accepted on input). Scope is re-derived
//! on every deserialization so a persisted record can never disagree with
//! its own token.

use std::collections::BTreeSet;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Scope granting administrative views.
pub const ADMIN_SCOPE: &str = "admin";

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Failure to decode a session token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Token is not three dot-separated segments.
    #[error("token must have three segments, found {0}")]
    Format(usize),
    /// Payload segment is not valid base64url.
    #[error("token payload is not valid base64url: {0}")]
    Base64(String),
    /// Payload is not a JSON object with the expected claim types.
    #[error("token payload is not valid claims JSON: {0}")]
    Payload(String),
}

// =============================================================================
// CLAIMS
// =============================================================================

/// Claims the backend writes into the token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(rename = "UserID", default)]
    pub user_id: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    /// Space-separated string on the wire; a JSON array is accepted too.
    #[serde(rename = "Scopes", default, deserialize_with = "deserialize_scopes")]
    pub scopes: BTreeSet<String>,
    /// Unix seconds, written by the backend as a string.
    #[serde(rename = "ExpiresAt", default, deserialize_with = "deserialize_timestamp")]
    pub expires_at: Option<i64>,
    #[serde(rename = "Issuer", default)]
    pub issuer: Option<String>,
    #[serde(rename = "Audience", default)]
    pub audience: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopesWire {
    Joined(String),
    List(Vec<String>),
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let scopes = match Option::<ScopesWire>::deserialize(deserializer)? {
        None => BTreeSet::new(),
        Some(ScopesWire::Joined(joined)) => joined.split_whitespace().map(str::to_owned).collect(),
        Some(ScopesWire::List(list)) => list
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect(),
    };
    Ok(scopes)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampWire {
    Number(i64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<TimestampWire>::deserialize(deserializer)? {
        None => Ok(None),
        Some(TimestampWire::Number(secs)) => Ok(Some(secs)),
        Some(TimestampWire::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid ExpiresAt: {text:?}"))),
    }
}

/// Decode the payload segment of a JWT without verifying its signature.
///
/// # Errors
///
/// Returns [`TokenError`] if the token is not three segments, the payload is
/// not base64url, or the payload is not a claims object.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Format(segments.len()));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| TokenError::Base64(e.to_string()))?;
    serde_json::from_slice(&payload).map_err(|e| TokenError::Payload(e.to_string()))
}

// =============================================================================
// IDENTITY
// =============================================================================

/// A logged-in user: the raw token plus claims decoded from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IdentityWire", into = "IdentityWire")]
pub struct Identity {
    token: String,
    claims: Claims,
}

#[derive(Serialize, Deserialize)]
struct IdentityWire {
    #[serde(alias = "jwt")]
    token: String,
}

impl TryFrom<IdentityWire> for Identity {
    type Error = TokenError;

    fn try_from(wire: IdentityWire) -> Result<Self, Self::Error> {
        Self::from_token(wire.token)
    }
}

impl From<Identity> for IdentityWire {
    fn from(identity: Identity) -> Self {
        Self { token: identity.token }
    }
}

impl Identity {
    /// Build an identity by decoding the token's payload.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the token cannot be decoded.
    pub fn from_token(token: impl Into<String>) -> Result<Self, TokenError> {
        let token = token.into().trim().to_owned();
        let claims = decode_claims(&token)?;
        Ok(Self { token, claims })
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    #[must_use]
    pub fn scope(&self) -> &BTreeSet<String> {
        &self.claims.scopes
    }

    #[must_use]
    pub fn has_scope(&self, role: &str) -> bool {
        self.claims.scopes.contains(role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_scope(ADMIN_SCOPE)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }

    /// Expiry claimed by the token, if present and representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.claims
            .expires_at
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
    }

    /// Whether the token's own expiry claim has passed. Tokens without an
    /// expiry claim never report expired; the backend remains authoritative.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|expiry| expiry <= now)
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
