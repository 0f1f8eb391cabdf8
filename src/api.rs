//! Backend HTTP API consumed by the session manager.
//!
//! ARCHITECTURE
//! ============
//! `AuthApi` is the seam between session state and the network. The session
//! manager only ever sees decoded wire types and [`ApiError`], so tests swap
//! in a scripted backend and the CLI plugs in [`HttpAuthApi`].
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses surface as [`ApiError::Status`]; the session manager
//! treats those as a rejection by the endpoint. Everything else (connect
//! failures, timeouts, undecodable bodies) is a transport problem and is
//! handled the same way by the caller, just logged differently.

use serde::{Deserialize, Serialize};

use crate::about::About;
use crate::config::SessionConfig;

pub const LOGIN_PATH: &str = "/login";
pub const VALIDATE_PATH: &str = "/jwt";
pub const ABOUT_PATH: &str = "/about";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response.
    #[error("API request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("API response error: status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether the backend itself rejected the request.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    code: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    jwt: &'a str,
}

/// Identity payload returned by `/login` and `/jwt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "jwt")]
    pub token: String,
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange an emailed access code for a session token.
    async fn login(&self, code: &str, email: &str) -> Result<TokenResponse, ApiError>;

    /// Ask the backend whether `token` is still valid.
    async fn validate(&self, token: &str) -> Result<TokenResponse, ApiError>;

    /// Fetch the server descriptor.
    async fn about(&self) -> Result<About, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// Build a client for `config.api_url` with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the TLS backend fails to initialize.
    pub fn new(config: &SessionConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.api_url.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        endpoint_url(&self.base_url, path)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Status { status, body: text });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, code: &str, email: &str) -> Result<TokenResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .json(&LoginRequest { code, email })
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        parse_token_response(&Self::read_body(response).await?)
    }

    async fn validate(&self, token: &str) -> Result<TokenResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint(VALIDATE_PATH))
            .json(&ValidateRequest { jwt: token })
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        parse_token_response(&Self::read_body(response).await?)
    }

    async fn about(&self) -> Result<About, ApiError> {
        let response = self
            .http
            .get(self.endpoint(ABOUT_PATH))
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        parse_about(&Self::read_body(response).await?)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn parse_token_response(json: &str) -> Result<TokenResponse, ApiError> {
    let body: TokenResponse = serde_json::from_str(json).map_err(|e| ApiError::Parse(e.to_string()))?;
    if body.token.trim().is_empty() {
        return Err(ApiError::Parse("empty token".to_owned()));
    }
    Ok(body)
}

fn parse_about(json: &str) -> Result<About, ApiError> {
    serde_json::from_str(json).map_err(|e| ApiError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
