//! Shared fixtures for unit tests: unsigned tokens, a scripted backend and a
//! store whose writes always fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::sync::Notify;

use crate::about::About;
use crate::api::{ApiError, AuthApi, TokenResponse};
use crate::storage::{SessionStore, StoreError};

pub(crate) const VALID_CODE: &str = "ABC234";

/// Encode `claims` as an HS256-shaped token with a dummy signature.
pub(crate) fn token_with(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub(crate) fn user_token(email: &str, scopes: &str) -> String {
    token_with(&serde_json::json!({
        "UserID": email,
        "Email": email,
        "Scopes": scopes,
        "ExpiresAt": "4102444800",
        "Issuer": "rmCloud WEB",
        "Audience": "web",
    }))
}

/// Backend double. Login accepts [`VALID_CODE`]; validation echoes the token
/// back while `validate_ok` is set and answers 401 otherwise.
pub(crate) struct MockApi {
    pub(crate) login_token: Mutex<String>,
    pub(crate) validate_ok: AtomicBool,
    pub(crate) validate_transport_error: AtomicBool,
    pub(crate) login_calls: AtomicUsize,
    pub(crate) validate_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            login_token: Mutex::new(user_token("ada@example.com", "sync15")),
            validate_ok: AtomicBool::new(true),
            validate_transport_error: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        })
    }

    pub(crate) fn set_login_token(&self, token: String) {
        *self.login_token.lock().unwrap() = token;
    }

    pub(crate) fn revoke(&self) {
        self.validate_ok.store(false, Ordering::SeqCst);
    }

    pub(crate) fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Hold every validation response until `gate` is notified.
    pub(crate) fn hold_validation(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }
}

#[async_trait::async_trait]
impl AuthApi for MockApi {
    async fn login(&self, code: &str, _email: &str) -> Result<TokenResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if code != VALID_CODE {
            return Err(ApiError::Status { status: 401, body: String::new() });
        }
        let token = self.login_token.lock().unwrap().clone();
        Ok(TokenResponse { token })
    }

    async fn validate(&self, token: &str) -> Result<TokenResponse, ApiError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.validate_transport_error.load(Ordering::SeqCst) {
            return Err(ApiError::Request("connection refused".to_owned()));
        }
        if self.validate_ok.load(Ordering::SeqCst) {
            Ok(TokenResponse { token: token.to_owned() })
        } else {
            Err(ApiError::Status { status: 401, body: "expired".to_owned() })
        }
    }

    async fn about(&self) -> Result<About, ApiError> {
        Ok(About {
            api_version: "0.1.0".to_owned(),
            servername: "rmcloud".to_owned(),
            hostname: "localhost".to_owned(),
            software: vec!["rust".to_owned()],
        })
    }
}

/// Store that can be read but rejects every write and removal.
pub(crate) struct FailingStore {
    record: Option<String>,
    pub(crate) save_attempts: AtomicUsize,
    pub(crate) remove_attempts: AtomicUsize,
}

impl FailingStore {
    pub(crate) fn new(record: Option<String>) -> Arc<Self> {
        Arc::new(Self { record, save_attempts: AtomicUsize::new(0), remove_attempts: AtomicUsize::new(0) })
    }

    fn denied() -> StoreError {
        StoreError::Io {
            path: "/read-only/user.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        }
    }
}

impl SessionStore for FailingStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.record.clone())
    }

    fn save(&self, _value: &str) -> Result<(), StoreError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Self::denied())
    }

    fn remove(&self) -> Result<(), StoreError> {
        self.remove_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Self::denied())
    }
}
