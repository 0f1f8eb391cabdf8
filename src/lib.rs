//! Client-side authentication session for the rmCloud API.
//!
//! `SessionManager` owns login, persistence, validity polling and logout;
//! `RouteGuard` gates navigation on it. The backend and durable storage are
//! reached through the `AuthApi` and `SessionStore` seams.

pub mod about;
pub mod api;
pub mod config;
pub mod events;
pub mod guard;
pub mod identity;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use about::About;
pub use api::{ApiError, AuthApi, HttpAuthApi, TokenResponse};
pub use config::{ConfigError, SessionConfig};
pub use events::{Notice, NoticeLevel, SessionEvent};
pub use guard::{GuardDecision, RouteGuard};
pub use identity::{Claims, Identity, TokenError};
pub use session::{SessionError, SessionManager, SessionOptions};
pub use storage::{FileStore, MemoryStore, SessionStore, StoreError};
