//! Client-side authentication session.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionManager` is created once by the application root and cloned into
//! whatever needs it (route guard, UI shell, CLI commands). All clones share
//! one state behind an `Arc`.
//!
//! DESIGN
//! ======
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`: network calls run unlocked, then the lock is retaken to apply
//! the outcome. Storage writes happen under the lock so the in-memory user
//! and the persisted record always change together.
//!
//! Validity polling is a spawned task holding only a `Weak` to the shared
//! state, never a public handle. Its `JoinHandle` sits next to the user and
//! is aborted when the session is cleared, when a new poller replaces it, and
//! when the last `SessionManager` is dropped (mid-check included).
//!
//! RECONCILIATION
//! ==============
//! `epoch` is bumped on every login and logout. A validity check records the
//! epoch before it sends and applies its response only if the epoch is
//! unchanged; otherwise the response is discarded. A stale success therefore
//! cannot resurrect a cleared session, and a stale failure cannot log out a
//! session created after it was sent. Checks within one epoch are
//! last-write-wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthApi};
use crate::config::{DEFAULT_HOME_PATH, DEFAULT_LOGIN_PATH, DEFAULT_POLL_INTERVAL_SECS, SessionConfig};
use crate::events::{EVENT_CHANNEL_CAPACITY, Notice, SessionEvent};
use crate::identity::{Identity, TokenError};
use crate::storage::SessionStore;

/// `tokio::time::interval` rejects a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `/login` rejected the code/email pair.
    #[error("login rejected: invalid code or email")]
    InvalidCredentials,

    /// `/jwt` rejected the current token.
    #[error("session is no longer valid")]
    SessionInvalid,

    /// The backend returned a token that cannot be decoded.
    #[error("malformed session token: {0}")]
    MalformedToken(#[from] TokenError),

    /// The backend could not be reached or answered with garbage.
    #[error("backend unavailable: {0}")]
    Transport(#[source] ApiError),

    /// A validity check was requested with no active session.
    #[error("not logged in")]
    NotLoggedIn,

    /// The session was replaced or cleared while the request was in flight.
    #[error("session changed while the request was in flight")]
    Superseded,
}

impl SessionError {
    fn from_api(err: ApiError, rejected: Self) -> Self {
        if err.is_rejection() { rejected } else { Self::Transport(err) }
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Behaviour knobs for a [`SessionManager`], usually derived from [`SessionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Period between validity checks while polling. Clamped to one second.
    pub poll_interval: Duration,
    /// Where the shell is sent after logout or a failed validity check.
    pub login_path: String,
    /// Where the shell is sent after login when no return URL is pending.
    pub home_path: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            home_path: DEFAULT_HOME_PATH.to_owned(),
        }
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            login_path: config.login_path.clone(),
            home_path: config.home_path.clone(),
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Default)]
struct SessionState {
    user: Option<Identity>,
    return_url: Option<String>,
    epoch: u64,
    poll: Option<JoinHandle<()>>,
}

/// State shared by every handle and by the polling task.
struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    options: SessionOptions,
    state: Mutex<SessionState>,
}

/// Owned by the public handles only. The poller never holds one, so the last
/// `SessionManager` going away always reaches `Drop` and cancels it, even if a
/// check is mid-flight.
struct Handle {
    inner: Arc<Inner>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.lock().poll.take() {
            handle.abort();
            debug!("session dropped, validity polling cancelled");
        }
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Cheaply clonable handle to the authentication session.
///
/// Clones share one state. Dropping the last clone cancels validity polling.
#[derive(Clone)]
pub struct SessionManager {
    handle: Arc<Handle>,
}

impl SessionManager {
    /// Create the session, restoring any identity record persisted in `store`.
    ///
    /// A persisted record whose token no longer decodes is removed and the
    /// session starts logged out.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>, options: SessionOptions) -> Self {
        let user = restore(store.as_ref());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            api,
            store,
            events,
            options,
            state: Mutex::new(SessionState { user, ..SessionState::default() }),
        });
        Self { handle: Arc::new(Handle { inner }) }
    }

    fn inner(&self) -> &Arc<Inner> {
        &self.handle.inner
    }

    /// Receive notifications and navigation requests from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner().events.subscribe()
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner().options
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner().lock().user.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<Identity> {
        self.inner().lock().user.clone()
    }

    #[must_use]
    pub fn return_url(&self) -> Option<String> {
        self.inner().lock().return_url.clone()
    }

    pub fn set_return_url(&self, path: impl Into<String>) {
        self.inner().lock().return_url = Some(path.into());
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner()
            .lock()
            .poll
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // -------------------------------------------------------------------------
    // login / logout
    // -------------------------------------------------------------------------

    /// Exchange `code` for a session.
    ///
    /// On success the identity is stored in memory and on disk, the shell is
    /// sent to the pending return URL (or home), and a success notice is
    /// emitted. On any failure the session is left untouched and a failure
    /// notice is emitted.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidCredentials`] when the backend rejects the code,
    /// [`SessionError::MalformedToken`] when the returned token does not decode,
    /// [`SessionError::Transport`] when the backend cannot be reached.
    pub async fn login(&self, code: &str, email: &str) -> Result<Identity, SessionError> {
        let inner = self.inner();
        let result = match inner.api.login(code.trim(), email.trim()).await {
            Ok(body) => Identity::from_token(body.token).map_err(SessionError::from),
            Err(err) => Err(SessionError::from_api(err, SessionError::InvalidCredentials)),
        };

        let identity = match result {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "login failed");
                inner.emit(SessionEvent::Notify(Notice::LoginFailed));
                return Err(err);
            }
        };

        let target = {
            let mut state = inner.lock();
            state.epoch += 1;
            state.user = Some(identity.clone());
            inner.persist(&identity);
            state
                .return_url
                .take()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| inner.options.home_path.clone())
        };

        info!(email = identity.email().unwrap_or(email), scopes = ?identity.scope(), "login succeeded");
        inner.emit(SessionEvent::Navigate(target));
        inner.emit(SessionEvent::Notify(Notice::LoginSucceeded));
        Ok(identity)
    }

    /// Forget the session everywhere and send the shell to the login page.
    pub fn logout(&self) {
        let inner = self.inner();
        {
            let mut state = inner.lock();
            let had_user = state.user.is_some();
            inner.clear_locked(&mut state);
            if had_user {
                info!("logged out");
            }
        }
        inner.emit(SessionEvent::Navigate(inner.options.login_path.clone()));
    }

    // -------------------------------------------------------------------------
    // validity
    // -------------------------------------------------------------------------

    /// Revalidate the current token against the backend.
    ///
    /// Success replaces the user with the backend's answer and re-persists it.
    /// Any failure stops polling and logs out; a session-expired notice is
    /// emitted only if a user was present. With no session this is a silent
    /// logout and no request is sent.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionInvalid`], [`SessionError::MalformedToken`],
    /// [`SessionError::Transport`] or [`SessionError::NotLoggedIn`] after the
    /// forced logout; [`SessionError::Superseded`] when the session changed
    /// while the request was in flight (nothing is applied in that case).
    pub async fn check_validity(&self) -> Result<Identity, SessionError> {
        self.inner().check_validity().await
    }

    /// Check validity now and then every poll interval. Replaces any running poller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_validity_polling(&self) {
        let inner = self.inner();
        let period = inner.options.poll_interval.max(MIN_POLL_INTERVAL);
        let weak = Arc::downgrade(inner);
        let mut state = inner.lock();
        if let Some(previous) = state.poll.take() {
            debug!("replacing validity poller");
            previous.abort();
        }
        state.poll = Some(tokio::spawn(poll_validity(weak, period)));
        info!(interval_secs = period.as_secs(), "validity polling started");
    }

    /// Cancel the validity poller if one is running.
    pub fn stop_validity_polling(&self) {
        if let Some(handle) = self.inner().lock().poll.take() {
            handle.abort();
            info!("validity polling stopped");
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        debug!(?event, "session event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn clear_locked(&self, state: &mut SessionState) {
        state.epoch += 1;
        state.user = None;
        if let Some(handle) = state.poll.take() {
            handle.abort();
        }
        if let Err(e) = self.store.remove() {
            warn!(error = %e, "failed to remove persisted session");
        }
    }

    fn persist(&self, identity: &Identity) {
        let raw = match serde_json::to_string(identity) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.store.save(&raw) {
            warn!(error = %e, "failed to persist session");
        }
    }

    async fn check_validity(&self) -> Result<Identity, SessionError> {
        let (epoch, token) = {
            let state = self.lock();
            (state.epoch, state.user.as_ref().map(|user| user.token().to_owned()))
        };

        let result = match token {
            Some(token) => match self.api.validate(&token).await {
                Ok(body) => Identity::from_token(body.token).map_err(SessionError::from),
                Err(err) => Err(SessionError::from_api(err, SessionError::SessionInvalid)),
            },
            None => Err(SessionError::NotLoggedIn),
        };

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(sent_epoch = epoch, current_epoch = state.epoch, "discarding stale validity response");
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(identity) => {
                state.user = Some(identity.clone());
                self.persist(&identity);
                debug!("session revalidated");
                Ok(identity)
            }
            Err(err) => {
                let had_user = state.user.is_some();
                self.clear_locked(&mut state);
                drop(state);
                if had_user {
                    warn!(error = %err, "session invalidated");
                    self.emit(SessionEvent::Notify(Notice::SessionExpired));
                }
                self.emit(SessionEvent::Navigate(self.options.login_path.clone()));
                Err(err)
            }
        }
    }
}

/// Runs until aborted or until every `SessionManager` is gone.
async fn poll_validity(inner: Weak<Inner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else { break };
        if let Err(err) = inner.check_validity().await {
            debug!(error = %err, "validity poll failed");
        }
    }
}

fn restore(store: &dyn SessionStore) -> Option<Identity> {
    let raw = match store.load() {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "failed to read persisted session");
            return None;
        }
    };
    match serde_json::from_str::<Identity>(&raw) {
        Ok(identity) => {
            debug!(scopes = ?identity.scope(), "restored persisted session");
            Some(identity)
        }
        Err(e) => {
            warn!(error = %e, "discarding unreadable persisted session");
            if let Err(e) = store.remove() {
                warn!(error = %e, "failed to remove persisted session");
            }
            None
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
