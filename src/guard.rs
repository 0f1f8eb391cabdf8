//! Navigation guard: only the login page is reachable without a session.
//!
//! SYSTEM CONTEXT
//! ==============
//! Consulted by the shell before every navigation. A denied navigation
//! remembers where the user was headed so `SessionManager::login` can send
//! them back there.

use crate::session::SessionManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

#[derive(Clone)]
pub struct RouteGuard {
    session: SessionManager,
    public_paths: Vec<String>,
}

impl RouteGuard {
    /// Guard with the session's login path as the only public page.
    #[must_use]
    pub fn new(session: SessionManager) -> Self {
        let public_paths = vec![session.options().login_path.clone()];
        Self { session, public_paths }
    }

    /// Add paths reachable without a session.
    #[must_use]
    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn is_public(&self, full_path: &str) -> bool {
        let path = route_path(full_path);
        self.public_paths.iter().any(|public| public == path)
    }

    /// Decide a navigation to `full_path` (path plus optional query/fragment).
    ///
    /// Public pages match on the path alone; the full path is what gets
    /// recorded as the return URL.
    pub fn check(&self, full_path: &str) -> GuardDecision {
        if self.is_public(full_path) || self.session.is_authenticated() {
            return GuardDecision::Allow;
        }
        tracing::debug!(path = full_path, "navigation requires login");
        self.session.set_return_url(full_path);
        GuardDecision::Redirect(self.session.options().login_path.clone())
    }
}

fn route_path(full_path: &str) -> &str {
    let end = full_path.find(['?', '#']).unwrap_or(full_path.len());
    &full_path[..end]
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
