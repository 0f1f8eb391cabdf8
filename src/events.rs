//! Notifications and navigation requests emitted by the session manager.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session manager never renders anything. It broadcasts what the shell
//! should show or where it should go; the CLI prints these, a UI would toast
//! and route.

/// Broadcast buffer. Slow subscribers lag rather than block the session.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    LoginSucceeded,
    LoginFailed,
    SessionExpired,
}

impl Notice {
    #[must_use]
    pub fn level(self) -> NoticeLevel {
        match self {
            Self::LoginSucceeded => NoticeLevel::Success,
            Self::LoginFailed => NoticeLevel::Error,
            Self::SessionExpired => NoticeLevel::Warning,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::LoginSucceeded => "Your code was valid. You are logged in now.",
            Self::LoginFailed => "Login failed. Your code was invalid.",
            Self::SessionExpired => "Your session has expired. Please log in again.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Notify(Notice),
    Navigate(String),
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
