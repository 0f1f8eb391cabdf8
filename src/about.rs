//! Server descriptor returned by `GET /about`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct About {
    pub api_version: String,
    pub servername: String,
    pub hostname: String,
    #[serde(default)]
    pub software: Vec<String>,
}

impl About {
    /// One-line summary for status output, e.g. `rmcloud 0.1.0 at host (rust, axum)`.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.software.is_empty() {
            format!("{} {} at {}", self.servername, self.api_version, self.hostname)
        } else {
            format!(
                "{} {} at {} ({})",
                self.servername,
                self.api_version,
                self.hostname,
                self.software.join(", ")
            )
        }
    }
}

#[cfg(test)]
#[path = "about_test.rs"]
mod tests;
