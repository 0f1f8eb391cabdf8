//! Durable client-side storage for the remembered session.
//!
//! DESIGN
//! ======
//! Storage is a single key holding the serialized identity record. Presence
//! of the key is the only signal that a session should be restored on the
//! next start. Access is synchronous and local; the session manager calls it
//! while holding its state lock so memory and storage never diverge.
//!
//! `FileStore` writes through a temp file + rename so a crash mid-write never
//! leaves a truncated record behind, and restricts the file to its owner on
//! Unix since it holds a bearer token.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Storage key for the serialized identity record.
pub const SESSION_KEY: &str = "user";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub trait SessionStore: Send + Sync {
    /// Read the persisted record, `None` when absent.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Replace the persisted record.
    fn save(&self, value: &str) -> Result<(), StoreError>;

    /// Remove the persisted record. Removing an absent record succeeds.
    fn remove(&self) -> Result<(), StoreError>;
}

// =============================================================================
// FILE STORE
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    path: PathBuf,
}

impl FileStore {
    /// Store the record as `<dir>/user.json`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(format!("{SESSION_KEY}.json"));
        Self { dir, path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| self.io_error(e))?;
        let tmp = self.path.with_extension("json.tmp");
        write_owner_only(&tmp, value).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, content: &str) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, content: &str) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Counts writes so callers can assert that nothing was persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self { value: Mutex::new(Some(value.into())), writes: AtomicUsize::new(0) }
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot().clone())
    }

    fn save(&self, value: &str) -> Result<(), StoreError> {
        *self.slot() = Some(value.to_owned());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
