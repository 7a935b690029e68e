//! Persistence for the log filter.
//!
//! The log filter survives restarts as a single setting stored under
//! [`FILTER_KEY`] in the `/source/` form produced by
//! [`Pattern::to_persisted`](crate::pattern::Pattern::to_persisted). Two
//! backends implement [`FilterStore`]: an in-memory one for tests and embedding,
//! and a `SQLite` one used by the binary.

pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Settings key under which the log filter is persisted.
pub const FILTER_KEY: &str = "debugRealtime";

/// A durable home for the persisted log filter.
pub trait FilterStore: Send + Sync {
    /// Read the persisted filter text, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load(&self) -> Result<Option<String>>;

    /// Replace the persisted filter text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn save(&self, value: &str) -> Result<()>;
}

/// A [`FilterStore`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryFilterStore {
    value: Mutex<Option<String>>,
}

impl MemoryFilterStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `value`.
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl FilterStore for MemoryFilterStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, value: &str) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }
}

/// `SQLite`-backed settings storage.
pub struct Storage {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create a settings database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening settings database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Settings database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory settings database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a setting, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            r"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            (key, value),
        )?;
        debug!(key, "Stored setting");
        Ok(())
    }

    /// Remove a setting. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }
}

impl FilterStore for Storage {
    fn load(&self) -> Result<Option<String>> {
        self.get(FILTER_KEY)
    }

    fn save(&self, value: &str) -> Result<()> {
        self.set(FILTER_KEY, value)
    }
}
