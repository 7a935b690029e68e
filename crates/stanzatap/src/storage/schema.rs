//! `SQLite` schema definitions for stanzatap.
//!
//! This module contains the SQL statements for creating and managing
//! the settings database.

/// SQL statement to create the settings table.
pub const CREATE_SETTINGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_SETTINGS_TABLE, CREATE_METADATA_TABLE];
