//! Repository layer for SQLite persistence.
//!
//! All repositories share one database file, open a connection per call
//! and create their own schema idempotently on construction.

mod admin;
mod content;
pub mod queue;

pub use admin::AdminRepository;
pub use content::{slugify, ContentRepository, Listing, Story};
pub use queue::QueueRepository;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::models::PayloadError;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a connection to the shared database file.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// Convert a no-rows query result into `None`.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_epoch_fallback() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
        let ts = parse_datetime("2025-06-01T12:00:00Z");
        assert_eq!(ts.to_rfc3339(), "2025-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_parse_datetime_opt() {
        assert_eq!(parse_datetime_opt(None), None);
        assert_eq!(parse_datetime_opt(Some("garbage".to_string())), None);
        assert!(parse_datetime_opt(Some("2025-06-01T12:00:00Z".to_string())).is_some());
    }
}
