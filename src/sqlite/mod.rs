// ABOUTME: SQLite source support for the dump engine
// ABOUTME: Validates database file paths and opens read-only connections

pub mod reader;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Validate a SQLite file path before it is opened
///
/// The path is canonicalized (resolving symlinks and relative segments), must
/// point at an existing regular file, and must carry one of the usual SQLite
/// extensions: `.db`, `.sqlite` or `.sqlite3`.
///
/// # Examples
///
/// ```no_run
/// # use seren_db_dump::sqlite::validate_sqlite_path;
/// assert!(validate_sqlite_path("site.sqlite").is_ok());
/// assert!(validate_sqlite_path("../../../etc/passwd").is_err());
/// ```
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let canonical = PathBuf::from(path).canonicalize().with_context(|| {
        format!(
            "Failed to resolve SQLite file path '{}'. \
             File may not exist or may not be readable.",
            path
        )
    })?;

    if !canonical.is_file() {
        bail!("Path '{}' is not a regular file (may be a directory)", path);
    }

    match canonical.extension().and_then(|ext| ext.to_str()) {
        Some("db") | Some("sqlite") | Some("sqlite3") => {}
        Some(other) => bail!(
            "Invalid SQLite file extension '{}'. Must be .db, .sqlite, or .sqlite3",
            other
        ),
        None => bail!(
            "SQLite file '{}' has no extension. Must be .db, .sqlite, or .sqlite3",
            path
        ),
    }

    tracing::debug!("Validated SQLite path: {}", canonical.display());

    Ok(canonical)
}

/// Open a SQLite database read-only
///
/// A dump never writes to its source, so the file is opened with
/// `SQLITE_OPEN_READ_ONLY` and probed with `sqlite_version()` to surface
/// corrupt files as connection errors rather than per-table failures.
pub fn open_sqlite(path: &str) -> Result<rusqlite::Connection> {
    let canonical = validate_sqlite_path(path)?;

    tracing::info!("Opening SQLite database: {}", canonical.display());

    let conn = rusqlite::Connection::open_with_flags(
        &canonical,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .with_context(|| format!("Failed to open SQLite database: {}", canonical.display()))?;

    let version: String = conn
        .query_row("SELECT sqlite_version()", [], |row| row.get(0))
        .context("Failed to query SQLite version (database may be corrupted)")?;

    tracing::debug!("Opened SQLite {} database", version);

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_validate_empty_path() {
        let result = validate_sqlite_path("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_validate_nonexistent_file() {
        assert!(validate_sqlite_path("/nonexistent/database.db").is_err());
    }

    #[test]
    fn test_validate_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump_source.txt");
        File::create(&path).unwrap();

        let result = validate_sqlite_path(path.to_str().unwrap());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid SQLite file extension"));
    }

    #[test]
    fn test_validate_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_sqlite_path(dir.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_validate_valid_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for ext in ["db", "sqlite", "sqlite3"] {
            let path = dir.path().join(format!("site.{}", ext));
            File::create(&path).unwrap();
            assert!(
                validate_sqlite_path(path.to_str().unwrap()).is_ok(),
                "Extension .{} should be valid",
                ext
            );
        }
    }

    #[test]
    fn test_open_sqlite_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("readonly.db");
        {
            let conn = rusqlite::Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE test (id INTEGER)", []).unwrap();
        }

        let conn = open_sqlite(db_path.to_str().unwrap()).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let write = conn.execute("INSERT INTO test VALUES (1)", []);
        assert!(write
            .unwrap_err()
            .to_string()
            .to_lowercase()
            .contains("read"));
    }
}
