//! Error taxonomy shared by the repository, resolver, reaper and service layers.

use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    ConstraintViolation(String),

    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Unclassified persistence failure.
    #[error("storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    /// A storage task on the blocking pool panicked or was cancelled.
    #[error("background task failed: {0}")]
    Background(String),
}

impl Error {
    pub fn not_found(what: &str, id: i64) -> Self {
        Self::NotFound(format!("{what} {id} not found"))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            if failure.code == ErrorCode::ConstraintViolation {
                let detail = message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string());
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                    return Self::Validation(format!("referenced record does not exist ({detail})"));
                }
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK
                {
                    return Self::Validation(detail);
                }
                return Self::ConstraintViolation(detail);
            }
        }
        Self::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id));",
        )
        .unwrap();
        conn
    }

    #[test]
    fn unique_violation_is_classified() {
        let conn = conn();
        conn.execute("INSERT INTO parent (name) VALUES ('a')", [])
            .unwrap();
        let err = conn
            .execute("INSERT INTO parent (name) VALUES ('a')", [])
            .unwrap_err();
        let err = Error::from(err);
        assert!(matches!(err, Error::ConstraintViolation(_)), "{err:?}");
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[test]
    fn foreign_key_violation_is_validation() {
        let conn = conn();
        let err = conn
            .execute("INSERT INTO child (parent_id) VALUES (42)", [])
            .unwrap_err();
        assert!(matches!(Error::from(err), Error::Validation(_)));
    }

    #[test]
    fn not_null_violation_is_validation() {
        let conn = conn();
        let err = conn
            .execute("INSERT INTO parent (name) VALUES (NULL)", [])
            .unwrap_err();
        assert!(matches!(Error::from(err), Error::Validation(_)));
    }

    #[test]
    fn other_errors_are_storage() {
        let conn = conn();
        let err = conn.execute("SELECT * FROM missing_table", []).unwrap_err();
        assert!(matches!(Error::from(err), Error::Storage(_)));
    }
}
