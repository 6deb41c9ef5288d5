//! Find-or-create of tag and ingredient records by exact name.

use rusqlite::params;

use crate::db::{Database, now};
use crate::error::{Error, Result};
use crate::models::{Label, LabelKind};

impl Database {
    /// Return the `kind` record named `name`, creating it if it does not exist.
    ///
    /// The insert is a no-op when the name is already taken, so concurrent
    /// callers converge on the same row. Matching is case-sensitive.
    pub fn find_or_create_label(&self, kind: LabelKind, name: &str) -> Result<Label> {
        if name.is_empty() {
            return Err(Error::Validation(format!("{kind} name must not be empty")));
        }
        let now = now();
        self.conn.execute(
            &format!(
                "INSERT INTO {} (name, created_at, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO NOTHING",
                kind.table()
            ),
            params![name, now, now],
        )?;
        self.find_label_by_name(kind, name)?
            .ok_or_else(|| Error::NotFound(format!("{kind} '{name}' not found")))
    }

    /// Resolve every name in order. Duplicate names yield the same record twice.
    pub fn resolve_all(&self, names: &[String], kind: LabelKind) -> Result<Vec<Label>> {
        names
            .iter()
            .map(|name| self.find_or_create_label(kind, name))
            .collect()
    }
}
