//! Async handle over the single SQLite connection.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::db::Database;
use crate::error::{Error, Result};

/// Cloneable handle that runs storage closures on the blocking pool.
///
/// All clones share one connection. Calls are serialized by the mutex, so a
/// closure passed to [`Store::run`] sees a consistent view for its duration.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&db)
        })
        .await
        .map_err(|e| Error::Background(e.to_string()))?
    }

    /// Like [`Store::run`], with `f` wrapped in a single transaction.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(move |db| db.in_transaction(f)).await
    }
}
