//! Persistence layer modules.
//!
//! Conversation history is kept in a per-workspace key/value store. The
//! [`StateStore`] trait is the seam: [`state_repo::StateRepo`] backs it with
//! `SQLite`, [`memory::MemoryStateStore`] keeps it in process.

pub mod db;
pub mod memory;
pub mod schema;
pub mod state_repo;

use crate::host::BoxFuture;
use crate::Result;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Durable string-array storage keyed by name, scoped to one workspace.
pub trait StateStore: Send + Sync {
    /// Read the array under `key`; a missing key reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on storage failure.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Replace the array under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on storage failure.
    fn set<'a>(&'a self, key: &'a str, value: Vec<String>) -> BoxFuture<'a, Result<()>>;
}
