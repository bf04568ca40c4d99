//! In-process [`StateStore`].

use std::collections::HashMap;
use std::sync::Mutex;

use crate::host::BoxFuture;
use crate::{AppError, Result};

use super::StateStore;

/// State store held in memory; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let guard = self
                .entries
                .lock()
                .map_err(|_| AppError::Db("memory store mutex poisoned".into()))?;
            Ok(guard.get(key).cloned().unwrap_or_default())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<String>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut guard = self
                .entries
                .lock()
                .map_err(|_| AppError::Db("memory store mutex poisoned".into()))?;
            guard.insert(key.to_owned(), value);
            Ok(())
        })
    }
}
