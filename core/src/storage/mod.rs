//! Remote favorites table: the path-addressed, push-notifying key/value
//! store the favorites live in, plus its backends.

mod database;
mod firebase;
mod memory;
mod sqlite;
pub mod sse;
pub mod tree;
mod watchers;

pub use database::{Connection, Database};
pub use firebase::FirebaseTable;
pub use memory::MemoryTable;
pub use sqlite::SqliteTable;

use crate::config::BackendConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a table subscription delivers
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    /// Full current value under the subscribed path. `version` grows with
    /// every mutation the backend observes.
    Snapshot { version: u64, value: Option<Value> },
    /// The listener is gone; no further events follow.
    Failed(String),
}

/// A live subscription. Dropping it unsubscribes.
pub struct TableSubscription {
    events: mpsc::UnboundedReceiver<TableEvent>,
    task: Option<JoinHandle<()>>,
}

impl TableSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<TableEvent>) -> Self {
        Self { events, task: None }
    }

    /// Subscription fed by a background task that is aborted on drop
    pub fn with_task(events: mpsc::UnboundedReceiver<TableEvent>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// Next event, `None` once the backend side has gone away
    pub async fn next(&mut self) -> Option<TableEvent> {
        self.events.recv().await
    }
}

impl Drop for TableSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Path-addressable realtime key/value store.
///
/// Paths are `/`-separated (`favorites/52772`). Subscribing to a path yields
/// the whole subtree below it whenever anything underneath changes.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Read the value at `path`, `None` if absent
    async fn read(&self, path: &str) -> Result<Option<Value>>;

    /// Replace the value at `path`
    async fn write(&self, path: &str, value: Value) -> Result<()>;

    /// Delete the value at `path`; deleting an absent path succeeds
    async fn delete(&self, path: &str) -> Result<()>;

    /// Watch `path`; the current value is delivered first
    async fn subscribe(&self, path: &str) -> Result<TableSubscription>;
}

/// Build the table backend selected in the configuration
pub fn open_table(config: &BackendConfig) -> Result<Arc<dyn RemoteTable>> {
    let table: Arc<dyn RemoteTable> = match config {
        BackendConfig::Memory => Arc::new(MemoryTable::new()),
        BackendConfig::Sqlite { path } => Arc::new(SqliteTable::open(&Database::new(path))?),
        BackendConfig::Firebase { database_url } => Arc::new(FirebaseTable::new(database_url)?),
    };
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_memory_table() {
        let table = open_table(&BackendConfig::Memory).unwrap();
        table.write("favorites/1", serde_json::json!({"id": "1"})).await.unwrap();
        assert!(table.read("favorites/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_sqlite_table() {
        let dir = tempdir().unwrap();
        let config = BackendConfig::Sqlite {
            path: dir.path().join("favorites.db"),
        };

        let table = open_table(&config).unwrap();
        table.write("favorites/1", serde_json::json!({"id": "1"})).await.unwrap();
        assert!(dir.path().join("favorites.db").exists());
    }
}
