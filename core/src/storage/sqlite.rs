use super::database::{Connection, Database};
use super::watchers::Watchers;
use super::{tree, RemoteTable, TableSubscription};
use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Table persisted in a local SQLite file.
///
/// Each top-level path segment is stored as one JSON document. Change
/// notifications only reach subscribers inside this process.
pub struct SqliteTable {
    conn: Arc<Mutex<Connection>>,
    watchers: Watchers,
}

impl SqliteTable {
    /// Open (creating if needed) the database behind `db`
    pub fn open(db: &Database) -> Result<Self> {
        Ok(Self::new(db.get_or_create()?))
    }

    /// Wrap a connection whose schema is already initialized
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            watchers: Watchers::default(),
        }
    }

    fn load_root(conn: &Connection, root: &str) -> Result<Value> {
        let raw: Option<String> = conn
            .query_row("SELECT value FROM nodes WHERE root = ?1", params![root], |row| row.get(0))
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Value::Null),
        }
    }

    fn store_root(conn: &Connection, root: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            conn.execute("DELETE FROM nodes WHERE root = ?1", params![root])?;
        } else {
            conn.execute(
                "INSERT OR REPLACE INTO nodes (root, value, updated_at) VALUES (?1, ?2, ?3)",
                params![root, serde_json::to_string(value)?, chrono::Utc::now().timestamp()],
            )?;
        }
        Ok(())
    }

    /// Split off the document key; the whole-database root is not addressable
    fn split(path: &str) -> Result<(String, Vec<&str>)> {
        let segments = tree::segments(path)?;
        match segments.split_first() {
            Some((root, rest)) => Ok((root.to_string(), rest.to_vec())),
            None => Err(Error::InvalidPath("sqlite table needs a top-level key".to_string())),
        }
    }

    async fn mutate<F>(&self, path: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut Value, &[&str]),
    {
        let (root, rest) = Self::split(path)?;
        let mut conn = self.conn.lock().await;

        let tx = conn.transaction()?;
        let mut document = Self::load_root(&tx, &root)?;
        change(&mut document, &rest);
        Self::store_root(&tx, &root, &document)?;
        tx.commit()?;

        let mut changed = vec![root.as_str()];
        changed.extend(rest.iter().copied());
        self.watchers
            .notify(&changed, |watched| tree::get(&document, &watched[1..]));
        Ok(())
    }
}

#[async_trait]
impl RemoteTable for SqliteTable {
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        let (root, rest) = Self::split(path)?;
        let conn = self.conn.lock().await;
        let document = Self::load_root(&conn, &root)?;
        Ok(tree::get(&document, &rest))
    }

    async fn write(&self, path: &str, value: Value) -> Result<()> {
        self.mutate(path, |document, rest| tree::set(document, rest, value))
            .await?;
        tracing::debug!(path, "sqlite table write");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.mutate(path, |document, rest| tree::remove(document, rest))
            .await?;
        tracing::debug!(path, "sqlite table delete");
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<TableSubscription> {
        let (root, rest) = Self::split(path)?;
        let conn = self.conn.lock().await;
        let document = Self::load_root(&conn, &root)?;

        let mut watched = vec![root];
        watched.extend(rest.iter().map(|s| s.to_string()));
        let events = self.watchers.add(watched, tree::get(&document, &rest));
        Ok(TableSubscription::new(events))
    }
}
