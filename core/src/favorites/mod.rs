//! The favorites store.
//!
//! Owns every operation on the favorites table: point queries, add/remove,
//! the serialized `toggle`, one-shot listing and live observation. All
//! observers share one physical table listener; its pushes are decoded into
//! [`FavoritesSnapshot`]s, cached, and fanned out in registration order.

mod feed;
mod key_lock;


pub use feed::{FavoritesUpdate, SubscriptionHandle};

use crate::codec;
use crate::models::{FavoriteRecord, FavoritesSnapshot, Recipe};
use crate::storage::{tree, RemoteTable, TableEvent, TableSubscription};
use crate::{Error, Result};
use chrono::Utc;
use feed::Feed;
use key_lock::KeyLocks;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub const DEFAULT_ROOT: &str = "favorites";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A failure the store recovered from locally but still wants reported
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub operation: &'static str,
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Table path holding one child per favorited recipe
    pub root: String,
    /// Upper bound for every remote call
    pub timeout: Duration,
    /// Where degraded reads are reported
    pub diagnostics: Option<mpsc::UnboundedSender<Diagnostic>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            diagnostics: None,
        }
    }
}

struct Listener {
    task: JoinHandle<()>,
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Inner {
    table: Arc<dyn RemoteTable>,
    options: StoreOptions,
    key_locks: KeyLocks,
    feed: Arc<Feed>,
    listener: Mutex<Option<Listener>>,
}

/// Handle to the favorites of one table. Clones share all state.
#[derive(Clone)]
pub struct FavoritesStore {
    inner: Arc<Inner>,
}

impl FavoritesStore {
    pub fn new(table: Arc<dyn RemoteTable>, options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                table,
                options,
                key_locks: KeyLocks::default(),
                feed: Arc::new(Feed::default()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Whether `id` is currently favorited.
    ///
    /// A failed lookup answers `false`; the failure goes to the log and to
    /// the diagnostics channel instead of the caller.
    pub async fn is_favorite(&self, id: &str) -> bool {
        let id = id.trim();
        match self.exists(id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(id, error = %e, "favorite lookup failed, assuming not favorited");
                self.report("is_favorite", id, &e);
                false
            }
        }
    }

    /// Favorite `recipe`. Re-adding refreshes its `added_at`.
    pub async fn add(&self, recipe: &Recipe) -> Result<()> {
        let mut record = codec::encode(recipe)?;
        let _guard = self.inner.key_locks.lock(&record.id).await;
        record.added_at = Utc::now();
        self.write_record(&record).await
    }

    /// Unfavorite `id`; unfavoriting something that is not a favorite succeeds
    pub async fn remove(&self, id: &str) -> Result<()> {
        let id = id.trim();
        let path = self.record_path(id)?;
        let _guard = self.inner.key_locks.lock(id).await;
        self.delete_record(id, &path).await
    }

    /// Flip the favorite state of `recipe` and return the new state.
    ///
    /// Calls for the same recipe run one after another, so each one sees
    /// the outcome of the previous. The returned state is the one just
    /// written, not re-read from the table.
    pub async fn toggle(&self, recipe: &Recipe) -> Result<bool> {
        let mut record = codec::encode(recipe)?;
        let path = self.record_path(&record.id)?;
        let _guard = self.inner.key_locks.lock(&record.id).await;

        if self.exists(&record.id).await? {
            self.delete_record(&record.id, &path).await?;
            Ok(false)
        } else {
            record.added_at = Utc::now();
            self.write_record(&record).await?;
            Ok(true)
        }
    }

    /// One-shot read of every favorite, newest first. Entries that fail to
    /// decode are left out.
    pub async fn list(&self) -> Result<FavoritesSnapshot> {
        let table = self
            .remote("list", self.inner.table.read(&self.inner.options.root))
            .await?;
        Ok(codec::decode_table(table.as_ref()))
    }

    /// Register `callback` for every change to the favorites table.
    ///
    /// The first subscriber opens the shared listener. A snapshot that is
    /// already cached is handed to the new observer straight away.
    pub async fn subscribe<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&FavoritesUpdate) + Send + Sync + 'static,
    {
        // Registering under the listener lock keeps unsubscribe_all from
        // slipping in between opening the listener and joining the feed
        let mut listener = self.inner.listener.lock().await;
        self.ensure_listener(&mut listener).await?;
        let handle = self.inner.feed.register(Arc::new(callback));
        drop(listener);
        tracing::debug!(observer = handle.id(), "favorites observer registered");
        Ok(handle)
    }

    /// Close the shared listener and forget every observer and the cached
    /// snapshot.
    pub async fn unsubscribe_all(&self) {
        let listener = self.inner.listener.lock().await.take();
        self.inner.feed.clear();
        if let Some(listener) = listener {
            drop(listener);
            tracing::info!(root = %self.inner.options.root, "favorites listener closed");
        }
    }

    /// Latest snapshot pushed by the listener, if one is open
    pub fn snapshot(&self) -> Option<FavoritesSnapshot> {
        self.inner.feed.latest()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.feed.len()
    }

    /// Whether the shared listener is open and still running
    pub async fn is_listening(&self) -> bool {
        self.inner
            .listener
            .lock()
            .await
            .as_ref()
            .is_some_and(|listener| !listener.task.is_finished())
    }

    fn record_path(&self, id: &str) -> Result<String> {
        tree::validate_key(id)?;
        Ok(format!("{}/{}", self.inner.options.root, id))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let path = self.record_path(id)?;
        let value = self.remote("read", self.inner.table.read(&path)).await?;
        Ok(value.is_some())
    }

    async fn write_record(&self, record: &FavoriteRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        let value = codec::to_value(record)?;
        self.remote("write", self.inner.table.write(&path, value)).await?;
        tracing::debug!(id = %record.id, "favorite added");
        Ok(())
    }

    async fn delete_record(&self, id: &str, path: &str) -> Result<()> {
        self.remote("delete", self.inner.table.delete(path)).await?;
        tracing::debug!(id, "favorite removed");
        Ok(())
    }

    /// Bound a table call by the configured timeout
    async fn remote<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.inner.options.timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::TransientRemoteFailure(format!(
                "{} timed out after {:?}",
                operation, timeout
            ))),
        }
    }

    fn report(&self, operation: &'static str, id: &str, error: &Error) {
        if let Some(diagnostics) = &self.inner.options.diagnostics {
            let _ = diagnostics.send(Diagnostic {
                operation,
                id: id.to_string(),
                message: error.to_string(),
            });
        }
    }

    async fn ensure_listener(&self, listener: &mut Option<Listener>) -> Result<()> {
        if let Some(active) = listener.as_ref() {
            if !active.task.is_finished() {
                return Ok(());
            }
            tracing::info!("favorites listener ended earlier, opening a new one");
        }

        let root = &self.inner.options.root;
        let subscription = self
            .remote("subscribe", self.inner.table.subscribe(root))
            .await
            .map_err(|e| Error::Subscription(e.to_string()))?;

        let feed = Arc::clone(&self.inner.feed);
        let generation = feed.generation();
        let task = tokio::spawn(pump(subscription, feed, generation));
        *listener = Some(Listener { task });
        tracing::info!(root = %root, "favorites listener opened");
        Ok(())
    }
}

/// Drive one table subscription: decode each push, drop stale ones, publish
/// the rest.
async fn pump(mut subscription: TableSubscription, feed: Arc<Feed>, generation: u64) {
    let mut last_version: Option<u64> = None;

    while let Some(event) = subscription.next().await {
        match event {
            TableEvent::Snapshot { version, value } => {
                if last_version.is_some_and(|last| version <= last) {
                    tracing::debug!(version, ?last_version, "dropping stale favorites push");
                    continue;
                }
                last_version = Some(version);
                feed.publish(generation, codec::decode_table(value.as_ref()));
            }
            TableEvent::Failed(reason) => {
                tracing::error!(%reason, "favorites listener failed");
                feed.fail(generation, &reason);
                return;
            }
        }
    }

    tracing::error!("favorites listener closed by the table");
    feed.fail(generation, "listener closed by the table");
}
