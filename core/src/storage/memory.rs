use super::watchers::Watchers;
use super::{tree, RemoteTable, TableSubscription};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// In-process table.
///
/// Behaves like the hosted backend, including push notifications, and can
/// simulate round-trip latency, an unreachable service and listener loss.
#[derive(Default)]
pub struct MemoryTable {
    root: Mutex<Value>,
    watchers: Watchers,
    latency: Duration,
    offline: AtomicBool,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it takes effect
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// While offline every call fails with a transient error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Drop every subscription with a failure notification
    pub fn fail_listeners(&self, reason: &str) {
        let _root = self.root();
        self.watchers.fail_all(reason);
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.watchers.len()
    }

    /// Number of completed writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of completed deletes
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn root(&self) -> MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::TransientRemoteFailure("table is offline".to_string()));
        }
        Ok(())
    }

    fn mutate<F>(&self, segments: &[&str], change: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut root = self.root();
        change(&mut root);
        self.watchers.notify(segments, |path| tree::get(&root, path));
    }
}

#[async_trait]
impl RemoteTable for MemoryTable {
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        let segments = tree::segments(path)?;
        self.round_trip().await?;
        Ok(tree::get(&self.root(), &segments))
    }

    async fn write(&self, path: &str, value: Value) -> Result<()> {
        let segments = tree::segments(path)?;
        self.round_trip().await?;
        self.mutate(&segments, |root| tree::set(root, &segments, value));
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(path, "memory table write");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let segments = tree::segments(path)?;
        self.round_trip().await?;
        self.mutate(&segments, |root| tree::remove(root, &segments));
        self.deletes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(path, "memory table delete");
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<TableSubscription> {
        let segments = tree::segments(path)?;
        self.round_trip().await?;
        let root = self.root();
        let owned: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
        let events = self.watchers.add(owned, tree::get(&root, &segments));
        Ok(TableSubscription::new(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TableEvent;
    use serde_json::json;

    #[tokio::test]
    async fn test_point_operations() {
        let table = MemoryTable::new();
        assert_eq!(table.read("favorites/1").await.unwrap(), None);

        table.write("favorites/1", json!({"id": "1"})).await.unwrap();
        assert_eq!(table.read("favorites/1").await.unwrap(), Some(json!({"id": "1"})));

        table.delete("favorites/1").await.unwrap();
        table.delete("favorites/1").await.unwrap();
        assert_eq!(table.read("favorites").await.unwrap(), None);
        assert_eq!(table.write_count(), 1);
        assert_eq!(table.delete_count(), 2);
    }

    #[tokio::test]
    async fn test_subscription_sees_subtree_changes() {
        let table = MemoryTable::new();
        table.write("favorites/1", json!({"id": "1"})).await.unwrap();

        let mut subscription = table.subscribe("favorites").await.unwrap();
        let first = subscription.next().await.unwrap();
        assert!(matches!(first, TableEvent::Snapshot { value: Some(_), .. }));

        table.write("favorites/2", json!({"id": "2"})).await.unwrap();
        table.write("unrelated/x", json!(1)).await.unwrap();
        table.delete("favorites/1").await.unwrap();

        match subscription.next().await.unwrap() {
            TableEvent::Snapshot { value: Some(value), .. } => assert_eq!(value.as_object().unwrap().len(), 2),
            other => panic!("unexpected event: {:?}", other),
        }
        match subscription.next().await.unwrap() {
            TableEvent::Snapshot { value: Some(value), .. } => assert_eq!(value, json!({"2": {"id": "2"}})),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let table = MemoryTable::new();
        let subscription = table.subscribe("favorites").await.unwrap();
        assert_eq!(table.listener_count(), 1);

        drop(subscription);
        assert_eq!(table.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_calls_fail_transiently() {
        let table = MemoryTable::new();
        table.set_offline(true);

        let err = table.read("favorites").await.unwrap_err();
        assert!(err.is_transient());
        assert!(table.write("favorites/1", json!({})).await.is_err());

        table.set_offline(false);
        assert!(table.read("favorites").await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_listeners() {
        let table = MemoryTable::new();
        let mut subscription = table.subscribe("favorites").await.unwrap();
        table.fail_listeners("permission denied");

        let _initial = subscription.next().await.unwrap();
        assert_eq!(
            subscription.next().await.unwrap(),
            TableEvent::Failed("permission denied".to_string())
        );
        assert_eq!(subscription.next().await, None);
    }
}
