use super::TableEvent;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

struct Watcher {
    path: Vec<String>,
    tx: mpsc::UnboundedSender<TableEvent>,
}

#[derive(Default)]
struct State {
    version: u64,
    watchers: Vec<Watcher>,
}

/// Change listeners for the in-process backends.
///
/// Callers must invoke `add` and `notify` while holding the lock that guards
/// their data, so that versions are handed out in mutation order.
#[derive(Default)]
pub(crate) struct Watchers {
    state: Mutex<State>,
}

impl Watchers {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a watcher and immediately queue the current value for it
    pub fn add(&self, path: Vec<String>, current: Option<Value>) -> mpsc::UnboundedReceiver<TableEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        state.version += 1;
        let version = state.version;
        // The receiver is still in hand, so this send cannot fail
        let _ = tx.send(TableEvent::Snapshot { version, value: current });
        state.watchers.push(Watcher { path, tx });
        rx
    }

    /// Push the value each related watcher now sees after a change at `changed`
    pub fn notify<F>(&self, changed: &[&str], lookup: F)
    where
        F: Fn(&[String]) -> Option<Value>,
    {
        let mut state = self.state();
        state.watchers.retain(|w| !w.tx.is_closed());
        if !state.watchers.iter().any(|w| super::tree::related(w.path.as_slice(), changed)) {
            return;
        }

        state.version += 1;
        let version = state.version;
        state.watchers.retain(|watcher| {
            if !super::tree::related(watcher.path.as_slice(), changed) {
                return true;
            }
            let value = lookup(&watcher.path);
            watcher.tx.send(TableEvent::Snapshot { version, value }).is_ok()
        });
    }

    /// Deliver a failure to every watcher and drop them all
    pub fn fail_all(&self, reason: &str) {
        let mut state = self.state();
        for watcher in state.watchers.drain(..) {
            let _ = watcher.tx.send(TableEvent::Failed(reason.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        let mut state = self.state();
        state.watchers.retain(|w| !w.tx.is_closed());
        state.watchers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_value_then_related_changes() {
        let watchers = Watchers::default();
        let mut rx = watchers.add(vec!["favorites".to_string()], None);

        watchers.notify(&["favorites", "1"], |_| Some(json!({"1": {}})));
        watchers.notify(&["other"], |_| Some(json!("ignored")));

        assert_eq!(rx.try_recv().unwrap(), TableEvent::Snapshot { version: 1, value: None });
        assert_eq!(
            rx.try_recv().unwrap(),
            TableEvent::Snapshot { version: 2, value: Some(json!({"1": {}})) }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_watchers_are_pruned() {
        let watchers = Watchers::default();
        let rx = watchers.add(vec!["favorites".to_string()], None);
        assert_eq!(watchers.len(), 1);

        drop(rx);
        assert_eq!(watchers.len(), 0);
    }

    #[test]
    fn test_fail_all() {
        let watchers = Watchers::default();
        let mut rx = watchers.add(vec!["favorites".to_string()], None);
        watchers.fail_all("connection lost");

        let _initial = rx.try_recv().unwrap();
        assert_eq!(rx.try_recv().unwrap(), TableEvent::Failed("connection lost".to_string()));
        assert_eq!(watchers.len(), 0);
    }
}
