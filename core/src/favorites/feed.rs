use crate::models::FavoritesSnapshot;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// What an observer receives
#[derive(Debug, Clone, PartialEq)]
pub enum FavoritesUpdate {
    /// The complete, sorted favorites table as of the latest change
    Snapshot(FavoritesSnapshot),
    /// The shared listener failed; no snapshots follow until someone
    /// subscribes again
    Failed(String),
}

type Callback = Arc<dyn Fn(&FavoritesUpdate) + Send + Sync>;

struct Observer {
    callback: Callback,
    /// Sequence number of the newest snapshot handed to this observer
    delivered: AtomicU64,
}

#[derive(Default)]
struct FeedState {
    /// Bumped by `clear`; pushes from an older listener are ignored
    generation: u64,
    next_id: u64,
    sequence: u64,
    observers: BTreeMap<u64, Arc<Observer>>,
    latest: Option<(u64, FavoritesSnapshot)>,
}

/// Observer registry plus the cached snapshot, shared between the store and
/// its listener task.
#[derive(Default)]
pub(crate) struct Feed {
    state: Mutex<FeedState>,
}

impl Feed {
    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(self: &Arc<Self>, callback: Callback) -> SubscriptionHandle {
        let observer = Arc::new(Observer {
            callback,
            delivered: AtomicU64::new(0),
        });

        let (id, latest) = {
            let mut state = self.state();
            state.next_id += 1;
            let id = state.next_id;
            state.observers.insert(id, Arc::clone(&observer));
            (id, state.latest.clone())
        };

        if let Some((sequence, snapshot)) = latest {
            self.deliver(id, &observer, sequence, &FavoritesUpdate::Snapshot(snapshot));
        }

        SubscriptionHandle {
            id,
            feed: Arc::downgrade(self),
        }
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Cache `snapshot` and fan it out in registration order
    pub fn publish(&self, generation: u64, snapshot: FavoritesSnapshot) {
        let (sequence, observers) = {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            state.sequence += 1;
            let sequence = state.sequence;
            state.latest = Some((sequence, snapshot.clone()));
            (sequence, Self::ordered(&state))
        };

        let update = FavoritesUpdate::Snapshot(snapshot);
        for (id, observer) in observers {
            self.deliver(id, &observer, sequence, &update);
        }
    }

    /// Tell every observer the listener is gone and forget its snapshot
    pub fn fail(&self, generation: u64, reason: &str) {
        let observers = {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            state.latest = None;
            Self::ordered(&state)
        };
        let update = FavoritesUpdate::Failed(reason.to_string());
        for (id, observer) in observers {
            if self.is_registered(id) {
                (observer.callback)(&update);
            }
        }
    }

    fn ordered(state: &FeedState) -> Vec<(u64, Arc<Observer>)> {
        state
            .observers
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect()
    }

    /// Invoke one observer unless it was cancelled or already saw something newer
    fn deliver(&self, id: u64, observer: &Observer, sequence: u64, update: &FavoritesUpdate) {
        if !self.is_registered(id) {
            return;
        }
        if observer.delivered.fetch_max(sequence, Ordering::SeqCst) >= sequence {
            return;
        }
        (observer.callback)(update);
    }

    fn is_registered(&self, id: u64) -> bool {
        self.state().observers.contains_key(&id)
    }

    pub fn cancel(&self, id: u64) -> bool {
        self.state().observers.remove(&id).is_some()
    }

    /// Drop every observer and the cached snapshot
    pub fn clear(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.observers.clear();
        state.latest = None;
    }

    pub fn latest(&self) -> Option<FavoritesSnapshot> {
        self.state().latest.as_ref().map(|(_, snapshot)| snapshot.clone())
    }

    pub fn len(&self) -> usize {
        self.state().observers.len()
    }
}

/// Registration of one observer. Cancelling it leaves every other observer
/// and the shared listener untouched; dropping it without cancelling keeps
/// the observer registered.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
    feed: Weak<Feed>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deregister this observer. Safe to call repeatedly, from any thread,
    /// and from inside the observer's own callback.
    pub fn cancel(&self) {
        if let Some(feed) = self.feed.upgrade() {
            if feed.cancel(self.id) {
                tracing::debug!(observer = self.id, "favorites observer cancelled");
            }
        }
    }

    /// Whether the observer is still registered
    pub fn is_active(&self) -> bool {
        self.feed
            .upgrade()
            .is_some_and(|feed| feed.is_registered(self.id))
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed").field("observers", &self.len()).finish()
    }
}
