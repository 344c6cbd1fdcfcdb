//! Live collection mirror.
//!
//! Each subscription runs a pump task that drains the store's snapshot feed into a
//! `watch` channel. The channel value is replaced wholesale before receivers are woken,
//! so readers only ever see complete snapshots. When the store rejects a sorted query the
//! pump re-attaches without the sort and orders each snapshot itself.

pub mod ordering;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::watch;

use crate::{
    store::{CollectionQuery, DocumentStore, SnapshotFeed},
    types::{Collection, Snapshot, SortOrder},
};

/// Field carrying the server-assigned commit time on every document.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Queries opened by [`Mirror::open_feeds`] for the application collections.
pub fn default_queries() -> Vec<CollectionQuery> {
    vec![
        CollectionQuery::ordered(Collection::Videos, TIMESTAMP_FIELD, SortOrder::Desc),
        CollectionQuery::all(Collection::Users),
        CollectionQuery::ordered(Collection::Comments, TIMESTAMP_FIELD, SortOrder::Desc),
        CollectionQuery::ordered(Collection::Notifications, TIMESTAMP_FIELD, SortOrder::Desc),
        CollectionQuery::ordered(Collection::Stories, TIMESTAMP_FIELD, SortOrder::Desc),
        CollectionQuery::all(Collection::Playlists),
    ]
}

/// Idempotent stop switch shared by a subscription and its pump.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (signal, receiver) = watch::channel(false);
        (
            Self {
                signal: Arc::new(signal),
            },
            receiver,
        )
    }

    pub fn stop(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.signal.borrow()
    }
}

/// Handle on one open subscription.
///
/// Clones share the same snapshot and the same stop switch.
#[derive(Debug, Clone)]
pub struct Subscription {
    query: Arc<CollectionQuery>,
    snapshot: watch::Receiver<Snapshot>,
    stop: StopHandle,
}

impl Subscription {
    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }

    /// Most recent full snapshot; empty until the first push arrives.
    pub fn latest(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next snapshot. `None` once the subscription has ended; the last
    /// snapshot stays readable through [`latest`](Self::latest).
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.snapshot.changed().await.ok()?;
        Some(self.snapshot.borrow_and_update().clone())
    }

    /// Wait until at least one snapshot has been received (or the subscription ended).
    pub async fn wait_until_loaded(&mut self) -> Snapshot {
        let loaded = self
            .snapshot
            .wait_for(Snapshot::is_loaded)
            .await
            .map(|snapshot| snapshot.clone());
        loaded.unwrap_or_else(|_| self.latest())
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

#[derive(Default)]
struct Registry {
    feeds: HashMap<Collection, Subscription>,
    open: Vec<StopHandle>,
}

/// Owned store of mirrored collections.
pub struct Mirror<S: DocumentStore> {
    store: Arc<S>,
    registry: Mutex<Registry>,
}

impl<S: DocumentStore> Mirror<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a push subscription for `query`. Must be called inside a Tokio runtime.
    pub fn subscribe(&self, query: CollectionQuery) -> Subscription {
        let (publisher, snapshot) = watch::channel(Snapshot::default());
        let (stop, stop_signal) = StopHandle::new();
        tokio::spawn(pump(self.store.clone(), query.clone(), publisher, stop_signal));

        let mut registry = self.registry();
        registry.open.retain(|handle| !handle.is_stopped());
        registry.open.push(stop.clone());

        Subscription {
            query: Arc::new(query),
            snapshot,
            stop,
        }
    }

    /// Open the application feeds (videos, users, comments, notifications, stories, playlists).
    pub fn open_feeds(&self) {
        for query in default_queries() {
            self.open_feed(query);
        }
    }

    fn open_feed(&self, query: CollectionQuery) -> Subscription {
        let collection = query.collection;
        let subscription = self.subscribe(query);
        if let Some(previous) = self.registry().feeds.insert(collection, subscription.clone()) {
            previous.stop();
        }
        subscription
    }

    /// Replace the application feed for `collection` with a fresh subscription.
    pub fn resubscribe(&self, collection: Collection) -> Option<Subscription> {
        let query = self.registry().feeds.get(&collection)?.query().clone();
        Some(self.open_feed(query))
    }

    /// The application feed for `collection`, if open.
    pub fn feed(&self, collection: Collection) -> Option<Subscription> {
        self.registry().feeds.get(&collection).cloned()
    }

    /// Current snapshot of an application feed; empty when the feed is not open.
    pub fn snapshot(&self, collection: Collection) -> Snapshot {
        self.feed(collection).map(|feed| feed.latest()).unwrap_or_default()
    }

    pub async fn wait_until_loaded(&self, collection: Collection) -> Snapshot {
        match self.feed(collection) {
            Some(mut feed) => feed.wait_until_loaded().await,
            None => Snapshot::default(),
        }
    }

    /// Stop every subscription that is still open.
    pub fn shutdown(&self) {
        let mut registry = self.registry();
        for handle in registry.open.drain(..) {
            handle.stop();
        }
        registry.feeds.clear();
    }
}

impl<S: DocumentStore> Drop for Mirror<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn attach<S: DocumentStore>(store: &S, query: &CollectionQuery) -> Option<(SnapshotFeed, bool)> {
    match store.subscribe(query).await {
        Ok(feed) => Some((feed, false)),
        Err(err) if err.is_precondition() && query.order.is_some() => {
            log::warn!(
                "sorted subscription on {} rejected ({err}); ordering client-side",
                query.collection
            );
            attach_unordered(store, query).await.map(|feed| (feed, true))
        }
        Err(err) => {
            log::error!("subscription on {} failed: {err}", query.collection);
            None
        }
    }
}

async fn attach_unordered<S: DocumentStore>(store: &S, query: &CollectionQuery) -> Option<SnapshotFeed> {
    match store.subscribe(&query.unordered()).await {
        Ok(feed) => Some(feed),
        Err(err) => {
            log::error!("fallback subscription on {} failed: {err}", query.collection);
            None
        }
    }
}

async fn pump<S: DocumentStore>(
    store: Arc<S>,
    query: CollectionQuery,
    publisher: watch::Sender<Snapshot>,
    mut stop: watch::Receiver<bool>,
) {
    let collection = query.collection;
    let attached = tokio::select! {
        _ = stop.wait_for(|stopped| *stopped) => None,
        attached = attach(store.as_ref(), &query) => attached,
    };
    let Some((mut feed, mut client_ordered)) = attached else {
        return;
    };

    loop {
        let event = tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => break,
            event = feed.next() => event,
        };

        match event {
            Some(Ok(mut documents)) => {
                if client_ordered && let Some(order) = &query.order {
                    ordering::sort_documents(&mut documents, order);
                }
                publisher.send_modify(|snapshot| {
                    *snapshot = Snapshot::new(snapshot.revision() + 1, documents);
                });
            }
            Some(Err(err)) if err.is_precondition() && !client_ordered && query.order.is_some() => {
                log::warn!("sorted subscription on {collection} rejected ({err}); ordering client-side");
                match attach_unordered(store.as_ref(), &query).await {
                    Some(fallback) => {
                        feed = fallback;
                        client_ordered = true;
                    }
                    None => break,
                }
            }
            Some(Err(err)) => {
                log::error!("subscription on {collection} failed: {err}; keeping last snapshot");
                break;
            }
            None => {
                log::debug!("store closed the {collection} listener");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentFields, MemoryStore};

    #[tokio::test]
    async fn stop_is_idempotent_and_detaches_the_listener() {
        let store = Arc::new(MemoryStore::new());
        let mirror = Mirror::new(store.clone());
        let mut sub = mirror.subscribe(CollectionQuery::all(Collection::Users));
        sub.wait_until_loaded().await;
        assert_eq!(store.listener_count(), 1);

        sub.stop();
        sub.stop();
        assert!(sub.is_stopped());
        assert!(sub.changed().await.is_none());
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn waiting_on_a_subscription_that_ended_unloaded_returns_the_empty_snapshot() {
        let (publisher, snapshot) = watch::channel(Snapshot::default());
        let (stop, _signal) = StopHandle::new();
        let mut sub = Subscription {
            query: Arc::new(CollectionQuery::all(Collection::Users)),
            snapshot,
            stop,
        };
        drop(publisher);

        let loaded = sub.wait_until_loaded().await;
        assert!(!loaded.is_loaded());
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_every_open_subscription() {
        let store = Arc::new(MemoryStore::new());
        let mirror = Mirror::new(store.clone());
        mirror.open_feeds();
        let extra = mirror.subscribe(CollectionQuery::all(Collection::Messages));
        mirror.wait_until_loaded(Collection::Videos).await;

        mirror.shutdown();
        assert!(extra.is_stopped());
        assert!(mirror.feed(Collection::Videos).is_none());
    }

    #[tokio::test]
    async fn snapshots_are_replaced_and_revisions_advance() {
        let store = Arc::new(MemoryStore::new());
        let mirror = Mirror::new(store.clone());
        let mut sub = mirror.subscribe(CollectionQuery::all(Collection::Users));
        let first = sub.wait_until_loaded().await;
        assert_eq!(first.revision(), 1);

        store
            .set_document(Collection::Users, "u1", DocumentFields::new().set("username", "ann"))
            .await
            .unwrap();
        let second = sub.changed().await.unwrap();
        assert_eq!(second.revision(), 2);
        assert_eq!(second.len(), 1);
        assert!(first.is_empty());
    }
}
