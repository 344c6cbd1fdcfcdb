//! Live mirror behavior against the in-memory store.

use std::{sync::Arc, time::Duration};

use reelsync::{
    Collection, CollectionQuery, DocumentFields, DocumentStore, MemoryStore, Mirror, SortOrder, Subscription,
    examples::support::next_matching,
    mirror::TIMESTAMP_FIELD,
};

fn newest_first() -> CollectionQuery {
    CollectionQuery::ordered(Collection::Videos, TIMESTAMP_FIELD, SortOrder::Desc)
}

fn ids(subscription: &Subscription) -> Vec<String> {
    subscription.latest().documents().iter().map(|doc| doc.id.clone()).collect()
}

async fn seed_videos(store: &MemoryStore, count: usize) -> Vec<String> {
    let mut seeded = Vec::new();
    for n in 0..count {
        let fields = DocumentFields::new()
            .set("userId", "ann")
            .set("caption", format!("video {n}"))
            .server_timestamp(TIMESTAMP_FIELD);
        seeded.push(store.add_document(Collection::Videos, fields).await.expect("seed video"));
    }
    seeded
}

#[tokio::test]
async fn client_side_order_matches_server_order() {
    let store = Arc::new(MemoryStore::new());
    seed_videos(&store, 5).await;
    let mirror = Mirror::new(store.clone());

    let mut server_sorted = mirror.subscribe(newest_first());
    let loaded = server_sorted.wait_until_loaded().await;
    let server_order = ids(&server_sorted);
    assert_eq!(server_order.len(), 5);

    // Losing the index mid-stream re-attaches the same subscription without the sort.
    store.disable_ordering(Collection::Videos);
    next_matching(&mut server_sorted, |snapshot| snapshot.revision() > loaded.revision())
        .await
        .expect("fallback snapshot");
    assert_eq!(ids(&server_sorted), server_order);

    // A subscription that starts after the index is gone falls back immediately.
    let mut fallback = mirror.subscribe(newest_first());
    fallback.wait_until_loaded().await;
    assert_eq!(ids(&fallback), server_order);
    assert!(!fallback.is_stopped());
}

#[tokio::test]
async fn fallback_keeps_ordering_new_documents() {
    let store = Arc::new(MemoryStore::new());
    store.disable_ordering(Collection::Videos);
    let mirror = Mirror::new(store.clone());
    let mut videos = mirror.subscribe(newest_first());
    videos.wait_until_loaded().await;

    let seeded = seed_videos(&store, 3).await;
    next_matching(&mut videos, |snapshot| snapshot.len() == 3)
        .await
        .expect("three videos");
    let expected: Vec<String> = seeded.into_iter().rev().collect();
    assert_eq!(ids(&videos), expected);
}

#[tokio::test]
async fn failed_subscription_keeps_serving_the_last_snapshot() {
    let store = Arc::new(MemoryStore::new());
    seed_videos(&store, 2).await;
    let mirror = Mirror::new(store.clone());
    mirror.open_feeds();
    let before = mirror.wait_until_loaded(Collection::Videos).await;
    assert_eq!(before.len(), 2);

    let mut feed = mirror.feed(Collection::Videos).expect("videos feed");
    store.break_listeners(Collection::Videos, "connection reset");
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        while feed.changed().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok(), "feed ends after the error");

    // Writes after the failure are not seen, but the last good snapshot is still served.
    seed_videos(&store, 1).await;
    let after = mirror.snapshot(Collection::Videos);
    assert_eq!(after.len(), 2);
    assert_eq!(after.revision(), before.revision());
    assert!(!feed.is_stopped());

    // Re-subscribing picks the collection up again.
    let mut fresh = mirror.resubscribe(Collection::Videos).expect("reopened feed");
    let reloaded = fresh.wait_until_loaded().await;
    assert_eq!(reloaded.len(), 3);
    assert!(feed.is_stopped(), "replaced feed is stopped");
}

#[tokio::test]
async fn subscription_that_never_loaded_serves_an_empty_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let mirror = Mirror::new(store.clone());
    let subscription = mirror.subscribe(CollectionQuery::all(Collection::Playlists));
    assert!(subscription.latest().is_empty());
    assert!(!subscription.latest().is_loaded());
    assert!(mirror.snapshot(Collection::Playlists).is_empty(), "feed not opened");
}

#[tokio::test]
async fn shutdown_releases_every_listener() {
    let store = Arc::new(MemoryStore::new());
    let mirror = Mirror::new(store.clone());
    mirror.open_feeds();
    let mut extra = mirror.subscribe(CollectionQuery::all(Collection::Messages));
    extra.wait_until_loaded().await;
    for collection in [Collection::Videos, Collection::Users, Collection::Stories] {
        mirror.wait_until_loaded(collection).await;
    }

    mirror.shutdown();
    mirror.shutdown();
    assert!(extra.is_stopped());
    assert!(extra.changed().await.is_none());

    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while store.listener_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(drained.is_ok(), "every store listener is detached");
}

#[tokio::test]
async fn dropping_the_mirror_stops_its_subscriptions() {
    let store = Arc::new(MemoryStore::new());
    let mirror = Mirror::new(store.clone());
    let subscription = mirror.subscribe(CollectionQuery::all(Collection::Users));
    drop(mirror);
    assert!(subscription.is_stopped());
}
