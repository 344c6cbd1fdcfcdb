//! Example 01 – Live mirror
//!
//! Subscribes to the videos collection, watches full snapshots replace each other as
//! documents arrive, and stops the subscription.

use anyhow::Result;

use super::support::{self, Harness};
use crate::{
    mirror::TIMESTAMP_FIELD,
    store::CollectionQuery,
    types::{Collection, SortOrder},
};

/// Example 01 – full-snapshot subscriptions with idempotent stop.
pub async fn run() -> Result<()> {
    let harness = Harness::open("live_mirror").await?;
    let mut videos = harness
        .mirror
        .subscribe(CollectionQuery::ordered(Collection::Videos, TIMESTAMP_FIELD, SortOrder::Desc));

    let initial = videos.wait_until_loaded().await;
    assert!(initial.is_empty(), "fresh store starts empty");

    let first = harness.seed_video("ann", "first", &[]).await?;
    let second = harness.seed_video("ann", "second", &["intro"]).await?;

    // Every push carries the whole collection, newest first.
    let snapshot = support::next_matching(&mut videos, |snapshot| snapshot.len() == 2).await?;
    let ids: Vec<&str> = snapshot.documents().iter().map(|doc| doc.id.as_str()).collect();
    assert_eq!(ids, [second.as_str(), first.as_str()]);

    // Entries are the persisted fields with the id merged in.
    let entry = snapshot.get(&first).map(|doc| doc.to_value()).unwrap_or_default();
    assert_eq!(entry["id"], first.as_str());
    assert_eq!(entry["caption"], "first");

    // Older snapshots stay intact after replacement.
    assert!(initial.is_empty());

    videos.stop();
    videos.stop();
    assert!(videos.is_stopped());

    harness.cleanup().await
}
