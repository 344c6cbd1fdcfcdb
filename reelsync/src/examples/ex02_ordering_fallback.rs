//! Example 02 – Ordering fallback
//!
//! The store refuses sorted queries on videos (as when a composite index is missing).
//! The mirror re-attaches without the sort and orders each snapshot itself, so readers
//! get the same shape and order either way.

use anyhow::Result;

use super::support::Harness;
use crate::{store::MemoryStore, types::Collection};

/// Example 02 – transparent client-side ordering.
pub async fn run() -> Result<()> {
    let store = MemoryStore::new();
    store.disable_ordering(Collection::Videos);
    let harness = Harness::with_store("ordering_fallback", store).await?;

    let mut seeded = Vec::new();
    for caption in ["one", "two", "three"] {
        seeded.push(harness.seed_video("ann", caption, &[]).await?);
    }

    let snapshot = harness
        .wait_for(Collection::Videos, |videos| videos.len() == 3)
        .await?;
    let ids: Vec<String> = snapshot.documents().iter().map(|doc| doc.id.clone()).collect();
    seeded.reverse();
    assert_eq!(ids, seeded, "fallback keeps newest-first order");

    // Losing the index while subscribed switches paths without surfacing an error.
    let comments = harness.mirror.feed(Collection::Comments);
    harness.store.disable_ordering(Collection::Comments);
    let video = seeded[0].clone();
    harness.social.add_comment(&video, "ann", "still ordered").await?;
    let comments_snapshot = harness
        .wait_for(Collection::Comments, |comments| comments.len() == 1)
        .await?;
    assert_eq!(comments_snapshot.documents()[0].str_field("text"), Some("still ordered"));
    assert!(comments.is_some_and(|feed| !feed.is_stopped()));

    harness.cleanup().await
}
