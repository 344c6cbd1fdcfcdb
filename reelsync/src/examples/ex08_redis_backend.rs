//! Example 08 – Redis backend
//!
//! The same mirror and social layer over RedisJSON documents. Sorted feeds read through
//! RediSearch indexes; change events arrive over pub/sub. Requires a redis-stack
//! instance (`REDIS_URL`).

use anyhow::Result;

use super::support::{self, Harness};
use crate::{
    social::ToggleDirection,
    store::default_index_fields,
    types::Collection,
};

/// Example 08 – likes and notifications against Redis.
pub async fn run() -> Result<()> {
    let store = support::redis_store("redis_backend").await?;
    for collection in Collection::ALL {
        store.ensure_index(collection, &default_index_fields(collection)).await?;
    }

    let harness = Harness::with_store("redis_backend", store).await?;
    harness.seed_user("ann", "ann").await?;
    harness.seed_user("bob", "bob").await?;
    let video_id = harness.seed_video("ann", "skyline", &["city"]).await?;

    let liked = harness.social.toggle_like(&video_id, "bob").await?;
    assert_eq!(liked.toggled, Some(ToggleDirection::Added));
    harness
        .wait_for(Collection::Notifications, |notifications| notifications.len() == 1)
        .await?;

    let unliked = harness.social.toggle_like(&video_id, "bob").await?;
    assert_eq!(unliked.toggled, Some(ToggleDirection::Removed));
    harness
        .wait_for(Collection::Videos, |videos| {
            videos.get(&video_id).is_some_and(|video| video.array_len("likes") == 0)
        })
        .await?;

    harness.cleanup().await
}
