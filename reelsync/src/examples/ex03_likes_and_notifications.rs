//! Example 03 – Likes and notification fan-out
//!
//! A like toggles membership in the video's `likes` set and notifies the owner, unless
//! the owner liked their own video.

use anyhow::Result;

use super::support::Harness;
use crate::{
    models::{NotificationKind, Video},
    social::ToggleDirection,
    types::Collection,
};

/// Example 03 – like/unlike with owner notifications.
pub async fn run() -> Result<()> {
    let harness = Harness::open("likes").await?;
    harness.seed_user("ann", "ann").await?;
    harness.seed_user("bob", "bob").await?;
    let video_id = harness.seed_video("ann", "sunset", &["beach"]).await?;

    let liked = harness.social.toggle_like(&video_id, "bob").await?;
    assert_eq!(liked.toggled, Some(ToggleDirection::Added));

    // The toggle returns once the mirror reflects it.
    let videos = harness.mirror.snapshot(Collection::Videos);
    let video: Option<Video> = videos.find(&video_id);
    assert!(video.is_some_and(|video| video.is_liked_by("bob")));

    harness
        .wait_for(Collection::Notifications, |notifications| notifications.len() == 1)
        .await?;
    let inbox = harness.social.notifications_for("ann");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Like);
    assert_eq!(inbox[0].from_user_id, "bob");
    assert_eq!(inbox[0].message, "bob liked your video");
    assert!(!inbox[0].read);

    harness.social.mark_notification_read(&inbox[0].id).await?;
    harness
        .wait_for(Collection::Notifications, |notifications| {
            notifications.documents()[0].get("read") == Some(&serde_json::Value::Bool(true))
        })
        .await?;

    // Second toggle removes the like again.
    let unliked = harness.social.toggle_like(&video_id, "bob").await?;
    assert_eq!(unliked.toggled, Some(ToggleDirection::Removed));
    let videos = harness.mirror.snapshot(Collection::Videos);
    assert_eq!(videos.get(&video_id).map(|doc| doc.array_len("likes")), Some(0));

    // Liking your own video never notifies yourself.
    harness.social.toggle_like(&video_id, "ann").await?;
    assert_eq!(harness.social.notifications_for("ann").len(), 1);

    harness.cleanup().await
}
