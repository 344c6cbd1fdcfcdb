//! Notification fan-out attached to likes, follows and comments.

use reelsync::{
    Collection, MutationError, ToggleDirection,
    examples::support::Harness,
    models::NotificationKind,
};

async fn ann_and_bob(label: &str) -> anyhow::Result<(Harness, String)> {
    let harness = Harness::open(label).await?;
    harness.seed_user("ann", "ann").await?;
    harness.seed_user("bob", "bob").await?;
    let video_id = harness.seed_video("ann", "sunset", &["beach"]).await?;
    Ok((harness, video_id))
}

fn notification_messages(harness: &Harness) -> Vec<String> {
    harness
        .store
        .documents(Collection::Notifications)
        .iter()
        .filter_map(|doc| doc.str_field("message").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn self_actions_never_notify() {
    let (harness, video_id) = ann_and_bob("notify_self").await.expect("harness");

    harness.social.toggle_like(&video_id, "ann").await.expect("self like");
    harness.social.add_comment(&video_id, "ann", "mine").await.expect("self comment");
    let follow = harness.social.toggle_follow("ann", "ann").await.expect("self follow");
    assert_eq!(follow.toggled, Some(ToggleDirection::Added));

    assert!(harness.store.documents(Collection::Notifications).is_empty());
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn direct_self_notification_is_rejected() {
    let harness = Harness::open("notify_reject").await.expect("harness");
    let err = harness
        .social
        .add_notification("ann", "ann", NotificationKind::Like, "ann liked your video")
        .await
        .expect_err("self notification");
    assert!(matches!(err, MutationError::InvalidRequest { .. }));
    assert_eq!(harness.store.write_count(), 0);
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn each_action_notifies_the_owner_once() {
    let (harness, video_id) = ann_and_bob("notify_each").await.expect("harness");

    harness.social.toggle_like(&video_id, "bob").await.expect("like");
    harness.social.toggle_follow("ann", "bob").await.expect("follow");
    harness.social.add_comment(&video_id, "bob", "great shot").await.expect("comment");
    // Removing a like or a follow sends nothing.
    harness.social.toggle_like(&video_id, "bob").await.expect("unlike");
    harness.social.toggle_follow("ann", "bob").await.expect("unfollow");
    // Reposts never notify.
    harness.social.toggle_repost(&video_id, "bob").await.expect("repost");

    let mut messages = notification_messages(&harness);
    messages.sort();
    assert_eq!(
        messages,
        vec![
            "bob commented on your video: \"great shot\"".to_string(),
            "bob liked your video".to_string(),
            "bob started following you".to_string(),
        ]
    );
    for doc in harness.store.documents(Collection::Notifications) {
        assert_eq!(doc.str_field("userId"), Some("ann"));
        assert_eq!(doc.str_field("fromUserId"), Some("bob"));
        assert_eq!(doc.get("read"), Some(&serde_json::Value::Bool(false)));
        assert!(doc.get("timestamp").is_some_and(serde_json::Value::is_number));
    }
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn comment_previews_are_cut_at_fifty_characters() {
    let (harness, video_id) = ann_and_bob("notify_preview").await.expect("harness");

    let long = "y".repeat(80);
    let short = "z".repeat(30);
    harness.social.add_comment(&video_id, "bob", &long).await.expect("long comment");
    harness.social.add_comment(&video_id, "bob", &short).await.expect("short comment");

    let messages = notification_messages(&harness);
    assert!(messages.contains(&format!("bob commented on your video: \"{}...\"", "y".repeat(50))));
    assert!(messages.contains(&format!("bob commented on your video: \"{short}\"")));
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn failed_notification_does_not_fail_the_like() {
    let (harness, video_id) = ann_and_bob("notify_failure").await.expect("harness");
    harness
        .store
        .fail_next_add(Collection::Notifications, "quota exceeded");

    let applied = harness.social.toggle_like(&video_id, "bob").await.expect("like succeeds");
    assert_eq!(applied.toggled, Some(ToggleDirection::Added));
    let video = harness.store.document(Collection::Videos, &video_id).expect("video");
    assert!(video.contains_member("likes", "bob"));
    assert!(harness.store.documents(Collection::Notifications).is_empty());
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn unknown_actor_is_named_someone() {
    let harness = Harness::open("notify_unknown").await.expect("harness");
    harness.seed_user("ann", "ann").await.expect("seed ann");
    let video_id = harness.seed_video("ann", "sunset", &[]).await.expect("seed video");

    harness.social.toggle_like(&video_id, "ghost").await.expect("like");
    assert_eq!(notification_messages(&harness), vec!["Someone liked your video".to_string()]);
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn marking_read_is_visible_through_the_mirror() {
    let (harness, video_id) = ann_and_bob("notify_read").await.expect("harness");
    harness.social.toggle_like(&video_id, "bob").await.expect("like");
    harness
        .wait_for(Collection::Notifications, |notifications| notifications.len() == 1)
        .await
        .expect("notification mirrored");

    let id = harness.social.notifications_for("ann")[0].id.clone();
    harness.social.mark_notification_read(&id).await.expect("mark read");
    harness
        .wait_for(Collection::Notifications, |notifications| {
            notifications.get(&id).and_then(|doc| doc.get("read")) == Some(&serde_json::Value::Bool(true))
        })
        .await
        .expect("read flag mirrored");
    assert!(harness.social.notifications_for("bob").is_empty());
    harness.cleanup().await.expect("cleanup");
}
