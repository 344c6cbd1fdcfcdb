//! Example 05 – Comments and reactions
//!
//! Comments copy the author's display fields and notify the video owner with a short
//! preview. Reactions come from a closed set; anything else is rejected before a write.

use anyhow::Result;

use super::support::Harness;
use crate::{
    errors::MutationError,
    models::{Comment, ReactionKind},
    types::Collection,
};

/// Example 05 – comment previews and reaction toggles.
pub async fn run() -> Result<()> {
    let harness = Harness::open("comments").await?;
    harness.seed_user("ann", "ann").await?;
    harness.seed_user("bob", "bob").await?;
    let video_id = harness.seed_video("ann", "recipe", &["food"]).await?;

    let long_text = "x".repeat(80);
    let created = harness.social.add_comment(&video_id, "bob", &long_text).await?;
    let comment_id = created.created_id.unwrap_or_default();

    harness
        .wait_for(Collection::Notifications, |notifications| notifications.len() == 1)
        .await?;
    let notification = &harness.social.notifications_for("ann")[0];
    assert_eq!(
        notification.message,
        format!("bob commented on your video: \"{}...\"", "x".repeat(50))
    );

    let comments = harness
        .wait_for(Collection::Comments, |comments| comments.get(&comment_id).is_some())
        .await?;
    let comment: Option<Comment> = comments.find(&comment_id);
    assert!(comment.is_some_and(|comment| comment.username == "bob"));

    harness
        .social
        .toggle_comment_reaction(&comment_id, "ann", "fire")
        .await?;
    let comments = harness.mirror.snapshot(Collection::Comments);
    let comment: Option<Comment> = comments.find(&comment_id);
    assert!(comment.is_some_and(|comment| comment.reactions(ReactionKind::Fire) == ["ann"]));

    let writes = harness.store.write_count();
    let err = harness
        .social
        .toggle_comment_reaction(&comment_id, "ann", "thumbs")
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::InvalidRequest { .. }));
    assert_eq!(harness.store.write_count(), writes, "rejected reaction writes nothing");

    // Commenting on your own video stays quiet.
    harness.social.add_comment(&video_id, "ann", "thanks!").await?;
    harness
        .wait_for(Collection::Comments, |comments| comments.len() == 2)
        .await?;
    assert_eq!(harness.social.notifications_for("ann").len(), 1);
    assert_eq!(harness.social.comments_on(&video_id).len(), 2);

    harness.cleanup().await
}
