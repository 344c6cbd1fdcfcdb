//! Example 04 – Follow graph
//!
//! Following writes two documents: the target's `followers` and the actor's
//! `following`. A failure between the two writes is reported as a partial mutation.

use anyhow::Result;

use super::support::Harness;
use crate::{errors::MutationError, models::User, types::Collection};

/// Example 04 – paired follow/unfollow and partial failures.
pub async fn run() -> Result<()> {
    let harness = Harness::open("follow_graph").await?;
    harness.seed_user("ann", "ann").await?;
    harness.seed_user("bob", "bob").await?;

    harness.social.toggle_follow("ann", "bob").await?;
    let users = harness
        .wait_for(Collection::Users, |users| {
            users.get("bob").is_some_and(|bob| bob.contains_member("following", "ann"))
        })
        .await?;
    let ann: Option<User> = users.find("ann");
    assert!(ann.is_some_and(|ann| ann.followers == ["bob"]));

    harness
        .wait_for(Collection::Notifications, |notifications| notifications.len() == 1)
        .await?;
    assert_eq!(harness.social.notifications_for("ann")[0].message, "bob started following you");

    // Unfollow reverses both sides.
    harness.social.toggle_follow("ann", "bob").await?;
    harness
        .wait_for(Collection::Users, |users| {
            users.get("bob").is_some_and(|bob| bob.array_len("following") == 0)
        })
        .await?;

    // The actor's side fails: the target keeps the new follower and the caller is told.
    harness.store.fail_next_update(Collection::Users, "bob", "deadline exceeded");
    let err = harness.social.toggle_follow("ann", "bob").await.unwrap_err();
    match err {
        MutationError::PartialMutation { completed, failed, .. } => {
            assert_eq!(completed, ["users/ann.followers"]);
            assert_eq!(failed, "users/bob.following");
        }
        other => anyhow::bail!("expected a partial mutation, got {other}"),
    }
    let users = harness
        .wait_for(Collection::Users, |users| {
            users.get("ann").is_some_and(|ann| ann.contains_member("followers", "bob"))
        })
        .await?;
    assert_eq!(users.get("bob").map(|bob| bob.array_len("following")), Some(0));

    harness.cleanup().await
}
