//! Search, statistics and view counting over mirrored snapshots.

use std::time::Duration;

use reelsync::{
    Collection, MutationError, ViewTracker,
    examples::support::Harness,
    social::{NewProfile, VideoStats},
};

#[tokio::test]
async fn blank_search_returns_every_mirrored_document_in_order() {
    let harness = Harness::open("search_blank").await.expect("harness");
    harness.seed_user("ann", "ann").await.expect("seed ann");
    for caption in ["one", "two", "three"] {
        harness.seed_video("ann", caption, &[]).await.expect("seed video");
    }

    let snapshot = harness.mirror.snapshot(Collection::Videos);
    let found = harness.social.search_videos("   ");
    assert_eq!(found, snapshot.documents().to_vec());
    assert_eq!(harness.social.search_users("").len(), 1);
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn search_matches_captions_tags_names_and_emails() {
    let harness = Harness::open("search_match").await.expect("harness");
    harness.seed_user("ann", "AnnLee").await.expect("seed ann");
    harness.seed_user("bob", "bob").await.expect("seed bob");
    let beach = harness.seed_video("ann", "Sunset walk", &["Beach"]).await.expect("seed");
    harness.seed_video("bob", "cooking", &["food"]).await.expect("seed");

    let by_caption: Vec<String> = harness.social.search_videos("SUNSET").into_iter().map(|d| d.id).collect();
    let by_tag: Vec<String> = harness.social.search_videos("beach").into_iter().map(|d| d.id).collect();
    assert_eq!(by_caption, vec![beach.clone()]);
    assert_eq!(by_tag, vec![beach]);

    let by_name: Vec<String> = harness.social.search_users("annl").into_iter().map(|d| d.id).collect();
    let by_email: Vec<String> = harness.social.search_users("bob@EXAMPLE").into_iter().map(|d| d.id).collect();
    assert_eq!(by_name, vec!["ann".to_string()]);
    assert_eq!(by_email, vec!["bob".to_string()]);
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn stats_count_comments_from_the_comment_collection() {
    let harness = Harness::open("stats").await.expect("harness");
    harness.seed_user("ann", "ann").await.expect("seed ann");
    harness.seed_user("bob", "bob").await.expect("seed bob");
    let video_id = harness.seed_video("ann", "sunset", &[]).await.expect("seed video");

    harness.social.toggle_like(&video_id, "bob").await.expect("like");
    harness.social.toggle_repost(&video_id, "bob").await.expect("repost");
    harness.social.add_comment(&video_id, "bob", "first").await.expect("comment");
    harness.social.add_comment(&video_id, "ann", "thanks").await.expect("comment");
    harness
        .wait_for(Collection::Comments, |comments| comments.len() == 2)
        .await
        .expect("comments mirrored");

    let stats = harness.social.video_stats(&video_id).expect("stats");
    assert_eq!(
        stats,
        VideoStats {
            views: 0,
            likes: 1,
            comments: 2,
            reposts: 1,
            engagement: 400.0,
        }
    );
    assert!(harness.social.video_stats("missing").is_none());
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn views_are_counted_once_per_activation() {
    let harness = Harness::open("views").await.expect("harness");
    harness.seed_user("ann", "ann").await.expect("seed ann");
    let first = harness.seed_video("ann", "one", &[]).await.expect("seed");
    let second = harness.seed_video("ann", "two", &[]).await.expect("seed");

    let mut tracker = ViewTracker::new();
    let mut increments = Vec::new();
    for video in [&first, &first, &first, &second, &first] {
        increments.extend(tracker.activate(&harness.social, video));
    }
    assert_eq!(increments.len(), 3);
    for handle in increments {
        handle.await.expect("view task");
    }
    assert_eq!(tracker.active(), Some(first.as_str()));

    tracker.deactivate();
    let again = tracker.activate(&harness.social, &first).expect("reactivation counts");
    again.await.expect("view task");

    let views = harness
        .wait_for(Collection::Videos, |videos| {
            videos.get(&first).and_then(|doc| doc.get("views")) == Some(&serde_json::json!(3))
        })
        .await
        .expect("views mirrored");
    assert_eq!(views.get(&second).and_then(|doc| doc.get("views")), Some(&serde_json::json!(1)));
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn failed_view_increment_is_only_logged() {
    let harness = Harness::open("views_failure").await.expect("harness");
    harness.seed_user("ann", "ann").await.expect("seed ann");
    let video_id = harness.seed_video("ann", "one", &[]).await.expect("seed");
    harness.store.fail_next_update(Collection::Videos, video_id.clone(), "offline");

    let handle = harness.social.record_view(&video_id);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("view task finishes")
        .expect("view task does not panic");
    let video = harness.store.document(Collection::Videos, &video_id).expect("video");
    assert_eq!(video.get("views"), Some(&serde_json::json!(0)));

    let err = harness.social.increment_views("missing").await.expect_err("missing video");
    assert!(matches!(err, MutationError::NotFound { .. }));
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn profiles_require_a_valid_email() {
    let harness = Harness::open("profiles").await.expect("harness");
    let err = harness
        .social
        .create_profile(
            "ann",
            NewProfile {
                email: "not-an-email".to_string(),
                username: "ann".to_string(),
            },
        )
        .await
        .expect_err("invalid email");
    assert!(matches!(err, MutationError::Validation(_)));
    assert!(harness.store.document(Collection::Users, "ann").is_none());
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn playlists_keep_one_entry_per_video() {
    let harness = Harness::open("playlists").await.expect("harness");
    harness.seed_user("ann", "ann").await.expect("seed ann");
    let video_id = harness.seed_video("ann", "one", &[]).await.expect("seed");

    let blank = harness.social.create_playlist("ann", "  ", "").await.expect_err("blank name");
    assert!(matches!(blank, MutationError::InvalidRequest { .. }));

    let created = harness
        .social
        .create_playlist("ann", "Favourites", "best clips")
        .await
        .expect("create playlist");
    let playlist_id = created.created_id.expect("playlist id");
    for _ in 0..2 {
        harness
            .social
            .add_video_to_playlist(&playlist_id, &video_id)
            .await
            .expect("add video");
    }

    harness
        .wait_for(Collection::Playlists, |playlists| {
            playlists.get(&playlist_id).map(|doc| doc.array_len("videos")) == Some(1)
        })
        .await
        .expect("playlist mirrored");
    let owned = harness.social.playlists_of("ann");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].name, "Favourites");
    assert_eq!(owned[0].videos, vec![video_id]);
    assert!(harness.social.playlists_of("bob").is_empty());
    harness.cleanup().await.expect("cleanup");
}
