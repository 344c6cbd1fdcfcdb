//! Example 06 – Media uploads, stories and search
//!
//! Uploads go to blob storage first; the returned locator is written into the video or
//! story document. Search and stats run over the mirrored snapshots only.

use anyhow::Result;
use chrono::{Duration, Utc};
use tokio::sync::mpsc;

use super::support::Harness;
use crate::{
    models::{MediaType, Video},
    social::{DEFAULT_CAPTION, MediaUpload, VideoEdit},
    types::Collection,
};

/// Example 06 – publish, edit, search and measure.
pub async fn run() -> Result<()> {
    let harness = Harness::open("media").await?;
    harness.seed_user("ann", "ann").await?;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let upload = MediaUpload {
        file_name: "dance.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        bytes: vec![0u8; 4096],
    };
    let published = harness
        .social
        .publish_video("ann", &upload, "  ", "#dance #Summer fun", Some(progress_tx))
        .await?;
    let video_id = published.created_id.unwrap_or_default();

    let mut last_percent = 0.0;
    while let Ok(progress) = progress_rx.try_recv() {
        last_percent = progress.percent();
    }
    assert_eq!(last_percent, 100.0);

    let videos = harness
        .wait_for(Collection::Videos, |videos| videos.get(&video_id).is_some())
        .await?;
    let video: Option<Video> = videos.find(&video_id);
    let video = video.ok_or_else(|| anyhow::anyhow!("published video missing from the mirror"))?;
    assert_eq!(video.caption, DEFAULT_CAPTION);
    assert_eq!(video.hashtags, ["dance", "Summer"]);
    assert_eq!(video.username, "ann");
    assert!(video.url.starts_with("file://"));

    harness
        .social
        .update_video(
            &video_id,
            VideoEdit {
                caption: Some("Summer dance".to_string()),
                hashtags: None,
            },
        )
        .await?;
    harness
        .wait_for(Collection::Videos, |videos| {
            videos.get(&video_id).and_then(|doc| doc.str_field("caption")) == Some("Summer dance")
        })
        .await?;

    assert_eq!(harness.social.search_videos("SUMMER").len(), 1);
    assert_eq!(harness.social.search_videos("").len(), 1);
    assert_eq!(harness.social.search_users("ANN@example").len(), 1);
    assert!(harness.social.search_users("nobody").is_empty());

    harness.social.increment_views(&video_id).await?;
    harness
        .social
        .toggle_like(&video_id, "ann")
        .await?;
    let stats = harness
        .social
        .video_stats(&video_id)
        .ok_or_else(|| anyhow::anyhow!("stats for a mirrored video"))?;
    assert_eq!(stats.views, 1);
    assert_eq!(stats.engagement, 100.0);

    let story = MediaUpload {
        file_name: "morning.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![1u8; 512],
    };
    harness.social.publish_story("ann", &story, None).await?;
    harness
        .wait_for(Collection::Stories, |stories| stories.len() == 1)
        .await?;
    let active = harness.social.active_stories(Utc::now());
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].media_type, MediaType::Image);
    assert!(harness.social.active_stories(Utc::now() + Duration::hours(25)).is_empty());

    harness.social.delete_video(&video_id).await?;
    harness
        .wait_for(Collection::Videos, |videos| videos.is_empty())
        .await?;

    harness.cleanup().await
}
