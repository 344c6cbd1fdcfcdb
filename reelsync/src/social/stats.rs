use serde::Serialize;
use serde_json::Value;

use super::SocialLayer;
use crate::{
    blob::BlobStorage,
    store::DocumentStore,
    types::{Collection, Snapshot},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStats {
    pub views: u64,
    pub likes: usize,
    pub comments: usize,
    pub reposts: usize,
    /// `(likes + comments + reposts) / max(views, 1) * 100`.
    pub engagement: f64,
}

/// Derived statistics for `video_id`, or `None` when the video is not mirrored.
///
/// Comments are counted from the comments snapshot, not the video's cached list.
pub fn video_stats(videos: &Snapshot, comments: &Snapshot, video_id: &str) -> Option<VideoStats> {
    let video = videos.get(video_id)?;
    let views = video.get("views").and_then(Value::as_u64).unwrap_or_default();
    let likes = video.array_len("likes");
    let reposts = video.array_len("reposts");
    let comments = comments
        .documents()
        .iter()
        .filter(|comment| comment.str_field("videoId") == Some(video_id))
        .count();

    let interactions = (likes + comments + reposts) as f64;
    let engagement = interactions / views.max(1) as f64 * 100.0;
    Some(VideoStats {
        views,
        likes,
        comments,
        reposts,
        engagement,
    })
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    pub fn video_stats(&self, video_id: &str) -> Option<VideoStats> {
        video_stats(
            &self.snapshot(Collection::Videos),
            &self.snapshot(Collection::Comments),
            video_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn zero_views_count_as_one() {
        let videos = Snapshot::new(1, vec![doc("v1", json!({"views": 0, "likes": ["a", "b"], "reposts": ["c"]}))]);
        let comments = Snapshot::new(
            1,
            vec![doc("c1", json!({"videoId": "v1"})), doc("c2", json!({"videoId": "v2"}))],
        );
        let stats = video_stats(&videos, &comments, "v1").unwrap();
        assert_eq!(stats.comments, 1);
        assert!(stats.engagement.is_finite());
        assert_eq!(stats.engagement, 400.0);
    }

    #[test]
    fn engagement_scales_with_views() {
        let videos = Snapshot::new(1, vec![doc("v1", json!({"views": 200, "likes": ["a"]}))]);
        let stats = video_stats(&videos, &Snapshot::default(), "v1").unwrap();
        assert_eq!(stats.engagement, 0.5);
    }

    #[test]
    fn unknown_video_has_no_stats() {
        assert!(video_stats(&Snapshot::default(), &Snapshot::default(), "nope").is_none());
    }
}
