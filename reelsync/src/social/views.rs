use tokio::task::JoinHandle;

use super::{Applied, MutationResult, SocialLayer};
use crate::{
    blob::BlobStorage,
    store::{DocumentStore, FieldMutation},
    types::Collection,
};

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    pub async fn increment_views(&self, video_id: &str) -> MutationResult {
        self.store()
            .update_document(Collection::Videos, video_id, vec![FieldMutation::increment("views", 1)])
            .await?;
        Ok(Applied::done())
    }

    /// Count one view without waiting for the store. Failures are logged only.
    pub fn record_view(&self, video_id: &str) -> JoinHandle<()> {
        let store = self.mirror.store().clone();
        let video_id = video_id.to_string();
        tokio::spawn(async move {
            let increment = vec![FieldMutation::increment("views", 1)];
            if let Err(err) = store.update_document(Collection::Videos, &video_id, increment).await {
                log::warn!("view count for video {video_id} not recorded: {err}");
            }
        })
    }
}

/// Tracks which video is active in a viewing surface so that a view is counted once
/// per activation rather than once per playback loop.
#[derive(Debug, Default)]
pub struct ViewTracker {
    active: Option<String>,
}

impl ViewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Mark `video_id` active. Returns the spawned view increment when the video was not
    /// already the active one.
    pub fn activate<S: DocumentStore, B: BlobStorage>(
        &mut self,
        social: &SocialLayer<S, B>,
        video_id: &str,
    ) -> Option<JoinHandle<()>> {
        if self.active.as_deref() == Some(video_id) {
            return None;
        }
        self.active = Some(video_id.to_string());
        Some(social.record_view(video_id))
    }

    pub fn deactivate(&mut self) {
        self.active = None;
    }
}
