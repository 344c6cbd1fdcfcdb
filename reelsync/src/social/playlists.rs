use chrono::Utc;
use serde_json::json;

use super::{Applied, MutationResult, SocialLayer};
use crate::{
    blob::BlobStorage,
    errors::MutationError,
    mirror::TIMESTAMP_FIELD,
    models::{Playlist, client_timestamp},
    store::{DocumentFields, DocumentStore, FieldMutation},
    types::Collection,
};

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    pub async fn create_playlist(&self, user_id: &str, name: &str, description: &str) -> MutationResult {
        let name = name.trim();
        if name.is_empty() {
            return Err(MutationError::invalid("playlist name is required"));
        }
        let fields = DocumentFields::new()
            .set("name", name)
            .set("description", description)
            .set("userId", user_id)
            .set("videos", json!([]))
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(Utc::now()));
        let id = self.store().add_document(Collection::Playlists, fields).await?;
        Ok(Applied::created(id))
    }

    /// Add a video to a playlist; adding it twice keeps a single entry.
    pub async fn add_video_to_playlist(&self, playlist_id: &str, video_id: &str) -> MutationResult {
        self.store()
            .update_document(
                Collection::Playlists,
                playlist_id,
                vec![FieldMutation::array_union("videos", video_id)],
            )
            .await?;
        Ok(Applied::done())
    }

    pub fn playlists_of(&self, user_id: &str) -> Vec<Playlist> {
        self.snapshot(Collection::Playlists)
            .decode_all::<Playlist>()
            .into_iter()
            .filter(|playlist| playlist.user_id == user_id)
            .collect()
    }
}
