use chrono::Utc;
use serde_json::json;

use super::{Applied, MutationResult, SocialLayer, UNKNOWN_ACTOR, comment_message};
use crate::{
    blob::BlobStorage,
    errors::MutationError,
    mirror::TIMESTAMP_FIELD,
    models::{Comment, NotificationKind, client_timestamp},
    store::{DocumentFields, DocumentStore},
    types::Collection,
};

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    /// Post a comment. The author's username and avatar are copied onto the comment as
    /// they are now; later profile edits do not reach existing comments.
    pub async fn add_comment(&self, video_id: &str, user_id: &str, text: &str) -> MutationResult {
        if text.trim().is_empty() {
            return Err(MutationError::invalid("comment text is empty"));
        }
        let (username, avatar) = self.author_fields(user_id);
        let fields = DocumentFields::new()
            .set("videoId", video_id)
            .set("userId", user_id)
            .set("username", username.as_str())
            .set("avatar", avatar)
            .set("text", text)
            .set("reactions", json!({}))
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(Utc::now()));
        let id = self.store().add_document(Collection::Comments, fields).await?;

        let owner = self
            .snapshot(Collection::Videos)
            .get(video_id)
            .and_then(|video| video.str_field("userId").map(str::to_string));
        if let Some(owner) = owner {
            let actor = if username.is_empty() { UNKNOWN_ACTOR } else { username.as_str() };
            let message = comment_message(actor, text, self.settings.preview_chars);
            self.fan_out(&owner, user_id, NotificationKind::Comment, message).await;
        }
        Ok(Applied::created(id))
    }

    /// Comments on `video_id`, newest first.
    pub fn comments_on(&self, video_id: &str) -> Vec<Comment> {
        self.snapshot(Collection::Comments)
            .decode_all::<Comment>()
            .into_iter()
            .filter(|comment| comment.video_id == video_id)
            .collect()
    }
}
