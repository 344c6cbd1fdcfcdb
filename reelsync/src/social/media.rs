use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::mpsc;

use super::{Applied, MutationResult, SocialLayer};
use crate::{
    blob::{BlobStorage, UploadProgress, media_path},
    errors::{MutationError, ValidationError, ValidationIssue},
    mirror::TIMESTAMP_FIELD,
    models::{MediaType, Story, client_timestamp},
    store::{DocumentFields, DocumentStore, FieldMutation},
    types::Collection,
};

/// Caption stored when the uploader leaves it blank.
pub const DEFAULT_CAPTION: &str = "No description";

pub const STORY_LIFETIME_HOURS: i64 = 24;

/// A media file handed over by the presentation layer.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Editable video fields. Everything else changes only through the named operations.
#[derive(Debug, Clone, Default)]
pub struct VideoEdit {
    pub caption: Option<String>,
    pub hashtags: Option<Vec<String>>,
}

/// Hashtags from a space-separated string: tokens starting with `#`, marker stripped.
pub fn parse_hashtags(raw: &str) -> Vec<String> {
    raw.split(' ')
        .map(str::trim)
        .filter_map(|token| token.strip_prefix('#'))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_upload(upload: &MediaUpload, accepts: impl Fn(&str) -> bool) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    if upload.bytes.is_empty() {
        issues.push(ValidationIssue::new("file", "empty", "file is empty"));
    }
    if upload.file_name.trim().is_empty() {
        issues.push(ValidationIssue::new("file_name", "required", "file name is required"));
    }
    if !accepts(&upload.content_type) {
        issues.push(ValidationIssue::new(
            "content_type",
            "unsupported",
            format!("content type '{}' is not accepted", upload.content_type),
        ));
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues))
    }
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    /// Upload a video and create its document. The uploader's display fields are copied
    /// from the users snapshot.
    pub async fn publish_video(
        &self,
        user_id: &str,
        upload: &MediaUpload,
        caption: &str,
        hashtags: &str,
        progress: Option<mpsc::UnboundedSender<UploadProgress>>,
    ) -> MutationResult {
        validate_upload(upload, |content_type| content_type.starts_with("video/"))?;

        let now = Utc::now();
        let path = media_path("videos", user_id, now.timestamp_millis(), &upload.file_name);
        let url = self.blobs.upload(&path, &upload.bytes, progress).await?;

        let (username, avatar) = self.author_fields(user_id);
        let caption = match caption.trim() {
            "" => DEFAULT_CAPTION,
            caption => caption,
        };
        let fields = DocumentFields::new()
            .set("userId", user_id)
            .set("username", username)
            .set("userAvatar", avatar)
            .set("url", url)
            .set("fileName", upload.file_name.as_str())
            .set("fileSize", upload.bytes.len() as u64)
            .set("fileType", upload.content_type.as_str())
            .set("caption", caption)
            .set("hashtags", parse_hashtags(hashtags))
            .set("likes", json!([]))
            .set("comments", json!([]))
            .set("reposts", json!([]))
            .set("views", 0)
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(now));
        let id = self.store().add_document(Collection::Videos, fields).await?;
        log::info!("video {id} published by {user_id}");
        Ok(Applied::created(id))
    }

    pub async fn update_video(&self, video_id: &str, edit: VideoEdit) -> MutationResult {
        let mut mutations = Vec::new();
        if let Some(caption) = edit.caption {
            mutations.push(FieldMutation::set("caption", caption));
        }
        if let Some(hashtags) = edit.hashtags {
            mutations.push(FieldMutation::set("hashtags", hashtags));
        }
        if mutations.is_empty() {
            return Err(MutationError::invalid("video edit changes nothing"));
        }
        self.store().update_document(Collection::Videos, video_id, mutations).await?;
        Ok(Applied::done())
    }

    /// Delete a video document. Its comments and the stored media are left in place.
    pub async fn delete_video(&self, video_id: &str) -> MutationResult {
        self.store().delete_document(Collection::Videos, video_id).await?;
        Ok(Applied::done())
    }

    /// Upload a story that expires after [`STORY_LIFETIME_HOURS`].
    pub async fn publish_story(
        &self,
        user_id: &str,
        upload: &MediaUpload,
        progress: Option<mpsc::UnboundedSender<UploadProgress>>,
    ) -> MutationResult {
        validate_upload(upload, |content_type| {
            content_type.starts_with("video/") || content_type.starts_with("image/")
        })?;

        let now = Utc::now();
        let path = media_path("stories", user_id, now.timestamp_millis(), &upload.file_name);
        let url = self.blobs.upload(&path, &upload.bytes, progress).await?;

        let (username, avatar) = self.author_fields(user_id);
        let media_type = MediaType::from_content_type(&upload.content_type);
        let fields = DocumentFields::new()
            .set("userId", user_id)
            .set("username", username)
            .set("userAvatar", avatar)
            .set("mediaUrl", url)
            .set("mediaType", media_type.as_str())
            .set("views", json!([]))
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(now))
            .set(
                "expiresAt",
                client_timestamp(now + Duration::hours(STORY_LIFETIME_HOURS)),
            );
        let id = self.store().add_document(Collection::Stories, fields).await?;
        Ok(Applied::created(id))
    }

    /// Stories whose expiry is still ahead of `now`, in feed order.
    pub fn active_stories(&self, now: DateTime<Utc>) -> Vec<Story> {
        self.snapshot(Collection::Stories)
            .decode_all::<Story>()
            .into_iter()
            .filter(|story| story.is_active(now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashtags_keep_only_marked_tokens() {
        assert_eq!(parse_hashtags("#dance fun #  #Summer2024 x#y"), ["dance", "Summer2024"]);
        assert!(parse_hashtags("").is_empty());
    }

    #[test]
    fn uploads_are_validated_before_anything_is_sent() {
        let upload = MediaUpload {
            file_name: "clip.txt".into(),
            content_type: "text/plain".into(),
            bytes: Vec::new(),
        };
        let err = validate_upload(&upload, |content_type| content_type.starts_with("video/")).unwrap_err();
        let fields: Vec<&str> = err.issues.iter().map(|issue| issue.field.as_str()).collect();
        assert_eq!(fields, ["file", "content_type"]);
    }
}
