use chrono::Utc;

use super::{Applied, MutationResult, SocialLayer};
use crate::{
    blob::BlobStorage,
    errors::MutationError,
    mirror::TIMESTAMP_FIELD,
    models::{Notification, NotificationKind, client_timestamp},
    store::{DocumentFields, DocumentStore, FieldMutation},
    types::Collection,
};

/// Actor name used when the acting user is not in the users snapshot.
pub const UNKNOWN_ACTOR: &str = "Someone";

const ELLIPSIS: &str = "...";

/// First `max_chars` characters of `text`, with an ellipsis marker when anything was cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn like_message(actor: &str) -> String {
    format!("{actor} liked your video")
}

pub fn follow_message(actor: &str) -> String {
    format!("{actor} started following you")
}

pub fn comment_message(actor: &str, text: &str, preview_chars: usize) -> String {
    format!(
        "{actor} commented on your video: \"{}\"",
        truncate_preview(text, preview_chars)
    )
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    /// Create a notification for `recipient_id` about an action by `actor_id`.
    ///
    /// Users are never notified about their own actions.
    pub async fn add_notification(
        &self,
        recipient_id: &str,
        actor_id: &str,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> MutationResult {
        if recipient_id == actor_id {
            return Err(MutationError::invalid("notification recipient is the acting user"));
        }
        let fields = DocumentFields::new()
            .set("userId", recipient_id)
            .set("fromUserId", actor_id)
            .set("type", kind.as_str())
            .set("message", message.into())
            .set("read", false)
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(Utc::now()));
        let id = self.store().add_document(Collection::Notifications, fields).await?;
        Ok(Applied::created(id))
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> MutationResult {
        self.store()
            .update_document(
                Collection::Notifications,
                notification_id,
                vec![FieldMutation::set("read", true)],
            )
            .await?;
        Ok(Applied::done())
    }

    /// Notifications addressed to `user_id`, newest first.
    pub fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        self.snapshot(Collection::Notifications)
            .decode_all::<Notification>()
            .into_iter()
            .filter(|notification| notification.user_id == user_id)
            .collect()
    }

    /// Secondary step of a social action. The primary mutation has already committed, so
    /// a failure here is logged and swallowed.
    pub(super) async fn fan_out(&self, recipient_id: &str, actor_id: &str, kind: NotificationKind, message: String) {
        if recipient_id == actor_id {
            return;
        }
        if let Err(err) = self.add_notification(recipient_id, actor_id, kind, message).await {
            log::error!(
                "{} notification for {recipient_id} from {actor_id} failed: {err}",
                kind.as_str()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_is_cut_at_the_preview_length() {
        let text = "a".repeat(80);
        let preview = truncate_preview(&text, 50);
        assert_eq!(preview, format!("{}...", "a".repeat(50)));
    }

    #[test]
    fn short_text_is_kept_whole() {
        let text = "b".repeat(30);
        assert_eq!(truncate_preview(&text, 50), text);
        assert_eq!(truncate_preview(&"c".repeat(50), 50), "c".repeat(50));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(60);
        assert_eq!(truncate_preview(&text, 50).chars().count(), 53);
    }

    #[test]
    fn comment_message_quotes_the_preview() {
        assert_eq!(
            comment_message("ann", "nice", 50),
            "ann commented on your video: \"nice\""
        );
    }
}
