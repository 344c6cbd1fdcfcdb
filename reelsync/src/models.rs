//! Typed views over mirrored documents.
//!
//! Field names follow the persisted camelCase schema. Sets are stored as arrays and
//! default to empty when a document predates the field.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Client-assigned creation timestamp as persisted in `createdAt`.
pub fn client_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_avatar: String,
    pub url: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub likes: Vec<String>,
    /// Denormalized and never authoritative; count comments by `videoId` instead.
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub reposts: Vec<String>,
    #[serde(default)]
    pub views: u64,
    /// Server-assigned epoch milliseconds, `None` while the write is pending.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Video {
    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    pub fn has_blocked(&self, user_id: &str) -> bool {
        self.blocked.iter().any(|id| id == user_id)
    }
}

/// Closed set of reactions a comment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Heart,
    Fire,
    Smile,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 4] = [
        ReactionKind::Like,
        ReactionKind::Heart,
        ReactionKind::Fire,
        ReactionKind::Smile,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Heart => "heart",
            ReactionKind::Fire => "fire",
            ReactionKind::Smile => "smile",
        }
    }

    /// Field path of this reaction's member set on a comment document.
    pub fn field_path(self) -> String {
        format!("reactions.{}", self.as_str())
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReactionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown reaction kind '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub user_id: String,
    /// Author display fields copied at post time; later profile edits do not reach them.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    pub text: String,
    #[serde(default)]
    pub reactions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Comment {
    pub fn reactions(&self, kind: ReactionKind) -> &[String] {
        self.reactions.get(kind.as_str()).map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Follow => "follow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Recipient.
    pub user_id: String,
    /// Actor.
    pub from_user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

impl MediaType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Image => "image",
        }
    }

    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video/") {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_avatar: String,
    pub media_url: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub views: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub expires_at: String,
}

impl Story {
    /// Stories are never deleted; consumers filter on the computed expiry instead.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => expires.with_timezone(&Utc) > now,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub user_id: String,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub last_message_time: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Conversation {
    pub fn involves(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }

    /// The participant that is not `me`, for a well-formed two-party conversation.
    pub fn other_participant(&self, me: &str) -> Option<&str> {
        if self.participants.len() != 2 {
            return None;
        }
        self.participants.iter().map(String::as_str).find(|id| *id != me)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn unknown_reaction_kind_is_rejected() {
        assert_eq!("fire".parse::<ReactionKind>(), Ok(ReactionKind::Fire));
        assert!("thumbs".parse::<ReactionKind>().is_err());
        assert!("Fire".parse::<ReactionKind>().is_err());
    }

    #[test]
    fn video_decodes_with_missing_sets() {
        let video: Video = serde_json::from_value(json!({
            "id": "v1",
            "userId": "u1",
            "url": "file:///v1.mp4",
        }))
        .unwrap();
        assert!(video.likes.is_empty());
        assert_eq!(video.views, 0);
        assert_eq!(video.timestamp, None);
    }

    #[test]
    fn story_expiry_is_computed_from_expires_at() {
        let now = Utc::now();
        let story = Story {
            id: "s1".into(),
            user_id: "u1".into(),
            username: String::new(),
            user_avatar: String::new(),
            media_url: "file:///s1.jpg".into(),
            media_type: MediaType::Image,
            views: Vec::new(),
            timestamp: None,
            created_at: None,
            expires_at: client_timestamp(now + Duration::hours(24)),
        };
        assert!(story.is_active(now));
        assert!(!story.is_active(now + Duration::hours(25)));
    }

    #[test]
    fn other_participant_requires_a_pair() {
        let conversation = Conversation {
            id: "c1".into(),
            participants: vec!["a".into(), "b".into()],
            last_message: String::new(),
            last_message_time: None,
            created_at: None,
        };
        assert_eq!(conversation.other_participant("a"), Some("b"));

        let crowded = Conversation {
            participants: vec!["a".into(), "b".into(), "c".into()],
            ..conversation
        };
        assert_eq!(crowded.other_participant("a"), None);
    }
}
