//! Social mutation layer.
//!
//! Every operation reads the mirror's current snapshot, issues the minimal store
//! mutations, and returns a tagged [`MutationResult`]. Local snapshots are never patched;
//! callers observe the effect on the mirror's next push.

mod comments;
mod media;
mod messaging;
mod notify;
mod playlists;
mod profile;
mod search;
mod stats;
mod toggle;
mod views;

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    blob::BlobStorage,
    errors::MutationError,
    mirror::Mirror,
    store::DocumentStore,
    types::{Collection, Snapshot},
};

pub use media::{MediaUpload, VideoEdit, parse_hashtags, DEFAULT_CAPTION, STORY_LIFETIME_HOURS};
pub use messaging::{ConversationDirectory, Inbox};
pub use notify::{comment_message, follow_message, like_message, truncate_preview, UNKNOWN_ACTOR};
pub use profile::{default_avatar_url, NewProfile, ProfileEdit};
pub use search::{search_users, search_videos};
pub use stats::{video_stats, VideoStats};
pub use toggle::{KeyedLedger, ToggleDirection, ToggleKey, ToggleLedger};
pub use views::ViewTracker;

/// Success half of a mutation's tagged result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    pub created_id: Option<String>,
    pub toggled: Option<ToggleDirection>,
}

impl Applied {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn created(id: impl Into<String>) -> Self {
        Self {
            created_id: Some(id.into()),
            toggled: None,
        }
    }

    pub fn toggled(direction: ToggleDirection) -> Self {
        Self {
            created_id: None,
            toggled: Some(direction),
        }
    }
}

pub type MutationResult = Result<Applied, MutationError>;

/// Tunables for the mutation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialSettings {
    /// Characters of comment text quoted in a comment notification.
    pub preview_chars: usize,
    /// Serialize toggles per (document, set, member) so a second toggle sees the first's outcome.
    pub serialize_toggles: bool,
    /// Upper bound on waiting for the mirror to reflect an acknowledged toggle.
    #[serde(with = "duration_millis", rename = "settle_timeout_ms")]
    pub settle_timeout: Duration,
}

impl Default for SocialSettings {
    fn default() -> Self {
        Self {
            preview_chars: 50,
            serialize_toggles: true,
            settle_timeout: Duration::from_secs(2),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Intention-revealing social operations over a mirrored document store.
pub struct SocialLayer<S: DocumentStore, B: BlobStorage> {
    mirror: Arc<Mirror<S>>,
    blobs: Arc<B>,
    settings: SocialSettings,
    ledger: ToggleLedger,
    conversations: Arc<ConversationDirectory>,
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    pub fn new(mirror: Arc<Mirror<S>>, blobs: Arc<B>, settings: SocialSettings) -> Self {
        Self {
            mirror,
            blobs,
            settings,
            ledger: ToggleLedger::default(),
            conversations: Arc::default(),
        }
    }

    pub fn mirror(&self) -> &Arc<Mirror<S>> {
        &self.mirror
    }

    pub fn settings(&self) -> &SocialSettings {
        &self.settings
    }

    fn store(&self) -> &S {
        self.mirror.store()
    }

    fn snapshot(&self, collection: Collection) -> Snapshot {
        self.mirror.snapshot(collection)
    }

    /// Username and avatar of `user_id` as currently mirrored, empty when unknown.
    fn author_fields(&self, user_id: &str) -> (String, String) {
        let users = self.snapshot(Collection::Users);
        let field = |name: &str| {
            users
                .get(user_id)
                .and_then(|user| user.str_field(name))
                .unwrap_or_default()
                .to_string()
        };
        (field("username"), field("avatar"))
    }

    /// Display name of `user_id` from the users snapshot.
    fn display_name(&self, user_id: &str) -> String {
        self.snapshot(Collection::Users)
            .get(user_id)
            .and_then(|user| user.str_field("username"))
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_ACTOR)
            .to_string()
    }
}
