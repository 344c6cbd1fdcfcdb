use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{Applied, MutationResult, SocialLayer};
use crate::{
    blob::BlobStorage,
    errors::MutationError,
    models::{NotificationKind, ReactionKind},
    store::{DocumentStore, FieldMutation},
    types::{Collection, Document},
};

/// A membership set on one document, together with the member being toggled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToggleKey {
    pub collection: Collection,
    pub document: String,
    pub path: String,
    pub member: String,
}

impl ToggleKey {
    pub fn new(
        collection: Collection,
        document: impl Into<String>,
        path: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            collection,
            document: document.into(),
            path: path.into(),
            member: member.into(),
        }
    }

    fn mutation(&self, direction: ToggleDirection) -> FieldMutation {
        match direction {
            ToggleDirection::Added => FieldMutation::array_union(self.path.as_str(), self.member.as_str()),
            ToggleDirection::Removed => FieldMutation::array_remove(self.path.as_str(), self.member.as_str()),
        }
    }
}

impl fmt::Display for ToggleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.collection, self.document, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleDirection {
    Added,
    Removed,
}

impl ToggleDirection {
    fn leaves_member_present(self) -> bool {
        matches!(self, ToggleDirection::Added)
    }
}

/// Per-key request queue.
///
/// A caller holds its key's lock from the snapshot read until the mirror reflects the
/// acknowledged write (or the settle timeout passes), so a queued request on the same
/// key decides from the first one's outcome.
#[derive(Debug)]
pub struct KeyedLedger<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

/// Ledger keyed by (collection, document, set path, member).
pub type ToggleLedger = KeyedLedger<ToggleKey>;

impl<K> Default for KeyedLedger<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Clone + Eq + Hash> KeyedLedger<K> {
    pub async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Keys with a request in flight or queued.
    pub fn in_flight(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}

/// What a toggle did and the document it decided from.
struct ToggleOutcome {
    direction: ToggleDirection,
    observed: Document,
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    /// Like or unlike a video. A new like notifies the video's owner.
    pub async fn toggle_like(&self, video_id: &str, user_id: &str) -> MutationResult {
        let key = ToggleKey::new(Collection::Videos, video_id, "likes", user_id);
        let outcome = self.toggle(key, None).await?;
        if outcome.direction == ToggleDirection::Added
            && let Some(owner) = outcome.observed.str_field("userId")
        {
            let message = super::like_message(&self.display_name(user_id));
            self.fan_out(owner, user_id, NotificationKind::Like, message).await;
        }
        Ok(Applied::toggled(outcome.direction))
    }

    pub async fn toggle_repost(&self, video_id: &str, user_id: &str) -> MutationResult {
        let key = ToggleKey::new(Collection::Videos, video_id, "reposts", user_id);
        let outcome = self.toggle(key, None).await?;
        Ok(Applied::toggled(outcome.direction))
    }

    /// Add or remove a video from the user's favorites.
    pub async fn toggle_favorite(&self, video_id: &str, user_id: &str) -> MutationResult {
        let key = ToggleKey::new(Collection::Users, user_id, "favorites", video_id);
        let outcome = self.toggle(key, None).await?;
        Ok(Applied::toggled(outcome.direction))
    }

    pub async fn toggle_block(&self, user_id: &str, blocked_user_id: &str) -> MutationResult {
        let key = ToggleKey::new(Collection::Users, user_id, "blocked", blocked_user_id);
        let outcome = self.toggle(key, None).await?;
        Ok(Applied::toggled(outcome.direction))
    }

    /// Follow or unfollow `target_id`.
    ///
    /// Writes the target's `followers` then the actor's `following`. When the second
    /// write fails the first stays applied and the failure is reported as
    /// [`MutationError::PartialMutation`].
    pub async fn toggle_follow(&self, target_id: &str, user_id: &str) -> MutationResult {
        let key = ToggleKey::new(Collection::Users, target_id, "followers", user_id);
        let paired = ToggleKey::new(Collection::Users, user_id, "following", target_id);
        let outcome = self.toggle(key, Some(paired)).await?;
        if outcome.direction == ToggleDirection::Added {
            let message = super::follow_message(&self.display_name(user_id));
            self.fan_out(target_id, user_id, NotificationKind::Follow, message).await;
        }
        Ok(Applied::toggled(outcome.direction))
    }

    /// Toggle a reaction by name; names outside the closed reaction set are rejected
    /// before anything is read or written.
    pub async fn toggle_comment_reaction(&self, comment_id: &str, user_id: &str, reaction: &str) -> MutationResult {
        let kind = reaction.parse::<ReactionKind>().map_err(MutationError::invalid)?;
        self.toggle_reaction(comment_id, user_id, kind).await
    }

    pub async fn toggle_reaction(&self, comment_id: &str, user_id: &str, kind: ReactionKind) -> MutationResult {
        let key = ToggleKey::new(Collection::Comments, comment_id, kind.field_path(), user_id);
        let outcome = self.toggle(key, None).await?;
        Ok(Applied::toggled(outcome.direction))
    }

    async fn toggle(&self, key: ToggleKey, paired: Option<ToggleKey>) -> Result<ToggleOutcome, MutationError> {
        let _queued = if self.settings.serialize_toggles {
            Some(self.ledger.acquire(&key).await)
        } else {
            None
        };

        let snapshot = self.snapshot(key.collection);
        let observed = snapshot
            .get(&key.document)
            .cloned()
            .ok_or_else(|| MutationError::not_found(key.collection, key.document.as_str()))?;
        let direction = if observed.contains_member(&key.path, &key.member) {
            ToggleDirection::Removed
        } else {
            ToggleDirection::Added
        };

        self.store()
            .update_document(key.collection, &key.document, vec![key.mutation(direction)])
            .await?;
        log::debug!("{key}: {direction:?} {}", key.member);

        if let Some(paired) = paired
            && let Err(err) = self
                .store()
                .update_document(paired.collection, &paired.document, vec![paired.mutation(direction)])
                .await
        {
            log::error!("{paired} failed after {key} was applied: {err}");
            return Err(MutationError::PartialMutation {
                completed: vec![key.to_string()],
                failed: paired.to_string(),
                message: err.to_string(),
            });
        }

        if self.settings.serialize_toggles {
            self.settle(&key, direction).await;
        }
        Ok(ToggleOutcome { direction, observed })
    }

    /// Wait until the mirror's feed for the key's collection reflects `direction`.
    async fn settle(&self, key: &ToggleKey, direction: ToggleDirection) {
        let Some(mut feed) = self.mirror.feed(key.collection) else {
            return;
        };
        let expected = direction.leaves_member_present();
        let reflected = async {
            loop {
                let snapshot = feed.latest();
                match snapshot.get(&key.document) {
                    Some(doc) if doc.contains_member(&key.path, &key.member) != expected => {}
                    _ => return,
                }
                if feed.changed().await.is_none() {
                    return;
                }
            }
        };
        if tokio::time::timeout(self.settings.settle_timeout, reflected).await.is_err() {
            log::warn!("{key} not reflected by the mirror within {:?}", self.settings.settle_timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ledger_serializes_the_same_key() {
        let ledger = ToggleLedger::default();
        let key = ToggleKey::new(Collection::Videos, "v1", "likes", "u1");
        let first = ledger.acquire(&key).await;
        assert_eq!(ledger.in_flight(), 1);

        let blocked = tokio::time::timeout(std::time::Duration::from_millis(20), ledger.acquire(&key)).await;
        assert!(blocked.is_err());

        drop(first);
        let _second = ledger.acquire(&key).await;
        let other = ToggleKey::new(Collection::Videos, "v1", "likes", "u2");
        let _independent = ledger.acquire(&other).await;
        assert_eq!(ledger.in_flight(), 2);
    }

    #[test]
    fn key_renders_collection_document_and_path() {
        let key = ToggleKey::new(Collection::Comments, "c1", ReactionKind::Fire.field_path(), "u1");
        assert_eq!(key.to_string(), "comments/c1.reactions.fire");
    }
}
