use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::Utc;
use serde_json::json;

use super::{Applied, KeyedLedger, MutationResult, SocialLayer};
use crate::{
    blob::BlobStorage,
    errors::MutationError,
    mirror::{Mirror, Subscription, TIMESTAMP_FIELD},
    models::{Conversation, client_timestamp},
    store::{CollectionQuery, DocumentFields, DocumentStore, FieldMutation},
    types::{Collection, SortOrder},
};

const LAST_MESSAGE_TIME_FIELD: &str = "lastMessageTime";

/// Unordered pair of participant ids.
type ParticipantPair = (String, String);

fn participant_pair(a: &str, b: &str) -> ParticipantPair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Two-party conversations opened through one social layer, shared by all its inboxes.
///
/// Sends between the same two users queue on the pair, and a conversation created by
/// one send is remembered until the sender's inbox mirrors it.
#[derive(Debug, Default)]
pub struct ConversationDirectory {
    sends: KeyedLedger<ParticipantPair>,
    opened: Mutex<HashMap<ParticipantPair, String>>,
}

impl ConversationDirectory {
    fn opened(&self) -> MutexGuard<'_, HashMap<ParticipantPair, String>> {
        self.opened.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Direct messages of one user.
///
/// Holds a live subscription on the user's conversations, newest activity first. The
/// subscription stops when the inbox is dropped.
pub struct Inbox<S: DocumentStore> {
    user_id: String,
    mirror: Arc<Mirror<S>>,
    conversations: Subscription,
    directory: Arc<ConversationDirectory>,
    settle_timeout: Duration,
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    pub fn inbox(&self, user_id: &str) -> Inbox<S> {
        let query = CollectionQuery::ordered(Collection::Conversations, LAST_MESSAGE_TIME_FIELD, SortOrder::Desc)
            .where_array_contains("participants", user_id);
        Inbox {
            user_id: user_id.to_string(),
            mirror: self.mirror.clone(),
            conversations: self.mirror.subscribe(query),
            directory: self.conversations.clone(),
            settle_timeout: self.settings.settle_timeout,
        }
    }
}

impl<S: DocumentStore> Inbox<S> {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn subscription(&self) -> &Subscription {
        &self.conversations
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations.latest().decode_all()
    }

    /// The two-party conversation between this user and `other_id`, if one is mirrored.
    pub fn conversation_with(&self, other_id: &str) -> Option<Conversation> {
        self.conversations()
            .into_iter()
            .find(|conversation| conversation.other_participant(&self.user_id) == Some(other_id))
    }

    /// Send `text` to `recipient_id`, opening the conversation on first contact.
    ///
    /// Sends between the same two users are serialized, so back-to-back messages land
    /// in one conversation even before the inbox has mirrored it. The message and the
    /// conversation's last-message cache are separate writes; when the second one fails
    /// the first stays applied and the result is a [`MutationError::PartialMutation`].
    pub async fn send_message(&self, recipient_id: &str, text: &str) -> MutationResult {
        let text = text.trim();
        if text.is_empty() {
            return Err(MutationError::invalid("message text is empty"));
        }
        if recipient_id == self.user_id {
            return Err(MutationError::invalid("cannot message yourself"));
        }
        let pair = participant_pair(&self.user_id, recipient_id);
        let _queued = self.directory.sends.acquire(&pair).await;
        self.conversations.clone().wait_until_loaded().await;

        match self.existing_conversation(&pair, recipient_id) {
            Some(conversation_id) => {
                let message_id = self.add_message(&conversation_id, recipient_id, text).await?;
                let refresh = vec![
                    FieldMutation::set("lastMessage", text),
                    FieldMutation::server_timestamp(LAST_MESSAGE_TIME_FIELD),
                ];
                if let Err(err) = self
                    .store()
                    .update_document(Collection::Conversations, &conversation_id, refresh)
                    .await
                {
                    return Err(MutationError::PartialMutation {
                        completed: vec![format!("messages/{message_id}")],
                        failed: format!("conversations/{conversation_id}.lastMessage"),
                        message: err.to_string(),
                    });
                }
                Ok(Applied::created(message_id))
            }
            None => {
                let fields = DocumentFields::new()
                    .set("participants", json!([self.user_id, recipient_id]))
                    .set("lastMessage", text)
                    .server_timestamp(LAST_MESSAGE_TIME_FIELD)
                    .set("createdAt", client_timestamp(Utc::now()));
                let conversation_id = self.store().add_document(Collection::Conversations, fields).await?;
                self.directory.opened().insert(pair, conversation_id.clone());
                log::debug!("opened conversation {conversation_id} between {} and {recipient_id}", self.user_id);

                let sent = self.add_message(&conversation_id, recipient_id, text).await;
                self.settle(&conversation_id).await;
                match sent {
                    Ok(message_id) => Ok(Applied::created(message_id)),
                    Err(err) => Err(MutationError::PartialMutation {
                        completed: vec![format!("conversations/{conversation_id}")],
                        failed: "messages".to_string(),
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Mirrored conversation with `recipient_id`, else one this layer opened that the
    /// inbox has not received yet.
    fn existing_conversation(&self, pair: &ParticipantPair, recipient_id: &str) -> Option<String> {
        let mut opened = self.directory.opened();
        match self.conversation_with(recipient_id) {
            Some(conversation) => {
                opened.remove(pair);
                Some(conversation.id)
            }
            None => opened.get(pair).cloned(),
        }
    }

    /// Wait until this inbox mirrors `conversation_id`.
    async fn settle(&self, conversation_id: &str) {
        let mut feed = self.conversations.clone();
        let mirrored = async {
            loop {
                if feed.latest().get(conversation_id).is_some() {
                    return;
                }
                if feed.changed().await.is_none() {
                    return;
                }
            }
        };
        if tokio::time::timeout(self.settle_timeout, mirrored).await.is_err() {
            log::warn!("conversation {conversation_id} not mirrored within {:?}", self.settle_timeout);
        }
    }

    /// Live view of one conversation's messages, oldest first.
    pub fn thread(&self, conversation_id: &str) -> Subscription {
        let query = CollectionQuery::ordered(Collection::Messages, TIMESTAMP_FIELD, SortOrder::Asc)
            .where_eq("conversationId", conversation_id);
        self.mirror.subscribe(query)
    }

    pub async fn mark_message_read(&self, message_id: &str) -> MutationResult {
        self.store()
            .update_document(Collection::Messages, message_id, vec![FieldMutation::set("read", true)])
            .await?;
        Ok(Applied::done())
    }

    fn store(&self) -> &S {
        self.mirror.store()
    }

    async fn add_message(&self, conversation_id: &str, recipient_id: &str, text: &str) -> Result<String, MutationError> {
        let fields = DocumentFields::new()
            .set("conversationId", conversation_id)
            .set("senderId", self.user_id.as_str())
            .set("participants", json!([self.user_id, recipient_id]))
            .set("text", text)
            .set("read", false)
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(Utc::now()));
        Ok(self.store().add_document(Collection::Messages, fields).await?)
    }
}

impl<S: DocumentStore> Drop for Inbox<S> {
    fn drop(&mut self) {
        self.conversations.stop();
    }
}
