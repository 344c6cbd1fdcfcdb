//! Example 07 – Direct messages
//!
//! Each user's inbox subscribes to the conversations they take part in. The first
//! message opens the conversation; later ones reuse it and refresh its preview.

use anyhow::Result;

use super::support::{self, Harness};
use crate::models::Message;

/// Example 07 – conversations, threads and read flags.
pub async fn run() -> Result<()> {
    let harness = Harness::open("messages").await?;
    harness.seed_user("ann", "ann").await?;
    harness.seed_user("bob", "bob").await?;

    let ann = harness.social.inbox("ann");
    let bob = harness.social.inbox("bob");

    ann.send_message("bob", "hey bob").await?;
    support::next_matching(&mut bob.subscription().clone(), |conversations| conversations.len() == 1).await?;
    let conversation = bob
        .conversation_with("ann")
        .ok_or_else(|| anyhow::anyhow!("bob should see the conversation"))?;
    assert_eq!(conversation.last_message, "hey bob");

    let reply = bob.send_message("ann", "hi ann").await?;
    let mut ann_view = ann.subscription().clone();
    support::next_matching(&mut ann_view, |conversations| {
        conversations.documents().first().and_then(|doc| doc.str_field("lastMessage")) == Some("hi ann")
    })
    .await?;
    assert_eq!(ann.conversations().len(), 1, "reply reuses the conversation");

    let mut thread = bob.thread(&conversation.id);
    let messages = support::next_matching(&mut thread, |messages| messages.len() == 2).await?;
    let texts: Vec<&str> = messages
        .documents()
        .iter()
        .filter_map(|message| message.str_field("text"))
        .collect();
    assert_eq!(texts, ["hey bob", "hi ann"], "threads read oldest first");

    let reply_id = reply.created_id.unwrap_or_default();
    ann.mark_message_read(&reply_id).await?;
    support::next_matching(&mut thread, |messages| {
        messages
            .decode_all::<Message>()
            .iter()
            .any(|message| message.id == reply_id && message.read)
    })
    .await?;

    assert!(ann.send_message("ann", "note to self").await.is_err());
    thread.stop();
    drop(bob);

    harness.cleanup().await
}
