//! Direct messages: conversation reuse, serialized sends and half-applied writes.

use reelsync::{
    Collection, MemoryStore, MutationError,
    examples::support::{self, Harness},
};

async fn harness_with_pair(label: &str) -> anyhow::Result<Harness> {
    let harness = Harness::open(label).await?;
    harness.seed_user("ann", "ann").await?;
    harness.seed_user("bob", "bob").await?;
    Ok(harness)
}

fn conversation_ids(store: &MemoryStore) -> Vec<String> {
    store
        .documents(Collection::Conversations)
        .into_iter()
        .map(|doc| doc.id)
        .collect()
}

fn message_texts(store: &MemoryStore, conversation_id: &str) -> Vec<String> {
    let mut texts: Vec<String> = store
        .documents(Collection::Messages)
        .into_iter()
        .filter(|doc| doc.str_field("conversationId") == Some(conversation_id))
        .filter_map(|doc| doc.str_field("text").map(str::to_string))
        .collect();
    texts.sort();
    texts
}

#[tokio::test]
async fn back_to_back_messages_share_one_conversation() {
    let harness = harness_with_pair("messages_back_to_back").await.expect("harness");
    let ann = harness.social.inbox("ann");

    ann.send_message("bob", "one").await.expect("first message");
    ann.send_message("bob", "two").await.expect("second message");

    let conversations = conversation_ids(&harness.store);
    assert_eq!(conversations.len(), 1, "conversations between ann and bob: {conversations:?}");
    assert_eq!(message_texts(&harness.store, &conversations[0]), ["one", "two"]);
    drop(ann);
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn opening_sends_from_both_sides_share_one_conversation() {
    let harness = harness_with_pair("messages_both_sides").await.expect("harness");
    let ann = harness.social.inbox("ann");
    let bob = harness.social.inbox("bob");

    let (from_ann, from_bob) = tokio::join!(ann.send_message("bob", "hi bob"), bob.send_message("ann", "hi ann"));
    from_ann.expect("ann's message");
    from_bob.expect("bob's message");

    let conversations = conversation_ids(&harness.store);
    assert_eq!(conversations.len(), 1, "conversations: {conversations:?}");
    assert_eq!(message_texts(&harness.store, &conversations[0]), ["hi ann", "hi bob"]);
    drop((ann, bob));
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn mirrored_conversation_is_reused_and_its_preview_refreshed() {
    let harness = harness_with_pair("messages_reuse").await.expect("harness");
    let ann = harness.social.inbox("ann");

    ann.send_message("bob", "first").await.expect("first message");
    let mut view = ann.subscription().clone();
    support::next_matching(&mut view, |conversations| conversations.len() == 1)
        .await
        .expect("conversation mirrored");
    let opened = ann.conversation_with("bob").expect("conversation with bob");

    ann.send_message("bob", "second").await.expect("second message");
    support::next_matching(&mut view, |conversations| {
        conversations.get(&opened.id).and_then(|doc| doc.str_field("lastMessage")) == Some("second")
    })
    .await
    .expect("preview refreshed");
    assert_eq!(conversation_ids(&harness.store), vec![opened.id.clone()]);
    assert_eq!(message_texts(&harness.store, &opened.id), ["first", "second"]);
    drop(ann);
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn failed_first_message_leaves_the_conversation_for_the_retry() {
    let harness = harness_with_pair("messages_failed_first").await.expect("harness");
    let ann = harness.social.inbox("ann");
    harness.store.fail_next_add(Collection::Messages, "offline");

    let err = ann.send_message("bob", "hello").await.expect_err("message write fails");
    let MutationError::PartialMutation { completed, failed, .. } = err else {
        panic!("expected a partial mutation, got {err:?}");
    };
    let conversations = conversation_ids(&harness.store);
    assert_eq!(conversations.len(), 1);
    assert_eq!(completed, vec![format!("conversations/{}", conversations[0])]);
    assert_eq!(failed, "messages");
    assert!(message_texts(&harness.store, &conversations[0]).is_empty());

    ann.send_message("bob", "hello again").await.expect("retry");
    assert_eq!(conversation_ids(&harness.store), conversations);
    assert_eq!(message_texts(&harness.store, &conversations[0]), ["hello again"]);
    drop(ann);
    harness.cleanup().await.expect("cleanup");
}

#[tokio::test]
async fn failed_preview_refresh_keeps_the_message() {
    let harness = harness_with_pair("messages_failed_refresh").await.expect("harness");
    let ann = harness.social.inbox("ann");
    ann.send_message("bob", "first").await.expect("first message");
    let conversation_id = conversation_ids(&harness.store).pop().expect("conversation");
    harness
        .store
        .fail_next_update(Collection::Conversations, conversation_id.clone(), "offline");

    let err = ann.send_message("bob", "second").await.expect_err("refresh fails");
    let MutationError::PartialMutation { completed, failed, .. } = err else {
        panic!("expected a partial mutation, got {err:?}");
    };
    assert_eq!(completed.len(), 1);
    assert!(completed[0].starts_with("messages/"));
    assert_eq!(failed, format!("conversations/{conversation_id}.lastMessage"));

    assert_eq!(message_texts(&harness.store, &conversation_id), ["first", "second"]);
    let conversation = harness
        .store
        .document(Collection::Conversations, &conversation_id)
        .expect("conversation");
    assert_eq!(conversation.str_field("lastMessage"), Some("first"));
    drop(ann);
    harness.cleanup().await.expect("cleanup");
}
