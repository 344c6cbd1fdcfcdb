use serde_json::Value;

use super::SocialLayer;
use crate::{
    blob::BlobStorage,
    store::DocumentStore,
    types::{Collection, Document, Snapshot},
};

/// Videos whose caption or any hashtag contains `query`, ignoring case.
///
/// A blank query returns the snapshot unchanged.
pub fn search_videos(videos: &Snapshot, query: &str) -> Vec<Document> {
    filter_snapshot(videos, query, |doc, needle| {
        contains_text(doc.get("caption"), needle)
            || doc
                .get("hashtags")
                .and_then(Value::as_array)
                .is_some_and(|tags| tags.iter().any(|tag| contains_text(Some(tag), needle)))
    })
}

/// Users whose username or email contains `query`, ignoring case.
pub fn search_users(users: &Snapshot, query: &str) -> Vec<Document> {
    filter_snapshot(users, query, |doc, needle| {
        contains_text(doc.get("username"), needle) || contains_text(doc.get("email"), needle)
    })
}

fn filter_snapshot(snapshot: &Snapshot, query: &str, matches: impl Fn(&Document, &str) -> bool) -> Vec<Document> {
    if query.trim().is_empty() {
        return snapshot.documents().to_vec();
    }
    let needle = query.to_lowercase();
    snapshot
        .documents()
        .iter()
        .filter(|doc| matches(doc, &needle))
        .cloned()
        .collect()
}

fn contains_text(value: Option<&Value>, needle: &str) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|text| text.to_lowercase().contains(needle))
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    pub fn search_videos(&self, query: &str) -> Vec<Document> {
        search_videos(&self.snapshot(Collection::Videos), query)
    }

    pub fn search_users(&self, query: &str) -> Vec<Document> {
        search_users(&self.snapshot(Collection::Users), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(values: Vec<(&str, Value)>) -> Snapshot {
        let docs = values
            .into_iter()
            .map(|(id, value)| Document::new(id, value.as_object().cloned().unwrap_or_default()))
            .collect();
        Snapshot::new(1, docs)
    }

    #[test]
    fn videos_match_caption_or_hashtag_case_insensitively() {
        let videos = snapshot(vec![
            ("v1", json!({"caption": "Sunset RUN", "hashtags": []})),
            ("v2", json!({"caption": "", "hashtags": ["Running", "beach"]})),
            ("v3", json!({"caption": "cooking", "hashtags": ["food"]})),
        ]);
        let ids: Vec<String> = search_videos(&videos, "run").into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["v1", "v2"]);
    }

    #[test]
    fn users_match_username_or_email() {
        let users = snapshot(vec![
            ("u1", json!({"username": "ann", "email": "ann@example.com"})),
            ("u2", json!({"username": "bob", "email": "b@ANNEX.io"})),
            ("u3", json!({"username": "cy"})),
        ]);
        assert_eq!(search_users(&users, "ANN").len(), 2);
    }

    #[test]
    fn blank_queries_return_everything_in_order() {
        let videos = snapshot(vec![("v2", json!({})), ("v1", json!({}))]);
        assert_eq!(search_videos(&videos, ""), videos.documents().to_vec());
        assert_eq!(search_users(&videos, "   "), videos.documents().to_vec());
    }
}
