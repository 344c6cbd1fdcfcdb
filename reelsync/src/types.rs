use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize, Serializer, de::DeserializeOwned, ser::SerializeMap};
use serde_json::{Map, Value};

/// Remote collections mirrored by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Videos,
    Users,
    Comments,
    Notifications,
    Stories,
    Playlists,
    Conversations,
    Messages,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Videos,
        Collection::Users,
        Collection::Comments,
        Collection::Notifications,
        Collection::Stories,
        Collection::Playlists,
        Collection::Conversations,
        Collection::Messages,
    ];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Collection::Videos => "videos",
            Collection::Users => "users",
            Collection::Comments => "comments",
            Collection::Notifications => "notifications",
            Collection::Stories => "stories",
            Collection::Playlists => "playlists",
            Collection::Conversations => "conversations",
            Collection::Messages => "messages",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|collection| collection.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown collection '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A persisted document: stored fields plus the storage identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { id: id.into(), fields }
    }

    /// Resolve a dotted field path (`reactions.fire`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn str_field(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Whether the array at `path` contains `member`. Missing arrays count as empty.
    pub fn contains_member(&self, path: &str, member: &str) -> bool {
        self.get(path)
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|item| item.as_str() == Some(member)))
    }

    /// Length of the array at `path`, zero when absent.
    pub fn array_len(&self, path: &str) -> usize {
        self.get(path).and_then(Value::as_array).map_or(0, Vec::len)
    }

    /// Snapshot entry shape: persisted fields with the id merged in as `id`.
    pub fn to_value(&self) -> Value {
        let mut merged = self.fields.clone();
        merged.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(merged)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (key, value) in &self.fields {
            if key != "id" {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// A complete point-in-time copy of one collection, replaced wholesale on every push.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    revision: u64,
    documents: Arc<Vec<Document>>,
}

impl Snapshot {
    pub fn new(revision: u64, documents: Vec<Document>) -> Self {
        Self {
            revision,
            documents: Arc::new(documents),
        }
    }

    /// Number of pushes applied so far; zero until the first snapshot arrives.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    /// Typed lookup by id; undecodable documents are treated as absent.
    pub fn find<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        self.get(id).and_then(|doc| decode_or_skip(doc))
    }

    /// Decode every entry in snapshot order, skipping documents that do not fit `T`.
    pub fn decode_all<T: DeserializeOwned>(&self) -> Vec<T> {
        self.documents.iter().filter_map(decode_or_skip).collect()
    }

    pub fn same_contents(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.documents, &other.documents) || self.documents == other.documents
    }
}

fn decode_or_skip<T: DeserializeOwned>(doc: &Document) -> Option<T> {
    match doc.decode() {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("skipping undecodable document {}: {err}", doc.id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(map) => Document::new(id, map),
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn entry_shape_merges_id() {
        let d = doc("v1", json!({"caption": "hi"}));
        assert_eq!(d.to_value(), json!({"id": "v1", "caption": "hi"}));
    }

    #[test]
    fn nested_paths_resolve() {
        let d = doc("c1", json!({"reactions": {"fire": ["u1"]}}));
        assert!(d.contains_member("reactions.fire", "u1"));
        assert!(!d.contains_member("reactions.heart", "u1"));
        assert_eq!(d.array_len("reactions.fire"), 1);
    }

    #[test]
    fn collection_names_round_trip_through_from_str() {
        for collection in Collection::ALL {
            assert_eq!(collection.as_str().parse::<Collection>().unwrap(), collection);
        }
        assert!("reels".parse::<Collection>().is_err());
    }

    #[test]
    fn empty_snapshot_is_not_loaded() {
        let snapshot = Snapshot::default();
        assert!(!snapshot.is_loaded());
        assert!(snapshot.is_empty());
    }
}
