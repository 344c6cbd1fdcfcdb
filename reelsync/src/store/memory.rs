use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::{CollectionQuery, DocumentFields, DocumentStore, FeedEvent, FieldMutation, SnapshotFeed};
use crate::{
    errors::StoreError,
    id::generate_document_id,
    types::{Collection, Document, SortOrder},
};

/// In-process document store with realtime listeners and fault injection.
///
/// Cloning yields another handle onto the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<Collection, BTreeMap<String, Map<String, Value>>>,
    listeners: Vec<Listener>,
    unordered_only: HashSet<Collection>,
    update_faults: Vec<UpdateFault>,
    add_faults: Vec<(Collection, String)>,
    clock: i64,
    writes: usize,
}

struct Listener {
    query: CollectionQuery,
    sender: mpsc::UnboundedSender<FeedEvent>,
}

struct UpdateFault {
    collection: Collection,
    id: String,
    message: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make ordered subscriptions on `collection` fail as if the composite index were missing.
    ///
    /// Ordered listeners already attached receive the failure as their next event.
    pub fn disable_ordering(&self, collection: Collection) {
        let mut state = self.state();
        state.unordered_only.insert(collection);
        state.fail_listeners(
            |query| query.collection == collection && query.order.is_some(),
            || StoreError::precondition(format!("the query on '{collection}' requires an index")),
        );
    }

    /// Deliver a transport error to every listener on `collection` and detach them.
    pub fn break_listeners(&self, collection: Collection, message: impl Into<String>) {
        let message = message.into();
        self.state().fail_listeners(
            |query| query.collection == collection,
            || StoreError::transport(message.clone()),
        );
    }

    /// The next update of `collection/id` fails with a transport error.
    pub fn fail_next_update(&self, collection: Collection, id: impl Into<String>, message: impl Into<String>) {
        self.state().update_faults.push(UpdateFault {
            collection,
            id: id.into(),
            message: message.into(),
        });
    }

    /// The next document added to `collection` fails with a transport error.
    pub fn fail_next_add(&self, collection: Collection, message: impl Into<String>) {
        self.state().add_faults.push((collection, message.into()));
    }

    /// Number of committed writes across all collections.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    /// Number of listeners still attached.
    pub fn listener_count(&self) -> usize {
        let mut state = self.state();
        state.listeners.retain(|listener| !listener.sender.is_closed());
        state.listeners.len()
    }

    /// Direct read, bypassing subscriptions.
    pub fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.state()
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone()))
    }

    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        self.state()
            .collections
            .get(&collection)
            .map(|docs| docs.iter().map(|(id, fields)| Document::new(id.clone(), fields.clone())).collect())
            .unwrap_or_default()
    }
}

impl MemoryState {
    /// Strictly increasing commit clock in epoch milliseconds.
    fn next_timestamp(&mut self) -> i64 {
        self.clock = (self.clock + 1).max(Utc::now().timestamp_millis());
        self.clock
    }

    fn evaluate(&self, query: &CollectionQuery) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(&query.collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .filter(|doc| query.matches(doc))
            .collect();

        if let Some(order) = &query.order {
            // Server-side ordering only returns documents that carry the order field.
            docs.retain(|doc| doc.get(&order.field).is_some_and(Value::is_number));
            docs.sort_by(|a, b| {
                let left = a.get(&order.field).and_then(Value::as_i64).unwrap_or_default();
                let right = b.get(&order.field).and_then(Value::as_i64).unwrap_or_default();
                match order.direction {
                    SortOrder::Asc => left.cmp(&right),
                    SortOrder::Desc => right.cmp(&left),
                }
            });
        }
        docs
    }

    fn publish(&mut self, collection: Collection) {
        self.writes += 1;
        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.retain(|listener| {
            if listener.query.collection != collection {
                return !listener.sender.is_closed();
            }
            let snapshot = self.evaluate(&listener.query);
            listener.sender.send(Ok(snapshot)).is_ok()
        });
        self.listeners = listeners;
    }

    fn fail_listeners(&mut self, affected: impl Fn(&CollectionQuery) -> bool, error: impl Fn() -> StoreError) {
        self.listeners.retain(|listener| {
            if !affected(&listener.query) {
                return true;
            }
            let _ = listener.sender.send(Err(error()));
            false
        });
    }

    fn take_update_fault(&mut self, collection: Collection, id: &str) -> Option<String> {
        let position = self
            .update_faults
            .iter()
            .position(|fault| fault.collection == collection && fault.id == id)?;
        Some(self.update_faults.remove(position).message)
    }

    fn take_add_fault(&mut self, collection: Collection) -> Option<String> {
        let position = self.add_faults.iter().position(|(target, _)| *target == collection)?;
        Some(self.add_faults.remove(position).1)
    }
}

impl DocumentStore for MemoryStore {
    async fn subscribe(&self, query: &CollectionQuery) -> Result<SnapshotFeed, StoreError> {
        let mut state = self.state();
        if query.order.is_some() && state.unordered_only.contains(&query.collection) {
            return Err(StoreError::precondition(format!(
                "the query on '{}' requires an index",
                query.collection
            )));
        }

        let (sender, feed) = SnapshotFeed::channel();
        let initial = state.evaluate(query);
        if sender.send(Ok(initial)).is_ok() {
            state.listeners.push(Listener {
                query: query.clone(),
                sender,
            });
        }
        Ok(feed)
    }

    async fn add_document(&self, collection: Collection, fields: DocumentFields) -> Result<String, StoreError> {
        let mut state = self.state();
        if let Some(message) = state.take_add_fault(collection) {
            return Err(StoreError::transport(message));
        }
        let id = generate_document_id();
        let now = state.next_timestamp();
        state
            .collections
            .entry(collection)
            .or_default()
            .insert(id.clone(), fields.resolve(now));
        state.publish(collection);
        Ok(id)
    }

    async fn set_document(&self, collection: Collection, id: &str, fields: DocumentFields) -> Result<(), StoreError> {
        let mut state = self.state();
        let now = state.next_timestamp();
        state
            .collections
            .entry(collection)
            .or_default()
            .insert(id.to_string(), fields.resolve(now));
        state.publish(collection);
        Ok(())
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        mutations: Vec<FieldMutation>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if let Some(message) = state.take_update_fault(collection, id) {
            return Err(StoreError::transport(message));
        }
        let now = state.next_timestamp();
        let fields = state
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        for mutation in mutations {
            apply_mutation(fields, mutation, now);
        }
        state.publish(collection);
        Ok(())
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let removed = state
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_some() {
            state.publish(collection);
        }
        Ok(())
    }
}

/// Apply one primitive mutation with the store's semantics: array union never
/// duplicates, array remove drops every equal element, increment on a non-number
/// starts from zero.
fn apply_mutation(fields: &mut Map<String, Value>, mutation: FieldMutation, now_ms: i64) {
    match mutation {
        FieldMutation::Set { path, value } => {
            *slot(fields, &path) = value;
        }
        FieldMutation::ServerTimestamp { path } => {
            *slot(fields, &path) = Value::from(now_ms);
        }
        FieldMutation::ArrayUnion { path, value } => {
            let target = slot(fields, &path);
            match target {
                Value::Array(items) => {
                    if !items.contains(&value) {
                        items.push(value);
                    }
                }
                other => *other = Value::Array(vec![value]),
            }
        }
        FieldMutation::ArrayRemove { path, value } => {
            if let Value::Array(items) = slot(fields, &path) {
                items.retain(|item| item != &value);
            }
        }
        FieldMutation::Increment { path, by } => {
            let target = slot(fields, &path);
            let current = target.as_i64().unwrap_or_default();
            *target = Value::from(current.saturating_add(by));
        }
    }
}

/// Mutable slot at a dotted path, creating intermediate objects on the way.
fn slot<'a>(fields: &'a mut Map<String, Value>, path: &str) -> &'a mut Value {
    let mut segments = path.split('.').peekable();
    let mut current = fields;
    loop {
        let segment = segments.next().unwrap_or_default();
        if segments.peek().is_none() {
            return current.entry(segment.to_string()).or_insert(Value::Null);
        }
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        current = match next {
            Value::Object(map) => map,
            _ => unreachable!("slot was just replaced with an object"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn array_union_is_idempotent() {
        let mut doc = fields(json!({"likes": ["a"]}));
        apply_mutation(&mut doc, FieldMutation::array_union("likes", "b"), 0);
        apply_mutation(&mut doc, FieldMutation::array_union("likes", "b"), 0);
        assert_eq!(doc["likes"], json!(["a", "b"]));
    }

    #[test]
    fn nested_paths_are_created_on_demand() {
        let mut doc = fields(json!({"text": "hi"}));
        apply_mutation(&mut doc, FieldMutation::array_union("reactions.fire", "u1"), 0);
        assert_eq!(doc["reactions"], json!({"fire": ["u1"]}));
        apply_mutation(&mut doc, FieldMutation::array_remove("reactions.fire", "u1"), 0);
        assert_eq!(doc["reactions"], json!({"fire": []}));
    }

    #[test]
    fn increment_starts_from_zero_when_missing() {
        let mut doc = Map::new();
        apply_mutation(&mut doc, FieldMutation::increment("views", 1), 0);
        apply_mutation(&mut doc, FieldMutation::increment("views", 1), 0);
        assert_eq!(doc["views"], json!(2));
    }

    #[tokio::test]
    async fn update_on_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_document(Collection::Videos, "nope", vec![FieldMutation::increment("views", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn listeners_receive_full_snapshots() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe(&CollectionQuery::all(Collection::Users)).await.unwrap();
        assert_eq!(feed.next().await.unwrap().unwrap().len(), 0);

        store
            .set_document(Collection::Users, "u1", DocumentFields::new().set("username", "ann"))
            .await
            .unwrap();
        store
            .set_document(Collection::Users, "u2", DocumentFields::new().set("username", "bob"))
            .await
            .unwrap();

        assert_eq!(feed.next().await.unwrap().unwrap().len(), 1);
        assert_eq!(feed.next().await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn disabled_ordering_rejects_sorted_queries() {
        let store = MemoryStore::new();
        store.disable_ordering(Collection::Videos);
        let err = store
            .subscribe(&CollectionQuery::ordered(Collection::Videos, "timestamp", SortOrder::Desc))
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(store.subscribe(&CollectionQuery::all(Collection::Videos)).await.is_ok());
    }

    #[tokio::test]
    async fn disabling_ordering_fails_attached_sorted_listeners() {
        let store = MemoryStore::new();
        let mut sorted = store
            .subscribe(&CollectionQuery::ordered(Collection::Videos, "timestamp", SortOrder::Desc))
            .await
            .unwrap();
        let _plain = store.subscribe(&CollectionQuery::all(Collection::Videos)).await.unwrap();
        sorted.next().await.unwrap().unwrap();

        store.disable_ordering(Collection::Videos);
        assert!(sorted.next().await.unwrap().unwrap_err().is_precondition());
        assert!(sorted.next().await.is_none());
        assert_eq!(store.listener_count(), 1);
    }

    #[tokio::test]
    async fn broken_listeners_get_a_transport_error() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe(&CollectionQuery::all(Collection::Users)).await.unwrap();
        feed.next().await.unwrap().unwrap();
        store.break_listeners(Collection::Users, "connection reset");
        let err = feed.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Transport { .. }));
    }

    #[tokio::test]
    async fn dropped_feeds_detach_their_listener() {
        let store = MemoryStore::new();
        let feed = store.subscribe(&CollectionQuery::all(Collection::Users)).await.unwrap();
        assert_eq!(store.listener_count(), 1);
        drop(feed);
        assert_eq!(store.listener_count(), 0);
    }
}
