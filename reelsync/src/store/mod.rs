//! Boundary toward the managed document store.
//!
//! The store performs replication, query execution and change delivery. This module only
//! fixes the shape of the calls: full-snapshot subscriptions and primitive field
//! mutations (set, array union/remove, increment, server timestamp).

mod memory;
mod redis_store;
mod scripts;

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

pub use memory::MemoryStore;
pub use redis_store::{IndexField, IndexFieldType, RedisStore, default_index_fields};

use crate::{
    errors::StoreError,
    types::{Collection, Document, SortOrder},
};

/// One delivery on a subscription: a complete snapshot or the error that ended it.
pub type FeedEvent = Result<Vec<Document>, StoreError>;

/// Push channel of full snapshots for one query.
///
/// Dropping the feed releases the store-side listener.
#[derive(Debug)]
pub struct SnapshotFeed {
    receiver: mpsc::UnboundedReceiver<FeedEvent>,
}

impl SnapshotFeed {
    pub fn channel() -> (mpsc::UnboundedSender<FeedEvent>, SnapshotFeed) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, SnapshotFeed { receiver })
    }

    /// Next delivery, or `None` once the store has closed the listener.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.receiver.recv().await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq { field, .. } | Filter::ArrayContains { field, .. } => field,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => doc.get(field) == Some(value),
            Filter::ArrayContains { field, value } => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortOrder,
}

/// What a subscription asks the store for.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub collection: Collection,
    pub filter: Option<Filter>,
    pub order: Option<OrderBy>,
}

impl CollectionQuery {
    pub fn all(collection: Collection) -> Self {
        Self {
            collection,
            filter: None,
            order: None,
        }
    }

    pub fn ordered(collection: Collection, field: impl Into<String>, direction: SortOrder) -> Self {
        Self {
            collection,
            filter: None,
            order: Some(OrderBy {
                field: field.into(),
                direction,
            }),
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Same query without the server-side sort.
    pub fn unordered(&self) -> Self {
        Self {
            order: None,
            ..self.clone()
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter.matches(doc))
    }
}

/// Fields of a document about to be written, with server-timestamp placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFields {
    values: Map<String, Value>,
    server_timestamps: Vec<String>,
}

impl DocumentFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Field whose value the store assigns at commit time.
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.values.remove(&field);
        self.server_timestamps.push(field);
        self
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn server_timestamp_fields(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Materialize the document with every placeholder set to `now_ms`.
    pub fn resolve(self, now_ms: i64) -> Map<String, Value> {
        let mut values = self.values;
        for field in self.server_timestamps {
            values.insert(field, Value::from(now_ms));
        }
        values
    }
}

/// Primitive field mutation understood by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldMutation {
    Set { path: String, value: Value },
    ArrayUnion { path: String, value: Value },
    ArrayRemove { path: String, value: Value },
    Increment { path: String, by: i64 },
    ServerTimestamp { path: String },
}

impl FieldMutation {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn array_union(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayUnion {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn array_remove(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayRemove {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn increment(path: impl Into<String>, by: i64) -> Self {
        Self::Increment { path: path.into(), by }
    }

    pub fn server_timestamp(path: impl Into<String>) -> Self {
        Self::ServerTimestamp { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            FieldMutation::Set { path, .. }
            | FieldMutation::ArrayUnion { path, .. }
            | FieldMutation::ArrayRemove { path, .. }
            | FieldMutation::Increment { path, .. }
            | FieldMutation::ServerTimestamp { path } => path,
        }
    }
}

/// Managed document store with realtime subscriptions.
///
/// Every method is a suspension point; none of them imposes its own timeout.
pub trait DocumentStore: Send + Sync + 'static {
    /// Attach a listener. Ordered queries the store cannot serve fail with
    /// [`StoreError::PreconditionFailed`], either here or as the first feed event.
    fn subscribe(&self, query: &CollectionQuery) -> impl Future<Output = Result<SnapshotFeed, StoreError>> + Send;

    /// Create a document under a store-assigned id.
    fn add_document(
        &self,
        collection: Collection,
        fields: DocumentFields,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Create or overwrite a document under a caller-chosen id.
    fn set_document(
        &self,
        collection: Collection,
        id: &str,
        fields: DocumentFields,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply mutations to an existing document; fails with `NotFound` if it is absent.
    fn update_document(
        &self,
        collection: Collection,
        id: &str,
        mutations: Vec<FieldMutation>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_document(&self, collection: Collection, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}
