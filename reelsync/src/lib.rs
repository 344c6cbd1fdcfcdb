//! ReelSync core library.
//!
//! A live mirror of a realtime document store plus the social mutation layer of a
//! short-video app: toggles, comments, notification fan-out, uploads and direct messages.

pub mod blob;
pub mod errors;
pub mod examples;
pub mod id;
pub mod keys;
pub mod mirror;
pub mod models;
pub mod social;
pub mod store;
pub mod types;

pub use blob::{BlobStorage, LocalBlobStorage, UploadProgress};
pub use errors::*;
pub use mirror::{Mirror, Subscription};
pub use social::{Applied, Inbox, MutationResult, SocialLayer, SocialSettings, ToggleDirection, ViewTracker};
pub use store::{
    CollectionQuery, DocumentFields, DocumentStore, FieldMutation, Filter, MemoryStore, OrderBy, RedisStore,
    SnapshotFeed,
};
pub use types::{Collection, Document, Snapshot, SortOrder};

// Re-export for downstream crates that manage their own Redis connections.
pub use redis;
