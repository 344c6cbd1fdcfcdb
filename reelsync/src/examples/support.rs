use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use crate::{
    blob::LocalBlobStorage,
    id::generate_document_id,
    mirror::{Mirror, Subscription, TIMESTAMP_FIELD, default_queries},
    models::client_timestamp,
    social::{NewProfile, SocialLayer, SocialSettings},
    store::{DocumentFields, DocumentStore, MemoryStore, RedisStore},
    types::{Collection, Snapshot},
};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Unique namespace prefix for isolating example data.
pub fn unique_namespace(label: &str) -> String {
    let salt = generate_document_id();
    format!("reelsync_example_{label}_{}", &salt[..8])
}

/// Connect to the Redis instance named by `REDIS_URL` (default: local redis-stack).
pub async fn redis_store(label: &str) -> Result<RedisStore> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    let store = RedisStore::connect(&url, unique_namespace(label)).await?;
    Ok(store)
}

/// Wait until `subscription` delivers a snapshot satisfying `check`.
pub async fn next_matching(subscription: &mut Subscription, check: impl Fn(&Snapshot) -> bool) -> Result<Snapshot> {
    let found = tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            let snapshot = subscription.latest();
            if check(&snapshot) {
                return Some(snapshot);
            }
            if subscription.changed().await.is_none() {
                return None;
            }
        }
    })
    .await
    .context("timed out waiting for a matching snapshot")?;
    found.context("subscription ended before a matching snapshot arrived")
}

/// Memory-backed mirror and social layer with every application feed open.
pub struct Harness<S: DocumentStore = MemoryStore> {
    pub store: Arc<S>,
    pub mirror: Arc<Mirror<S>>,
    pub social: SocialLayer<S, LocalBlobStorage>,
    media_root: PathBuf,
}

impl Harness<MemoryStore> {
    pub async fn open(label: &str) -> Result<Self> {
        Self::with_store(label, MemoryStore::new()).await
    }
}

impl<S: DocumentStore> Harness<S> {
    pub async fn with_store(label: &str, store: S) -> Result<Self> {
        Self::with_settings(label, store, SocialSettings::default()).await
    }

    pub async fn with_settings(label: &str, store: S, settings: SocialSettings) -> Result<Self> {
        let store = Arc::new(store);
        let mirror = Arc::new(Mirror::new(store.clone()));
        mirror.open_feeds();
        for query in default_queries() {
            mirror.wait_until_loaded(query.collection).await;
        }

        let media_root = std::env::temp_dir().join(unique_namespace(label));
        let blobs = Arc::new(LocalBlobStorage::new(&media_root));
        let social = SocialLayer::new(mirror.clone(), blobs, settings);
        Ok(Self {
            store,
            mirror,
            social,
            media_root,
        })
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Wait until the application feed for `collection` satisfies `check`.
    pub async fn wait_for(&self, collection: Collection, check: impl Fn(&Snapshot) -> bool) -> Result<Snapshot> {
        let mut feed = self
            .mirror
            .feed(collection)
            .with_context(|| format!("{collection} feed is not open"))?;
        next_matching(&mut feed, check).await
    }

    /// Create a profile under `user_id` and wait until the mirror holds it.
    pub async fn seed_user(&self, user_id: &str, username: &str) -> Result<()> {
        let profile = NewProfile {
            email: format!("{username}@example.com"),
            username: username.to_string(),
        };
        self.social.create_profile(user_id, profile).await?;
        self.wait_for(Collection::Users, |users| users.get(user_id).is_some())
            .await?;
        Ok(())
    }

    /// Write a video document directly, skipping the upload, and wait for it.
    pub async fn seed_video(&self, owner_id: &str, caption: &str, hashtags: &[&str]) -> Result<String> {
        let fields = DocumentFields::new()
            .set("userId", owner_id)
            .set("url", format!("file:///media/{owner_id}/{caption}.mp4"))
            .set("caption", caption)
            .set("hashtags", json!(hashtags))
            .set("likes", json!([]))
            .set("comments", json!([]))
            .set("reposts", json!([]))
            .set("views", 0)
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(Utc::now()));
        let id = self.store.add_document(Collection::Videos, fields).await?;
        self.wait_for(Collection::Videos, |videos| videos.get(&id).is_some())
            .await?;
        Ok(id)
    }

    /// Stop every subscription and remove uploaded media.
    pub async fn cleanup(self) -> Result<()> {
        self.mirror.shutdown();
        if tokio::fs::try_exists(&self.media_root).await? {
            tokio::fs::remove_dir_all(&self.media_root).await?;
        }
        Ok(())
    }
}
