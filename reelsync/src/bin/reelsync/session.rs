use std::sync::Arc;

use anyhow::{Context, Result};
use reelsync::{
    LocalBlobStorage, MemoryStore, Mirror, RedisStore, SocialLayer, mirror::default_queries, store::DocumentStore,
};

use crate::{context::ProjectContext, output::OutputManager};

/// Mirror plus social layer over one store, with the application feeds loaded.
pub struct Session<S: DocumentStore> {
    pub mirror: Arc<Mirror<S>>,
    pub social: SocialLayer<S, LocalBlobStorage>,
}

impl<S: DocumentStore> Session<S> {
    pub async fn open(store: S, ctx: &ProjectContext, output: &OutputManager) -> Result<Self> {
        let mirror = Arc::new(Mirror::new(Arc::new(store)));
        mirror.open_feeds();

        let deadline = ctx.config.mirror.load_timeout();
        output.progress("Loading snapshots");
        for query in default_queries() {
            let collection = query.collection;
            match tokio::time::timeout(deadline, mirror.wait_until_loaded(collection)).await {
                Ok(snapshot) => output.verbose(&format!("{collection}: {} documents", snapshot.len())),
                Err(_) => {
                    output.clear_line();
                    output.warning(&format!("{collection} did not load within {}s", deadline.as_secs()));
                }
            }
        }
        output.clear_line();

        let blobs = Arc::new(LocalBlobStorage::new(ctx.media_root()));
        let social = SocialLayer::new(mirror.clone(), blobs, ctx.config.social.clone());
        Ok(Self { mirror, social })
    }

    pub fn close(&self) {
        self.mirror.shutdown();
    }
}

pub fn memory_store(output: &OutputManager) -> MemoryStore {
    output.verbose("Using the in-memory store; nothing outlives this command");
    MemoryStore::new()
}

pub async fn redis_store(ctx: &ProjectContext, output: &OutputManager) -> Result<RedisStore> {
    let url = ctx
        .redis_url()
        .context("REDIS_URL environment variable not set. Set it or [store] url to connect to Redis.")?;
    output.progress("Connecting to Redis");
    let store = RedisStore::connect(&url, ctx.config.store.prefix.clone())
        .await
        .context("Failed to connect to Redis")?;
    output.clear_line();
    output.verbose(&format!("Connected to Redis (prefix '{}')", store.prefix()));
    Ok(store)
}
