use anyhow::{Result, anyhow};
use clap::Args;
use reelsync::{Collection, store::default_index_fields};

use crate::context::{Backend, ProjectContext};
use crate::examples::ExampleGroup;
use crate::output::OutputManager;
use crate::session;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Search Indexes",
    commands: &[
        "reelsync index                     # Create every collection's index",
        "reelsync index comments            # Only the comments index",
    ],
}];

#[derive(Args)]
pub struct IndexArgs {
    /// Collection to index (all when omitted)
    pub collection: Option<String>,
}

/// Create the RediSearch indexes behind sorted subscriptions.
///
/// Without them the mirror still works but orders every snapshot itself.
pub async fn handle_index(args: IndexArgs, ctx: &ProjectContext, output: &OutputManager) -> Result<()> {
    if ctx.config.store.backend != Backend::Redis {
        output.info("The memory backend sorts without indexes; nothing to do.");
        return Ok(());
    }

    let collections = match args.collection.as_deref() {
        Some(name) => vec![name.parse::<Collection>().map_err(|err| anyhow!(err))?],
        None => Collection::ALL.to_vec(),
    };

    let store = session::redis_store(ctx, output).await?;
    output.heading("Search Indexes");
    for collection in collections {
        if store.ensure_index(collection, &default_index_fields(collection)).await? {
            output.success(&format!("{collection}: created"));
        } else {
            output.bullet(&format!("{collection}: already exists"));
        }
    }
    Ok(())
}
