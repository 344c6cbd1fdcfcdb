use anyhow::{Context, Result};
use clap::Args;

use crate::context::{Backend, CONFIG_DIR, CONFIG_FILE, ProjectContext, ReelsyncConfig};
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Initialize",
    commands: &[
        "reelsync init                      # In-memory store, for trying commands out",
        "reelsync init --backend redis      # Redis store at ${REDIS_URL}",
        "reelsync init --backend redis --force",
    ],
}];

#[derive(Args)]
pub struct InitArgs {
    /// Store backend to configure
    #[arg(long, value_enum, default_value = "memory")]
    pub backend: Backend,

    /// Overwrite an existing configuration
    #[arg(long)]
    pub force: bool,
}

const CONFIG_HEADER: &str = "# reelsync configuration\n\
# [store] url accepts ${VAR} references, expanded when a command runs.\n\n";

pub fn handle_init(args: InitArgs, output: &OutputManager) -> Result<()> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let ctx = ProjectContext::from_root(current_dir)?;

    if ctx.initialized && !args.force {
        output.warning(&format!("{} already exists", ctx.config_path.display()));
        output.info("Use --force to overwrite it.");
        return Ok(());
    }

    let mut config = ReelsyncConfig::default();
    config.store.backend = args.backend;

    let config_dir = ctx.project_root.join(CONFIG_DIR);
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    let body = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    let config_path = config_dir.join(CONFIG_FILE);
    std::fs::write(&config_path, format!("{CONFIG_HEADER}{body}"))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let written = ProjectContext::from_root(ctx.project_root.clone())?;
    let media_root = written.media_root();
    std::fs::create_dir_all(&media_root)
        .with_context(|| format!("Failed to create {}", media_root.display()))?;

    output.success(&format!("Wrote {}", config_path.display()));
    output.bullet(&format!("backend: {:?}", args.backend).to_lowercase());
    output.bullet(&format!("media root: {}", media_root.display()));
    if args.backend == Backend::Redis {
        output.info("Run 'reelsync index' once to create the search indexes for sorted feeds.");
    }
    Ok(())
}
