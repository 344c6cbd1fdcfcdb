use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use reelsync::SocialSettings;
use serde::{Deserialize, Serialize};

pub const CONFIG_DIR: &str = ".reelsync";
pub const CONFIG_FILE: &str = "config.toml";

/// Project context for reelsync commands
pub struct ProjectContext {
    /// Directory holding `.reelsync/`
    pub project_root: PathBuf,
    pub config_path: PathBuf,
    pub config: ReelsyncConfig,
    /// Whether `config` came from disk or from defaults
    pub initialized: bool,
}

/// Configuration stored in .reelsync/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReelsyncConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub media: MediaSettings,
    #[serde(default)]
    pub social: SocialSettings,
    #[serde(default)]
    pub mirror: MirrorSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process store; data lives as long as the command
    #[default]
    Memory,
    /// Redis with the RedisJSON and RediSearch modules
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            url: default_redis_url(),
            prefix: default_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_prefix() -> String {
    "reelsync".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Blob root, relative to the project root unless absolute
    #[serde(default = "default_media_root")]
    pub root: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            root: default_media_root(),
        }
    }
}

fn default_media_root() -> String {
    format!("{CONFIG_DIR}/media")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// How long commands wait for the initial snapshots
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

fn default_load_timeout_secs() -> u64 {
    10
}

impl MirrorSettings {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

impl ProjectContext {
    /// Find the nearest `.reelsync/` from the current directory upwards.
    ///
    /// Falls back to defaults rooted at the current directory when none exists.
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        let root = Self::find_project_root(&current_dir).unwrap_or(current_dir);
        Self::from_root(root)
    }

    pub fn from_root(project_root: PathBuf) -> Result<Self> {
        let config_path = project_root.join(CONFIG_DIR).join(CONFIG_FILE);
        let (config, initialized) = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: ReelsyncConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?;
            (config, true)
        } else {
            (ReelsyncConfig::default(), false)
        };

        Ok(Self {
            project_root,
            config_path,
            config,
            initialized,
        })
    }

    fn find_project_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE).is_file())
            .map(Path::to_path_buf)
    }

    /// The Redis URL with `${VAR}` references expanded
    pub fn redis_url(&self) -> Result<String> {
        expand_env(&self.config.store.url)
    }

    pub fn media_root(&self) -> PathBuf {
        let root = Path::new(&self.config.media.root);
        if root.is_absolute() {
            root.to_path_buf()
        } else {
            self.project_root.join(root)
        }
    }
}

/// Replace every `${NAME}` in `raw` with the value of the environment variable.
pub fn expand_env(raw: &str) -> Result<String> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("Unterminated variable reference in '{raw}'"))?;
        let name = &after[..end];
        let value = std::env::var(name).with_context(|| format!("Environment variable {name} not set"))?;
        expanded.push_str(&value);
        rest = &after[end + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}
