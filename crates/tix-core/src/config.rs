use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt, str::FromStr};

/// Name of the per-project state directory.
pub const PROJECT_DIR: &str = ".tix";

/// Config file name inside [`PROJECT_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub projections: ProjectionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl StoreBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend '{other}' (expected sqlite or memory)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file, relative to the project directory.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl StoreConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            timeout_ms: default_timeout_ms(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Compare-and-commit attempts before a mutation gives up.
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: default_max_commit_retries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("tix.db")
}

const fn default_timeout_ms() -> u64 {
    5_000
}

const fn default_pool_size() -> usize {
    4
}

const fn default_max_commit_retries() -> u32 {
    8
}

const fn default_limit() -> usize {
    50
}

fn default_addr() -> String {
    "127.0.0.1:8081".to_string()
}

impl ProjectConfig {
    /// Apply `TIX_STORE_BACKEND`, `TIX_STORE_TIMEOUT_MS` and `TIX_HTTP_ADDR`
    /// from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is present but malformed.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("TIX_STORE_BACKEND") {
            self.store.backend = raw.parse().context("TIX_STORE_BACKEND")?;
        }
        if let Some(raw) = lookup("TIX_STORE_TIMEOUT_MS") {
            self.store.timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("TIX_STORE_TIMEOUT_MS: invalid value '{raw}'"))?;
        }
        if let Some(raw) = lookup("TIX_HTTP_ADDR") {
            self.server.addr = raw.trim().to_string();
        }
        Ok(())
    }

    /// Render as TOML, for writing a fresh config file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize config")
    }
}

/// Read `.tix/config.toml` under `project_root`, falling back to defaults when
/// the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Project config with environment overrides applied.
///
/// # Errors
///
/// Returns an error if the file or an override is malformed.
pub fn resolve_config(project_root: &Path) -> Result<ProjectConfig> {
    let mut config = load_project_config(project_root)?;
    config.apply_overrides(|key| env::var(key).ok())?;
    Ok(config)
}
