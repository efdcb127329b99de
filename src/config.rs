//! Configuration for the recovery orchestrator.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (RECOVERY_HOME, RECOVERY_MAX_OUTPUTS, RECOVERY_RESULT_CACHE)
//! 2. Config file (.recovery/config.yaml)
//! 3. Defaults (~/.recovery, in-memory store)
//!
//! Config file discovery:
//! - Searches current directory and parents for .recovery/config.yaml
//! - Relative paths in the config file resolve against the .recovery/ directory

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{ExecutionLimits, DEFAULT_RESULT_CAPACITY};
use crate::store::{JsonlRunStore, MemoryRunStore, RunStore, StoreError};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const ENV_HOME: &str = "RECOVERY_HOME";
pub const ENV_MAX_OUTPUTS: &str = "RECOVERY_MAX_OUTPUTS";
pub const ENV_RESULT_CACHE: &str = "RECOVERY_RESULT_CACHE";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub execution: Option<ExecutionConfig>,
    #[serde(default)]
    pub results: Option<ResultsConfig>,
    #[serde(default)]
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    pub max_outputs: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsConfig {
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub kind: Option<StoreKind>,
    /// JSONL file path (relative to the config file's directory)
    pub path: Option<String>,
}

/// Which run store backs the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    Jsonl,
}

/// Resolved store settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// Used by the JSONL store
    pub path: PathBuf,
}

impl StoreSettings {
    /// Open the configured store
    pub async fn open(&self) -> Result<Arc<dyn RunStore>, StoreError> {
        match self.kind {
            StoreKind::Memory => Ok(Arc::new(MemoryRunStore::new())),
            StoreKind::Jsonl => Ok(Arc::new(JsonlRunStore::open(self.path.clone()).await?)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSettings {
    /// Results kept for lookup by run id
    pub capacity: usize,
}

impl Default for ResultSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RESULT_CAPACITY,
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state directory
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub execution: ExecutionLimits,
    pub results: ResultSettings,
    pub store: StoreSettings,
}

/// Values read from the environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<PathBuf>,
    pub max_outputs: Option<usize>,
    pub result_capacity: Option<usize>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            home: std::env::var(ENV_HOME).ok().map(PathBuf::from),
            max_outputs: parse_env(ENV_MAX_OUTPUTS)?,
            result_capacity: parse_env(ENV_RESULT_CACHE)?,
        })
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    find_config_file_from(std::env::current_dir().ok()?)
}

fn find_config_file_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(".recovery").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge a config file and environment overrides on top of defaults
pub fn resolve_config(
    file: Option<(&Path, ConfigFile)>,
    env: &EnvOverrides,
    default_home: PathBuf,
) -> ResolvedConfig {
    let (config_file, file) = match file {
        Some((path, file)) => (Some(path.to_path_buf()), Some(file)),
        None => (None, None),
    };
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let home = env.home.clone().unwrap_or_else(|| {
        file.as_ref()
            .and_then(|f| f.home.as_deref())
            .map(|h| resolve_path(&base_dir, h))
            .unwrap_or(default_home)
    });

    let max_outputs = env.max_outputs.unwrap_or_else(|| {
        file.as_ref()
            .and_then(|f| f.execution.as_ref())
            .and_then(|e| e.max_outputs)
            .unwrap_or(ExecutionLimits::default().max_outputs)
    });

    let capacity = env.result_capacity.unwrap_or_else(|| {
        file.as_ref()
            .and_then(|f| f.results.as_ref())
            .and_then(|r| r.capacity)
            .unwrap_or(DEFAULT_RESULT_CAPACITY)
    });

    let store_config = file.as_ref().and_then(|f| f.store.as_ref());
    let store = StoreSettings {
        kind: store_config.and_then(|s| s.kind).unwrap_or_default(),
        path: store_config
            .and_then(|s| s.path.as_deref())
            .map(|p| resolve_path(&base_dir, p))
            .unwrap_or_else(|| home.join("runs").join("records.jsonl")),
    };

    ResolvedConfig {
        home,
        config_file,
        execution: ExecutionLimits::new(max_outputs),
        results: ResultSettings { capacity },
        store,
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".recovery");

    let env = EnvOverrides::from_env()?;

    match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            Ok(resolve_config(Some((path.as_path(), file)), &env, default_home))
        }
        None => Ok(resolve_config(None, &env, default_home)),
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
