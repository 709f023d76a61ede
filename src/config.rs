use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::import::DEFAULT_BATCH_SIZE;
use crate::reachability::DEFAULT_EXCLUDED_TYPES;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemseeConfig {
    /// Database opened at start-up when none is given on the command line
    pub database: Option<String>,
    /// Objects imported per committed transaction
    pub batch_size: Option<usize>,
    /// Types that stop ancestor classification
    pub excluded_ancestor_types: Option<Vec<String>>,
}

impl MemseeConfig {
    /// Config with every default spelled out, as written by `memsee init`
    pub fn with_defaults() -> Self {
        Self {
            database: None,
            batch_size: Some(DEFAULT_BATCH_SIZE),
            excluded_ancestor_types: Some(
                DEFAULT_EXCLUDED_TYPES.iter().map(|s| s.to_string()).collect(),
            ),
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            excluded_ancestor_types: self.excluded_ancestor_types.clone().unwrap_or_else(|| {
                DEFAULT_EXCLUDED_TYPES.iter().map(|s| s.to_string()).collect()
            }),
        }
    }
}

/// Resolved tunables used by the command layer
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub batch_size: usize,
    pub excluded_ancestor_types: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        MemseeConfig::default().settings()
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("memsee.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<MemseeConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: MemseeConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &MemseeConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
