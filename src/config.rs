use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PatchwrightError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project-wide settings
    pub project: ProjectConfig,

    /// Context assembly limits
    pub context: ContextConfig,

    /// Fingerprint cache settings
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory names never entered while scanning
    pub ignore_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Depth limit for the structural scan
    pub scan_depth: usize,

    /// Maximum number of similar files attached for reference
    pub similar_files_limit: usize,

    /// Depth limit for the similar-file search
    pub similar_search_depth: usize,

    /// Number of common imports / patterns kept in a bundle
    pub top_k: usize,

    /// Files larger than this (in bytes) are not sampled as similar files
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether assembled bundles are cached at all
    pub enabled: bool,

    /// Entries older than this are treated as expired
    pub max_age_secs: u64,

    /// Capacity; the oldest entry is evicted when full
    pub max_entries: usize,

    /// Load the snapshot on start and write it back after assembly
    pub persist: bool,

    /// Snapshot location, relative to the project root unless absolute
    pub snapshot_path: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: [
                ".git",
                "node_modules",
                "target",
                "dist",
                "build",
                "out",
                "coverage",
                ".next",
                ".cache",
                "__pycache__",
                ".venv",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            scan_depth: 4,
            similar_files_limit: 5,
            similar_search_depth: 3,
            top_k: 10,
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: 30 * 60,
            max_entries: 100,
            persist: false,
            snapshot_path: PathBuf::from(".patchwright/context-cache.json"),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| PatchwrightError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PatchwrightError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Patchwright.toml",
                    "patchwright.toml",
                    ".patchwright.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
