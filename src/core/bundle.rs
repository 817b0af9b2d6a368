// src/core/bundle.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::style::StyleProfile;

/// A source file as read during context assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path of the file
    pub path: PathBuf,

    /// Full text content (empty for files that do not exist yet)
    pub content: String,

    /// Language tag derived from the extension
    pub language: String,

    /// Size in bytes on disk
    pub size: u64,

    /// Last modification time, when known
    pub modified: Option<DateTime<Utc>>,

    /// The file was referenced but does not exist and should be created
    pub is_new: bool,
}

impl FileRecord {
    /// Read a file from disk. Returns `None` when it cannot be read as text.
    pub async fn load(path: &Path) -> Option<Self> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        let metadata = tokio::fs::metadata(path).await.ok()?;
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        Some(Self {
            path: path.to_path_buf(),
            language: detect_language(path).to_string(),
            size: metadata.len(),
            modified,
            content,
            is_new: false,
        })
    }

    /// Placeholder for a file the generator is expected to create
    pub fn placeholder(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            content: String::new(),
            language: detect_language(path).to_string(),
            size: 0,
            modified: None,
            is_new: true,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

/// Detect a language tag from a file path
pub fn detect_language(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "py" | "pyi" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "vue" => "vue",
        "svelte" => "svelte",
        "css" | "scss" | "sass" | "less" => "css",
        "html" | "htm" => "html",
        "json" => "json",
        "md" | "markdown" => "markdown",
        "toml" => "toml",
        "yml" | "yaml" => "yaml",
        _ => "unknown",
    }
}

/// A frequency-ranked item (import identifier or structural pattern)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem {
    pub name: String,
    pub count: usize,
}

/// Project-level configuration signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFlags {
    pub has_strict_typing: bool,
    pub has_lint_config: bool,
    pub package_manager: Option<String>,
    pub frameworks: Vec<String>,
}

/// Folder list and per-extension file counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub folders: Vec<PathBuf>,
    pub file_counts: BTreeMap<String, usize>,
    pub total_files: usize,
}

/// Assembled project context handed to a code generator.
///
/// Bundles are never mutated after assembly; the cache hands out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectContextBundle {
    pub intent: String,
    pub related_files: Vec<FileRecord>,
    pub similar_files: Vec<FileRecord>,
    pub style: StyleProfile,
    pub common_imports: Vec<RankedItem>,
    pub common_patterns: Vec<RankedItem>,
    pub project: ProjectFlags,
    pub structure: StructureSummary,
    pub assembled_at: DateTime<Utc>,
}

impl ProjectContextBundle {
    /// Files the generator should create rather than edit
    pub fn files_to_create(&self) -> impl Iterator<Item = &FileRecord> {
        self.related_files.iter().filter(|f| f.is_new)
    }
}
