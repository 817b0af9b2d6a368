// src/core/assembler.rs
use chrono::Utc;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Result;
use super::bundle::{FileRecord, ProjectContextBundle, RankedItem};
use super::cache::ContentFingerprintCache;
use super::outline::OutlineStrategy;
use super::project::ProjectProfiler;
use super::references::{normalize_path, ExtractedFileReference};
use super::scanner::FileCorpusScanner;
use super::style::StyleDetector;

/// Builds [`ProjectContextBundle`]s for a project, consulting the cache first
pub struct ContextAssembler {
    project_root: PathBuf,
    similar_files_limit: usize,
    similar_search_depth: usize,
    top_k: usize,
    max_file_size: u64,
    ignore_dirs: HashSet<String>,
    scanner: FileCorpusScanner,
    style_detector: StyleDetector,
    outlines: OutlineStrategy,
    structure_patterns: Vec<(&'static str, Regex)>,
    cache: Option<Arc<ContentFingerprintCache>>,
}

impl ContextAssembler {
    pub fn new<P: AsRef<Path>>(
        project_root: P,
        config: &Config,
        cache: Option<Arc<ContentFingerprintCache>>,
    ) -> Result<Self> {
        let structure_patterns = vec![
            ("default export", Regex::new(r"\bexport\s+default\b")?),
            ("class export", Regex::new(r"\bexport\s+(?:default\s+)?(?:abstract\s+)?class\b")?),
            ("interface export", Regex::new(r"\bexport\s+interface\b")?),
            ("type export", Regex::new(r"\bexport\s+type\b")?),
            ("named export", Regex::new(r"\bexport\s+(?:const|let|var|function|async\s+function)\b")?),
            ("async function", Regex::new(r"\basync\s+(?:function\b|fn\b|def\b|\()")?),
            ("arrow function", Regex::new(r"=>")?),
            ("class declaration", Regex::new(r"\bclass\s+[A-Z]\w*")?),
        ];

        Ok(Self {
            project_root: project_root.as_ref().to_path_buf(),
            similar_files_limit: config.context.similar_files_limit,
            similar_search_depth: config.context.similar_search_depth,
            top_k: config.context.top_k,
            max_file_size: config.context.max_file_size,
            ignore_dirs: config.project.ignore_dirs.iter().cloned().collect(),
            scanner: FileCorpusScanner::new(config.context.scan_depth, &config.project.ignore_dirs),
            style_detector: StyleDetector::new()?,
            outlines: OutlineStrategy::new()?,
            structure_patterns,
            cache,
        })
    }

    /// Assemble context for an intent.
    ///
    /// Explicit references come first, then target files not already covered.
    /// Files that cannot be read are skipped; referenced files that do not
    /// exist are included empty and flagged for creation.
    pub async fn collect_context(
        &self,
        intent: &str,
        target_files: &[PathBuf],
        explicit_files: Option<&[ExtractedFileReference]>,
    ) -> ProjectContextBundle {
        let explicit = explicit_files.unwrap_or_default();

        let mut requested: Vec<(PathBuf, bool)> = explicit
            .iter()
            .map(|reference| (reference.resolved.clone(), reference.exists))
            .collect();
        requested.extend(target_files.iter().map(|target| {
            let path = self.absolute(target);
            let exists = path.exists();
            (path, exists)
        }));

        // An empty file set has no staleness signal, so it is never cached
        let key_files: Vec<PathBuf> = requested.iter().map(|(path, _)| path.clone()).collect();
        let cache = self.cache.as_ref().filter(|_| !key_files.is_empty());
        if let Some(cache) = cache {
            if let Some(mut bundle) = cache.get(&key_files) {
                info!("♻️ Reusing cached context for {} files", key_files.len());
                bundle.intent = intent.to_string();
                return bundle;
            }
        }

        let mut covered = HashSet::new();
        let mut related_files = Vec::new();
        for (path, exists) in &requested {
            if !covered.insert(path.clone()) {
                continue;
            }
            if *exists {
                match FileRecord::load(path).await {
                    Some(record) => related_files.push(record),
                    None => debug!("Skipping unreadable file {}", path.display()),
                }
            } else {
                debug!("{} does not exist, marking for creation", path.display());
                related_files.push(FileRecord::placeholder(path));
            }
        }

        let similar_files = self.find_similar_files(&related_files, &covered).await;
        let structure = self.scanner.scan(&self.project_root).summary();

        let sample: Vec<&FileRecord> = related_files.iter().chain(similar_files.iter()).collect();
        let style = self.style_detector.detect(sample.iter().copied());
        let common_imports = self.common_imports(&sample);
        let common_patterns = self.common_patterns(&sample);
        let project = ProjectProfiler::profile(&self.project_root);

        info!(
            "📦 Assembled context: {} related, {} similar, {} files scanned",
            related_files.len(),
            similar_files.len(),
            structure.total_files
        );

        let bundle = ProjectContextBundle {
            intent: intent.to_string(),
            related_files,
            similar_files,
            style,
            common_imports,
            common_patterns,
            project,
            structure,
            assembled_at: Utc::now(),
        };

        if let Some(cache) = cache {
            cache.set(&key_files, bundle.clone());
        }
        bundle
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.project_root.join(path))
        }
    }

    /// Files sharing an extension with any related file, for reference only
    async fn find_similar_files(&self, related: &[FileRecord], exclude: &HashSet<PathBuf>) -> Vec<FileRecord> {
        let extensions: BTreeSet<String> = related
            .iter()
            .filter_map(|record| record.extension())
            .map(|ext| ext.to_lowercase())
            .collect();
        if extensions.is_empty() || self.similar_files_limit == 0 {
            return Vec::new();
        }

        let walker = WalkDir::new(&self.project_root)
            .max_depth(self.similar_search_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.ignore_dirs.contains(&*entry.file_name().to_string_lossy())
            });

        let mut similar = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping entry during similar-file search: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || exclude.contains(entry.path()) {
                continue;
            }

            let matches_extension = entry
                .path()
                .extension()
                .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase()))
                .unwrap_or(false);
            let small_enough = entry
                .metadata()
                .map(|meta| meta.len() <= self.max_file_size)
                .unwrap_or(false);
            if !matches_extension || !small_enough {
                continue;
            }

            if let Some(record) = FileRecord::load(entry.path()).await {
                similar.push(record);
                if similar.len() >= self.similar_files_limit {
                    break;
                }
            }
        }

        similar
    }

    /// Modules imported by the most files
    fn common_imports(&self, files: &[&FileRecord]) -> Vec<RankedItem> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for file in files.iter().filter(|f| !f.content.is_empty()) {
            let outline = self.outlines.outline(&file.content, &file.language);
            for module in outline.imports {
                *counts.entry(module).or_insert(0) += 1;
            }
        }
        rank(counts, self.top_k)
    }

    /// Structural idioms by number of occurrences
    fn common_patterns(&self, files: &[&FileRecord]) -> Vec<RankedItem> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for file in files {
            for (label, regex) in &self.structure_patterns {
                let found = regex.find_iter(&file.content).count();
                if found > 0 {
                    *counts.entry(label.to_string()).or_insert(0) += found;
                }
            }
        }
        rank(counts, self.top_k)
    }
}

/// Descending by count, ties alphabetical, truncated to `k`
fn rank(counts: HashMap<String, usize>, k: usize) -> Vec<RankedItem> {
    let mut items: Vec<RankedItem> = counts
        .into_iter()
        .map(|(name, count)| RankedItem { name, count })
        .collect();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    items.truncate(k);
    items
}
