// src/core/engine.rs
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use super::{
    ContentFingerprintCache, ContextAssembler, DiffAnalysis, DiffEngine, DiffLineKind,
    FileReferenceExtractor, ProjectContextBundle,
};

/// Cache maintenance operations exposed on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    Stats,
    Clear,
    Cleanup,
    Export(PathBuf),
    Import(PathBuf),
}

/// Main orchestration engine: intents in, context bundles and diff reports out
pub struct Engine {
    config: Config,
    project_root: PathBuf,
    extractor: FileReferenceExtractor,
    assembler: ContextAssembler,
    differ: DiffEngine,
    cache: Arc<ContentFingerprintCache>,
}

impl Engine {
    /// Create a new engine for a project root (defaults to the current directory)
    pub async fn new(config_path: Option<&Path>, project_root: Option<PathBuf>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);

        let project_root = match project_root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let project_root = std::fs::canonicalize(&project_root).unwrap_or(project_root);

        let cache = Arc::new(ContentFingerprintCache::new(&config.cache));
        let extractor = FileReferenceExtractor::new(&project_root, &config.project.ignore_dirs)
            .map_err(|e| anyhow::anyhow!("Failed to create reference extractor: {}", e))?;
        let assembler = ContextAssembler::new(
            &project_root,
            &config,
            config.cache.enabled.then(|| cache.clone()),
        )?;
        let differ = DiffEngine::new()?;

        let engine = Self {
            config,
            project_root,
            extractor,
            assembler,
            differ,
            cache,
        };

        if engine.config.cache.persist {
            engine.load_snapshot();
        }

        Ok(engine)
    }

    fn snapshot_path(&self) -> PathBuf {
        if self.config.cache.snapshot_path.is_absolute() {
            self.config.cache.snapshot_path.clone()
        } else {
            self.project_root.join(&self.config.cache.snapshot_path)
        }
    }

    fn load_snapshot(&self) {
        let path = self.snapshot_path();
        if path.exists() {
            self.cache.import(&path);
        } else {
            debug!("No cache snapshot at {}", path.display());
        }
    }

    fn save_snapshot(&self) {
        let path = self.snapshot_path();
        if let Err(e) = self.cache.export(&path) {
            warn!("⚠️ Failed to write cache snapshot {}: {}", path.display(), e);
        }
    }

    /// Resolve the files an intent mentions and assemble context for them
    pub async fn prepare_context(&self, intent: &str, extra_files: &[PathBuf]) -> ProjectContextBundle {
        let references = self.extractor.extract_file_paths(intent);
        if let Some(primary) = self.extractor.extract_primary_file(intent) {
            info!("🎯 Primary file: {}", primary.resolved.display());
        }

        let bundle = self
            .assembler
            .collect_context(intent, extra_files, Some(&references))
            .await;

        if self.config.cache.persist && self.config.cache.enabled {
            self.save_snapshot();
        }
        bundle
    }

    pub async fn context(&self, intent: &str, files: &[PathBuf], json: bool) -> Result<()> {
        info!("🔍 Collecting context in {}", self.project_root.display());
        let bundle = self.prepare_context(intent, files).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&bundle)?);
        } else {
            print!("{}", render_bundle(&bundle));
        }
        Ok(())
    }

    pub fn references(&self, text: &str) -> Result<()> {
        let references = self.extractor.extract_file_paths(text);
        if references.is_empty() {
            println!("No file references found");
            return Ok(());
        }

        let primary = self.extractor.extract_primary_file(text);
        for reference in &references {
            let marker = if primary.as_ref() == Some(reference) { "*" } else { " " };
            let state = if reference.exists { "exists" } else { "missing" };
            println!(
                "{} {} -> {} ({})",
                marker,
                reference.original,
                reference.resolved.display(),
                state
            );
        }
        Ok(())
    }

    /// Compare two files; a missing file is treated as empty
    pub async fn analyze_files(&self, original: &Path, modified: &Path) -> DiffAnalysis {
        let before = read_or_empty(original).await;
        let after = read_or_empty(modified).await;
        self.differ.analyze_diff(&before, &after, Some(modified))
    }

    pub async fn diff(&self, original: &Path, modified: &Path, json: bool) -> Result<()> {
        let analysis = self.analyze_files(original, modified).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            print!("{}", render_diff(&analysis));
        }
        Ok(())
    }

    /// Run a maintenance action against the configured snapshot
    pub fn cache_command(&self, action: CacheAction) -> Result<()> {
        if !self.config.cache.persist {
            self.load_snapshot();
        }

        match action {
            CacheAction::Stats => {
                let stats = self.cache.stats();
                println!("entries: {}", stats.entry_count);
                println!("hits:    {}", stats.hits);
                println!("misses:  {}", stats.misses);
                println!("size:    ~{} bytes", stats.approx_byte_size);
            }
            CacheAction::Clear => {
                self.cache.clear();
                self.save_snapshot();
                println!("Cache cleared");
            }
            CacheAction::Cleanup => {
                let removed = self.cache.cleanup_expired();
                self.save_snapshot();
                println!("Removed {} expired entries", removed);
            }
            CacheAction::Export(path) => {
                self.cache.export(&path)?;
                println!("Exported cache to {}", path.display());
            }
            CacheAction::Import(path) => {
                if self.cache.import(&path) {
                    self.save_snapshot();
                    println!("Imported cache from {}", path.display());
                } else {
                    println!("Snapshot {} could not be read; cache unchanged", path.display());
                }
            }
        }
        Ok(())
    }
}

async fn read_or_empty(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!("Treating {} as empty: {}", path.display(), e);
            String::new()
        }
    }
}

fn render_bundle(bundle: &ProjectContextBundle) -> String {
    let mut out = String::new();
    out.push_str(&format!("Intent: {}\n", bundle.intent));

    out.push_str("\nRelated files:\n");
    for file in &bundle.related_files {
        let note = if file.is_new { " (new)" } else { "" };
        out.push_str(&format!("  {} [{}]{}\n", file.path.display(), file.language, note));
    }

    if !bundle.similar_files.is_empty() {
        out.push_str("\nSimilar files:\n");
        for file in &bundle.similar_files {
            out.push_str(&format!("  {}\n", file.path.display()));
        }
    }

    let style = &bundle.style;
    out.push_str(&format!(
        "\nStyle: {:?} ({}), {:?} quotes, semicolons: {}, {:?}, {:?}\n",
        style.indentation, style.indent_size, style.quotes, style.semicolons, style.async_style, style.naming
    ));

    if !bundle.common_imports.is_empty() {
        let imports: Vec<String> = bundle
            .common_imports
            .iter()
            .map(|i| format!("{} ({})", i.name, i.count))
            .collect();
        out.push_str(&format!("Common imports: {}\n", imports.join(", ")));
    }
    if !bundle.common_patterns.is_empty() {
        let patterns: Vec<String> = bundle
            .common_patterns
            .iter()
            .map(|p| format!("{} ({})", p.name, p.count))
            .collect();
        out.push_str(&format!("Common patterns: {}\n", patterns.join(", ")));
    }

    let project = &bundle.project;
    out.push_str(&format!(
        "Project: strict typing: {}, lint config: {}, package manager: {}, frameworks: {}\n",
        project.has_strict_typing,
        project.has_lint_config,
        project.package_manager.as_deref().unwrap_or("unknown"),
        if project.frameworks.is_empty() { "none".to_string() } else { project.frameworks.join(", ") }
    ));
    out.push_str(&format!(
        "Structure: {} files in {} folders\n",
        bundle.structure.total_files,
        bundle.structure.folders.len()
    ));
    out
}

fn render_diff(analysis: &DiffAnalysis) -> String {
    let mut out = String::new();

    for hunk in &analysis.hunks {
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines
        ));
        for line in &hunk.lines {
            let prefix = match line.kind {
                DiffLineKind::Add => '+',
                DiffLineKind::Remove => '-',
                DiffLineKind::Unchanged => ' ',
            };
            out.push_str(&format!("{}{}\n", prefix, line.content));
        }
    }

    if !analysis.semantic_changes.is_empty() {
        out.push_str("\nSemantic changes:\n");
        for change in &analysis.semantic_changes {
            out.push_str(&format!("  {:?} {} [{:?}]\n", change.category, change.name, change.impact));
        }
    }

    if !analysis.breaking_changes.is_empty() {
        out.push_str("\nBreaking changes:\n");
        for change in &analysis.breaking_changes {
            out.push_str(&format!("  {}\n    → {}\n", change.description, change.suggestion));
        }
    }

    out.push_str(&format!("\n{}\n", analysis.summary));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_context_uses_intent_references() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.js"), "export const x = 1;\n").unwrap();

        let engine = Engine::new(Some(Path::new("/no/config.toml")), Some(dir.path().to_path_buf()))
            .await
            .unwrap();
        let bundle = engine
            .prepare_context("add a route to `src/app.js` and create src/routes.js", &[])
            .await;

        let names: Vec<_> = bundle
            .related_files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["app.js", "routes.js"]);
        assert!(!bundle.related_files[0].is_new);
        assert!(bundle.related_files[1].is_new);
    }

    #[tokio::test]
    async fn test_analyze_files_treats_missing_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let modified = dir.path().join("new.ts");
        std::fs::write(&modified, "export const a = 1;").unwrap();

        let engine = Engine::new(Some(Path::new("/no/config.toml")), Some(dir.path().to_path_buf()))
            .await
            .unwrap();
        let analysis = engine.analyze_files(&dir.path().join("old.ts"), &modified).await;

        assert_eq!(analysis.stats.modifications, 1);
        assert!(render_diff(&analysis).contains("+export const a = 1;"));
    }

    #[test]
    fn test_render_diff_no_changes() {
        let analysis = DiffEngine::new().unwrap().analyze_diff("a", "a", None);
        assert_eq!(render_diff(&analysis), "\nNo changes\n");
    }
}
