// src/core/scanner.rs
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::bundle::StructureSummary;

/// File inventory produced by a bounded scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectStructure {
    /// Folders relative to the scan root, in discovery order
    pub folders: Vec<PathBuf>,

    /// Extension (without dot, empty for none) to relative file paths
    pub files_by_extension: BTreeMap<String, Vec<PathBuf>>,

    pub total_files: usize,
}

impl ProjectStructure {
    pub fn summary(&self) -> StructureSummary {
        StructureSummary {
            folders: self.folders.clone(),
            file_counts: self
                .files_by_extension
                .iter()
                .map(|(ext, files)| (ext.clone(), files.len()))
                .collect(),
            total_files: self.total_files,
        }
    }
}

/// Bounded-depth directory walker.
///
/// Symlinked directories are followed and cycles are not detected; the depth
/// limit is the only bound on how far a walk goes.
pub struct FileCorpusScanner {
    max_depth: usize,
    ignore_dirs: HashSet<String>,
}

impl FileCorpusScanner {
    pub fn new(max_depth: usize, ignore_dirs: &[String]) -> Self {
        Self {
            max_depth,
            ignore_dirs: ignore_dirs.iter().cloned().collect(),
        }
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_dirs.contains(name)
    }

    /// Scan `root`. Unreadable subtrees are skipped, never fatal.
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> ProjectStructure {
        let root = root.as_ref();
        let mut structure = ProjectStructure::default();

        // (directory, depth of its entries)
        let mut worklist: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

        while let Some((dir, depth)) = worklist.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping unreadable directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            let mut subdirs = Vec::new();
            let mut sorted: Vec<_> = entries.flatten().collect();
            sorted.sort_by_key(|entry| entry.file_name());

            for entry in sorted {
                let path = entry.path();
                let file_type = match std::fs::metadata(&path) {
                    Ok(meta) => meta.file_type(),
                    Err(e) => {
                        debug!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

                if file_type.is_dir() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if self.is_ignored(&name) {
                        continue;
                    }
                    structure.folders.push(relative);
                    if depth < self.max_depth {
                        subdirs.push((path, depth + 1));
                    }
                } else if file_type.is_file() {
                    let extension = path
                        .extension()
                        .map(|ext| ext.to_string_lossy().to_lowercase())
                        .unwrap_or_default();
                    structure
                        .files_by_extension
                        .entry(extension)
                        .or_default()
                        .push(relative);
                    structure.total_files += 1;
                }
            }

            // Reverse so the stack pops subdirectories in name order
            worklist.extend(subdirs.into_iter().rev());
        }

        debug!(
            "Scanned {}: {} folders, {} files",
            root.display(),
            structure.folders.len(),
            structure.total_files
        );
        structure
    }
}
