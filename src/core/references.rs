// src/core/references.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::Result;

const SOURCE_ROOTS: &[&str] = &["", "src", "lib", "app"];
const BASENAME_SEARCH_DEPTH: usize = 2;
/// Any extension: a letter followed by up to nine alphanumerics
const FILE_EXTENSION: &str = "[A-Za-z][A-Za-z0-9]{0,9}";

/// A file path mentioned in free-form text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFileReference {
    /// Text as written, without quoting delimiters
    pub original: String,

    /// Normalized absolute path (best guess when the file does not exist)
    pub resolved: PathBuf,

    pub exists: bool,

    /// Extension without the leading dot
    pub extension: String,

    pub file_name: String,

    /// Written as an absolute path (POSIX or Windows style)
    pub is_absolute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    WindowsAbsolute,
    PosixAbsolute,
    Quoted,
    Relative,
    Bare,
}

struct Candidate {
    kind: PatternKind,
    start: usize,
    end: usize,
    text: String,
}

/// Pulls file references out of user intents and resolves them against a project
pub struct FileReferenceExtractor {
    project_root: PathBuf,
    ignore_dirs: HashSet<String>,
    windows_regex: Regex,
    posix_regex: Regex,
    quoted_regex: Regex,
    relative_regex: Regex,
    bare_regex: Regex,
}

impl FileReferenceExtractor {
    pub fn new<P: AsRef<Path>>(project_root: P, ignore_dirs: &[String]) -> Result<Self> {
        Ok(Self {
            project_root: project_root.as_ref().to_path_buf(),
            ignore_dirs: ignore_dirs.iter().cloned().collect(),
            windows_regex: Regex::new(r#"[A-Za-z]:\\(?:[^\\/:*?"<>|\s`']+\\)*[^\\/:*?"<>|\s`']+"#)?,
            posix_regex: Regex::new(r"(?:^|[\s(\[])(/(?:[\w.\-]+/)*[\w.\-]+)")?,
            quoted_regex: Regex::new(r#"`([^`\s]+)`|"([^"\s]+)"|'([^'\s]+)'"#)?,
            relative_regex: Regex::new(&format!(
                r"(?:\.{{1,2}}/)?(?:[\w.\-]+/)+[\w\-]+(?:\.[\w\-]+)*\.(?:{})\b",
                FILE_EXTENSION
            ))?,
            bare_regex: Regex::new(&format!(r"\b[\w\-]+(?:\.[\w\-]+)*\.(?:{})\b", FILE_EXTENSION))?,
        })
    }

    /// Extract and resolve every file reference in `text`, in first-seen order
    pub fn extract_file_paths(&self, text: &str) -> Vec<ExtractedFileReference> {
        let candidates = self.collect_candidates(text);

        let mut seen = HashSet::new();
        let mut references = Vec::new();
        for candidate in candidates {
            if seen.insert(candidate.text.clone()) {
                references.push(self.resolve(&candidate.text, candidate.kind));
            }
        }

        debug!("Extracted {} file references", references.len());
        references
    }

    /// Pick the reference an intent is most likely about
    pub fn extract_primary_file(&self, text: &str) -> Option<ExtractedFileReference> {
        let references = self.extract_file_paths(text);

        if let Some(existing) = references.iter().find(|r| r.exists) {
            return Some(existing.clone());
        }
        if let Some(absolute) = references.iter().find(|r| r.is_absolute) {
            return Some(absolute.clone());
        }
        references.into_iter().next()
    }

    fn collect_candidates(&self, text: &str) -> Vec<Candidate> {
        // Quoted spans are claimed first so no other pattern splits them
        let quoted: Vec<Candidate> = self
            .quoted_regex
            .captures_iter(text)
            .filter_map(|caps| {
                let inner = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
                let whole = caps.get(0)?;
                looks_like_path(inner.as_str()).then(|| Candidate {
                    kind: PatternKind::Quoted,
                    start: whole.start(),
                    end: whole.end(),
                    text: inner.as_str().to_string(),
                })
            })
            .collect();

        let mut spans: Vec<(usize, usize)> = quoted.iter().map(|c| (c.start, c.end)).collect();
        let mut accepted = Vec::new();

        let mut take = |kind: PatternKind, matches: Vec<(usize, usize, String)>, accepted: &mut Vec<Candidate>| {
            for (start, end, text) in matches {
                if spans.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                spans.push((start, end));
                accepted.push(Candidate { kind, start, end, text });
            }
        };

        let windows = self
            .windows_regex
            .find_iter(text)
            .map(|m| trimmed_match(m.start(), m.as_str()))
            .collect();
        take(PatternKind::WindowsAbsolute, windows, &mut accepted);

        let posix = self
            .posix_regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| trimmed_match(m.start(), m.as_str()))
            .collect();
        take(PatternKind::PosixAbsolute, posix, &mut accepted);

        accepted.extend(quoted);

        let relative = self
            .relative_regex
            .find_iter(text)
            .map(|m| (m.start(), m.end(), m.as_str().to_string()))
            .collect();
        take(PatternKind::Relative, relative, &mut accepted);

        let bare = self
            .bare_regex
            .find_iter(text)
            .map(|m| (m.start(), m.end(), m.as_str().to_string()))
            .collect();
        take(PatternKind::Bare, bare, &mut accepted);

        accepted.retain(|c| !c.text.is_empty());
        accepted
    }

    fn resolve(&self, text: &str, kind: PatternKind) -> ExtractedFileReference {
        let windows_style = kind == PatternKind::WindowsAbsolute || is_windows_absolute(text);
        let is_absolute = windows_style || Path::new(text).is_absolute();

        let mut resolved = if windows_style {
            PathBuf::from(text)
        } else if is_absolute {
            normalize_path(Path::new(text))
        } else {
            normalize_path(&self.project_root.join(text))
        };

        let mut exists = resolved.exists();
        if !exists {
            if let Some(name) = Path::new(&text.replace('\\', "/")).file_name() {
                if let Some(found) = self.find_by_basename(&name.to_string_lossy()) {
                    debug!("Resolved {} to {}", text, found.display());
                    resolved = found;
                    exists = true;
                }
            }
        }

        let file_name = Path::new(&resolved.to_string_lossy().replace('\\', "/"))
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| text.to_string());
        let extension = Path::new(&file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();

        ExtractedFileReference {
            original: text.to_string(),
            resolved,
            exists,
            extension,
            file_name,
            is_absolute,
        }
    }

    /// Breadth-first search for `name` under the conventional source roots
    fn find_by_basename(&self, name: &str) -> Option<PathBuf> {
        for root in SOURCE_ROOTS {
            let search_root = if root.is_empty() {
                self.project_root.clone()
            } else {
                self.project_root.join(root)
            };
            if !search_root.is_dir() {
                continue;
            }

            let mut queue = VecDeque::from([(search_root, 0usize)]);
            while let Some((dir, depth)) = queue.pop_front() {
                let Ok(entries) = std::fs::read_dir(&dir) else {
                    continue;
                };
                let mut entries: Vec<_> = entries.flatten().collect();
                entries.sort_by_key(|e| e.file_name());

                for entry in entries {
                    let path = entry.path();
                    let entry_name = entry.file_name().to_string_lossy().to_string();
                    if path.is_dir() {
                        if depth < BASENAME_SEARCH_DEPTH && !self.ignore_dirs.contains(&entry_name) {
                            queue.push_back((path, depth + 1));
                        }
                    } else if entry_name == name {
                        return Some(path);
                    }
                }
            }
        }
        None
    }
}

fn looks_like_path(text: &str) -> bool {
    if text.contains('/') || text.contains('\\') {
        return true;
    }
    match text.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Drop sentence punctuation that the greedy path patterns pick up
fn trimmed_match(start: usize, text: &str) -> (usize, usize, String) {
    let trimmed = text.trim_end_matches(['.', ',', ';', ':']);
    (start, start + trimmed.len(), trimmed.to_string())
}

fn is_windows_absolute(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Lexically normalize `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    fn extractor(root: &Path) -> FileReferenceExtractor {
        FileReferenceExtractor::new(root, &ProjectConfig::default().ignore_dirs).unwrap()
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_backtick_path_is_stripped_and_single() {
        let dir = tempfile::tempdir().unwrap();
        let refs = extractor(dir.path()).extract_file_paths("please edit `src/app.ts` now");

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].original, "src/app.ts");
        assert_eq!(refs[0].resolved, dir.path().join("src/app.ts"));
        assert!(!refs[0].exists);
        assert_eq!(refs[0].extension, "ts");
        assert_eq!(refs[0].file_name, "app.ts");
    }

    #[test]
    fn test_relative_and_bare_do_not_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let refs = extractor(dir.path()).extract_file_paths("move src/utils/date.js next to helpers.js");

        let originals: Vec<_> = refs.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(originals, vec!["src/utils/date.js", "helpers.js"]);
    }

    #[test]
    fn test_any_extension_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let refs = extractor(dir.path())
            .extract_file_paths("update docs/notes.txt and settings.xml and build.gradle");

        let originals: Vec<_> = refs.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(originals, vec!["docs/notes.txt", "settings.xml", "build.gradle"]);
        assert_eq!(refs[2].extension, "gradle");
    }

    #[test]
    fn test_duplicates_keep_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let refs = extractor(dir.path()).extract_file_paths("fix index.ts, then index.ts and main.py");

        let originals: Vec<_> = refs.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(originals, vec!["index.ts", "main.py"]);
    }

    #[test]
    fn test_absolute_posix_path() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "server/main.go");
        let absolute = dir.path().join("server/main.go");
        let text = format!("look at {}.", absolute.display());

        let refs = extractor(dir.path()).extract_file_paths(&text);
        assert_eq!(refs.len(), 1);
        assert!(refs[0].is_absolute);
        assert!(refs[0].exists);
        assert_eq!(refs[0].resolved, absolute);
    }

    #[test]
    fn test_windows_path_is_kept_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let refs = extractor(dir.path()).extract_file_paths(r"open C:\work\app\main.ts please");

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].original, r"C:\work\app\main.ts");
        assert_eq!(refs[0].file_name, "main.ts");
        assert!(refs[0].is_absolute);
    }

    #[test]
    fn test_missing_relative_falls_back_to_basename_search() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/components/Button.tsx");

        let refs = extractor(dir.path()).extract_file_paths("style Button.tsx like the header");
        assert_eq!(refs.len(), 1);
        assert!(refs[0].exists);
        assert_eq!(refs[0].resolved, dir.path().join("src/components/Button.tsx"));
    }

    #[test]
    fn test_basename_search_is_depth_bounded() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/b/c/d/deep.rs");

        let refs = extractor(dir.path()).extract_file_paths("update deep.rs");
        assert_eq!(refs.len(), 1);
        assert!(!refs[0].exists);
        assert_eq!(refs[0].resolved, dir.path().join("deep.rs"));
    }

    #[test]
    fn test_primary_prefers_existing_then_absolute() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "lib/store.py");
        let ex = extractor(dir.path());

        let primary = ex.extract_primary_file("create new_api.py using store.py").unwrap();
        assert_eq!(primary.original, "store.py");

        let primary = ex.extract_primary_file("create new_api.py and /tmp/nope/other.py").unwrap();
        assert_eq!(primary.original, "/tmp/nope/other.py");

        let primary = ex.extract_primary_file("create first.py and second.py").unwrap();
        assert_eq!(primary.original, "first.py");

        assert!(ex.extract_primary_file("no files here").is_none());
    }

    #[test]
    fn test_quoted_words_without_paths_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let refs = extractor(dir.path()).extract_file_paths("rename `count` to \"total\"");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c.ts")), PathBuf::from("/a/c.ts"));
    }
}
