// src/core/differ.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use super::bundle::detect_language;
use super::outline::{OutlineStrategy, SourceOutline};

/// Trailing unchanged lines that close a hunk
const HUNK_CLOSE_CONTEXT: usize = 3;
/// A hunk must be longer than this before it can close
const HUNK_MIN_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    Add,
    Remove,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: String,
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    fn open(old_start: usize, new_start: usize) -> Self {
        Self {
            old_start,
            old_lines: 0,
            new_start,
            new_lines: 0,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, kind: DiffLineKind, content: &str, old_line: Option<usize>, new_line: Option<usize>) {
        if old_line.is_some() {
            self.old_lines += 1;
        }
        if new_line.is_some() {
            self.new_lines += 1;
        }
        self.lines.push(DiffLine {
            kind,
            content: content.to_string(),
            old_line,
            new_line,
        });
    }

    fn should_close(&self) -> bool {
        self.lines.len() > HUNK_MIN_LINES
            && self
                .lines
                .iter()
                .rev()
                .take(HUNK_CLOSE_CONTEXT)
                .all(|line| line.kind == DiffLineKind::Unchanged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticCategory {
    FunctionAdded,
    FunctionRemoved,
    ImportAdded,
    ImportRemoved,
    ExportAdded,
    ExportRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticChange {
    pub category: SemanticCategory,
    pub name: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakingCategory {
    Removal,
    SignatureChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    pub category: BreakingCategory,
    pub description: String,
    pub affected_files: Vec<PathBuf>,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Added lines not paired with a removal
    pub additions: usize,
    /// Removed lines not paired with an addition
    pub deletions: usize,
    /// Removal immediately followed by an addition
    pub modifications: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.deletions == 0 && self.modifications == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffAnalysis {
    pub hunks: Vec<DiffHunk>,
    pub semantic_changes: Vec<SemanticChange>,
    pub breaking_changes: Vec<BreakingChange>,
    pub stats: DiffStats,
    pub summary: String,
}

impl DiffAnalysis {
    pub fn has_changes(&self) -> bool {
        !self.hunks.is_empty()
    }
}

/// Line diff with a semantic overlay.
///
/// The line pass is positional: lines are compared pairwise by index and a
/// mismatch is reported as remove-then-add, so an insertion early in a file
/// shows every later line as modified.
pub struct DiffEngine {
    outlines: OutlineStrategy,
}

impl DiffEngine {
    pub fn new() -> Result<Self> {
        Ok(Self {
            outlines: OutlineStrategy::new()?,
        })
    }

    pub fn analyze_diff(&self, original: &str, modified: &str, path: Option<&Path>) -> DiffAnalysis {
        let hunks = compute_hunks(original, modified);

        let language = path.map(detect_language).unwrap_or("unknown");
        let before = self.outlines.outline(original, language);
        let after = self.outlines.outline(modified, language);

        let semantic_changes = semantic_changes(&before, &after);
        let affected_files: Vec<PathBuf> = path.map(|p| vec![p.to_path_buf()]).unwrap_or_default();
        let breaking_changes = breaking_changes(&before, &after, &affected_files);

        let stats = compute_stats(&hunks);
        let summary = summarize(&stats, semantic_changes.len(), breaking_changes.len());

        debug!(
            "Diff{}: {} hunks, {}",
            path.map(|p| format!(" of {}", p.display())).unwrap_or_default(),
            hunks.len(),
            summary
        );

        DiffAnalysis {
            hunks,
            semantic_changes,
            breaking_changes,
            stats,
            summary,
        }
    }
}

/// Positional two-cursor line diff
pub fn compute_hunks(original: &str, modified: &str) -> Vec<DiffHunk> {
    let old: Vec<&str> = original.split('\n').collect();
    let new: Vec<&str> = modified.split('\n').collect();

    let mut hunks = Vec::new();
    let mut current: Option<DiffHunk> = None;
    let (mut i, mut j) = (0, 0);

    while i < old.len() || j < new.len() {
        if i < old.len() && j < new.len() && old[i] == new[j] {
            if let Some(hunk) = current.as_mut() {
                hunk.push(DiffLineKind::Unchanged, old[i], Some(i + 1), Some(j + 1));
                if hunk.should_close() {
                    hunks.extend(current.take());
                }
            }
            i += 1;
            j += 1;
            continue;
        }

        let hunk = current.get_or_insert_with(|| DiffHunk::open(i + 1, j + 1));

        if i >= old.len() {
            hunk.push(DiffLineKind::Add, new[j], None, Some(j + 1));
            j += 1;
        } else if j >= new.len() {
            hunk.push(DiffLineKind::Remove, old[i], Some(i + 1), None);
            i += 1;
        } else {
            hunk.push(DiffLineKind::Remove, old[i], Some(i + 1), None);
            hunk.push(DiffLineKind::Add, new[j], None, Some(j + 1));
            i += 1;
            j += 1;
        }
    }

    hunks.extend(current);
    hunks
}

fn compute_stats(hunks: &[DiffHunk]) -> DiffStats {
    let mut stats = DiffStats::default();

    for hunk in hunks {
        let mut lines = hunk.lines.iter().peekable();
        while let Some(line) = lines.next() {
            match line.kind {
                DiffLineKind::Remove => {
                    if lines.peek().map_or(false, |next| next.kind == DiffLineKind::Add) {
                        lines.next();
                        stats.modifications += 1;
                    } else {
                        stats.deletions += 1;
                    }
                }
                DiffLineKind::Add => stats.additions += 1,
                DiffLineKind::Unchanged => {}
            }
        }
    }

    stats
}

fn semantic_changes(before: &SourceOutline, after: &SourceOutline) -> Vec<SemanticChange> {
    let mut changes = Vec::new();
    let mut record = |category, name: &String, impact| {
        changes.push(SemanticChange {
            category,
            name: name.clone(),
            impact,
        })
    };

    for name in after.functions.keys().filter(|n| !before.functions.contains_key(*n)) {
        record(SemanticCategory::FunctionAdded, name, Impact::Medium);
    }
    for name in before.functions.keys().filter(|n| !after.functions.contains_key(*n)) {
        record(SemanticCategory::FunctionRemoved, name, Impact::High);
    }
    for name in after.imports.difference(&before.imports) {
        record(SemanticCategory::ImportAdded, name, Impact::Low);
    }
    for name in before.imports.difference(&after.imports) {
        record(SemanticCategory::ImportRemoved, name, Impact::Medium);
    }
    for name in after.exports.difference(&before.exports) {
        record(SemanticCategory::ExportAdded, name, Impact::Medium);
    }
    for name in before.exports.difference(&after.exports) {
        record(SemanticCategory::ExportRemoved, name, Impact::High);
    }

    changes
}

fn breaking_changes(before: &SourceOutline, after: &SourceOutline, affected_files: &[PathBuf]) -> Vec<BreakingChange> {
    let mut changes = Vec::new();

    for name in before.exports.difference(&after.exports) {
        changes.push(BreakingChange {
            category: BreakingCategory::Removal,
            description: format!("Exported `{}` was removed", name),
            affected_files: affected_files.to_vec(),
            suggestion: format!(
                "Update every module importing `{}`, or keep a re-export for compatibility",
                name
            ),
        });
    }

    for (name, old_params) in &before.functions {
        let Some(new_params) = after.functions.get(name) else {
            continue;
        };
        if old_params.trim() != new_params.trim() {
            changes.push(BreakingChange {
                category: BreakingCategory::SignatureChange,
                description: format!(
                    "Signature of `{}` changed from ({}) to ({})",
                    name, old_params, new_params
                ),
                affected_files: affected_files.to_vec(),
                suggestion: format!(
                    "Review call sites of `{}`; consider default values for new parameters",
                    name
                ),
            });
        }
    }

    changes
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn summarize(stats: &DiffStats, semantic: usize, breaking: usize) -> String {
    if stats.is_empty() && semantic == 0 && breaking == 0 {
        return "No changes".to_string();
    }

    [
        (stats.additions, "addition"),
        (stats.deletions, "deletion"),
        (stats.modifications, "modification"),
        (semantic, "semantic change"),
        (breaking, "breaking change"),
    ]
    .iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, noun)| plural(*count, noun))
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DiffEngine {
        DiffEngine::new().unwrap()
    }

    fn kinds(hunk: &DiffHunk) -> Vec<(DiffLineKind, &str)> {
        hunk.lines.iter().map(|l| (l.kind, l.content.as_str())).collect()
    }

    #[test]
    fn test_identical_text_has_no_changes() {
        let analysis = engine().analyze_diff("a\nb\nc", "a\nb\nc", None);
        assert!(analysis.hunks.is_empty());
        assert_eq!(analysis.stats, DiffStats::default());
        assert_eq!(analysis.summary, "No changes");
        assert!(!analysis.has_changes());
    }

    #[test]
    fn test_single_line_modification() {
        let analysis = engine().analyze_diff("a\nb", "a\nx", None);
        assert_eq!(analysis.hunks.len(), 1);

        let hunk = &analysis.hunks[0];
        assert_eq!(kinds(hunk), vec![(DiffLineKind::Remove, "b"), (DiffLineKind::Add, "x")]);
        assert_eq!((hunk.old_start, hunk.new_start), (2, 2));
        assert_eq!((hunk.old_lines, hunk.new_lines), (1, 1));
        assert_eq!(analysis.stats.modifications, 1);
        assert_eq!(analysis.summary, "1 modification");
    }

    #[test]
    fn test_pure_addition_and_deletion_at_end() {
        let added = engine().analyze_diff("a", "a\nb\nc", None);
        assert_eq!(kinds(&added.hunks[0]), vec![(DiffLineKind::Add, "b"), (DiffLineKind::Add, "c")]);
        assert_eq!(added.stats.additions, 2);
        assert_eq!(added.summary, "2 additions");

        let removed = engine().analyze_diff("a\nb", "a", None);
        assert_eq!(kinds(&removed.hunks[0]), vec![(DiffLineKind::Remove, "b")]);
        assert_eq!(removed.stats.deletions, 1);
    }

    #[test]
    fn test_mid_stream_insertion_shifts_alignment() {
        // Positional comparison: everything after the insertion is reported as modified
        let analysis = engine().analyze_diff("a\nb\nc", "a\nnew\nb\nc", None);
        assert_eq!(analysis.hunks.len(), 1);
        assert_eq!(
            kinds(&analysis.hunks[0]),
            vec![
                (DiffLineKind::Remove, "b"),
                (DiffLineKind::Add, "new"),
                (DiffLineKind::Remove, "c"),
                (DiffLineKind::Add, "b"),
                (DiffLineKind::Add, "c"),
            ]
        );
        assert_eq!(analysis.stats.modifications, 2);
        assert_eq!(analysis.stats.additions, 1);
    }

    #[test]
    fn test_hunk_closes_after_context_run() {
        let original = "1\n2\n3\n4\n5\n6\n7\n8\n9";
        let modified = "x\ny\ny2\n4\n5\n6\n7\n8\nz";
        let analysis = engine().analyze_diff(original, modified, None);

        // 3 pairs (6 lines) + 3 unchanged closes the first hunk; the run of 7,8 is outside any hunk
        assert_eq!(analysis.hunks.len(), 2);
        assert_eq!(analysis.hunks[0].lines.len(), 9);
        assert_eq!(analysis.hunks[1].old_start, 9);
        assert_eq!(kinds(&analysis.hunks[1]), vec![(DiffLineKind::Remove, "9"), (DiffLineKind::Add, "z")]);
    }

    #[test]
    fn test_short_hunk_keeps_trailing_context() {
        let analysis = engine().analyze_diff("a\nb\nc\nd", "x\nb\nc\nd", None);
        assert_eq!(analysis.hunks.len(), 1);
        // Remove + add + 3 unchanged is only five lines, so the hunk stays open
        assert_eq!(analysis.hunks[0].lines.len(), 5);
        assert_eq!((analysis.hunks[0].old_lines, analysis.hunks[0].new_lines), (4, 4));

        let longer = engine().analyze_diff("a\nb\nc\nd\ne\nf", "x\nb\nc\nd\ne\nf", None);
        // The sixth line pushes the hunk past five lines and closes it before `f`
        assert_eq!(longer.hunks.len(), 1);
        assert_eq!(longer.hunks[0].lines.len(), 6);
    }

    #[test]
    fn test_line_numbers_are_monotonic() {
        let analysis = engine().analyze_diff("a\nb\nc\nd", "a\nB\nc\nD\ne", None);
        for hunk in &analysis.hunks {
            let old: Vec<_> = hunk.lines.iter().filter_map(|l| l.old_line).collect();
            let new: Vec<_> = hunk.lines.iter().filter_map(|l| l.new_line).collect();
            assert!(old.windows(2).all(|w| w[0] <= w[1]));
            assert!(new.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_removed_export_is_breaking() {
        let original = "export function foo(a) {}\nexport const bar = 1;\n";
        let modified = "export const bar = 1;\n";
        let analysis = engine().analyze_diff(original, modified, Some(Path::new("src/lib.ts")));

        let removals: Vec<_> = analysis
            .breaking_changes
            .iter()
            .filter(|c| c.category == BreakingCategory::Removal)
            .collect();
        assert_eq!(removals.len(), 1);
        assert!(removals[0].description.contains("foo"));
        assert_eq!(removals[0].affected_files, vec![PathBuf::from("src/lib.ts")]);
        assert!(analysis
            .semantic_changes
            .iter()
            .any(|c| c.category == SemanticCategory::FunctionRemoved && c.name == "foo" && c.impact == Impact::High));
    }

    #[test]
    fn test_added_import_is_low_impact() {
        let analysis = engine().analyze_diff("const a = 1;\n", "import y from 'x';\nconst a = 1;\n", None);

        let imports: Vec<_> = analysis
            .semantic_changes
            .iter()
            .filter(|c| c.category == SemanticCategory::ImportAdded)
            .collect();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].name, "x");
        assert_eq!(imports[0].impact, Impact::Low);
    }

    #[test]
    fn test_signature_change_in_javascript_uses_structural_tier() {
        let original = "export function total(items) {\n  return 0;\n}\n";
        let modified = "export function total(items, tax) {\n  return 0;\n}\n";
        let analysis = engine().analyze_diff(original, modified, Some(Path::new("cart.js")));

        assert_eq!(analysis.breaking_changes.len(), 1);
        let change = &analysis.breaking_changes[0];
        assert_eq!(change.category, BreakingCategory::SignatureChange);
        assert!(change.description.contains("items, tax"));
        assert_eq!(analysis.summary, "1 modification, 1 breaking change");
    }

    #[test]
    fn test_semantic_categories_serialize_kebab_case() {
        let json = serde_json::to_string(&SemanticCategory::ImportAdded).unwrap();
        assert_eq!(json, "\"import-added\"");
        let json = serde_json::to_string(&BreakingCategory::SignatureChange).unwrap();
        assert_eq!(json, "\"signature-change\"");
    }
}
