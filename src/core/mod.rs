// src/core/mod.rs
mod assembler;
mod bundle;
mod cache;
mod differ;
mod engine;
mod outline;
mod project;
mod references;
mod scanner;
mod style;

pub use bundle::{
    detect_language, FileRecord, ProjectContextBundle, ProjectFlags, RankedItem, StructureSummary,
};
pub use scanner::{FileCorpusScanner, ProjectStructure};
pub use references::{normalize_path, ExtractedFileReference, FileReferenceExtractor};
pub use style::{AsyncStyle, Indentation, NamingConvention, QuoteStyle, StyleDetector, StyleProfile};
pub use outline::{HeuristicOutliner, OutlineExtractor, OutlineStrategy, SourceOutline, TreeSitterOutliner};
pub use cache::{
    canonical_file_set, fingerprint, staleness_hash, CacheCounters, CacheEntry, CacheStats,
    ContentFingerprintCache,
};
pub use project::ProjectProfiler;
pub use assembler::ContextAssembler;
pub use differ::{
    compute_hunks, BreakingCategory, BreakingChange, DiffAnalysis, DiffEngine, DiffHunk, DiffLine,
    DiffLineKind, DiffStats, Impact, SemanticCategory, SemanticChange,
};

// Export the main engine
pub use engine::{CacheAction, Engine};
