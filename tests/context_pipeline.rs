use assert_fs::prelude::*;
use chrono::Duration;
use predicates::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

use patchwright::config::Config;
use patchwright::core::{
    ContentFingerprintCache, ContextAssembler, FileCorpusScanner, FileReferenceExtractor,
};

fn project() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("package.json")
        .write_str(r#"{"dependencies": {"express": "4"}}"#)
        .unwrap();
    temp.child("package-lock.json").write_str("{}").unwrap();
    temp.child("src/server.js")
        .write_str("const express = require('express');\nconst app = express();\napp.listen(3000);\n")
        .unwrap();
    temp.child("src/routes/users.js")
        .write_str("const express = require('express');\nmodule.exports = express.Router();\n")
        .unwrap();
    temp.child(".git/config").write_str("[core]\n").unwrap();
    temp.child("node_modules/express/index.js")
        .write_str("module.exports = {};\n")
        .unwrap();
    temp
}

#[tokio::test]
async fn intent_to_bundle_round_trip_through_cache() {
    let temp = project();
    let config = Config::default();
    let cache = Arc::new(ContentFingerprintCache::with_limits(Duration::minutes(5), 8));

    let extractor = FileReferenceExtractor::new(temp.path(), &config.project.ignore_dirs).unwrap();
    let assembler = ContextAssembler::new(temp.path(), &config, Some(cache.clone())).unwrap();

    let intent = "add logging to server.js";
    let references = extractor.extract_file_paths(intent);
    assert_eq!(references.len(), 1);
    assert!(references[0].exists);
    assert_eq!(references[0].resolved, temp.path().join("src/server.js"));

    let bundle = assembler.collect_context(intent, &[], Some(&references)).await;
    assert_eq!(bundle.related_files.len(), 1);
    assert_eq!(bundle.similar_files.len(), 1);
    assert_eq!(bundle.common_imports[0].name, "express");
    assert_eq!(bundle.common_imports[0].count, 2);
    assert_eq!(bundle.project.package_manager.as_deref(), Some("npm"));
    assert_eq!(bundle.project.frameworks, vec!["Express".to_string()]);
    assert_eq!(bundle.structure.total_files, 4);

    let again = assembler.collect_context(intent, &[], Some(&references)).await;
    assert_eq!(again, bundle);
    assert_eq!(cache.stats().hits, 1);

    temp.child("src/server.js")
        .write_str("const express = require('express');\n")
        .unwrap();
    let rebuilt = assembler.collect_context(intent, &[], Some(&references)).await;
    assert_ne!(rebuilt.related_files[0].content, bundle.related_files[0].content);
    assert_eq!(cache.stats().entry_count, 1);
}

#[tokio::test]
async fn snapshot_survives_a_new_cache_instance() {
    let temp = project();
    let snapshot = temp.child(".patchwright/context-cache.json");
    let target = vec![PathBuf::from("src/server.js")];

    let cache = Arc::new(ContentFingerprintCache::with_limits(Duration::minutes(5), 8));
    let assembler = ContextAssembler::new(temp.path(), &Config::default(), Some(cache.clone())).unwrap();
    let bundle = assembler.collect_context("tidy up", &target, None).await;
    cache.export(snapshot.path()).unwrap();
    snapshot.assert(predicate::path::exists());
    snapshot.assert(predicate::str::contains("\"entries\""));

    let restored = Arc::new(ContentFingerprintCache::with_limits(Duration::minutes(5), 8));
    assert!(restored.import(snapshot.path()));
    let assembler = ContextAssembler::new(temp.path(), &Config::default(), Some(restored.clone())).unwrap();
    let served = assembler.collect_context("another intent", &target, None).await;

    assert_eq!(served.intent, "another intent");
    assert_eq!(served.related_files, bundle.related_files);
    assert_eq!(served.assembled_at, bundle.assembled_at);
    assert_eq!(restored.stats().hits, 1);
}

#[tokio::test]
async fn cached_context_carries_the_current_intent() {
    let temp = project();
    let cache = Arc::new(ContentFingerprintCache::with_limits(Duration::minutes(5), 8));
    let assembler = ContextAssembler::new(temp.path(), &Config::default(), Some(cache.clone())).unwrap();
    let target = vec![PathBuf::from("src/server.js")];

    assembler.collect_context("add logging to src/server.js", &target, None).await;
    let second = assembler
        .collect_context("delete everything in src/server.js", &target, None)
        .await;

    assert_eq!(cache.stats().hits, 1);
    assert_eq!(second.intent, "delete everything in src/server.js");
}

#[test]
fn scanner_skips_vcs_and_dependency_dirs() {
    let temp = project();
    let structure = FileCorpusScanner::new(50, &Config::default().project.ignore_dirs).scan(temp.path());

    let all_files: Vec<&PathBuf> = structure.files_by_extension.values().flatten().collect();
    assert!(all_files
        .iter()
        .all(|p| !p.starts_with(".git") && !p.starts_with("node_modules")));
    assert_eq!(structure.files_by_extension["js"].len(), 2);
}
