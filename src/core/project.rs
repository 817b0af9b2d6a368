// src/core/project.rs
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use super::bundle::ProjectFlags;

const LINT_CONFIGS: &[&str] = &[
    ".eslintrc",
    ".eslintrc.js",
    ".eslintrc.cjs",
    ".eslintrc.json",
    ".eslintrc.yml",
    ".eslintrc.yaml",
    "eslint.config.js",
    "eslint.config.mjs",
    "eslint.config.ts",
    ".prettierrc",
    ".prettierrc.json",
    "prettier.config.js",
    "biome.json",
    ".flake8",
    "ruff.toml",
    ".pylintrc",
    "clippy.toml",
    "rustfmt.toml",
    ".golangci.yml",
];

// Checked in order; the first lockfile found wins
const PACKAGE_MANAGERS: &[(&str, &str)] = &[
    ("pnpm-lock.yaml", "pnpm"),
    ("yarn.lock", "yarn"),
    ("bun.lockb", "bun"),
    ("package-lock.json", "npm"),
    ("Cargo.toml", "cargo"),
    ("poetry.lock", "poetry"),
    ("uv.lock", "uv"),
    ("requirements.txt", "pip"),
    ("go.mod", "go"),
    ("package.json", "npm"),
];

const JS_FRAMEWORKS: &[(&str, &str)] = &[
    ("next", "Next.js"),
    ("react", "React"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("@angular/core", "Angular"),
    ("express", "Express"),
    ("@nestjs/core", "NestJS"),
    ("fastify", "Fastify"),
    ("vite", "Vite"),
    ("jest", "Jest"),
    ("vitest", "Vitest"),
    ("tailwindcss", "Tailwind CSS"),
];

const RUST_FRAMEWORKS: &[(&str, &str)] = &[
    ("axum", "Axum"),
    ("actix-web", "Actix Web"),
    ("rocket", "Rocket"),
    ("warp", "Warp"),
    ("tokio", "Tokio"),
    ("clap", "Clap"),
];

const PYTHON_FRAMEWORKS: &[(&str, &str)] = &[
    ("django", "Django"),
    ("flask", "Flask"),
    ("fastapi", "FastAPI"),
    ("pytest", "pytest"),
];

/// Detects project-level configuration signals from well-known files
pub struct ProjectProfiler;

impl ProjectProfiler {
    pub fn profile<P: AsRef<Path>>(project_root: P) -> ProjectFlags {
        let root = project_root.as_ref();

        let mut frameworks = BTreeSet::new();
        if let Some(names) = package_json_dependencies(root) {
            collect_frameworks(&names, JS_FRAMEWORKS, &mut frameworks);
        }
        if let Some(names) = cargo_dependencies(root) {
            collect_frameworks(&names, RUST_FRAMEWORKS, &mut frameworks);
        }
        if let Some(names) = python_requirements(root) {
            collect_frameworks(&names, PYTHON_FRAMEWORKS, &mut frameworks);
        }

        let flags = ProjectFlags {
            has_strict_typing: has_strict_typing(root),
            has_lint_config: LINT_CONFIGS.iter().any(|name| root.join(name).is_file()),
            package_manager: PACKAGE_MANAGERS
                .iter()
                .find(|(file, _)| root.join(file).is_file())
                .map(|(_, manager)| manager.to_string()),
            frameworks: frameworks.into_iter().collect(),
        };

        debug!("Project flags for {}: {:?}", root.display(), flags);
        flags
    }
}

fn has_strict_typing(root: &Path) -> bool {
    let tsconfig_strict = std::fs::read_to_string(root.join("tsconfig.json"))
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|json| json.pointer("/compilerOptions/strict").and_then(|v| v.as_bool()))
        .unwrap_or(false);

    tsconfig_strict
        || root.join("mypy.ini").is_file()
        || root.join("pyrightconfig.json").is_file()
        || root.join("Cargo.toml").is_file()
}

fn package_json_dependencies(root: &Path) -> Option<BTreeSet<String>> {
    let content = std::fs::read_to_string(root.join("package.json")).ok()?;
    let json: serde_json::Value = match serde_json::from_str(&content) {
        Ok(json) => json,
        Err(e) => {
            debug!("Skipping malformed package.json: {}", e);
            return None;
        }
    };

    let mut names = BTreeSet::new();
    for table in ["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(deps) = json.get(table).and_then(|d| d.as_object()) {
            names.extend(deps.keys().cloned());
        }
    }
    Some(names)
}

fn cargo_dependencies(root: &Path) -> Option<BTreeSet<String>> {
    let content = std::fs::read_to_string(root.join("Cargo.toml")).ok()?;
    let manifest: toml::Value = match toml::from_str(&content) {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!("Skipping malformed Cargo.toml: {}", e);
            return None;
        }
    };

    let mut names = BTreeSet::new();
    for table in ["dependencies", "dev-dependencies"] {
        if let Some(deps) = manifest.get(table).and_then(|d| d.as_table()) {
            names.extend(deps.keys().cloned());
        }
    }
    if let Some(deps) = manifest
        .get("workspace")
        .and_then(|w| w.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        names.extend(deps.keys().cloned());
    }
    Some(names)
}

fn python_requirements(root: &Path) -> Option<BTreeSet<String>> {
    let content = std::fs::read_to_string(root.join("requirements.txt")).ok()?;
    Some(
        content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                line.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
                    .next()
                    .map(|name| name.to_lowercase())
            })
            .collect(),
    )
}

fn collect_frameworks(names: &BTreeSet<String>, known: &[(&str, &str)], found: &mut BTreeSet<String>) {
    for (dependency, framework) in known {
        if names.contains(*dependency) {
            found.insert(framework.to_string());
        }
    }
}
