// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The fast pass: file references, manifests, git status.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::{ContextFile, Dependencies, FileOrigin, GitStatus};

/// Extensions considered source files when enumerating a directory.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "c", "cpp", "h", "rb", "sh", "sql",
];

/// Keywords that make a non-coding prompt worth a file scan.
pub(crate) const CODING_HINTS: &[&str] = &[
    "code", "function", "file", "script", "implement", "bug", "class", "module",
];

pub(crate) const GIT_HINTS: &[&str] = &["git", "commit", "branch", "merge", "diff", "staged"];

/// Anchored patterns that pull explicit file references out of a prompt.
/// Kept as a function so the regex compile cost stays off the hot path —
/// the manager compiles once and reuses.
pub(crate) fn reference_patterns() -> Vec<Regex> {
    [
        // bare path with a known source extension: src/main.rs, ./lib/util.py
        r"(?:^|[\s`'\(])((?:\./)?[\w][\w./-]*\.(?:rs|py|js|ts|tsx|jsx|go|java|c|cpp|h|rb|sh|sql|json|ya?ml|toml|md))(?:$|[\s`'\),.:;])",
        // quoted path: "anything/with/extension"
        r#""([\w./-]+\.[\w]{1,5})""#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("reference patterns are static and valid"))
    .collect()
}

/// Explicit file references that resolve on disk, in order of appearance.
pub(crate) fn referenced_files(
    patterns: &[Regex],
    content: &str,
    root: &Path,
) -> Vec<ContextFile> {
    let mut files = Vec::new();
    for pattern in patterns {
        for cap in pattern.captures_iter(content) {
            let Some(m) = cap.get(1) else { continue };
            let rel = m.as_str().trim_start_matches("./");
            if files.iter().any(|f: &ContextFile| f.path == rel) {
                continue;
            }
            if root.join(rel).is_file() {
                files.push(ContextFile {
                    path: rel.to_string(),
                    origin: FileOrigin::ExplicitReference,
                });
            }
        }
    }
    files
}

/// Enumerate up to `limit` source files directly under `dir` (no recursion).
pub(crate) fn enumerate_sources(dir: &Path, limit: usize, origin: FileOrigin) -> Vec<ContextFile> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| SOURCE_EXTENSIONS.contains(&x))
                .unwrap_or(false)
        })
        .collect();
    names.sort();
    names
        .into_iter()
        .take(limit)
        .map(|path| ContextFile { path, origin })
        .collect()
}

/// Dependency names from the workspace manifest: `package.json` first,
/// then `Cargo.toml` as the equivalent.  Caps: 5 runtime, 3 dev.
pub(crate) fn manifest_dependencies(root: &Path) -> Option<Dependencies> {
    let package_json = root.join("package.json");
    if package_json.is_file() {
        let text = std::fs::read_to_string(&package_json).ok()?;
        let value: serde_json::Value = serde_json::from_str(&text).ok()?;
        return Some(Dependencies {
            runtime: key_names(&value, "dependencies", 5),
            dev: key_names(&value, "devDependencies", 3),
        });
    }

    let cargo_toml = root.join("Cargo.toml");
    if cargo_toml.is_file() {
        let text = std::fs::read_to_string(&cargo_toml).ok()?;
        let value: toml::Value = text.parse().ok()?;
        return Some(Dependencies {
            runtime: toml_key_names(&value, "dependencies", 5),
            dev: toml_key_names(&value, "dev-dependencies", 3),
        });
    }

    None
}

fn key_names(value: &serde_json::Value, key: &str, limit: usize) -> Vec<String> {
    value
        .get(key)
        .and_then(serde_json::Value::as_object)
        .map(|map| map.keys().take(limit).cloned().collect())
        .unwrap_or_default()
}

fn toml_key_names(value: &toml::Value, key: &str, limit: usize) -> Vec<String> {
    value
        .get(key)
        .and_then(toml::Value::as_table)
        .map(|table| table.keys().take(limit).cloned().collect())
        .unwrap_or_default()
}

/// `git status --porcelain` summary: change count plus the first 3 lines.
pub(crate) async fn git_status(root: &Path) -> Option<GitStatus> {
    let output = tokio::process::Command::new("git")
        .arg("status")
        .arg("--porcelain")
        .current_dir(root)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        debug!("git status failed; skipping VCS context");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    Some(GitStatus {
        changed_count: lines.len(),
        sample: lines.iter().take(3).map(|l| l.to_string()).collect(),
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "x").unwrap();
    }

    #[test]
    fn referenced_files_keeps_only_existing_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "main.py");
        let patterns = reference_patterns();
        let files = referenced_files(
            &patterns,
            "fix the bug in main.py and missing.py please",
            dir.path(),
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "main.py");
        assert_eq!(files[0].origin, FileOrigin::ExplicitReference);
    }

    #[test]
    fn referenced_files_handles_relative_prefix_and_quotes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        touch(&dir.path().join("src"), "lib.rs");
        let patterns = reference_patterns();
        let files = referenced_files(&patterns, r#"look at "./src/lib.rs" now"#, dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/lib.rs");
    }

    #[test]
    fn referenced_files_dedups_repeated_mentions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "app.js");
        let patterns = reference_patterns();
        let files = referenced_files(&patterns, "app.js then app.js again", dir.path());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn enumerate_sources_respects_limit_and_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.rs", "b.rs", "c.rs", "d.txt", "e.py"] {
            touch(dir.path(), name);
        }
        let files = enumerate_sources(dir.path(), 3, FileOrigin::ProjectStructure);
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.path != "d.txt"));
    }

    #[test]
    fn enumerate_sources_on_missing_dir_is_empty() {
        let files = enumerate_sources(
            Path::new("/definitely/not/here"),
            5,
            FileOrigin::ProjectStructure,
        );
        assert!(files.is_empty());
    }

    #[test]
    fn package_json_dependencies_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{
                "dependencies": {"a":"1","b":"1","c":"1","d":"1","e":"1","f":"1"},
                "devDependencies": {"x":"1","y":"1","z":"1","w":"1"}
            }"#,
        )
        .unwrap();
        let deps = manifest_dependencies(dir.path()).unwrap();
        assert_eq!(deps.runtime.len(), 5);
        assert_eq!(deps.dev.len(), 3);
    }

    #[test]
    fn cargo_toml_is_the_manifest_equivalent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n\n[dependencies]\nserde = \"1\"\ntokio = \"1\"\n\n[dev-dependencies]\ntempfile = \"3\"\n",
        )
        .unwrap();
        let deps = manifest_dependencies(dir.path()).unwrap();
        assert_eq!(deps.runtime, vec!["serde", "tokio"]);
        assert_eq!(deps.dev, vec!["tempfile"]);
    }

    #[test]
    fn no_manifest_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(manifest_dependencies(dir.path()).is_none());
    }

    #[tokio::test]
    async fn git_status_outside_a_repo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(git_status(dir.path()).await.is_none());
    }
}
