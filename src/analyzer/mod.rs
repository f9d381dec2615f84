//! Repository metadata extraction.
//!
//! A single filesystem walk feeds every detector: language breakdown from
//! extensions, frameworks from manifest dependencies, license from license
//! files, plus headline counts. Results are cached in the shared store,
//! keyed by the structure hash, so a repository is only re-analyzed when
//! its set of files changes.

pub mod detectors;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::cache::metadata::MetadataCache;
use crate::scanner::Repository;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LanguageInfo {
    pub name: String,
    pub percentage: f64,
    pub lines_of_code: u64,
    pub file_count: u64,
    pub bytes_count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameworkInfo {
    pub name: String,
    pub version: String,
    pub category: String,
    pub confidence: f64,
    pub detection_method: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LicenseInfo {
    pub name: String,
    pub key: String,
    pub license_type: String,
    pub source_file: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
    pub dep_type: String,
    pub package_manager: String,
    pub source_file: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectMetadata {
    pub project_type: String,
    pub main_language: String,
    pub total_lines_of_code: u64,
    pub file_count: u64,
    pub directory_count: u64,
    pub repository_size: u64,
    pub has_readme: bool,
    pub has_license: bool,
    pub has_tests: bool,
    pub has_ci: bool,
    pub has_docs: bool,
    pub structure_hash: String,
    pub analyzed_at: Option<DateTime<Local>>,
    pub languages: Vec<LanguageInfo>,
    pub frameworks: Vec<FrameworkInfo>,
    pub licenses: Vec<LicenseInfo>,
    pub dependencies: Vec<DependencyInfo>,
}

/// Directories never descended during analysis.
static IGNORED_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "dist",
    "build",
    "vendor",
    "__pycache__",
    ".venv",
    "venv",
];

fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRS.contains(&name) || (name.starts_with('.') && name != ".github")
}

/// Relative paths of all analyzable files, sorted for determinism.
fn collect_paths(repo_path: &Path) -> Vec<String> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(repo_path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            if e.file_type().is_dir() {
                if let Some(name) = e.file_name().to_str() {
                    return !is_ignored_dir(name);
                }
            }
            true
        })
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() {
            if let Ok(rel) = entry.path().strip_prefix(repo_path) {
                paths.push(rel.to_string_lossy().into_owned());
            }
        }
    }
    paths.sort();
    paths
}

/// SHA-256 over the sorted list of non-ignored relative file paths. Stable
/// under mtime and content changes; varies iff the file set changes.
pub fn structure_hash(repo_path: &Path) -> String {
    let paths = collect_paths(repo_path);
    let mut hasher = Sha256::new();
    hasher.update(paths.join("|").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Analyze a repository from scratch (no cache involved).
pub fn analyze(repo_path: &Path) -> Result<ProjectMetadata> {
    let paths = collect_paths(repo_path);

    let mut meta = ProjectMetadata {
        structure_hash: {
            let mut hasher = Sha256::new();
            hasher.update(paths.join("|").as_bytes());
            format!("{:x}", hasher.finalize())
        },
        analyzed_at: Some(Local::now()),
        ..ProjectMetadata::default()
    };

    let mut by_language: BTreeMap<&'static str, LanguageInfo> = BTreeMap::new();
    let mut directories = std::collections::BTreeSet::new();

    for rel in &paths {
        let abs = repo_path.join(rel);
        let Ok(fs_meta) = std::fs::metadata(&abs) else {
            continue;
        };

        meta.file_count += 1;
        meta.repository_size += fs_meta.len();
        if let Some(parent) = Path::new(rel).parent() {
            for ancestor in parent.ancestors() {
                if !ancestor.as_os_str().is_empty() {
                    directories.insert(ancestor.to_path_buf());
                }
            }
        }

        let lower = rel.to_lowercase();
        if lower.starts_with("readme") {
            meta.has_readme = true;
        }
        if lower.starts_with("license") || lower.starts_with("licence") || lower.starts_with("copying") {
            meta.has_license = true;
        }
        if lower.starts_with("tests/") || lower.contains("/tests/") || lower.contains("_test.") || lower.contains(".test.") {
            meta.has_tests = true;
        }
        if lower.starts_with(".github/workflows/") || lower.starts_with(".gitlab-ci") || lower == "jenkinsfile" {
            meta.has_ci = true;
        }
        if lower.starts_with("docs/") || lower.starts_with("doc/") {
            meta.has_docs = true;
        }

        let ext = Path::new(rel)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if let Some(language) = detectors::language_for_extension(ext) {
            let lines = count_lines(&abs);
            let info = by_language.entry(language).or_insert_with(|| LanguageInfo {
                name: language.to_string(),
                ..LanguageInfo::default()
            });
            info.file_count += 1;
            info.bytes_count += fs_meta.len();
            info.lines_of_code += lines;
            meta.total_lines_of_code += lines;
        }
    }

    meta.directory_count = directories.len() as u64;

    let mut languages: Vec<LanguageInfo> = by_language.into_values().collect();
    languages.sort_by(|a, b| b.lines_of_code.cmp(&a.lines_of_code));
    if meta.total_lines_of_code > 0 {
        for lang in &mut languages {
            lang.percentage = lang.lines_of_code as f64 / meta.total_lines_of_code as f64 * 100.0;
        }
    }
    if let Some(main) = languages.first() {
        meta.main_language = main.name.clone();
    }
    meta.languages = languages;

    collect_manifests(repo_path, &mut meta);
    collect_licenses(repo_path, &mut meta);

    Ok(meta)
}

/// Read dependency manifests at the repository root, filling dependencies,
/// frameworks, and the project type.
fn collect_manifests(repo_path: &Path, meta: &mut ProjectMetadata) {
    for rule in detectors::MANIFEST_RULES {
        let manifest = repo_path.join(rule.file);
        if !manifest.is_file() {
            continue;
        }
        if meta.project_type.is_empty() {
            meta.project_type = rule.project_type.to_string();
        }

        let Ok(content) = std::fs::read_to_string(&manifest) else {
            warn!("unreadable manifest: {}", manifest.display());
            continue;
        };

        let deps = match rule.file {
            "Cargo.toml" => parse_cargo_toml(&content),
            "package.json" => parse_package_json(&content),
            "go.mod" => parse_go_mod(&content),
            "requirements.txt" => parse_requirements(&content),
            _ => Vec::new(),
        };

        for (name, version) in deps {
            for framework_rule in detectors::FRAMEWORK_RULES {
                if name == framework_rule.dependency {
                    meta.frameworks.push(FrameworkInfo {
                        name: framework_rule.framework.to_string(),
                        version: version.clone(),
                        category: framework_rule.category.to_string(),
                        confidence: 0.9,
                        detection_method: format!("dependency in {}", rule.file),
                    });
                }
            }
            meta.dependencies.push(DependencyInfo {
                name,
                version,
                dep_type: "runtime".to_string(),
                package_manager: rule.package_manager.to_string(),
                source_file: rule.file.to_string(),
            });
        }
    }
}

fn collect_licenses(repo_path: &Path, meta: &mut ProjectMetadata) {
    for file in detectors::LICENSE_FILES {
        let path = repo_path.join(file);
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        if let Some(rule) = detectors::classify_license(&text) {
            meta.licenses.push(LicenseInfo {
                name: rule.name.to_string(),
                key: rule.key.to_string(),
                license_type: rule.license_type.to_string(),
                source_file: file.to_string(),
                confidence: 0.95,
            });
        }
        // First license file wins either way; unclassified text is still a
        // license, we just cannot name it.
        break;
    }
}

fn count_lines(path: &Path) -> u64 {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().count() as u64,
        Err(_) => 0,
    }
}

fn parse_cargo_toml(content: &str) -> Vec<(String, String)> {
    let Ok(value) = content.parse::<toml::Value>() else {
        return Vec::new();
    };
    let mut deps = Vec::new();
    for section in ["dependencies", "dev-dependencies"] {
        if let Some(table) = value.get(section).and_then(|v| v.as_table()) {
            for (name, spec) in table {
                let version = match spec {
                    toml::Value::String(v) => v.clone(),
                    toml::Value::Table(t) => t
                        .get("version")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    _ => String::new(),
                };
                deps.push((name.clone(), version));
            }
        }
    }
    deps
}

fn parse_package_json(content: &str) -> Vec<(String, String)> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return Vec::new();
    };
    let mut deps = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = value.get(section).and_then(|v| v.as_object()) {
            for (name, version) in map {
                deps.push((name.clone(), version.as_str().unwrap_or("").to_string()));
            }
        }
    }
    deps
}

fn parse_go_mod(content: &str) -> Vec<(String, String)> {
    let mut deps = Vec::new();
    let mut in_require = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with("require (") {
            in_require = true;
            continue;
        }
        if in_require && line == ")" {
            in_require = false;
            continue;
        }
        let spec = if let Some(rest) = line.strip_prefix("require ") {
            Some(rest)
        } else if in_require && !line.is_empty() && !line.starts_with("//") {
            Some(line)
        } else {
            None
        };
        if let Some(spec) = spec {
            let mut parts = spec.split_whitespace();
            if let (Some(name), Some(version)) = (parts.next(), parts.next()) {
                deps.push((name.to_string(), version.to_string()));
            }
        }
    }
    deps
}

fn parse_requirements(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
        .map(|line| {
            for sep in ["==", ">=", "<=", "~=", ">"] {
                if let Some((name, version)) = line.split_once(sep) {
                    return (name.trim().to_string(), version.trim().to_string());
                }
            }
            (line.to_string(), String::new())
        })
        .collect()
}

/// Cache-aware analysis: the structure hash decides whether the stored
/// metadata is still valid.
pub struct MetadataService {
    cache: Option<MetadataCache>,
    force_refresh: bool,
}

impl MetadataService {
    pub fn new(cache: Option<MetadataCache>, force_refresh: bool) -> Self {
        Self {
            cache,
            force_refresh,
        }
    }

    pub fn analyze_repository(&self, repo: &Repository) -> Result<ProjectMetadata> {
        let hash = structure_hash(&repo.path);
        let path_str = repo.path.to_string_lossy();

        if !self.force_refresh {
            if let Some(cache) = &self.cache {
                if let Some(cached) = cache.get(&path_str, &hash)? {
                    debug!("metadata cache hit: {}", repo.name);
                    return Ok(cached);
                }
            }
        }

        let meta = analyze(&repo.path)
            .with_context(|| format!("failed to analyze {}", repo.path.display()))?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.save(&path_str, &repo.name, &meta) {
                warn!("failed to cache metadata for {}: {err:#}", repo.name);
            }
        }

        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(temp: &TempDir) -> &Path {
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("tests")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {\n    println!(\"hi\");\n}\n").unwrap();
        fs::write(root.join("tests/basic.rs"), "#[test]\nfn ok() {}\n").unwrap();
        fs::write(root.join("README.md"), "# demo\n").unwrap();
        fs::write(
            root.join("LICENSE"),
            "MIT License\n\nPermission is hereby granted, free of charge, to any person...\n",
        )
        .unwrap();
        fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"demo\"\n\n[dependencies]\ntokio = \"1\"\nserde = { version = \"1\" }\n",
        )
        .unwrap();
        root
    }

    #[test]
    fn test_structure_hash_ignores_mtime_and_content() {
        let temp = TempDir::new().unwrap();
        let root = project(&temp);

        let before = structure_hash(root);
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        assert_eq!(structure_hash(root), before);

        fs::write(root.join("src/extra.rs"), "").unwrap();
        assert_ne!(structure_hash(root), before);
    }

    #[test]
    fn test_structure_hash_skips_ignored_dirs() {
        let temp = TempDir::new().unwrap();
        let root = project(&temp);
        let before = structure_hash(root);

        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::write(root.join("target/debug/junk"), "x").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();

        assert_eq!(structure_hash(root), before);
    }

    #[test]
    fn test_analyze_detects_language_and_license() {
        let temp = TempDir::new().unwrap();
        let meta = analyze(project(&temp)).unwrap();

        assert_eq!(meta.main_language, "Rust");
        assert_eq!(meta.project_type, "rust");
        assert!(meta.has_readme);
        assert!(meta.has_license);
        assert!(meta.has_tests);
        assert!(!meta.has_ci);
        assert_eq!(meta.licenses.len(), 1);
        assert_eq!(meta.licenses[0].key, "mit");
        assert!(meta.dependencies.iter().any(|d| d.name == "tokio"));
        assert!(meta.frameworks.iter().any(|f| f.name == "Tokio"));
        assert!(meta.total_lines_of_code > 0);
    }

    #[test]
    fn test_language_percentages_sum_to_hundred() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.rs"), "fn a() {}\nfn b() {}\n").unwrap();
        fs::write(root.join("b.py"), "print('x')\n").unwrap();

        let meta = analyze(root).unwrap();
        let total: f64 = meta.languages.iter().map(|l| l.percentage).sum();
        assert!((total - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_go_mod_block() {
        let content = "module example.com/x\n\nrequire (\n\tgithub.com/sirupsen/logrus v1.9.0\n\tgithub.com/spf13/cobra v1.8.0\n)\n";
        let deps = parse_go_mod(content);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].0, "github.com/sirupsen/logrus");
        assert_eq!(deps[0].1, "v1.9.0");
    }

    #[test]
    fn test_parse_requirements() {
        let deps = parse_requirements("# comment\nflask==2.0\nrequests>=2.28\nplainpkg\n");
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0], ("flask".to_string(), "2.0".to_string()));
        assert_eq!(deps[2], ("plainpkg".to_string(), String::new()));
    }
}
