//! README discovery and normalization.
//!
//! The normalized form defined here is the unit of cache identity: the
//! description cache hashes it, and the same text (truncated) is what the
//! LLM summarizes. Normalization strips lines that carry no descriptive
//! content so cosmetic README edits do not invalidate cached descriptions.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Candidate filenames, first hit wins.
pub const README_CANDIDATES: &[&str] = &[
    "README.md",
    "README.rst",
    "README.txt",
    "README",
    "readme.md",
    "readme.rst",
    "readme.txt",
    "readme",
    "Readme.md",
    "ReadMe.md",
];

/// Lines surviving normalization are capped at this count.
const MAX_LINES: usize = 50;
/// Normalized text is truncated to this many chars before an LLM call.
pub const MAX_LLM_CHARS: usize = 4000;

/// Read and normalize the repository's README. Empty string when no
/// candidate file exists or nothing survives normalization.
pub fn read_normalized(repo_path: &Path) -> String {
    for candidate in README_CANDIDATES {
        let path = repo_path.join(candidate);
        if let Ok(content) = std::fs::read_to_string(&path) {
            log::debug!("found README: {}", path.display());
            return normalize(&content);
        }
    }
    String::new()
}

/// Line-filter a README: trim each line, then drop empties, horizontal
/// rules, image/badge lines, and table-of-contents headers. The first 50
/// surviving lines are joined by newlines.
pub fn normalize(content: &str) -> String {
    let mut kept = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_horizontal_rule(line) {
            continue;
        }
        if line.contains("![") && line.contains("](") {
            continue;
        }
        let lower = line.to_lowercase();
        if lower.contains("table of contents") || lower.contains("目录") {
            continue;
        }
        kept.push(line);
        if kept.len() >= MAX_LINES {
            break;
        }
    }
    kept.join("\n")
}

/// A line more than half made of `-`, `=`, or `*` is decoration.
fn is_horizontal_rule(line: &str) -> bool {
    let len = line.chars().count();
    if len == 0 {
        return false;
    }
    for symbol in ['-', '=', '*'] {
        if line.chars().filter(|&c| c == symbol).count() > len / 2 {
            return true;
        }
    }
    false
}

/// SHA-256 of the normalized README, lowercase hex.
pub fn sha256_hex(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Normalized text capped for an LLM request.
pub fn for_llm(normalized: &str) -> String {
    if normalized.chars().count() <= MAX_LLM_CHARS {
        return normalized.to_string();
    }
    let mut s: String = normalized.chars().take(MAX_LLM_CHARS).collect();
    s.push_str("...");
    s
}

/// Fallback description when no LLM is available or the call failed: the
/// first meaningful line, stripped of Markdown markers, capped at 80 chars.
pub fn fallback_description(normalized: &str) -> String {
    for line in normalized.lines() {
        let mut line = line.trim();
        while let Some(stripped) = line
            .strip_prefix('#')
            .or_else(|| line.strip_prefix('='))
            .or_else(|| line.strip_prefix('-'))
            .or_else(|| line.strip_prefix('*'))
        {
            line = stripped.trim();
        }

        if line.contains("![") || line.contains("[![") || line.contains("<img") || line.contains("<div") {
            continue;
        }

        if line.chars().count() > 3 {
            return crate::updater::classify::truncate(line, 80);
        }
    }
    String::new()
}
