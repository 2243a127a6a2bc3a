//! Path filtering.
//!
//! Every candidate path gets exactly one [`PathDecision`] before its content
//! is read. Ignore rules come from a built-in list, the repository's
//! `.gitignore` and `.git/info/exclude`, and caller-supplied globs.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Patterns ignored in every repository regardless of its ignore files.
pub const BASE_IGNORE_PATTERNS: &[&str] = &[
    ".git/*",
    ".gitignore",
    ".gitmodules",
    ".gitattributes",
    // Environment
    ".env",
    ".venv*",
    "env/",
    "venv/",
    "ENV/",
    "env.bak/",
    "venv.bak/",
    // Package locks
    "*.lock",
    "package-lock.json",
];

/// Outcome of evaluating a single path against the ignore rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDecision {
    /// The path is part of the output.
    Include,
    /// The path is left out, for the given reason.
    Exclude(ExcludeReason),
}

impl PathDecision {
    /// Returns true for [`PathDecision::Include`].
    #[must_use]
    pub const fn is_included(self) -> bool {
        matches!(self, Self::Include)
    }
}

/// Why a path was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludeReason {
    /// Inside a `.git` directory.
    GitMetadata,
    /// Matched a built-in or repository ignore pattern.
    IgnorePattern,
    /// Matched a caller-supplied exclude glob.
    ExtraPattern,
}

/// Ignore rules for one repository root.
#[derive(Debug, Clone)]
pub struct PathFilter {
    ignore: Gitignore,
    patterns: Vec<String>,
    extra: GlobSet,
}

impl PathFilter {
    /// Loads ignore rules for the repository at `root`.
    ///
    /// Unparseable lines in `.gitignore` or `.git/info/exclude` are skipped
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the `extra_excludes` globs is invalid.
    pub fn new(root: &Path, extra_excludes: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        let mut patterns = Vec::new();

        for pattern in BASE_IGNORE_PATTERNS {
            Self::add_pattern(&mut builder, &mut patterns, None, pattern);
        }

        for source in [
            root.join(".gitignore"),
            root.join(".git").join("info").join("exclude"),
        ] {
            let Ok(text) = fs::read_to_string(&source) else {
                continue;
            };

            debug!("Loading ignore patterns from {}", source.display());
            for line in parse_ignore_lines(&text) {
                Self::add_pattern(&mut builder, &mut patterns, Some(&source), line);
            }
        }

        let ignore = builder.build().unwrap_or_else(|e| {
            warn!("Failed to compile ignore patterns, using none: {}", e);
            Gitignore::empty()
        });

        Ok(Self {
            ignore,
            patterns,
            extra: build_globset(extra_excludes)?,
        })
    }

    fn add_pattern(
        builder: &mut GitignoreBuilder,
        patterns: &mut Vec<String>,
        source: Option<&Path>,
        line: &str,
    ) {
        if patterns.iter().any(|p| p == line) {
            return;
        }

        match builder.add_line(source.map(Path::to_path_buf), line) {
            Ok(_) => patterns.push(line.to_string()),
            Err(e) => warn!("Skipping invalid ignore pattern '{}': {}", line, e),
        }
    }

    /// Ignore patterns that were accepted, in load order, without duplicates.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Decides whether a repo-relative path is part of the output.
    #[must_use]
    pub fn decide(&self, relative: &Path, is_dir: bool) -> PathDecision {
        if relative
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
        {
            return PathDecision::Exclude(ExcludeReason::GitMetadata);
        }

        if self
            .ignore
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
        {
            return PathDecision::Exclude(ExcludeReason::IgnorePattern);
        }

        if self.extra.is_match(relative)
            || relative
                .ancestors()
                .skip(1)
                .filter(|a| !a.as_os_str().is_empty())
                .any(|a| self.extra.is_match(a))
        {
            return PathDecision::Exclude(ExcludeReason::ExtraPattern);
        }

        PathDecision::Include
    }
}

/// Trims lines and drops blanks and `#` comments.
fn parse_ignore_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::invalid_pattern(pattern, e.to_string()))?;
        builder.add(glob);
    }

    builder
        .build()
        .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
}

/// Escapes a repo-relative path so it can be used as an exact-match glob.
#[must_use]
pub(crate) fn literal_glob(relative: &Path) -> String {
    let normalized: PathBuf = relative.components().collect();
    globset::escape(&normalized.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn filter_for(temp: &assert_fs::TempDir, extra: &[&str]) -> PathFilter {
        let extra: Vec<String> = extra.iter().map(|s| (*s).to_string()).collect();
        PathFilter::new(temp.path(), &extra).unwrap()
    }

    #[test]
    fn test_base_patterns_loaded() {
        let temp = assert_fs::TempDir::new().unwrap();
        let filter = filter_for(&temp, &[]);

        let expected: Vec<String> = BASE_IGNORE_PATTERNS.iter().map(|s| (*s).to_string()).collect();
        assert_eq!(filter.patterns(), expected.as_slice());
    }

    #[test]
    fn test_gitignore_patterns_loaded() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore")
            .write_str("\n    *.log\n    temp/\n# comment\n*.lock\n")
            .unwrap();

        let filter = filter_for(&temp, &[]);
        let patterns = filter.patterns();

        assert!(patterns.contains(&"*.log".to_string()));
        assert!(patterns.contains(&"temp/".to_string()));
        assert!(!patterns.iter().any(|p| p.starts_with('#')));
        assert_eq!(patterns.iter().filter(|p| *p == "*.lock").count(), 1);
        assert_eq!(patterns.len(), BASE_IGNORE_PATTERNS.len() + 2);
    }

    #[test]
    fn test_git_info_exclude_loaded() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".git/info/exclude").write_str("secret.txt\n").unwrap();

        let filter = filter_for(&temp, &[]);
        assert_eq!(
            filter.decide(Path::new("secret.txt"), false),
            PathDecision::Exclude(ExcludeReason::IgnorePattern)
        );
    }

    #[test]
    fn test_decide_gitignore_matches() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("*.log\ntemp/\n").unwrap();
        let filter = filter_for(&temp, &[]);

        assert!(filter.decide(Path::new("file1.txt"), false).is_included());
        assert!(!filter.decide(Path::new("file2.log"), false).is_included());
        assert!(!filter.decide(Path::new("temp"), true).is_included());
        assert!(!filter.decide(Path::new("temp/file3.txt"), false).is_included());
    }

    #[test]
    fn test_decide_base_patterns() {
        let temp = assert_fs::TempDir::new().unwrap();
        let filter = filter_for(&temp, &[]);

        assert!(!filter.decide(Path::new(".env"), false).is_included());
        assert!(!filter.decide(Path::new(".venv"), true).is_included());
        assert!(!filter.decide(Path::new("venv/lib/site.py"), false).is_included());
        assert!(!filter.decide(Path::new("Cargo.lock"), false).is_included());
        assert!(!filter.decide(Path::new("web/package-lock.json"), false).is_included());
        assert!(filter.decide(Path::new("src/env.rs"), false).is_included());
    }

    #[test]
    fn test_decide_git_metadata() {
        let temp = assert_fs::TempDir::new().unwrap();
        let filter = filter_for(&temp, &[]);

        assert_eq!(
            filter.decide(Path::new(".git"), true),
            PathDecision::Exclude(ExcludeReason::GitMetadata)
        );
        assert_eq!(
            filter.decide(Path::new("vendor/lib/.git/HEAD"), false),
            PathDecision::Exclude(ExcludeReason::GitMetadata)
        );
    }

    #[test]
    fn test_decide_extra_patterns() {
        let temp = assert_fs::TempDir::new().unwrap();
        let filter = filter_for(&temp, &["*.md", "docs"]);

        assert_eq!(
            filter.decide(Path::new("README.md"), false),
            PathDecision::Exclude(ExcludeReason::ExtraPattern)
        );
        assert_eq!(
            filter.decide(Path::new("docs/guide/intro.txt"), false),
            PathDecision::Exclude(ExcludeReason::ExtraPattern)
        );
        assert!(filter.decide(Path::new("src/lib.rs"), false).is_included());
    }

    #[test]
    fn test_invalid_gitignore_is_not_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("[INVALID PATTERN\n*.log\n").unwrap();

        let filter = filter_for(&temp, &[]);
        assert!(!filter.decide(Path::new("app.log"), false).is_included());
        assert!(filter.decide(Path::new("main.py"), false).is_included());
    }

    #[test]
    fn test_invalid_extra_pattern_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = PathFilter::new(temp.path(), &["[unclosed".to_string()]);

        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_literal_glob_escapes_metacharacters() {
        let temp = assert_fs::TempDir::new().unwrap();
        let glob = literal_glob(Path::new("out[1]"));
        let filter = filter_for(&temp, &[glob.as_str()]);

        assert!(!filter.decide(Path::new("out[1]/chunk_1.txt"), false).is_included());
        assert!(filter.decide(Path::new("out1/chunk_1.txt"), false).is_included());
    }
}
