//! Path exclusion using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter decides whether a discovered path is scanned
//! - Patterns apply in order; a later match overrides an earlier one
//! - `!pattern` re-includes a path excluded by an earlier pattern
//! - `.baselineignore` files in ancestor directories are honored

use crate::domain::violations::{BaselineError, BaselineResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default ignore file name
pub const DEFAULT_IGNORE_FILE: &str = ".baselineignore";

/// Directories and files never worth scanning
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/target/**",
    "**/*.min.*",
];

/// Decides which paths are scanned
#[derive(Debug, Clone)]
pub struct PathFilter {
    rules: Vec<FilterRule>,
    /// Ignore file name to look for in ancestor directories, if any
    ignore_filename: Option<String>,
}

#[derive(Debug, Clone)]
struct FilterRule {
    pattern: glob::Pattern,
    /// `!`-prefixed rules re-include
    is_include: bool,
    /// Pattern text without the `!` prefix
    source: String,
}

impl FilterRule {
    fn parse(text: &str) -> BaselineResult<Self> {
        let (is_include, source) = match text.strip_prefix('!') {
            Some(stripped) => (true, stripped),
            None => (false, text),
        };
        let glob_source = source.trim_start_matches('/').trim_end_matches('/');

        let pattern = glob::Pattern::new(glob_source)
            .map_err(|e| BaselineError::config(format!("Invalid exclude pattern '{source}': {e}")))?;

        Ok(Self {
            pattern,
            is_include,
            source: source.to_string(),
        })
    }

    /// Match a path relative to the scan root with .gitignore-like semantics
    fn matches(&self, relative: &Path, is_dir: bool) -> bool {
        if self.source.ends_with('/') && !is_dir {
            return false;
        }

        if self.source.contains('/') {
            return self.pattern.matches_path(relative);
        }

        relative
            .file_name()
            .map(|name| self.pattern.matches(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

impl PathFilter {
    /// Create a filter from exclusion patterns and an optional ignore file name
    pub fn new<S: AsRef<str>>(patterns: &[S], ignore_filename: Option<String>) -> BaselineResult<Self> {
        let rules = patterns
            .iter()
            .map(|p| FilterRule::parse(p.as_ref()))
            .collect::<BaselineResult<Vec<_>>>()?;

        Ok(Self {
            rules,
            ignore_filename,
        })
    }

    /// Default exclusions plus `.baselineignore` processing
    pub fn with_defaults() -> BaselineResult<Self> {
        Self::new(DEFAULT_EXCLUDES, Some(DEFAULT_IGNORE_FILE.to_string()))
    }

    /// Append an exclusion (or `!` re-inclusion) pattern
    pub fn add_pattern(&mut self, pattern: &str) -> BaselineResult<()> {
        self.rules.push(FilterRule::parse(pattern)?);
        Ok(())
    }

    /// Check if a path should be scanned, matching patterns against the path as given
    pub fn should_scan<P: AsRef<Path>>(&self, path: P) -> BaselineResult<bool> {
        let path = path.as_ref();
        self.should_scan_relative(path, path)
    }

    /// Check a path whose patterns apply to `relative`, its location below the scan root
    ///
    /// Directories above the scan root never take part in pattern matching, so a project
    /// that itself lives under a `build/` or `dist/` directory is still scanned.
    pub fn should_scan_relative(&self, path: &Path, relative: &Path) -> BaselineResult<bool> {
        let is_dir = path.is_dir();

        let mut included = true;
        for rule in &self.rules {
            if rule.matches(relative, is_dir) {
                included = rule.is_include;
            }
        }

        if !included {
            return Ok(false);
        }

        if self.ignore_filename.is_some() && self.is_ignored_by_files(path)? {
            return Ok(false);
        }

        Ok(true)
    }

    /// Walk ancestor directories applying their ignore files, outermost last
    fn is_ignored_by_files(&self, path: &Path) -> BaselineResult<bool> {
        let Some(ignore_filename) = &self.ignore_filename else {
            return Ok(false);
        };

        let is_dir = path.is_dir();
        let mut ignored = false;
        let mut current_dir = path.parent();

        while let Some(dir) = current_dir {
            let ignore_file = dir.join(ignore_filename);

            if ignore_file.is_file() {
                if let Ok(relative_path) = path.strip_prefix(dir) {
                    for rule in load_ignore_file(&ignore_file)? {
                        if rule.matches(relative_path, is_dir) {
                            ignored = !rule.is_include;
                        }
                    }
                }
            }

            current_dir = dir.parent();
        }

        Ok(ignored)
    }

    /// All scannable files under a directory, in file-name order
    ///
    /// Patterns are matched against paths relative to `root`.
    pub fn find_files<P: AsRef<Path>>(&self, root: P) -> BaselineResult<Vec<PathBuf>> {
        let root = root.as_ref();
        let relative = |path: &Path| path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || self
                        .should_scan_relative(entry.path(), &relative(entry.path()))
                        .unwrap_or(true)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file()
                && self.should_scan_relative(entry.path(), &relative(entry.path()))?
            {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Keep only the paths that should be scanned, preserving order
    pub fn filter_paths<P: AsRef<Path>>(&self, paths: &[P]) -> BaselineResult<Vec<PathBuf>> {
        let mut filtered = Vec::new();

        for path in paths {
            if self.should_scan(path)? {
                filtered.push(path.as_ref().to_path_buf());
            }
        }

        Ok(filtered)
    }
}

/// Load rules from an ignore file; invalid lines are logged and skipped
fn load_ignore_file(path: &Path) -> BaselineResult<Vec<FilterRule>> {
    let content = fs::read_to_string(path).map_err(|e| {
        BaselineError::config(format!(
            "Failed to read ignore file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let mut rules = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match FilterRule::parse(line) {
            Ok(rule) => rules.push(rule),
            Err(e) => tracing::warn!("Ignoring pattern in {}: {}", path.display(), e),
        }
    }

    Ok(rules)
}
