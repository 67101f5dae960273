//! Source file discovery
//!
//! Architecture: Service Layer - turns glob patterns or explicit paths into an ordered file list
//! - Glob patterns expand in the order given; files found twice keep their first position
//! - Directories are walked in file-name order
//! - Every candidate passes through the PathFilter

pub mod path_filter;

pub use path_filter::{PathFilter, DEFAULT_EXCLUDES, DEFAULT_IGNORE_FILE};

use crate::domain::violations::{BaselineError, BaselineResult};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Finds the files a run will scan
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    filter: PathFilter,
}

impl FileDiscovery {
    pub fn new(filter: PathFilter) -> Self {
        Self { filter }
    }

    pub fn with_defaults() -> BaselineResult<Self> {
        Ok(Self::new(PathFilter::with_defaults()?))
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Expand glob patterns into files, deduplicated in first-seen order
    ///
    /// An invalid pattern is a configuration error; unreadable entries are skipped.
    /// Exclusions see each match relative to the working directory, or to the pattern's
    /// literal base directory when the match lies outside it.
    pub fn expand_patterns<S: AsRef<str>>(&self, patterns: &[S]) -> BaselineResult<Vec<PathBuf>> {
        let cwd = env::current_dir().ok();
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let entries = glob::glob(pattern).map_err(|e| {
                BaselineError::config(format!("Invalid scan pattern '{pattern}': {e}"))
            })?;
            let base = literal_base(pattern);

            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => {
                        let relative = cwd
                            .as_deref()
                            .and_then(|cwd| path.strip_prefix(cwd).ok())
                            .or_else(|| path.strip_prefix(&base).ok())
                            .unwrap_or(path.as_path());
                        if self.filter.should_scan_relative(&path, relative)?
                            && seen.insert(path.clone())
                        {
                            files.push(path);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Skipping unreadable path: {}", e),
                }
            }
        }

        tracing::debug!("Expanded {} patterns into {} files", patterns.len(), files.len());
        Ok(files)
    }

    /// Resolve explicit files and directories, deduplicated in first-seen order
    ///
    /// Explicit files bypass the exclusion patterns; directory contents do not.
    pub fn collect_paths<P: AsRef<Path>>(&self, paths: &[P]) -> BaselineResult<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for path in paths {
            let path = path.as_ref();

            let found = if path.is_file() {
                vec![path.to_path_buf()]
            } else if path.is_dir() {
                self.filter.find_files(path)?
            } else {
                tracing::warn!("Path does not exist: {}", path.display());
                Vec::new()
            };

            for file in found {
                if seen.insert(file.clone()) {
                    files.push(file);
                }
            }
        }

        Ok(files)
    }
}

/// Leading directories of a glob pattern that contain no wildcards
fn literal_base(pattern: &str) -> PathBuf {
    Path::new(pattern)
        .components()
        .take_while(|c| {
            !c.as_os_str()
                .to_string_lossy()
                .contains(|ch: char| matches!(ch, '*' | '?' | '['))
        })
        .collect()
}
