//! Usage scanning for Baseline Guard
//!
//! Architecture: Domain Services - Analyzer dispatches files to the scanner that understands them
//! - Each file kind has one scanner strategy behind the `UsageScanner` trait
//! - Unsupported files are skipped without being opened
//! - Per-file failures are logged and counted; they never abort the run
//! - Parallel scanning keeps candidates in input file order

pub mod css;
pub mod script;

use crate::domain::violations::{BaselineError, BaselineResult, UsageCandidate};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub use css::{CssFeatureExtractor, ExtractError, ExtractedUsage, FeatureExtractor, StyleSheetScanner};
pub use script::{ScriptScanner, ScriptToken};

/// Source file categories known to the scanners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    StyleSheet,
    Script,
    Other,
}

impl FileKind {
    /// Categorize a path by its extension (case-insensitive)
    pub fn of(path: &Path) -> Self {
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Other;
        };

        match extension.to_ascii_lowercase().as_str() {
            "css" => Self::StyleSheet,
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => Self::Script,
            _ => Self::Other,
        }
    }
}

/// How much a scanner's candidates can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Syntax-aware extraction
    High,
    /// Text heuristics that may report usages in comments or strings
    Low,
}

/// Strategy for turning one file's content into usage candidates
pub trait UsageScanner: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn confidence(&self) -> Confidence;

    /// Check if this scanner handles the given file type
    fn handles_file(&self, file_path: &Path) -> bool;

    /// Scan file content; a parse failure is a `FileScan` error
    fn scan(&self, file_path: &Path, content: &str) -> BaselineResult<Vec<UsageCandidate>>;
}

/// Options for customizing a scan
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Whether to use parallel processing
    pub parallel: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// What happened to a single file
#[derive(Debug)]
pub enum FileOutcome {
    Scanned(Vec<UsageCandidate>),
    /// No scanner handles this file kind
    Unsupported,
    Failed(BaselineError),
}

/// A file that could not be read or parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub file: PathBuf,
    pub message: String,
}

/// Aggregate result of scanning a list of files
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Candidates in file order, then in-file order
    pub candidates: Vec<UsageCandidate>,
    pub files_scanned: usize,
    pub files_unsupported: usize,
    pub failures: Vec<ScanFailure>,
}

impl ScanOutput {
    pub fn files_skipped(&self) -> usize {
        self.failures.len()
    }

    fn record(&mut self, file: &Path, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Scanned(candidates) => {
                self.files_scanned += 1;
                self.candidates.extend(candidates);
            }
            FileOutcome::Unsupported => {
                tracing::debug!("No scanner for {}, skipping", file.display());
                self.files_unsupported += 1;
            }
            FileOutcome::Failed(e) => {
                tracing::warn!("Failed to scan {}: {}", file.display(), e);
                self.failures.push(ScanFailure {
                    file: file.to_path_buf(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Dispatches files to scanner strategies
pub struct Analyzer {
    scanners: Vec<Box<dyn UsageScanner>>,
}

impl Analyzer {
    /// Create an analyzer with no scanners
    pub fn new() -> Self {
        Self {
            scanners: Vec::new(),
        }
    }

    /// Style sheet scanner plus a script scanner over the given tokens
    pub fn with_default_scanners(script_tokens: Vec<ScriptToken>) -> Self {
        Self::new()
            .with_scanner(StyleSheetScanner::new())
            .with_scanner(ScriptScanner::new(script_tokens))
    }

    /// Register a scanner; earlier scanners win when several handle a file
    pub fn with_scanner<S: UsageScanner + 'static>(mut self, scanner: S) -> Self {
        self.scanners.push(Box::new(scanner));
        self
    }

    pub fn scanner_for(&self, file_path: &Path) -> Option<&dyn UsageScanner> {
        self.scanners
            .iter()
            .find(|scanner| scanner.handles_file(file_path))
            .map(|scanner| scanner.as_ref())
    }

    /// Scan in-memory content as if it were the given file
    pub fn scan_source(&self, file_path: &Path, content: &str) -> FileOutcome {
        match self.scanner_for(file_path) {
            Some(scanner) => {
                tracing::trace!("Scanning {} with {}", file_path.display(), scanner.name());
                match scanner.scan(file_path, content) {
                    Ok(candidates) => FileOutcome::Scanned(candidates),
                    Err(e) => FileOutcome::Failed(e),
                }
            }
            None => FileOutcome::Unsupported,
        }
    }

    /// Read and scan a single file
    pub fn scan_file(&self, file_path: &Path) -> FileOutcome {
        if self.scanner_for(file_path).is_none() {
            return FileOutcome::Unsupported;
        }

        match fs::read_to_string(file_path) {
            Ok(content) => self.scan_source(file_path, &content),
            Err(e) => FileOutcome::Failed(BaselineError::file_scan(
                file_path.display().to_string(),
                format!("Failed to read file: {e}"),
            )),
        }
    }

    /// Scan files in order and collect candidates, counts and failures
    pub fn scan_files(&self, files: &[PathBuf], options: &AnalysisOptions) -> ScanOutput {
        let outcomes: Vec<FileOutcome> = if options.parallel && files.len() > 1 {
            files.par_iter().map(|file| self.scan_file(file)).collect()
        } else {
            files.iter().map(|file| self.scan_file(file)).collect()
        };

        let mut output = ScanOutput::default();
        for (file, outcome) in files.iter().zip(outcomes) {
            output.record(file, outcome);
        }

        output
    }

    /// Scan in-memory sources in order
    pub fn scan_sources(&self, sources: &[(PathBuf, String)]) -> ScanOutput {
        let mut output = ScanOutput::default();
        for (file, content) in sources {
            output.record(file, self.scan_source(file, content));
        }
        output
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::with_default_scanners(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer() -> Analyzer {
        Analyzer::with_default_scanners(vec![ScriptToken::new(
            "structuredClone(",
            "api.structuredClone",
        )])
    }

    #[rstest]
    #[case("a.css", FileKind::StyleSheet)]
    #[case("a.module.CSS", FileKind::StyleSheet)]
    #[case("app.tsx", FileKind::Script)]
    #[case("lib.mjs", FileKind::Script)]
    #[case("README.md", FileKind::Other)]
    #[case("Makefile", FileKind::Other)]
    fn test_file_kind(#[case] path: &str, #[case] expected: FileKind) {
        assert_eq!(FileKind::of(Path::new(path)), expected);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_scan_files_keeps_order_and_counts(#[case] parallel: bool) -> BaselineResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for i in 0..8 {
            let path = temp_dir.path().join(format!("s{i}.css"));
            fs::write(&path, format!(".c{i} {{ gap: {i}px; }}"))?;
            files.push(path);
        }
        let broken = temp_dir.path().join("broken.css");
        fs::write(&broken, ".x { color: red")?;
        files.push(broken.clone());
        let script = temp_dir.path().join("app.js");
        fs::write(&script, "const copy = structuredClone(value);")?;
        files.push(script.clone());
        files.push(temp_dir.path().join("notes.txt"));

        let options = AnalysisOptions {
            parallel,
        };
        let output = analyzer().scan_files(&files, &options);

        assert_eq!(output.files_scanned, 9);
        assert_eq!(output.files_skipped(), 1);
        assert_eq!(output.files_unsupported, 1);
        assert_eq!(output.failures[0].file, broken);

        let gap_files: Vec<&PathBuf> = output
            .candidates
            .iter()
            .filter(|c| c.feature_id == "css.properties.gap")
            .map(|c| &c.file)
            .collect();
        assert_eq!(gap_files, files[..8].iter().collect::<Vec<_>>());
        assert_eq!(
            output.candidates.last().map(|c| c.feature_id.as_str()),
            Some("api.structuredClone")
        );
        Ok(())
    }

    #[test]
    fn test_unreadable_file_is_skipped() -> BaselineResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.css");

        let output = analyzer().scan_files(&[missing], &AnalysisOptions::default());
        assert_eq!(output.files_scanned, 0);
        assert_eq!(output.files_skipped(), 1);
        assert!(output.failures[0].message.contains("Failed to read file"));
        Ok(())
    }

    #[rstest]
    #[case::sequential(false)]
    #[case::parallel(true)]
    fn test_broken_file_does_not_hide_later_files(#[case] parallel: bool) -> BaselineResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let broken = temp_dir.path().join("a.css");
        let healthy = temp_dir.path().join("b.css");
        fs::write(&broken, ".a { color: red")?;
        fs::write(&healthy, ".b:has(img) {}")?;

        let output = analyzer().scan_files(
            &[broken.clone(), healthy.clone()],
            &AnalysisOptions { parallel },
        );

        assert_eq!(output.files_scanned, 1);
        assert_eq!(output.failures[0].file, broken);
        assert!(output.failures[0].message.contains("unclosed '{'"));
        assert_eq!(output.candidates[0].feature_id, "css.selectors.has");
        assert_eq!(output.candidates[0].file, healthy);
        Ok(())
    }
}
