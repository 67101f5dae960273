//! Baseline Guard - Web Platform Baseline compliance checks for CSS and script sources
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Feature data is loaded once into an immutable store and classified up front
//! - Scanners turn files into usage candidates; the aggregator judges them
//! - Fatal errors (feature data, configuration) stop a run before any source file is read

pub mod aggregator;
pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod report;

// Re-export main types for convenient access
pub use domain::features::{BaselineStatus, FeatureRecord, FeatureStore};
pub use domain::target::{ComplianceTarget, TargetLevel};
pub use domain::violations::{
    BaselineError, BaselineResult, ComplianceReport, ComplianceSummary, ErrorKind, Location,
    UsageCandidate, Verdict, Violation,
};

pub use aggregator::{aggregate, aggregate_classified, Aggregation};
pub use analyzer::{AnalysisOptions, Analyzer, ScanOutput, UsageScanner};
pub use classifier::{classify, decide, Classification, Decision, DecisionBasis};
pub use config::{BaselineConfig, ConfigBuilder};
pub use discovery::{FileDiscovery, PathFilter};
pub use report::{OutputFormat, ReportFormatter, ReportOptions};

use std::path::{Path, PathBuf};
use std::time::Instant;

/// A feature record together with the verdict for the active target
#[derive(Debug, Clone)]
pub struct Explanation<'a> {
    pub record: &'a FeatureRecord,
    pub decision: Decision,
}

/// Main compliance checker providing high-level check operations
pub struct BaselineGuard {
    store: FeatureStore,
    target: ComplianceTarget,
    classification: Classification,
    analyzer: Analyzer,
    discovery: FileDiscovery,
    options: AnalysisOptions,
    report_formatter: ReportFormatter,
}

impl BaselineGuard {
    /// Create a checker with the default scanners and discovery rules
    pub fn new(
        store: FeatureStore,
        target: ComplianceTarget,
        options: AnalysisOptions,
    ) -> BaselineResult<Self> {
        Ok(Self::assemble(store, target, &BaselineConfig::with_defaults())?.with_options(options))
    }

    /// Create a checker for an already-loaded store using configured scanning settings
    pub fn with_config(store: FeatureStore, config: &BaselineConfig) -> BaselineResult<Self> {
        let target = config.compliance_target()?;
        Self::assemble(store, target, config)
    }

    /// Parse the target, then load the feature data named by the configuration
    ///
    /// The target is checked first so a bad target never touches the file system.
    pub async fn from_config(config: &BaselineConfig) -> BaselineResult<Self> {
        config.validate()?;
        let target = config.compliance_target()?;

        let store = FeatureStore::load_from_file(&config.features_path).await?;
        tracing::info!(
            "Loaded {} feature records from {}",
            store.len(),
            config.features_path.display()
        );

        Self::assemble(store, target, config)
    }

    fn assemble(
        store: FeatureStore,
        target: ComplianceTarget,
        config: &BaselineConfig,
    ) -> BaselineResult<Self> {
        let classification = classify(&store, &target);
        tracing::info!(
            "Classified features for {}: {} compliant, {} non-compliant",
            target,
            classification.compliant.len(),
            classification.non_compliant.len()
        );

        let mut script_tokens = config.script_tokens();
        if config.script_tokens.derive_from_data {
            script_tokens.extend(analyzer::script::derive_tokens(&store));
        }
        let analyzer = Analyzer::with_default_scanners(script_tokens);

        let filter = PathFilter::new(&config.scan.exclude, config.ignore_file())?;

        Ok(Self {
            store,
            target,
            classification,
            analyzer,
            discovery: FileDiscovery::new(filter),
            options: AnalysisOptions {
                parallel: config.scan.parallel,
            },
            report_formatter: ReportFormatter::default(),
        })
    }

    /// Replace the scanner set
    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn target(&self) -> &ComplianceTarget {
        &self.target
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Look up a feature and the decision reached for it
    pub fn explain(&self, feature_id: &str) -> Option<Explanation<'_>> {
        self.store.lookup(feature_id).map(|record| Explanation {
            record,
            decision: decide(record, &self.target),
        })
    }

    /// Expand glob patterns and check the matching files
    pub fn check_patterns<S: AsRef<str>>(&self, patterns: &[S]) -> BaselineResult<ComplianceReport> {
        let start_time = Instant::now();
        let files = self.discovery.expand_patterns(patterns)?;
        Ok(self.check_discovered(&files, start_time))
    }

    /// Check explicit files and directory trees
    pub fn check_paths<P: AsRef<Path>>(&self, paths: &[P]) -> BaselineResult<ComplianceReport> {
        let start_time = Instant::now();
        let files = self.discovery.collect_paths(paths)?;
        Ok(self.check_discovered(&files, start_time))
    }

    /// Check in-memory sources, treating each path as the file it names
    pub fn check_sources(&self, sources: &[(PathBuf, String)]) -> ComplianceReport {
        let start_time = Instant::now();
        let output = self.analyzer.scan_sources(sources);
        self.build_report(output, start_time)
    }

    fn check_discovered(&self, files: &[PathBuf], start_time: Instant) -> ComplianceReport {
        tracing::info!("Scanning {} files", files.len());
        let output = self.analyzer.scan_files(files, &self.options);
        self.build_report(output, start_time)
    }

    fn build_report(&self, output: ScanOutput, start_time: Instant) -> ComplianceReport {
        let files_skipped = output.files_skipped();
        let files_scanned = output.files_scanned;

        let aggregation =
            aggregate_classified(output.candidates, &self.classification, &self.target);

        let mut report = ComplianceReport::new(self.target.to_string());
        report.extend_violations(aggregation.violations);
        report.summary.files_scanned = files_scanned;
        report.summary.files_skipped = files_skipped;
        report.summary.compliant_features = self.classification.compliant.len();
        report.summary.non_compliant_features = self.classification.non_compliant.len();
        report.set_execution_time(start_time.elapsed().as_millis() as u64);

        tracing::info!(
            "Check complete: {} violations in {} files ({} skipped), verdict {}",
            report.violations.len(),
            files_scanned,
            files_skipped,
            report.verdict.as_str()
        );
        report
    }

    /// Format a report using this checker's formatter
    pub fn format_report(
        &self,
        report: &ComplianceReport,
        format: OutputFormat,
    ) -> BaselineResult<String> {
        self.report_formatter.format_report(report, format)
    }
}

/// Load everything a configuration names and check its scan patterns
pub async fn check_project(config: &BaselineConfig) -> BaselineResult<ComplianceReport> {
    let guard = BaselineGuard::from_config(config).await?;
    guard.check_patterns(&config.scan.patterns)
}
