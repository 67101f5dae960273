//! Core domain models for Baseline usages, violations and compliance results
//!
//! Architecture: Rich Domain Models - Violations are entities with behavior, not just data
//! - Usage candidates are the raw, not-yet-judged output of scanning
//! - Violations are judged candidates that carry their own reason text
//! - ComplianceReport acts as an aggregate root for one run's outcome

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Literal used for locations a scanning strategy cannot determine
pub const UNKNOWN_LOCATION: &str = "unknown";

/// A line or column position inside a scanned file
///
/// Serializes as a plain integer when known and as the string `"unknown"` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    /// 1-indexed position reported by the scanner
    Known(u32),
    /// The scanner could not localize the usage
    Unknown,
}

impl Location {
    /// Build a location from an optional position, treating `0` as unknown
    pub fn from_option(value: Option<u32>) -> Self {
        match value {
            Some(n) if n > 0 => Self::Known(n),
            _ => Self::Unknown,
        }
    }

    /// The numeric position, if known
    pub fn as_option(self) -> Option<u32> {
        match self {
            Self::Known(n) => Some(n),
            Self::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(n) => write!(f, "{n}"),
            Self::Unknown => f.write_str(UNKNOWN_LOCATION),
        }
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(n) => serializer.serialize_u32(*n),
            Self::Unknown => serializer.serialize_str(UNKNOWN_LOCATION),
        }
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LocationVisitor;

        impl Visitor<'_> for LocationVisitor {
            type Value = Location;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive integer or the string \"unknown\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Location, E> {
                let n = u32::try_from(v).map_err(|_| E::custom("location out of range"))?;
                Ok(Location::from_option(Some(n)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Location, E> {
                if v < 0 {
                    return Ok(Location::Unknown);
                }
                self.visit_u64(v as u64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Location, E> {
                if v.eq_ignore_ascii_case(UNKNOWN_LOCATION) {
                    Ok(Location::Unknown)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(LocationVisitor)
    }
}

/// A detected, not-yet-judged occurrence of a feature in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageCandidate {
    /// Feature identifier (browser-compat-data style key)
    pub feature_id: String,
    /// File the usage was found in
    pub file: PathBuf,
    /// 1-indexed line, when the scanner can localize it
    pub line: Option<u32>,
    /// 1-indexed column, when the scanner can localize it
    pub column: Option<u32>,
}

impl UsageCandidate {
    /// Create a candidate without a known position
    pub fn new(feature_id: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            feature_id: feature_id.into(),
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Set line and column position
    pub fn with_position(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

/// A usage of a feature that falls outside the compliant set for the active target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// File path where the usage was found
    pub file: PathBuf,
    /// Line of the usage, or `"unknown"`
    pub line: Location,
    /// Column of the usage, or `"unknown"`
    pub column: Location,
    /// Offending feature identifier
    pub feature_id: String,
    /// Human-readable explanation naming the feature and the target
    pub reason: String,
}

impl Violation {
    /// Create a violation from a judged candidate
    pub fn from_candidate(candidate: UsageCandidate, reason: impl Into<String>) -> Self {
        Self {
            line: Location::from_option(candidate.line),
            column: Location::from_option(candidate.column),
            file: candidate.file,
            feature_id: candidate.feature_id,
            reason: reason.into(),
        }
    }

    /// Format violation for display
    pub fn format_display(&self) -> String {
        format!(
            "{}:{}:{} [{}] {}",
            self.file.display(),
            self.line,
            self.column,
            self.feature_id,
            self.reason
        )
    }
}

/// Final pass/fail outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// Summary statistics for a compliance report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Files that were read and scanned
    pub files_scanned: usize,
    /// Files skipped because they could not be read or parsed
    pub files_skipped: usize,
    /// Size of the compliant feature set
    pub compliant_features: usize,
    /// Size of the non-compliant feature set
    pub non_compliant_features: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
    /// Timestamp when the check was performed
    pub checked_at: DateTime<Utc>,
}

/// Complete result of one compliance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Display form of the active target
    pub target: String,
    /// Violations in scan order
    pub violations: Vec<Violation>,
    /// Pass/fail outcome
    pub verdict: Verdict,
    /// Summary statistics
    pub summary: ComplianceSummary,
}

impl ComplianceReport {
    /// Create an empty, passing report for the given target
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            violations: Vec::new(),
            verdict: Verdict::Pass,
            summary: ComplianceSummary {
                checked_at: Utc::now(),
                ..Default::default()
            },
        }
    }

    /// Append violations, keeping their order, and update the verdict
    pub fn extend_violations(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
        self.verdict = if self.violations.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Whether the run failed; equivalent to `violations-found`
    pub fn failed(&self) -> bool {
        self.verdict == Verdict::Fail
    }

    /// Number of distinct files that contain at least one violation
    pub fn files_with_violations(&self) -> usize {
        let mut seen: Vec<&PathBuf> = Vec::new();
        for violation in &self.violations {
            if !seen.contains(&&violation.file) {
                seen.push(&violation.file);
            }
        }
        seen.len()
    }

    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }
}

/// Whether an error terminates the run or only affects a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Abort the run before any output is produced
    Fatal,
    /// Log, skip the affected item and continue
    Recoverable,
}

/// Error types that can occur during a compliance run
#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    /// Feature database missing, unreadable or malformed
    #[error("Feature data error: {message}")]
    DataLoad { message: String },

    /// Configuration or target string is invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A single file could not be scanned
    #[error("Scan error in {file}: {message}")]
    FileScan { file: String, message: String },

    /// Report could not be rendered or written
    #[error("Report error: {message}")]
    Report { message: String },
}

impl BaselineError {
    pub fn data_load(message: impl Into<String>) -> Self {
        Self::DataLoad {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn file_scan(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileScan {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }

    /// Classify the error per the run's propagation rules
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataLoad { .. } | Self::Configuration { .. } | Self::Report { .. } => {
                ErrorKind::Fatal
            }
            Self::Io { .. } | Self::FileScan { .. } => ErrorKind::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

/// Result type for Baseline Guard operations
pub type BaselineResult<T> = Result<T, BaselineError>;
