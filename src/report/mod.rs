//! Report generation with multiple output formats
//!
//! Architecture: Anti-Corruption Layer - Formatters translate the compliance report to external formats
//! - Human output groups violations by file in scan order
//! - JSON carries the full report for programmatic consumers
//! - Markdown is the artifact format for pull-request summaries
//! - GitHub format emits workflow annotation commands

use crate::domain::violations::{BaselineError, BaselineResult, ComplianceReport, Location, Violation};
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// Supported output formats for compliance reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// Markdown table for review artifacts
    Markdown,
    /// GitHub Actions annotations
    GitHub,
}

impl OutputFormat {
    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "markdown", "github"]
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "github" => Ok(Self::GitHub),
            other => Err(format!(
                "Unknown format '{other}'. Available: {}",
                Self::all_formats().join(", ")
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Human => "human",
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::GitHub => "github",
        })
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Maximum number of violations to list
    pub max_violations: Option<usize>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            max_violations: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Success,
    Failure,
    Dim,
    Heading,
    Feature,
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Format a compliance report in the specified format
    pub fn format_report(
        &self,
        report: &ComplianceReport,
        format: OutputFormat,
    ) -> BaselineResult<String> {
        let shown = self.shown_violations(&report.violations);

        match format {
            OutputFormat::Human => Ok(self.format_human(report, shown)),
            OutputFormat::Json => self.format_json(report, shown),
            OutputFormat::Markdown => Ok(self.format_markdown(report, shown)),
            OutputFormat::GitHub => Ok(self.format_github(shown)),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        report: &ComplianceReport,
        format: OutputFormat,
        mut writer: W,
    ) -> BaselineResult<()> {
        let formatted = self.format_report(report, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    fn shown_violations<'a>(&self, violations: &'a [Violation]) -> &'a [Violation] {
        match self.options.max_violations {
            Some(max) if violations.len() > max => &violations[..max],
            _ => violations,
        }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.options.use_colors {
            styled(text, style)
        } else {
            text.to_string()
        }
    }

    fn format_human(&self, report: &ComplianceReport, shown: &[Violation]) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} {}\n\n",
            self.paint("Target:", Style::Heading),
            report.target
        ));

        if report.violations.is_empty() {
            output.push_str(&self.paint("No Baseline violations found", Style::Success));
            output.push('\n');
        } else {
            output.push_str(&self.paint("Baseline violations found", Style::Failure));
            output.push_str("\n\n");

            for (file, violations) in group_by_file(shown) {
                output.push_str(&format!("{}\n", self.paint(&file.display().to_string(), Style::Heading)));
                for violation in violations {
                    output.push_str(&format!(
                        "  {} [{}] {}\n",
                        self.paint(&position(violation), Style::Dim),
                        self.paint(&violation.feature_id, Style::Feature),
                        violation.reason
                    ));
                }
                output.push('\n');
            }

            let hidden = report.violations.len() - shown.len();
            if hidden > 0 {
                output.push_str(&format!("  ... and {hidden} more\n\n"));
            }
        }

        output.push_str(&self.format_summary(report));
        output
    }

    fn format_summary(&self, report: &ComplianceReport) -> String {
        let summary = &report.summary;
        let seconds = (summary.execution_time_ms as f64) / 1000.0;
        let count = report.violations.len();

        let violations = format!("{} violation{}", count, if count == 1 { "" } else { "s" });
        let violations = if count == 0 {
            self.paint(&violations, Style::Success)
        } else {
            self.paint(&violations, Style::Failure)
        };

        let mut line = format!(
            "{} {} in {} files",
            self.paint("Summary:", Style::Heading),
            violations,
            summary.files_scanned
        );
        if summary.files_skipped > 0 {
            line.push_str(&format!(" ({} skipped)", summary.files_skipped));
        }
        line.push_str(&format!(
            ", {} compliant / {} non-compliant features ({:.1}s)\n",
            summary.compliant_features, summary.non_compliant_features, seconds
        ));
        line
    }

    fn format_json(&self, report: &ComplianceReport, shown: &[Violation]) -> BaselineResult<String> {
        let value = json!({
            "target": report.target,
            "verdict": report.verdict.as_str(),
            "violations_found": report.failed(),
            "total_violations": report.violations.len(),
            "violations": shown,
            "summary": report.summary,
        });

        serde_json::to_string_pretty(&value)
            .map_err(|e| BaselineError::report(format!("Failed to serialize report: {e}")))
    }

    fn format_markdown(&self, report: &ComplianceReport, shown: &[Violation]) -> String {
        let mut output = String::from("# Baseline compliance report\n\n");
        output.push_str(&format!("**Target:** {}\n\n", report.target));

        if report.violations.is_empty() {
            output.push_str("**Result:** pass, no violations found\n\n");
        } else {
            output.push_str(&format!(
                "**Result:** fail, {} violation{} in {} file{}\n\n",
                report.violations.len(),
                if report.violations.len() == 1 { "" } else { "s" },
                report.files_with_violations(),
                if report.files_with_violations() == 1 { "" } else { "s" },
            ));

            output.push_str("| File | Line | Column | Feature | Reason |\n");
            output.push_str("| --- | --- | --- | --- | --- |\n");
            for violation in shown {
                output.push_str(&format!(
                    "| `{}` | {} | {} | `{}` | {} |\n",
                    escape_markdown_cell(&violation.file.display().to_string()),
                    violation.line,
                    violation.column,
                    escape_markdown_cell(&violation.feature_id),
                    escape_markdown_cell(&violation.reason)
                ));
            }

            let hidden = report.violations.len() - shown.len();
            if hidden > 0 {
                output.push_str(&format!("\n_{hidden} more violations not shown._\n"));
            }
            output.push('\n');
        }

        let summary = &report.summary;
        output.push_str(&format!(
            "_Scanned {} files ({} skipped) against {} compliant and {} non-compliant features._\n",
            summary.files_scanned,
            summary.files_skipped,
            summary.compliant_features,
            summary.non_compliant_features
        ));
        output
    }

    fn format_github(&self, shown: &[Violation]) -> String {
        let mut output = String::new();

        for violation in shown {
            let mut properties = format!("file={}", violation.file.display());
            if let Location::Known(line) = violation.line {
                properties.push_str(&format!(",line={line}"));
            }
            if let Location::Known(column) = violation.column {
                properties.push_str(&format!(",col={column}"));
            }

            output.push_str(&format!(
                "::error {},title=Baseline {}::{}\n",
                properties,
                violation.feature_id,
                escape_annotation(&violation.reason)
            ));
        }

        output
    }
}

#[cfg(feature = "colors")]
fn styled(text: &str, style: Style) -> String {
    use colored::Colorize;
    match style {
        Style::Success => text.green().bold().to_string(),
        Style::Failure => text.red().bold().to_string(),
        Style::Dim => text.dimmed().to_string(),
        Style::Heading => text.bold().to_string(),
        Style::Feature => text.cyan().to_string(),
    }
}

#[cfg(not(feature = "colors"))]
fn styled(text: &str, _style: Style) -> String {
    text.to_string()
}

/// Group violations by file, files in order of first appearance
fn group_by_file(violations: &[Violation]) -> Vec<(&Path, Vec<&Violation>)> {
    let mut groups: Vec<(&Path, Vec<&Violation>)> = Vec::new();

    for violation in violations {
        match groups.iter_mut().find(|(file, _)| *file == violation.file.as_path()) {
            Some((_, group)) => group.push(violation),
            None => groups.push((violation.file.as_path(), vec![violation])),
        }
    }

    groups
}

fn position(violation: &Violation) -> String {
    format!("{}:{}", violation.line, violation.column)
}

fn escape_markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Escape data for a workflow command message
fn escape_annotation(text: &str) -> String {
    text.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violations::UsageCandidate;

    fn create_test_report() -> ComplianceReport {
        let mut report = ComplianceReport::new("Baseline widely available");
        report.extend_violations(vec![
            Violation::from_candidate(
                UsageCandidate::new("css.at-rules.container", "src/card.css")
                    .with_position(Some(3), Some(1)),
                "Feature 'css.at-rules.container' is not compliant with Baseline widely available",
            ),
            Violation::from_candidate(
                UsageCandidate::new("api.structuredClone", "src/app.js"),
                "Feature 'api.structuredClone' is not compliant with Baseline widely available",
            ),
            Violation::from_candidate(
                UsageCandidate::new("css.selectors.has", "src/card.css")
                    .with_position(Some(7), Some(4)),
                "Feature 'css.selectors.has' is not compliant with Baseline widely available",
            ),
        ]);
        report.summary.files_scanned = 2;
        report.summary.compliant_features = 10;
        report.summary.non_compliant_features = 3;
        report
    }

    fn plain() -> ReportFormatter {
        ReportFormatter::new(ReportOptions {
            use_colors: false,
            max_violations: None,
        })
    }

    #[test]
    fn test_human_format_groups_in_scan_order() {
        let output = plain()
            .format_report(&create_test_report(), OutputFormat::Human)
            .unwrap();

        assert!(output.contains("Baseline violations found"));
        let card = output.find("src/card.css").unwrap();
        let app = output.find("src/app.js").unwrap();
        assert!(card < app);
        assert!(output.contains("3:1 [css.at-rules.container]"));
        assert!(output.contains("unknown:unknown [api.structuredClone]"));
        assert!(output.contains("3 violations in 2 files"));
    }

    #[test]
    fn test_json_format() {
        let output = plain()
            .format_report(&create_test_report(), OutputFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["verdict"], "fail");
        assert_eq!(value["violations_found"], true);
        assert_eq!(value["violations"][0]["line"], 3);
        assert_eq!(value["violations"][1]["line"], "unknown");
        assert_eq!(value["summary"]["files_scanned"], 2);
    }

    #[test]
    fn test_markdown_format() {
        let output = plain()
            .format_report(&create_test_report(), OutputFormat::Markdown)
            .unwrap();

        assert!(output.starts_with("# Baseline compliance report"));
        assert!(output.contains("**Result:** fail, 3 violations in 2 files"));
        assert!(output.contains("| `src/app.js` | unknown | unknown | `api.structuredClone` |"));
    }

    #[test]
    fn test_github_format() {
        let output = plain()
            .format_report(&create_test_report(), OutputFormat::GitHub)
            .unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("::error file=src/card.css,line=3,col=1,title=Baseline css.at-rules.container::"));
        assert!(lines[1].starts_with("::error file=src/app.js,title=Baseline api.structuredClone::"));
    }

    #[test]
    fn test_empty_report() {
        let report = ComplianceReport::new("Baseline 2022");

        let human = plain().format_report(&report, OutputFormat::Human).unwrap();
        assert!(human.contains("No Baseline violations found"));

        let markdown = plain().format_report(&report, OutputFormat::Markdown).unwrap();
        assert!(markdown.contains("pass, no violations found"));

        assert!(plain().format_report(&report, OutputFormat::GitHub).unwrap().is_empty());
    }

    #[test]
    fn test_max_violations() {
        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            max_violations: Some(1),
        });
        let output = formatter
            .format_report(&create_test_report(), OutputFormat::Human)
            .unwrap();

        assert!(output.contains("... and 2 more"));
        assert!(!output.contains("api.structuredClone"));
    }

    #[test]
    fn test_format_names() {
        assert_eq!("MD".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert!("sarif".parse::<OutputFormat>().is_err());
        for name in OutputFormat::all_formats() {
            let format: OutputFormat = name.parse().unwrap();
            assert_eq!(format.to_string(), *name);
        }
    }
}
