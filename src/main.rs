//! Baseline Guard CLI - Command-line interface for Baseline compliance checks
//!
//! Architecture: Application Layer - CLI coordinates user interactions with domain services
//! - Merges configuration files with command-line overrides
//! - Handles external concerns like file I/O, CI step outputs and process exit codes
//! - Logs go to stderr so reports on stdout stay parseable

use anyhow::Context;
use baseline_guard::{BaselineConfig, BaselineGuard, OutputFormat, ReportFormatter, ReportOptions};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Baseline Guard - Web Platform Baseline compliance checks
#[derive(Parser)]
#[command(name = "baseline-guard")]
#[command(version)]
#[command(about = "Fail builds that use web platform features outside a chosen Baseline target")]
#[command(
    long_about = "Baseline Guard scans CSS and script sources for web platform features, classifies them against the web-features Baseline data, and fails when a feature falls outside the target (widely available, newly available, or a Baseline year)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Check source files against the Baseline target
    Check(CheckArgs),

    /// Show how the feature data classifies for a target
    Features {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the identifiers on one side of the partition
        #[arg(long, value_enum)]
        list: Option<ListArg>,
    },

    /// Explain the decision for a single feature
    Explain {
        /// Feature identifier, e.g. css.at-rules.container
        feature_id: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },
}

/// Target selection shared by every subcommand that classifies
#[derive(Args, Clone, Debug, Default)]
struct TargetArgs {
    /// Baseline target: widely, newly, or a year
    #[arg(short, long)]
    target: Option<String>,

    /// Reject newly available features regardless of target
    #[arg(long)]
    fail_on_newly: bool,

    /// Path to the web-features data.json
    #[arg(long)]
    features: Option<PathBuf>,
}

#[derive(Args, Clone, Debug, Default)]
struct CheckArgs {
    /// Files or directories to check; defaults to the configured scan patterns
    paths: Vec<PathBuf>,

    #[command(flatten)]
    target: TargetArgs,

    /// Glob pattern of files to scan (repeatable)
    #[arg(long = "scan", action = clap::ArgAction::Append)]
    scan: Vec<String>,

    /// Additional exclude patterns
    #[arg(long, action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Output format [default: report.format from the config, else human]
    #[arg(short, long, value_enum)]
    format: Option<OutputFormatArg>,

    /// Write a Markdown report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Disable parallel processing
    #[arg(long)]
    no_parallel: bool,

    /// Maximum number of violations to report
    #[arg(long)]
    max_violations: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
    Markdown,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Markdown => OutputFormat::Markdown,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListArg {
    Compliant,
    NonCompliant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let use_colors = !cli.no_color;

    match cli.command {
        Commands::Check(args) => run_check(cli.config, args, use_colors).await,
        Commands::Features { target, list } => run_features(cli.config, target, list).await,
        Commands::Explain { feature_id, target } => {
            run_explain(cli.config, feature_id, target).await
        }
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
    }
}

/// Explicit config file, else a default-named one in the working directory, else defaults
fn load_config(config_path: Option<&Path>) -> anyhow::Result<BaselineConfig> {
    let config = match config_path {
        Some(path) => BaselineConfig::load_from_file(path)?,
        None => BaselineConfig::discover(".")?,
    };
    Ok(config)
}

fn apply_target_args(config: &mut BaselineConfig, args: &TargetArgs) {
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    if args.fail_on_newly {
        config.fail_on_newly = true;
    }
    if let Some(features) = &args.features {
        config.features_path = features.clone();
    }
}

async fn run_check(
    config_path: Option<PathBuf>,
    args: CheckArgs,
    use_colors: bool,
) -> anyhow::Result<i32> {
    let mut config = load_config(config_path.as_deref())?;
    apply_target_args(&mut config, &args.target);
    if !args.scan.is_empty() {
        config.scan.patterns = args.scan.clone();
    }
    config.scan.exclude.extend(args.exclude.iter().cloned());
    if args.no_parallel {
        config.scan.parallel = false;
    }
    if let Some(report) = &args.report {
        config.report.artifact_name = Some(report.clone());
    }
    config.validate()?;

    let guard = BaselineGuard::from_config(&config)
        .await?
        .with_report_formatter(ReportFormatter::new(ReportOptions {
            use_colors,
            max_violations: args.max_violations,
        }));

    let report = if args.paths.is_empty() {
        guard.check_patterns(&config.scan.patterns)?
    } else {
        guard.check_paths(&args.paths)?
    };

    let format = match args.format {
        Some(format) => format.into(),
        None => config.output_format()?,
    };
    let formatted = guard.format_report(&report, format)?;
    println!("{formatted}");

    if let Some(artifact) = &config.report.artifact_name {
        let markdown = ReportFormatter::new(ReportOptions {
            use_colors: false,
            max_violations: None,
        })
        .format_report(&report, OutputFormat::Markdown)?;
        fs::write(artifact, markdown)
            .with_context(|| format!("Failed to write report artifact '{}'", artifact.display()))?;
        tracing::info!("Wrote report artifact {}", artifact.display());
    }

    if let Ok(output_path) = env::var("GITHUB_OUTPUT") {
        write_step_output(Path::new(&output_path), report.failed())?;
    }

    Ok(if report.failed() { 1 } else { 0 })
}

/// Append `violations-found=<bool>` to a GitHub Actions step output file
fn write_step_output(path: &Path, violations_found: bool) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open step output file '{}'", path.display()))?;
    writeln!(file, "violations-found={violations_found}")
        .with_context(|| format!("Failed to write step output file '{}'", path.display()))?;
    Ok(())
}

async fn run_features(
    config_path: Option<PathBuf>,
    args: TargetArgs,
    list: Option<ListArg>,
) -> anyhow::Result<i32> {
    let mut config = load_config(config_path.as_deref())?;
    apply_target_args(&mut config, &args);

    let guard = BaselineGuard::from_config(&config).await?;
    let classification = guard.classification();

    println!("Target: {}", guard.target());
    println!("Features: {}", guard.store().len());
    println!("  compliant:     {}", classification.compliant.len());
    println!("  non-compliant: {}", classification.non_compliant.len());

    let ids = match list {
        Some(ListArg::Compliant) => Some(&classification.compliant),
        Some(ListArg::NonCompliant) => Some(&classification.non_compliant),
        None => None,
    };
    if let Some(ids) = ids {
        println!();
        for id in ids {
            println!("{id}");
        }
    }

    Ok(0)
}

async fn run_explain(
    config_path: Option<PathBuf>,
    feature_id: String,
    args: TargetArgs,
) -> anyhow::Result<i32> {
    let mut config = load_config(config_path.as_deref())?;
    apply_target_args(&mut config, &args);

    let guard = BaselineGuard::from_config(&config).await?;
    let Some(explanation) = guard.explain(&feature_id) else {
        eprintln!("Feature '{feature_id}' not found in {}", config.features_path.display());
        return Ok(1);
    };

    let record = explanation.record;
    let date = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("Feature: {}", record.id);
    println!("Baseline status: {}", record.baseline_status.as_str());
    println!("Newly available since: {}", date(record.low_date));
    println!("Widely available since: {}", date(record.high_date));
    if let Some(url) = &record.reference_url {
        println!("Reference: {url}");
    }
    println!();
    println!("Target: {}", guard.target());
    println!(
        "Verdict: {} ({})",
        if explanation.decision.compliant { "compliant" } else { "not compliant" },
        explanation.decision.basis
    );

    Ok(0)
}

fn run_validate_config(config_path: Option<PathBuf>) -> anyhow::Result<i32> {
    let config_path = config_path.unwrap_or_else(|| {
        baseline_guard::config::DEFAULT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .unwrap_or_else(|| PathBuf::from(baseline_guard::config::DEFAULT_CONFIG_FILES[0]))
    });

    println!("Validating configuration: {}", config_path.display());

    match BaselineConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  Target: {}", config.compliance_target()?);
            println!("  Feature data: {}", config.features_path.display());
            println!("  Scan patterns: {}", config.scan.patterns.len());
            println!("  Exclude patterns: {}", config.scan.exclude.len());
            println!("  Script tokens: {}", config.script_tokens.tokens.len());
            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {e}");
            Ok(1)
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    const FEATURES: &str = r#"{
        "css.properties.gap": {"status": {"baseline": "high", "baseline_low_date": "2017-10-17"}},
        "css.at-rules.container": {"status": {"baseline": "low", "baseline_low_date": "2023-02-14"}, "spec": "https://drafts.csswg.org/css-contain-3/"}
    }"#;

    fn fixture(css: &str) -> (TempDir, CheckArgs) {
        let temp_dir = TempDir::new().unwrap();
        let features = temp_dir.path().join("data.json");
        fs::write(&features, FEATURES).unwrap();
        let css_file = temp_dir.path().join("site.css");
        fs::write(&css_file, css).unwrap();

        let args = CheckArgs {
            paths: vec![css_file],
            target: TargetArgs {
                target: Some("widely".to_string()),
                features: Some(features),
                ..Default::default()
            },
            format: Some(OutputFormatArg::Json),
            ..Default::default()
        };
        (temp_dir, args)
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn test_check_command_exit_codes() {
        let (_dir, args) = fixture("@container (width > 1px) { a { gap: 0 } }");
        assert_eq!(run_check(None, args, false).await.unwrap(), 1);

        let (_dir, mut args) = fixture("@container (width > 1px) { a { gap: 0 } }");
        args.target.target = Some("newly".to_string());
        assert_eq!(run_check(None, args, false).await.unwrap(), 0);

        let (_dir, mut args) = fixture("@container (width > 1px) {}");
        args.target.target = Some("newly".to_string());
        args.target.fail_on_newly = true;
        assert_eq!(run_check(None, args, false).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_check_writes_report_artifact() {
        let (dir, mut args) = fixture("@container (width > 1px) {}");
        let artifact = dir.path().join("baseline-report.md");
        args.report = Some(artifact.clone());

        assert_eq!(run_check(None, args, false).await.unwrap(), 1);
        let markdown = fs::read_to_string(artifact).unwrap();
        assert!(markdown.contains("`css.at-rules.container`"));
    }

    #[tokio::test]
    async fn test_check_fatal_errors() {
        let (_dir, mut args) = fixture("a {}");
        args.target.target = Some("foo".to_string());
        assert!(run_check(None, args, false).await.is_err());

        let (_dir, mut args) = fixture("a {}");
        args.target.features = Some(PathBuf::from("/nonexistent/data.json"));
        assert!(run_check(None, args, false).await.is_err());
    }

    #[test]
    fn test_write_step_output_appends() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("github_output");
        fs::write(&output, "previous=1\n").unwrap();

        write_step_output(&output, true).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "previous=1\nviolations-found=true\n"
        );
    }

    #[tokio::test]
    async fn test_explain_and_features() {
        let (_dir, args) = fixture("a {}");

        let result = run_explain(None, "css.at-rules.container".to_string(), args.target.clone());
        assert_eq!(result.await.unwrap(), 0);

        let result = run_explain(None, "css.properties.nope".to_string(), args.target.clone());
        assert_eq!(result.await.unwrap(), 1);

        let result = run_features(None, args.target, Some(ListArg::NonCompliant));
        assert_eq!(result.await.unwrap(), 0);
    }

    #[test]
    fn test_validate_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("baseline_guard.yaml");

        let yaml = BaselineConfig::default().to_yaml().unwrap();
        fs::write(&config_file, yaml).unwrap();
        assert_eq!(run_validate_config(Some(config_file.clone())).unwrap(), 0);

        fs::write(&config_file, "target: someday\n").unwrap();
        assert_eq!(run_validate_config(Some(config_file)).unwrap(), 1);
    }
}
