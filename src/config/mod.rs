//! Configuration loading and management for Baseline Guard
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML into run settings
//! - Every field has a default, so an empty file is a valid configuration
//! - The built-in script token table lives here, alongside the other defaults
//! - Validation rejects bad targets and patterns before any source file is read

use crate::analyzer::ScriptToken;
use crate::discovery::{DEFAULT_EXCLUDES, DEFAULT_IGNORE_FILE};
use crate::domain::target::ComplianceTarget;
use crate::domain::violations::{BaselineError, BaselineResult};
use crate::report::OutputFormat;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File names looked up in the working directory when no config is given
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "baseline_guard.yaml",
    "baseline_guard.yml",
    ".baseline_guard.yaml",
];

/// Main configuration structure for Baseline Guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Configuration format version
    pub version: String,
    /// `widely`, `newly`, or a year
    #[serde(deserialize_with = "deserialize_target")]
    pub target: String,
    /// Reject newly available features regardless of target
    pub fail_on_newly: bool,
    /// Location of the web-features JSON snapshot
    pub features_path: PathBuf,
    pub scan: ScanConfig,
    pub script_tokens: ScriptTokenConfig,
    pub report: ReportConfig,
}

/// Which files are scanned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Glob patterns expanded in order
    pub patterns: Vec<String>,
    /// Exclusion patterns (gitignore-style, `!` re-includes)
    pub exclude: Vec<String>,
    /// Ignore file honored in ancestor directories; empty disables it
    pub ignore_file: Option<String>,
    pub parallel: bool,
}

/// Script heuristic token table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptTokenConfig {
    /// Add tokens derived from top-level API and built-in feature names
    pub derive_from_data: bool,
    /// Mappings added after the built-in table, consulted in order
    pub tokens: Vec<ScriptTokenRule>,
}

/// One configured token mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTokenRule {
    pub token: String,
    pub feature: String,
}

/// Report output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Markdown report written after each run, if set
    pub artifact_name: Option<PathBuf>,
    /// Console output format when none is given on the command line
    pub format: String,
}

impl BaselineConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BaselineResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            BaselineError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            BaselineError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> BaselineResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| BaselineError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the first default config file present in `dir`, or the defaults
    pub fn discover<P: AsRef<Path>>(dir: P) -> BaselineResult<Self> {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = dir.as_ref().join(name);
            if candidate.is_file() {
                tracing::debug!("Using config file {}", candidate.display());
                return Self::load_from_file(candidate);
            }
        }
        Ok(Self::with_defaults())
    }

    /// Default configuration: widely available target, built-in token table
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            target: "widely".to_string(),
            fail_on_newly: false,
            features_path: PathBuf::from("node_modules/web-features/data.json"),
            scan: ScanConfig::default(),
            script_tokens: ScriptTokenConfig::default(),
            report: ReportConfig::default(),
        }
    }

    /// Parse the target and override flag
    pub fn compliance_target(&self) -> BaselineResult<ComplianceTarget> {
        ComplianceTarget::parse(&self.target, self.fail_on_newly)
    }

    /// Built-in token table followed by the configured mappings
    pub fn script_tokens(&self) -> Vec<ScriptToken> {
        BUILTIN_SCRIPT_TOKENS
            .iter()
            .map(|(token, feature)| ScriptToken::new(*token, *feature))
            .chain(
                self.script_tokens
                    .tokens
                    .iter()
                    .map(|rule| ScriptToken::new(&rule.token, &rule.feature)),
            )
            .collect()
    }

    /// Parsed console output format
    pub fn output_format(&self) -> BaselineResult<OutputFormat> {
        self.report.format.parse().map_err(BaselineError::config)
    }

    /// Effective ignore file name, treating an empty name as disabled
    pub fn ignore_file(&self) -> Option<String> {
        self.scan.ignore_file.clone().filter(|name| !name.is_empty())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> BaselineResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(BaselineError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        self.compliance_target()?;

        for pattern in &self.scan.patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                BaselineError::config(format!("Invalid scan pattern '{pattern}': {e}"))
            })?;
        }

        for pattern in &self.scan.exclude {
            let pattern = pattern.trim_start_matches('!');
            glob::Pattern::new(pattern.trim_matches('/')).map_err(|e| {
                BaselineError::config(format!("Invalid exclude pattern '{pattern}': {e}"))
            })?;
        }

        self.output_format()?;

        let mut tokens = HashSet::new();
        for rule in &self.script_tokens.tokens {
            if rule.token.is_empty() || rule.feature.is_empty() {
                return Err(BaselineError::config(format!(
                    "Script token mapping needs both a token and a feature (token '{}', feature '{}')",
                    rule.token, rule.feature
                )));
            }
            if !tokens.insert(rule.token.as_str()) {
                return Err(BaselineError::config(format!(
                    "Duplicate script token '{}'",
                    rule.token
                )));
            }
        }

        Ok(())
    }

    /// Convert to YAML, the same format it is loaded from
    pub fn to_yaml(&self) -> BaselineResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| BaselineError::config(format!("Failed to serialize config: {e}")))
    }
}

/// Accept `target: 2023` as well as `target: "2023"`
fn deserialize_target<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTarget {
        Text(String),
        Year(i64),
    }

    Ok(match RawTarget::deserialize(deserializer)? {
        RawTarget::Text(text) => text,
        RawTarget::Year(year) => year.to_string(),
    })
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            artifact_name: None,
            format: OutputFormat::Human.to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            patterns: ["css", "js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"]
                .iter()
                .map(|ext| format!("**/*.{ext}"))
                .collect(),
            exclude: DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect(),
            ignore_file: Some(DEFAULT_IGNORE_FILE.to_string()),
            parallel: true,
        }
    }
}

impl Default for ScriptTokenConfig {
    fn default() -> Self {
        Self {
            derive_from_data: true,
            tokens: Vec::new(),
        }
    }
}

/// Token table for well-known modern APIs, always scanned for
pub const BUILTIN_SCRIPT_TOKENS: &[(&str, &str)] = &[
    ("structuredClone(", "api.structuredClone"),
    ("navigator.share(", "api.Navigator.share"),
    ("navigator.clipboard", "api.Navigator.clipboard"),
    ("navigator.gpu", "api.Navigator.gpu"),
    (".showPopover(", "api.HTMLElement.showPopover"),
    ("document.startViewTransition(", "api.Document.startViewTransition"),
    ("Object.hasOwn(", "javascript.builtins.Object.hasOwn"),
    ("Object.groupBy(", "javascript.builtins.Object.groupBy"),
    (".findLast(", "javascript.builtins.Array.findLast"),
    (".toSorted(", "javascript.builtins.Array.toSorted"),
    ("Promise.withResolvers(", "javascript.builtins.Promise.withResolvers"),
];

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: BaselineConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: BaselineConfig::default(),
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.target = target.into();
        self
    }

    pub fn fail_on_newly(mut self, fail_on_newly: bool) -> Self {
        self.config.fail_on_newly = fail_on_newly;
        self
    }

    pub fn features_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.features_path = path.into();
        self
    }

    /// Replace the scan patterns
    pub fn scan_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.scan.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.config.scan.exclude.push(pattern.into());
        self
    }

    pub fn add_script_token(mut self, token: impl Into<String>, feature: impl Into<String>) -> Self {
        self.config.script_tokens.tokens.push(ScriptTokenRule {
            token: token.into(),
            feature: feature.into(),
        });
        self
    }

    pub fn derive_script_tokens(mut self, enabled: bool) -> Self {
        self.config.script_tokens.derive_from_data = enabled;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.scan.parallel = parallel;
        self
    }

    pub fn artifact_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report.artifact_name = Some(path.into());
        self
    }

    /// Build the final configuration
    pub fn build(self) -> BaselineResult<BaselineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::target::TargetLevel;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = BaselineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compliance_target().unwrap(), ComplianceTarget::widely());
        assert!(config.script_tokens.derive_from_data);
        assert!(config.script_tokens.tokens.is_empty());
        assert_eq!(config.script_tokens().len(), BUILTIN_SCRIPT_TOKENS.len());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = BaselineConfig::load_from_str("{}").unwrap();
        assert_eq!(config, BaselineConfig::default());
    }

    #[test]
    fn test_load_from_str() {
        let yaml = r#"
version: "1.0"
target: "2023"
fail_on_newly: true
features_path: data/features.json
scan:
  patterns: ["src/**/*.css"]
  parallel: false
script_tokens:
  derive_from_data: false
  tokens:
    - token: "new Intl.Segmenter("
      feature: api.Intl.Segmenter
report:
  artifact_name: baseline-report.md
  format: markdown
"#;

        let config = BaselineConfig::load_from_str(yaml).unwrap();
        let target = config.compliance_target().unwrap();

        assert_eq!(target.level, TargetLevel::Year(2023));
        assert!(target.fail_on_newly_available);
        assert_eq!(config.features_path, PathBuf::from("data/features.json"));
        assert_eq!(config.scan.patterns, vec!["src/**/*.css"]);
        assert!(!config.scan.parallel);
        assert_eq!(config.scan.exclude.len(), DEFAULT_EXCLUDES.len());
        let tokens = config.script_tokens();
        assert_eq!(tokens.len(), BUILTIN_SCRIPT_TOKENS.len() + 1);
        assert_eq!(
            tokens.first(),
            Some(&ScriptToken::new("structuredClone(", "api.structuredClone"))
        );
        assert_eq!(
            tokens.last(),
            Some(&ScriptToken::new("new Intl.Segmenter(", "api.Intl.Segmenter"))
        );
        assert_eq!(
            config.report.artifact_name,
            Some(PathBuf::from("baseline-report.md"))
        );
        assert_eq!(config.output_format().unwrap(), OutputFormat::Markdown);
    }

    #[test]
    fn test_invalid_configs() {
        let cases = [
            "version: \"2.0\"",
            "target: foo",
            "scan:\n  patterns: [\"src/[.css\"]",
            "script_tokens:\n  tokens:\n    - token: \"\"\n      feature: api.X",
            "script_tokens:\n  tokens:\n    - {token: a, feature: x}\n    - {token: a, feature: y}",
            "target: [1, 2]",
            "report:\n  format: sarif",
        ];

        for yaml in cases {
            let err = BaselineConfig::load_from_str(yaml).unwrap_err();
            assert!(matches!(err, BaselineError::Configuration { .. }), "{yaml}");
        }
    }

    #[test]
    fn test_discover_and_round_trip() -> BaselineResult<()> {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(BaselineConfig::discover(temp_dir.path())?, BaselineConfig::default());

        let config = ConfigBuilder::new()
            .target("newly")
            .add_script_token("CSS.highlights", "api.HighlightRegistry")
            .build()?;
        fs::write(temp_dir.path().join("baseline_guard.yml"), config.to_yaml()?)?;

        assert_eq!(BaselineConfig::discover(temp_dir.path())?, config);
        Ok(())
    }

    #[test]
    fn test_numeric_target() {
        let config = BaselineConfig::load_from_str("target: 2022").unwrap();
        assert_eq!(config.compliance_target().unwrap(), ComplianceTarget::year(2022));
    }

    #[test]
    fn test_builder_rejects_invalid_target() {
        assert!(ConfigBuilder::new().target("sometime").build().is_err());
    }

    #[test]
    fn test_empty_ignore_file_disables_it() {
        let mut config = BaselineConfig::default();
        assert_eq!(config.ignore_file().as_deref(), Some(DEFAULT_IGNORE_FILE));
        config.scan.ignore_file = Some(String::new());
        assert_eq!(config.ignore_file(), None);
    }
}
