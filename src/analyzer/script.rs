//! Heuristic feature detection for script files
//!
//! Matching is plain substring search over the whole file, so usages inside
//! comments and string literals are reported too. Candidates carry no position
//! and the scanner reports `Confidence::Low`.

use crate::analyzer::{Confidence, FileKind, UsageScanner};
use crate::domain::features::FeatureStore;
use crate::domain::violations::{BaselineResult, UsageCandidate};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

lazy_static! {
    /// Global names distinctive enough to search for as bare text:
    /// capitalized interfaces (`ResizeObserver`) or camelCase functions (`structuredClone`)
    static ref DISTINCTIVE_GLOBAL: Regex =
        Regex::new(r"^(?:[A-Z][A-Za-z0-9]{3,}|[a-z]+[A-Z][A-Za-z0-9]*)$")
            .expect("global name pattern is valid");
}

/// A source text fragment that signals use of a feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptToken {
    pub token: String,
    pub feature_id: String,
}

impl ScriptToken {
    pub fn new(token: impl Into<String>, feature_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            feature_id: feature_id.into(),
        }
    }
}

/// Tokens derived from the feature data's top-level API and JavaScript built-in entries
pub fn derive_tokens(store: &FeatureStore) -> Vec<ScriptToken> {
    store
        .all_ids()
        .filter_map(|id| {
            let name = id
                .strip_prefix("api.")
                .or_else(|| id.strip_prefix("javascript.builtins."))?;
            DISTINCTIVE_GLOBAL.is_match(name).then(|| ScriptToken::new(name, id))
        })
        .collect()
}

/// Substring-matching scanner for JavaScript and TypeScript sources
#[derive(Debug, Clone, Default)]
pub struct ScriptScanner {
    tokens: Vec<ScriptToken>,
}

impl ScriptScanner {
    /// Create a scanner; when a token text repeats, the first mapping wins
    pub fn new(tokens: impl IntoIterator<Item = ScriptToken>) -> Self {
        let mut seen = HashSet::new();
        let tokens = tokens
            .into_iter()
            .filter(|t| !t.token.is_empty() && seen.insert(t.token.clone()))
            .collect();
        Self { tokens }
    }

    pub fn tokens(&self) -> &[ScriptToken] {
        &self.tokens
    }
}

impl UsageScanner for ScriptScanner {
    fn name(&self) -> &'static str {
        "script-heuristic"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Low
    }

    fn handles_file(&self, file_path: &Path) -> bool {
        FileKind::of(file_path) == FileKind::Script
    }

    fn scan(&self, file_path: &Path, content: &str) -> BaselineResult<Vec<UsageCandidate>> {
        let mut reported = HashSet::new();

        Ok(self
            .tokens
            .iter()
            .filter(|t| content.contains(t.token.as_str()))
            .filter(|t| reported.insert(t.feature_id.as_str()))
            .map(|t| UsageCandidate::new(t.feature_id.clone(), file_path))
            .collect())
    }
}
