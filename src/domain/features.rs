//! Feature records and the read-only store built from a feature database snapshot
//!
//! Architecture: Anti-Corruption Layer - Raw JSON snapshots become typed, immutable records
//! - Field names of the external database are only known here
//! - Unrecognized values degrade to "no evidence" rather than failing the load
//! - The store is built once per run and never mutated afterwards

use crate::domain::violations::{BaselineError, BaselineResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Baseline availability tier of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineStatus {
    /// Not (yet) part of Baseline, or status unrecognized
    None,
    /// Newly available
    Low,
    /// Widely available
    High,
}

impl BaselineStatus {
    /// Read the `baseline` status value; anything but "high"/"low" means no status
    fn from_json(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some(s) if s.eq_ignore_ascii_case("high") => Self::High,
            Some(s) if s.eq_ignore_ascii_case("low") => Self::Low,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

/// Baseline metadata for a single platform feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    pub baseline_status: BaselineStatus,
    pub low_date: Option<NaiveDate>,
    pub high_date: Option<NaiveDate>,
    pub reference_url: Option<String>,
}

impl FeatureRecord {
    /// Create a record with no dates or reference URL
    pub fn new(id: impl Into<String>, baseline_status: BaselineStatus) -> Self {
        Self {
            id: id.into(),
            baseline_status,
            low_date: None,
            high_date: None,
            reference_url: None,
        }
    }

    pub fn with_low_date(mut self, date: NaiveDate) -> Self {
        self.low_date = Some(date);
        self
    }

    pub fn with_high_date(mut self, date: NaiveDate) -> Self {
        self.high_date = Some(date);
        self
    }

    pub fn with_reference_url(mut self, url: impl Into<String>) -> Self {
        self.reference_url = Some(url.into());
        self
    }

    pub fn low_year(&self) -> Option<i32> {
        self.low_date.map(|d| d.year())
    }

    pub fn high_year(&self) -> Option<i32> {
        self.high_date.map(|d| d.year())
    }

    /// Normalize one raw database entry
    fn from_json(id: &str, raw: &Value) -> Self {
        let Some(object) = raw.as_object() else {
            tracing::debug!("Feature '{}' is not an object; treating it as non-Baseline", id);
            return Self::new(id, BaselineStatus::None);
        };

        Self {
            id: id.to_string(),
            baseline_status: BaselineStatus::from_json(status_field(object, "baseline")),
            low_date: parse_baseline_date(id, status_field(object, "baseline_low_date")),
            high_date: parse_baseline_date(id, status_field(object, "baseline_high_date")),
            reference_url: reference_url(object),
        }
    }
}

/// Records keyed by the browser-compat-data keys a web-features entry lists
///
/// Each key takes its status from `status.by_compat_key` when present, otherwise from the
/// entry's own `status`.
fn compat_records(raw: &Value) -> Vec<FeatureRecord> {
    let Some(object) = raw.as_object() else {
        return Vec::new();
    };
    let Some(keys) = object.get("compat_features").and_then(Value::as_array) else {
        return Vec::new();
    };

    let status = object.get("status").and_then(Value::as_object);
    let by_key = status
        .and_then(|status| status.get("by_compat_key"))
        .and_then(Value::as_object);
    let reference = reference_url(object);

    keys.iter()
        .filter_map(Value::as_str)
        .map(|key| {
            let key_status = by_key
                .and_then(|by_key| by_key.get(key))
                .and_then(Value::as_object)
                .or(status);
            let field = |name: &str| key_status.and_then(|status| status.get(name));

            FeatureRecord {
                id: key.to_string(),
                baseline_status: BaselineStatus::from_json(field("baseline")),
                low_date: parse_baseline_date(key, field("baseline_low_date")),
                high_date: parse_baseline_date(key, field("baseline_high_date")),
                reference_url: reference.clone(),
            }
        })
        .collect()
}

/// Look up a field in the nested `status` object, falling back to the record itself
fn status_field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object
        .get("status")
        .and_then(Value::as_object)
        .and_then(|status| status.get(name))
        .or_else(|| object.get(name))
}

/// Parse a Baseline date such as `2021-03-01` or `≤2020-07-28`
fn parse_baseline_date(id: &str, value: Option<&Value>) -> Option<NaiveDate> {
    let raw = value.and_then(Value::as_str)?.trim();
    let text = raw.trim_start_matches('≤').trim_start_matches("<=").trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }

    // Fall back to a leading four-digit year
    let year = text
        .get(..4)
        .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
        .and_then(|y| y.parse::<i32>().ok());
    match year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)) {
        Some(date) => Some(date),
        None => {
            tracing::debug!("Ignoring unparsable Baseline date '{}' on feature '{}'", raw, id);
            None
        }
    }
}

fn reference_url(object: &Map<String, Value>) -> Option<String> {
    match object.get("spec") {
        Some(Value::String(url)) => return Some(url.clone()),
        Some(Value::Array(urls)) => {
            if let Some(url) = urls.iter().find_map(Value::as_str) {
                return Some(url.to_string());
            }
        }
        _ => {}
    }
    object.get("url").and_then(Value::as_str).map(str::to_string)
}

/// Immutable lookup of feature records keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    records: BTreeMap<String, FeatureRecord>,
}

impl FeatureStore {
    /// Build a store from a parsed snapshot
    ///
    /// Accepts a bare `{id: record}` mapping or a web-features document with a top-level
    /// `features` mapping. In a web-features document every entry is also expanded into one
    /// record per `compat_features` key, which is the id space the scanners report in.
    /// Anything that is not a mapping is a data load error.
    pub fn load(snapshot: &Value) -> BaselineResult<Self> {
        let root = snapshot.as_object().ok_or_else(|| {
            BaselineError::data_load(format!(
                "Feature snapshot must be a mapping, found {}",
                json_kind(snapshot)
            ))
        })?;

        let (features, web_features) = match root.get("features") {
            Some(Value::Object(features)) => (features, true),
            Some(other) => {
                return Err(BaselineError::data_load(format!(
                    "'features' must be a mapping, found {}",
                    json_kind(other)
                )))
            }
            None => (root, false),
        };

        let mut records = features
            .iter()
            .map(|(id, raw)| (id.clone(), FeatureRecord::from_json(id, raw)))
            .collect::<BTreeMap<_, _>>();

        if web_features {
            let mut compat_keys = 0usize;
            for raw in features.values() {
                for record in compat_records(raw) {
                    if !records.contains_key(&record.id) {
                        compat_keys += 1;
                        records.insert(record.id.clone(), record);
                    }
                }
            }
            tracing::debug!("Expanded {} compat keys from {} features", compat_keys, features.len());
        }

        tracing::debug!("Loaded {} feature records", records.len());
        Ok(Self { records })
    }

    /// Build a store from JSON text
    pub fn from_json_str(content: &str) -> BaselineResult<Self> {
        let snapshot: Value = serde_json::from_str(content)
            .map_err(|e| BaselineError::data_load(format!("Failed to parse feature data: {e}")))?;
        Self::load(&snapshot)
    }

    /// Read and build a store from a JSON file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BaselineResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            BaselineError::data_load(format!(
                "Failed to read feature data '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json_str(&content).map_err(|e| match e {
            BaselineError::DataLoad { message } => {
                BaselineError::data_load(format!("{} ({})", message, path.display()))
            }
            other => other,
        })
    }

    /// Build a store from already-normalized records
    pub fn from_records(records: impl IntoIterator<Item = FeatureRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn lookup(&self, id: &str) -> Option<&FeatureRecord> {
        self.records.get(id)
    }

    /// All identifiers, in sorted order
    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// All records, in identifier order
    pub fn records(&self) -> impl Iterator<Item = &FeatureRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
