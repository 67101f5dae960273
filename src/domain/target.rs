//! Compliance targets parsed from user configuration

use crate::domain::violations::{BaselineError, BaselineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The Baseline tier or year a run is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLevel {
    /// Only widely available features are allowed
    Widely,
    /// Newly and widely available features are allowed
    Newly,
    /// Features that reached Baseline in or before the given year are allowed
    Year(i32),
}

impl FromStr for TargetLevel {
    type Err = BaselineError;

    fn from_str(s: &str) -> BaselineResult<Self> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("widely") {
            return Ok(Self::Widely);
        }
        if text.eq_ignore_ascii_case("newly") {
            return Ok(Self::Newly);
        }
        text.parse::<i32>().map(Self::Year).map_err(|_| {
            BaselineError::config(format!(
                "Invalid target baseline '{s}': expected 'widely', 'newly' or a year"
            ))
        })
    }
}

impl fmt::Display for TargetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Widely => f.write_str("widely"),
            Self::Newly => f.write_str("newly"),
            Self::Year(year) => write!(f, "{year}"),
        }
    }
}

/// A target level plus the newly-available override, fixed for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplianceTarget {
    pub level: TargetLevel,
    /// Reject `low` features even when the level would admit them
    pub fail_on_newly_available: bool,
}

impl ComplianceTarget {
    pub fn new(level: TargetLevel, fail_on_newly_available: bool) -> Self {
        Self {
            level,
            fail_on_newly_available,
        }
    }

    /// Parse a textual target (`widely`, `newly`, or a year), case-insensitive
    pub fn parse(target: &str, fail_on_newly_available: bool) -> BaselineResult<Self> {
        Ok(Self::new(target.parse()?, fail_on_newly_available))
    }

    pub fn widely() -> Self {
        Self::new(TargetLevel::Widely, false)
    }

    pub fn newly() -> Self {
        Self::new(TargetLevel::Newly, false)
    }

    pub fn year(year: i32) -> Self {
        Self::new(TargetLevel::Year(year), false)
    }

    pub fn failing_on_newly(mut self) -> Self {
        self.fail_on_newly_available = true;
        self
    }
}

impl fmt::Display for ComplianceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            TargetLevel::Widely => f.write_str("Baseline widely available")?,
            TargetLevel::Newly => f.write_str("Baseline newly available")?,
            TargetLevel::Year(year) => write!(f, "Baseline {year}")?,
        }
        if self.fail_on_newly_available {
            f.write_str(" (newly available rejected)")?;
        }
        Ok(())
    }
}
