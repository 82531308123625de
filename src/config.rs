//! Run configuration
//!
//! A fixed set of recognized fields. Unknown keys are rejected when a
//! config is deserialized, so a misspelled threshold fails loudly instead
//! of silently falling back to its default.

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard ceiling for `max_conditions_per_decision` (2^16 truth-table rows).
pub const MAX_SUPPORTED_CONDITIONS: usize = 16;

/// Configuration for a single test-generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Percentage of changed lines that must be covered (0–100)
    #[serde(default = "default_threshold")]
    pub changed_lines_threshold: f64,

    /// Percentage of newly added lines that must be covered (0–100)
    #[serde(default = "default_threshold")]
    pub new_lines_threshold: f64,

    /// Require every in-scope decision to be MCDC satisfied before stopping
    #[serde(default = "default_true")]
    pub mcdc_required: bool,

    /// Consecutive zero-gain tests that count as a plateau
    #[serde(default = "default_plateau_test_count")]
    pub plateau_test_count: usize,

    /// Wall-clock budget for the run
    #[serde(default = "default_time_limit_minutes")]
    pub time_limit_minutes: u64,

    /// Maximum number of recorded tests
    #[serde(default = "default_max_tests")]
    pub max_tests: usize,

    /// Decisions with more conditions are rejected as too complex
    #[serde(default = "default_max_conditions")]
    pub max_conditions_per_decision: usize,
}

fn default_threshold() -> f64 {
    80.0
}

fn default_true() -> bool {
    true
}

fn default_plateau_test_count() -> usize {
    5
}

fn default_time_limit_minutes() -> u64 {
    60
}

fn default_max_tests() -> usize {
    100
}

fn default_max_conditions() -> usize {
    8
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            changed_lines_threshold: default_threshold(),
            new_lines_threshold: default_threshold(),
            mcdc_required: true,
            plateau_test_count: default_plateau_test_count(),
            time_limit_minutes: default_time_limit_minutes(),
            max_tests: default_max_tests(),
            max_conditions_per_decision: default_max_conditions(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a YAML config
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RunConfig = serde_norway::from_str(yaml)
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; `.json` is read as JSON, anything else as YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<()> {
        check_percentage("changed_lines_threshold", self.changed_lines_threshold)?;
        check_percentage("new_lines_threshold", self.new_lines_threshold)?;

        if self.plateau_test_count < 1 {
            return Err(Error::InvalidConfiguration(
                "plateau_test_count must be at least 1".into(),
            ));
        }
        if self.time_limit_minutes < 1 {
            return Err(Error::InvalidConfiguration(
                "time_limit_minutes must be at least 1".into(),
            ));
        }
        if self.max_tests < 1 {
            return Err(Error::InvalidConfiguration(
                "max_tests must be at least 1".into(),
            ));
        }
        if self.max_conditions_per_decision < 1
            || self.max_conditions_per_decision > MAX_SUPPORTED_CONDITIONS
        {
            return Err(Error::InvalidConfiguration(format!(
                "max_conditions_per_decision must be between 1 and {}, got {}",
                MAX_SUPPORTED_CONDITIONS, self.max_conditions_per_decision
            )));
        }

        Ok(())
    }

    pub fn with_changed_lines_threshold(mut self, percent: f64) -> Self {
        self.changed_lines_threshold = percent;
        self
    }

    pub fn with_new_lines_threshold(mut self, percent: f64) -> Self {
        self.new_lines_threshold = percent;
        self
    }

    pub fn with_mcdc_required(mut self, required: bool) -> Self {
        self.mcdc_required = required;
        self
    }

    pub fn with_plateau_test_count(mut self, count: usize) -> Self {
        self.plateau_test_count = count;
        self
    }

    pub fn with_time_limit_minutes(mut self, minutes: u64) -> Self {
        self.time_limit_minutes = minutes;
        self
    }

    pub fn with_max_tests(mut self, max: usize) -> Self {
        self.max_tests = max;
        self
    }

    pub fn with_max_conditions(mut self, max: usize) -> Self {
        self.max_conditions_per_decision = max;
        self
    }
}

fn check_percentage(field: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(Error::InvalidConfiguration(format!(
            "{} must be within [0, 100], got {}",
            field, value
        )));
    }
    Ok(())
}
