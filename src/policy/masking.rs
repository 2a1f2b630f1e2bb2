//! Output-stage masking and leakage rules.

use serde::{Deserialize, Serialize};

use super::Severity;
use crate::{Error, Result};

/// A pattern-to-replacement rewrite applied to generated output.
///
/// Masking must be idempotent: a rule whose replacement matches its own
/// pattern would re-trigger on already-masked text and is rejected at
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingRule {
    /// Unique rule identifier
    pub id: String,
    /// Regex pattern matched against the output text
    pub pattern: String,
    /// Literal replacement for each claimed match
    pub replacement: String,
    /// Disabled rules are skipped
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Tie-break order among overlapping matches of equal start and length
    #[serde(default)]
    pub order_index: u32,
}

fn default_enabled() -> bool {
    true
}

impl MaskingRule {
    /// Create and validate a masking rule.
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<Self> {
        let rule = Self {
            id: id.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
            enabled: true,
            order_index: 0,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Validate pattern compilability and idempotence.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation_field(
                "Masking rule ID cannot be empty",
                "id",
            ));
        }
        let re = regex::Regex::new(&self.pattern).map_err(|e| {
            Error::validation_field(
                format!("Masking rule '{}' has an invalid pattern: {}", self.id, e),
                "pattern",
            )
        })?;
        if re.is_match(&self.replacement) {
            return Err(Error::validation_field(
                format!(
                    "Masking rule '{}' replacement matches its own pattern; masking would not be idempotent",
                    self.id
                ),
                "replacement",
            ));
        }
        Ok(())
    }
}

/// Action taken when a leakage rule matches generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakageAction {
    /// Replace each match with the redaction marker
    Redact,
    /// Replace the entire response with the configured refusal message
    Refuse,
    /// Pass the output through and raise an alert
    Alert,
}

impl LeakageAction {
    /// Lowercase name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LeakageAction::Redact => "redact",
            LeakageAction::Refuse => "refuse",
            LeakageAction::Alert => "alert",
        }
    }
}

/// A sensitive-content detector applied to output after masking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageRule {
    /// Unique rule identifier
    pub id: String,
    /// Human-readable name, used in the redaction marker
    pub name: String,
    /// Regex pattern matched against the masked output
    pub pattern: String,
    /// Action taken on match
    pub action: LeakageAction,
    /// Severity propagated into alerts raised by this rule
    #[serde(default)]
    pub severity: Severity,
    /// Disabled rules are skipped
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Evaluation order position
    #[serde(default)]
    pub order_index: u32,
}

impl LeakageRule {
    /// Create and validate a leakage rule.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: impl Into<String>,
        action: LeakageAction,
    ) -> Result<Self> {
        let rule = Self {
            id: id.into(),
            name: name.into(),
            pattern: pattern.into(),
            action,
            severity: Severity::default(),
            enabled: true,
            order_index: 0,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// The marker substituted for matches under [`LeakageAction::Redact`].
    pub fn redaction_marker(&self) -> String {
        format!("<REDACTED:{}>", self.name)
    }

    /// Validate the rule's pattern.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation_field(
                "Leakage rule ID cannot be empty",
                "id",
            ));
        }
        if self.name.is_empty() {
            return Err(Error::validation_field(
                "Leakage rule name cannot be empty",
                "name",
            ));
        }
        let re = regex::Regex::new(&self.pattern).map_err(|e| {
            Error::validation_field(
                format!("Leakage rule '{}' has an invalid pattern: {}", self.id, e),
                "pattern",
            )
        })?;
        if re.is_match(&self.redaction_marker()) {
            return Err(Error::validation_field(
                format!(
                    "Leakage rule '{}' would match its own redaction marker",
                    self.id
                ),
                "pattern",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_rule_idempotence_enforced() {
        // Replacement text that the pattern itself would match again
        let err = MaskingRule::new("m-broad", r"\[.*\]", "[MASKED]").unwrap_err();
        assert!(err.to_string().contains("idempotent"));

        let ok = MaskingRule::new("m-email", r"[\w.+-]+@[\w-]+\.[\w.]+", "<email>");
        assert!(ok.is_ok());
    }

    #[test]
    fn test_leakage_rule_marker() {
        let rule = LeakageRule::new(
            "lk-ssn",
            "ssn",
            r"\b\d{3}-\d{2}-\d{4}\b",
            LeakageAction::Redact,
        )
        .unwrap();
        assert_eq!(rule.redaction_marker(), "<REDACTED:ssn>");
    }

    #[test]
    fn test_leakage_rule_bad_pattern_rejected() {
        let err = LeakageRule::new("lk-bad", "bad", r"(", LeakageAction::Alert).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
