//! Rule-set document loading.
//!
//! A document bundles the rule sets for every stage plus the output-stage
//! masking and leakage rules, so a deployment can be described in one YAML
//! or JSON file and loaded atomically.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{LeakageRule, MaskingRule, RuleSet, Stage};
use crate::{Error, Result};

/// Serialized bundle of rule sets loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDocument {
    /// Document format version
    #[serde(default = "default_version")]
    pub version: String,
    /// Per-stage rule sets
    #[serde(default)]
    pub rule_sets: Vec<RuleSet>,
    /// Output-stage masking rules
    #[serde(default)]
    pub masking_rules: Vec<MaskingRule>,
    /// Output-stage leakage rules
    #[serde(default)]
    pub leakage_rules: Vec<LeakageRule>,
}

fn default_version() -> String {
    "1".to_string()
}

impl RuleSetDocument {
    /// Parse a document from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let doc: Self = serde_yaml::from_str(content)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Parse a document from JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(content)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Load a document from a file, dispatching on extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(Error::validation(format!(
                "Unsupported rule file extension: {:?}",
                other
            ))),
        }
    }

    /// Validate every rule set and rule in the document. At most one rule
    /// set per stage is allowed.
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<Stage> = Vec::new();
        for set in &self.rule_sets {
            if seen.contains(&set.stage) {
                return Err(Error::validation(format!(
                    "Duplicate rule set for stage {}",
                    set.stage.name()
                )));
            }
            seen.push(set.stage);
            set.validate()?;
        }
        for rule in &self.masking_rules {
            rule.validate()?;
        }
        for rule in &self.leakage_rules {
            rule.validate()?;
        }
        Ok(())
    }

    /// The rule set for a stage, if the document defines one.
    pub fn rule_set(&self, stage: Stage) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|s| s.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::EnforcementMode;

    const SAMPLE_YAML: &str = r#"
version: "1"
rule_sets:
  - stage: prompt_firewall
    mode: permissive
    rules:
      - id: fw-override
        name: Instruction override
        stage: prompt_firewall
        pattern: 'ignore\s+previous\s+instructions'
        action: deny
        severity: high
        order_index: 10
masking_rules:
  - id: m-email
    pattern: '[\w.+-]+@[\w-]+\.[\w.]+'
    replacement: '<email>'
leakage_rules:
  - id: lk-key
    name: aws_key
    pattern: 'AKIA[0-9A-Z]{16}'
    action: redact
    severity: critical
"#;

    #[test]
    fn test_load_yaml_document() {
        let doc = RuleSetDocument::from_yaml(SAMPLE_YAML).unwrap();
        let set = doc.rule_set(Stage::PromptFirewall).unwrap();
        assert_eq!(set.mode, EnforcementMode::Permissive);
        assert_eq!(set.rules.len(), 1);
        assert_eq!(doc.masking_rules.len(), 1);
        assert_eq!(doc.leakage_rules.len(), 1);
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let yaml = r#"
rule_sets:
  - stage: abac_gate
    mode: strict
  - stage: abac_gate
    mode: permissive
"#;
        let err = RuleSetDocument::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate rule set"));
    }

    #[test]
    fn test_invalid_rule_in_document_rejected() {
        let yaml = r#"
rule_sets:
  - stage: prompt_firewall
    rules:
      - id: bad
        name: Bad
        stage: prompt_firewall
        pattern: '(unclosed'
        action: deny
"#;
        assert!(RuleSetDocument::from_yaml(yaml).is_err());
    }
}
