//! Attribute context for rule evaluation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::policy::AttributeValue;

/// The subject and object attributes a rule's conditions are evaluated
/// against. Condition attribute paths are prefixed `subject.` or `object.`
/// to select the map they read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeContext {
    /// Attributes of the requesting identity (department, clearance, ip)
    #[serde(default)]
    pub subject: HashMap<String, AttributeValue>,
    /// Attributes of the thing being accessed (sensitivity, doc_type, owner)
    #[serde(default)]
    pub object: HashMap<String, AttributeValue>,
}

impl AttributeContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a context.
    pub fn builder() -> AttributeContextBuilder {
        AttributeContextBuilder::default()
    }

    /// Look up an attribute by path. Unprefixed paths resolve against the
    /// subject map.
    pub fn get(&self, path: &str) -> Option<&AttributeValue> {
        if let Some(key) = path.strip_prefix("subject.") {
            self.subject.get(key)
        } else if let Some(key) = path.strip_prefix("object.") {
            self.object.get(key)
        } else {
            self.subject.get(path)
        }
    }

    /// Derive a context for a retrieval chunk: subject attributes are kept,
    /// object attributes are replaced by the chunk's metadata.
    pub fn with_object(&self, object: HashMap<String, AttributeValue>) -> Self {
        Self {
            subject: self.subject.clone(),
            object,
        }
    }
}

/// Builder for [`AttributeContext`].
#[derive(Debug, Clone, Default)]
pub struct AttributeContextBuilder {
    subject: HashMap<String, AttributeValue>,
    object: HashMap<String, AttributeValue>,
}

impl AttributeContextBuilder {
    /// Add a subject attribute.
    pub fn subject(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.subject.insert(key.into(), value.into());
        self
    }

    /// Add an object attribute.
    pub fn object(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.object.insert(key.into(), value.into());
        self
    }

    /// Finish building.
    pub fn build(self) -> AttributeContext {
        AttributeContext {
            subject: self.subject,
            object: self.object,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_prefixed_path() {
        let ctx = AttributeContext::builder()
            .subject("department", "engineering")
            .subject("clearance", 3.0)
            .object("sensitivity", 2.0)
            .build();

        assert!(matches!(
            ctx.get("subject.department"),
            Some(AttributeValue::String(s)) if s == "engineering"
        ));
        assert!(ctx.get("object.sensitivity").is_some());
        assert!(ctx.get("subject.missing").is_none());
        // unprefixed paths fall back to the subject map
        assert!(ctx.get("department").is_some());
    }

    #[test]
    fn test_with_object_replaces_object_map() {
        let ctx = AttributeContext::builder()
            .subject("clearance", 3.0)
            .object("sensitivity", 1.0)
            .build();

        let mut chunk_meta = HashMap::new();
        chunk_meta.insert("sensitivity".to_string(), AttributeValue::from(4.0));
        let derived = ctx.with_object(chunk_meta);

        assert!(derived.get("subject.clearance").is_some());
        assert_eq!(
            derived.get("object.sensitivity").and_then(|v| v.as_number()),
            Some(4.0)
        );
    }
}
