//! Typed conditions evaluated against an attribute context.
//!
//! Every condition declares the type of its comparison value; each value type
//! carries a fixed operator whitelist that is enforced when the rule is
//! written, never at evaluation time.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// A condition that can be evaluated against an attribute context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Attribute path to evaluate (e.g. "subject.department",
    /// "object.sensitivity"). Unprefixed paths resolve against the subject.
    pub attribute: String,
    /// The comparison operator
    pub operator: ConditionOperator,
    /// The value to compare against
    pub value: ConditionValue,
}

impl Condition {
    /// Create a new condition.
    pub fn new(
        attribute: impl Into<String>,
        operator: ConditionOperator,
        value: ConditionValue,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value,
        }
    }

    /// Create an equality condition on a string attribute.
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            attribute,
            ConditionOperator::Equals,
            ConditionValue::String(value.into()),
        )
    }

    /// Create an inequality condition on a string attribute.
    pub fn not_equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            attribute,
            ConditionOperator::NotEquals,
            ConditionValue::String(value.into()),
        )
    }

    /// Create a "greater than" condition on a numeric attribute.
    pub fn greater_than(attribute: impl Into<String>, value: f64) -> Self {
        Self::new(
            attribute,
            ConditionOperator::GreaterThan,
            ConditionValue::Number(value),
        )
    }

    /// Create a "less than or equal" condition on a numeric attribute.
    pub fn at_most(attribute: impl Into<String>, value: f64) -> Self {
        Self::new(
            attribute,
            ConditionOperator::LessThanOrEquals,
            ConditionValue::Number(value),
        )
    }

    /// Create an "in" condition against a set of allowed values.
    pub fn is_in(attribute: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(attribute, ConditionOperator::In, ConditionValue::EnumSet(values))
    }

    /// Create a "not in" condition against a set of values.
    pub fn not_in(attribute: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(attribute, ConditionOperator::NotIn, ConditionValue::EnumSet(values))
    }

    /// Create a "contains" condition on a string attribute.
    pub fn contains(attribute: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::new(
            attribute,
            ConditionOperator::Contains,
            ConditionValue::String(needle.into()),
        )
    }

    /// Create a regex match condition on a string attribute.
    pub fn matches(attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            attribute,
            ConditionOperator::Matches,
            ConditionValue::String(pattern.into()),
        )
    }

    /// Create a "within" condition against a time-of-day range
    /// (closed interval, inclusive on both ends).
    pub fn within(attribute: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self::new(
            attribute,
            ConditionOperator::Within,
            ConditionValue::TimeRange { start, end },
        )
    }

    /// Create a "between" condition against a numeric range
    /// (closed interval, inclusive on both ends).
    pub fn between(attribute: impl Into<String>, low: f64, high: f64) -> Self {
        Self::new(
            attribute,
            ConditionOperator::Between,
            ConditionValue::NumberRange { low, high },
        )
    }

    /// Create an "in CIDR" condition on an IP attribute.
    pub fn in_cidr(attribute: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self::new(attribute, ConditionOperator::In, ConditionValue::IpCidr(cidr.into()))
    }

    /// The declared type of this condition's value.
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Validate the condition: operator must be whitelisted for the value
    /// type, regex patterns must compile, ranges and CIDRs must be
    /// well-formed.
    pub fn validate(&self) -> crate::Result<()> {
        if self.attribute.is_empty() {
            return Err(crate::Error::validation_field(
                "Condition attribute cannot be empty",
                "attribute",
            ));
        }

        let value_type = self.value.value_type();
        if !value_type.supports(self.operator) {
            return Err(crate::Error::validation(format!(
                "Operator {:?} is not supported for {} attributes",
                self.operator,
                value_type.name()
            )));
        }

        // Range operators and range values must be paired exactly.
        match (self.operator, &self.value) {
            (ConditionOperator::Between, ConditionValue::NumberRange { .. }) => {}
            (ConditionOperator::Between, _) => {
                return Err(crate::Error::validation(
                    "Between requires a numeric range value",
                ));
            }
            (ConditionOperator::Within, ConditionValue::TimeRange { .. }) => {}
            (ConditionOperator::Within, _) => {
                return Err(crate::Error::validation(
                    "Within requires a time range value",
                ));
            }
            (_, ConditionValue::NumberRange { .. }) => {
                return Err(crate::Error::validation(
                    "Numeric range values are only valid with Between",
                ));
            }
            (_, ConditionValue::TimeRange { .. }) => {
                return Err(crate::Error::validation(
                    "Time range values are only valid with Within",
                ));
            }
            _ => {}
        }

        match &self.value {
            ConditionValue::String(pattern) if self.operator == ConditionOperator::Matches => {
                regex::Regex::new(pattern).map_err(|e| {
                    crate::Error::validation(format!("Invalid regex '{}': {}", pattern, e))
                })?;
            }
            ConditionValue::NumberRange { low, high } => {
                if low > high {
                    return Err(crate::Error::validation(format!(
                        "Numeric range is inverted: {} > {}",
                        low, high
                    )));
                }
            }
            ConditionValue::IpCidr(cidr) => {
                parse_cidr(cidr)?;
            }
            ConditionValue::EnumSet(values) => {
                if values.is_empty() {
                    return Err(crate::Error::validation(
                        "Enum set condition requires at least one value",
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Operators for condition evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Equality check
    Equals,
    /// Inequality check
    NotEquals,
    /// Greater than comparison
    GreaterThan,
    /// Greater than or equal comparison
    GreaterThanOrEquals,
    /// Less than comparison
    LessThan,
    /// Less than or equal comparison
    LessThanOrEquals,
    /// Membership in a set (or a CIDR block for IP attributes)
    In,
    /// Non-membership in a set (or a CIDR block)
    NotIn,
    /// String contains value
    Contains,
    /// Regex pattern match
    Matches,
    /// Time of day within a range, inclusive on both ends
    Within,
    /// Number within a range, inclusive on both ends
    Between,
}

/// The declared type of a condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// UTF-8 string
    String,
    /// 64-bit float (integers are widened)
    Number,
    /// Boolean
    Boolean,
    /// Time of day without a date
    TimeOfDay,
    /// Closed time-of-day interval
    TimeRange,
    /// IPv4 CIDR block
    IpCidr,
    /// Set of string values
    EnumSet,
}

impl ValueType {
    /// The fixed operator whitelist for this value type.
    pub fn allowed_operators(&self) -> &'static [ConditionOperator] {
        use ConditionOperator::*;
        match self {
            ValueType::String => &[Equals, NotEquals, Contains, Matches],
            ValueType::Number => &[
                Equals,
                NotEquals,
                GreaterThan,
                GreaterThanOrEquals,
                LessThan,
                LessThanOrEquals,
                Between,
            ],
            ValueType::Boolean => &[Equals, NotEquals],
            ValueType::TimeOfDay => &[
                Equals,
                NotEquals,
                GreaterThan,
                GreaterThanOrEquals,
                LessThan,
                LessThanOrEquals,
            ],
            ValueType::TimeRange => &[Within],
            ValueType::IpCidr => &[In, NotIn],
            ValueType::EnumSet => &[In, NotIn],
        }
    }

    /// Whether the operator is whitelisted for this value type.
    pub fn supports(&self, operator: ConditionOperator) -> bool {
        self.allowed_operators().contains(&operator)
    }

    /// Lowercase name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::TimeOfDay => "time_of_day",
            ValueType::TimeRange => "time_range",
            ValueType::IpCidr => "ip_cidr",
            ValueType::EnumSet => "enum_set",
        }
    }
}

/// A value used in conditions. The variant determines the value type and
/// therefore the operator whitelist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionValue {
    /// String value (also carries regex patterns for `matches`)
    String(String),
    /// Numeric value
    Number(f64),
    /// Boolean value
    Boolean(bool),
    /// Time of day
    TimeOfDay(NaiveTime),
    /// Closed time-of-day range; ranges that wrap midnight are supported
    TimeRange {
        /// Inclusive start
        start: NaiveTime,
        /// Inclusive end
        end: NaiveTime,
    },
    /// Closed numeric range
    NumberRange {
        /// Inclusive lower bound
        low: f64,
        /// Inclusive upper bound
        high: f64,
    },
    /// IPv4 CIDR block, e.g. "10.0.0.0/8"
    IpCidr(String),
    /// Set of string values
    EnumSet(Vec<String>),
}

impl ConditionValue {
    /// The declared type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            ConditionValue::String(_) => ValueType::String,
            ConditionValue::Number(_) => ValueType::Number,
            ConditionValue::Boolean(_) => ValueType::Boolean,
            ConditionValue::TimeOfDay(_) => ValueType::TimeOfDay,
            ConditionValue::TimeRange { .. } => ValueType::TimeRange,
            ConditionValue::NumberRange { .. } => ValueType::Number,
            ConditionValue::IpCidr(_) => ValueType::IpCidr,
            ConditionValue::EnumSet(_) => ValueType::EnumSet,
        }
    }
}

/// A runtime value held in an attribute context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    /// String value
    String(String),
    /// Numeric value
    Number(f64),
    /// Boolean value
    Boolean(bool),
    /// Time of day
    Time(NaiveTime),
}

impl AttributeValue {
    /// Lowercase type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Number(_) => "number",
            AttributeValue::Boolean(_) => "boolean",
            AttributeValue::Time(_) => "time_of_day",
        }
    }

    /// The numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Boolean(b)
    }
}

impl From<NaiveTime> for AttributeValue {
    fn from(t: NaiveTime) -> Self {
        AttributeValue::Time(t)
    }
}

/// Parse an IPv4 CIDR block into (network, prefix length).
pub(crate) fn parse_cidr(cidr: &str) -> crate::Result<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr.split_once('/').ok_or_else(|| {
        crate::Error::validation(format!("Malformed CIDR '{}': missing prefix length", cidr))
    })?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|_| crate::Error::validation(format!("Malformed CIDR '{}': bad address", cidr)))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| crate::Error::validation(format!("Malformed CIDR '{}': bad prefix", cidr)))?;
    if prefix > 32 {
        return Err(crate::Error::validation(format!(
            "Malformed CIDR '{}': prefix exceeds 32",
            cidr
        )));
    }
    Ok((addr, prefix))
}

/// Check whether an IPv4 address string falls within a CIDR block.
pub(crate) fn ip_in_cidr(ip: &str, cidr: &str) -> crate::Result<bool> {
    let (network, prefix) = parse_cidr(cidr)?;
    let ip: Ipv4Addr = ip
        .parse()
        .map_err(|_| crate::Error::evaluation(format!("Malformed IP address '{}'", ip)))?;
    if prefix == 0 {
        return Ok(true);
    }
    let mask = u32::MAX << (32 - prefix);
    Ok((u32::from(ip) & mask) == (u32::from(network) & mask))
}
