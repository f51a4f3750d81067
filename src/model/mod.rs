//! Test definition data as loaded from and saved to the console backend.

pub mod payload;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use payload::{Payload, PayloadError, PayloadType};

/// A variant/arm of an experiment. `value` is the stable identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub value: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Bucket {
    pub fn new(value: i32, name: &str) -> Self {
        Self { value, name: name.to_string(), description: String::new(), payload: None }
    }
}

/// A contiguous slice of an allocation's unit interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub bucket_value: i32,
    pub length: f64,
}

impl Range {
    pub fn new(bucket_value: i32, length: f64) -> Self {
        Self { bucket_value, length }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Allocation {
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub ranges: Vec<Range>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Allocation {
    pub fn new(rule: Option<&str>, ranges: Vec<Range>) -> Self {
        Self { rule: rule.map(str::to_string), ranges, extra: Map::new() }
    }
}

/// Fields the console doesn't edit are kept in `extra` so a load/save cycle
/// never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    #[serde(default)]
    pub test_type: String,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub constants: Map<String, Value>,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub silent: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestDefinition {
    /// Payload type implied by the first bucket carrying a payload.
    pub fn payload_type(&self) -> PayloadType {
        self.buckets
            .iter()
            .find_map(|b| b.payload.as_ref().map(Payload::payload_type))
            .unwrap_or_default()
    }
}

pub fn bucket_by_value(buckets: &[Bucket], value: i32) -> Option<&Bucket> {
    buckets.iter().find(|b| b.value == value)
}

pub fn bucket_by_value_or_name<'a>(buckets: &'a [Bucket], value: i32, name: &str) -> Option<&'a Bucket> {
    bucket_by_value(buckets, value).or_else(|| buckets.iter().find(|b| b.name == name))
}

/// `^[A-Za-z0-9_]+$`, shared by bucket, test and constant names.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
