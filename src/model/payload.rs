//! Typed bucket payloads.
//!
//! On the wire a payload is an object with exactly one populated field, e.g.
//! `{"longValue": 42}` or `{"stringArray": ["a", "b"]}`. Other fields may be
//! present as `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPayload", into = "RawPayload")]
pub enum Payload {
    Long(i64),
    Double(f64),
    String(String),
    LongArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Long(_) => PayloadType::LongValue,
            Payload::Double(_) => PayloadType::DoubleValue,
            Payload::String(_) => PayloadType::StringValue,
            Payload::LongArray(_) => PayloadType::LongArray,
            Payload::DoubleArray(_) => PayloadType::DoubleArray,
            Payload::StringArray(_) => PayloadType::StringArray,
        }
    }

    /// The bare value as edited in the bucket form, without the type key.
    pub fn value(&self) -> Value {
        match self {
            Payload::Long(v) => Value::from(*v),
            Payload::Double(v) => Value::from(*v),
            Payload::String(v) => Value::from(v.clone()),
            Payload::LongArray(v) => Value::from(v.clone()),
            Payload::DoubleArray(v) => Value::from(v.clone()),
            Payload::StringArray(v) => Value::from(v.clone()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    long_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    double_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    long_array: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    double_array: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_array: Option<Vec<String>>,
}

impl TryFrom<RawPayload> for Payload {
    type Error = String;

    fn try_from(raw: RawPayload) -> Result<Self, Self::Error> {
        let mut found = Vec::new();
        if let Some(v) = raw.long_value {
            found.push(Payload::Long(v));
        }
        if let Some(v) = raw.double_value {
            found.push(Payload::Double(v));
        }
        if let Some(v) = raw.string_value {
            found.push(Payload::String(v));
        }
        if let Some(v) = raw.long_array {
            found.push(Payload::LongArray(v));
        }
        if let Some(v) = raw.double_array {
            found.push(Payload::DoubleArray(v));
        }
        if let Some(v) = raw.string_array {
            found.push(Payload::StringArray(v));
        }
        match found.len() {
            1 => Ok(found.remove(0)),
            n => Err(format!("payload must have exactly one value, found {}", n)),
        }
    }
}

impl From<Payload> for RawPayload {
    fn from(p: Payload) -> Self {
        let mut raw = RawPayload::default();
        match p {
            Payload::Long(v) => raw.long_value = Some(v),
            Payload::Double(v) => raw.double_value = Some(v),
            Payload::String(v) => raw.string_value = Some(v),
            Payload::LongArray(v) => raw.long_array = Some(v),
            Payload::DoubleArray(v) => raw.double_array = Some(v),
            Payload::StringArray(v) => raw.string_array = Some(v),
        }
        raw
    }
}

/// Payload type selected for the whole test; every bucket shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PayloadType {
    #[default]
    None,
    LongValue,
    DoubleValue,
    StringValue,
    LongArray,
    DoubleArray,
    StringArray,
}

impl PayloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadType::None => "none",
            PayloadType::LongValue => "longValue",
            PayloadType::DoubleValue => "doubleValue",
            PayloadType::StringValue => "stringValue",
            PayloadType::LongArray => "longArray",
            PayloadType::DoubleArray => "doubleArray",
            PayloadType::StringArray => "stringArray",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            PayloadType::None,
            PayloadType::LongValue,
            PayloadType::DoubleValue,
            PayloadType::StringValue,
            PayloadType::LongArray,
            PayloadType::DoubleArray,
            PayloadType::StringArray,
        ]
        .into_iter()
        .find(|t| t.as_str() == name)
    }

    pub fn expected_example(&self) -> &'static str {
        match self {
            PayloadType::LongValue => "42",
            PayloadType::DoubleValue => "5.7",
            PayloadType::StringValue => "\"foo\"",
            PayloadType::LongArray => "[ 27, 54, 5 ]",
            PayloadType::DoubleArray => "[ 3.14, -27, 50.5 ]",
            PayloadType::StringArray => "[ \"foo\", \"bar\", \"baz\" ]",
            PayloadType::None => "(empty string)",
        }
    }

    /// Parse the text of a payload input for this type.
    ///
    /// `Ok(None)` for [`PayloadType::None`]; the text is ignored then.
    pub fn parse_payload(&self, text: &str) -> Result<Option<Payload>, PayloadError> {
        if *self == PayloadType::None {
            return Ok(None);
        }
        if text.trim().is_empty() {
            return Err(PayloadError::Missing);
        }
        let value: Value = match serde_json::from_str(text) {
            Ok(Value::Null) | Err(_) => return Err(PayloadError::Unparseable(*self)),
            Ok(Value::String(s)) if s.trim().is_empty() => {
                return Err(PayloadError::Unparseable(*self))
            }
            Ok(v) => v,
        };
        self.from_value(&value).map(Some).ok_or(PayloadError::WrongType(*self))
    }

    fn from_value(&self, value: &Value) -> Option<Payload> {
        match (self, value) {
            (PayloadType::LongValue, v) => as_long(v).map(Payload::Long),
            (PayloadType::DoubleValue, v) => as_double(v).map(Payload::Double),
            (PayloadType::StringValue, Value::String(s)) => Some(Payload::String(s.clone())),
            (PayloadType::LongArray, Value::Array(items)) => {
                items.iter().map(as_long).collect::<Option<_>>().map(Payload::LongArray)
            }
            (PayloadType::DoubleArray, Value::Array(items)) => {
                items.iter().map(as_double).collect::<Option<_>>().map(Payload::DoubleArray)
            }
            (PayloadType::StringArray, Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<_>>()
                .map(Payload::StringArray),
            _ => None,
        }
    }
}

fn as_long(v: &Value) -> Option<i64> {
    let n = v.as_number()?;
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn as_double(v: &Value) -> Option<f64> {
    v.as_f64().filter(|f| f.is_finite())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    Missing,
    Unparseable(PayloadType),
    WrongType(PayloadType),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Missing => write!(f, "Payload must be supplied."),
            PayloadError::Unparseable(t) => {
                write!(f, "Cannot parse payload.  Example: {}", t.expected_example())
            }
            PayloadError::WrongType(t) => {
                write!(f, "Payload of the wrong type.  Example: {}", t.expected_example())
            }
        }
    }
}

impl std::error::Error for PayloadError {}
