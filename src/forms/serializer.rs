//! Flat named fields → nested JSON.
//!
//! ```text
//! x.y[0].a = "A"
//! x.y[0].b = "B"
//! ```
//! yields `{"x": {"y": [{"a": "A", "b": "B"}]}}`.

use serde_json::map::Entry;
use serde_json::{Map, Value};

use super::path::{FieldPath, FormError, Index, Segment};
use crate::logging::{log, obj, v_str, Domain, Level};

/// One named form input.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: Option<Value>,
    /// The value is JSON text to be parsed before placement.
    pub raw_json: bool,
    pub disabled: bool,
}

impl NamedValue {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(Value::String(value.into())),
            raw_json: false,
            disabled: false,
        }
    }

    pub fn json(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value: Some(value), raw_json: false, disabled: false }
    }

    pub fn raw(name: impl Into<String>, json_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(Value::String(json_text.into())),
            raw_json: true,
            disabled: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Serialize all inputs into one root object, in order.
pub fn serialize(inputs: &[NamedValue]) -> Result<Map<String, Value>, FormError> {
    let mut root = Map::new();
    for input in inputs {
        add_input(input, &mut root)?;
    }
    Ok(root)
}

fn add_input(input: &NamedValue, root: &mut Map<String, Value>) -> Result<(), FormError> {
    if input.name.is_empty() || input.disabled {
        return Ok(());
    }
    let value = match &input.value {
        None | Some(Value::Null) => return Ok(()),
        Some(v) => v.clone(),
    };
    let value = if input.raw_json {
        match value {
            Value::String(text) => match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    // dropped, not fatal: the rest of the form still serializes
                    log(
                        Level::Debug,
                        Domain::Forms,
                        "raw_json_skipped",
                        obj(&[("name", v_str(&input.name)), ("error", v_str(&err.to_string()))]),
                    );
                    return Ok(());
                }
            },
            already_parsed => already_parsed,
        }
    } else {
        value
    };
    add_to_object(&input.name, value, root).map(|_| ())
}

/// Place `value` at `path` under `root`, creating intermediate containers.
pub fn add_to_object<'a>(
    path: &str,
    value: Value,
    root: &'a mut Map<String, Value>,
) -> Result<&'a mut Value, FormError> {
    let parsed = FieldPath::parse(path)?;
    let (last, parents) = match parsed.segments.split_last() {
        Some(split) => split,
        None => return Err(FormError::EmptySegment { pos: 0, path: path.to_string() }),
    };

    let mut head = root;
    for seg in parents {
        // a.b[0].c: head becomes a, then a.b[0]
        let slot = place(head, seg, Value::Object(Map::new()), false)?;
        head = match slot {
            Value::Object(map) => map,
            _ => {
                return Err(FormError::NotAnObject {
                    name: seg.name.clone(),
                    path: path.to_string(),
                })
            }
        };
    }
    place(head, last, value, true)
}

fn place<'a>(
    obj: &'a mut Map<String, Value>,
    seg: &Segment,
    value: Value,
    overwrite: bool,
) -> Result<&'a mut Value, FormError> {
    match seg.index {
        Index::NotArray => match obj.entry(seg.name.clone()) {
            Entry::Occupied(mut e) => {
                if overwrite {
                    e.insert(value);
                }
                Ok(e.into_mut())
            }
            Entry::Vacant(e) => Ok(e.insert(value)),
        },
        Index::Append | Index::At(_) => {
            let field = obj
                .entry(seg.name.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            let arr = match field {
                Value::Array(arr) => arr,
                other => {
                    return Err(FormError::NotAnArray {
                        name: seg.name.clone(),
                        found: other.to_string(),
                    })
                }
            };
            let idx = match seg.index {
                Index::At(i) => i,
                _ => arr.len(),
            };
            // holes left by a sparse index count as unset
            let unset = idx >= arr.len() || arr[idx].is_null();
            if idx >= arr.len() {
                arr.resize(idx + 1, Value::Null);
            }
            if overwrite || unset {
                arr[idx] = value;
            }
            Ok(&mut arr[idx])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_keys_nest() {
        let out = serialize(&[NamedValue::json("a.b.c", json!(5))]).unwrap();
        assert_eq!(Value::Object(out), json!({"a": {"b": {"c": 5}}}));
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let inputs: Vec<_> = ["x", "y", "z"].iter().map(|v| NamedValue::text("a.b[]", *v)).collect();
        let out = serialize(&inputs).unwrap();
        assert_eq!(Value::Object(out), json!({"a": {"b": ["x", "y", "z"]}}));
    }

    #[test]
    fn test_sparse_index_grows_array() {
        let out = serialize(&[NamedValue::text("list[3]", "d")]).unwrap();
        assert_eq!(out["list"], json!([null, null, null, "d"]));
    }

    #[test]
    fn test_objects_inside_arrays_are_shared() {
        let out = serialize(&[
            NamedValue::text("x.y[0].a", "A"),
            NamedValue::text("x.y[0].b", "B"),
            NamedValue::text("x.y[1].a", "C"),
        ])
        .unwrap();
        assert_eq!(Value::Object(out), json!({"x": {"y": [{"a": "A", "b": "B"}, {"a": "C"}]}}));
    }

    #[test]
    fn test_last_write_wins_for_leaf() {
        let out = serialize(&[NamedValue::text("a", "1"), NamedValue::text("a", "2")]).unwrap();
        assert_eq!(out["a"], "2");
    }

    #[test]
    fn test_skips_disabled_empty_and_null() {
        let out = serialize(&[
            NamedValue::text("a", "1").disabled(),
            NamedValue::text("", "2"),
            NamedValue { name: "c".into(), value: None, raw_json: false, disabled: false },
            NamedValue::json("d", Value::Null),
        ])
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_raw_json_parsed_or_dropped() {
        let out = serialize(&[
            NamedValue::raw("constants", r#"{"K": 1}"#),
            NamedValue::raw("broken", "{not json"),
            NamedValue::text("kept", "yes"),
        ])
        .unwrap();
        assert_eq!(out["constants"], json!({"K": 1}));
        assert!(!out.contains_key("broken"));
        assert_eq!(out["kept"], "yes");
    }

    #[test]
    fn test_scalar_where_array_expected_is_fatal() {
        let err = serialize(&[NamedValue::text("a", "1"), NamedValue::text("a[0]", "2")]).unwrap_err();
        assert!(matches!(err, FormError::NotAnArray { .. }));
    }

    #[test]
    fn test_scalar_where_object_expected_is_fatal() {
        let err = serialize(&[NamedValue::text("a", "1"), NamedValue::text("a.b", "2")]).unwrap_err();
        assert!(matches!(err, FormError::NotAnObject { .. }));
    }

    #[test]
    fn test_empty_segment_aborts() {
        let err = serialize(&[NamedValue::text("a..b", "1")]).unwrap_err();
        assert!(matches!(err, FormError::EmptySegment { pos: 1, .. }));
    }
}
