//! Free-form JSON object editors (`constants` and friends).

use serde_json::{Map, Value};

use crate::forms::{serialize, FieldError, NamedValue};
use crate::logging::log_validation;
use crate::model::is_identifier;

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantsEditor {
    field: String,
    text: String,
    constants: Map<String, Value>,
}

impl ConstantsEditor {
    /// `field` is the definition key this editor owns, usually `constants`.
    pub fn new(field: &str, constants: &Map<String, Value>) -> Self {
        let text = serde_json::to_string_pretty(constants).unwrap_or_else(|_| "{}".to_string());
        Self { field: field.to_string(), text, constants: constants.clone() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Last accepted value.
    pub fn constants(&self) -> &Map<String, Value> {
        &self.constants
    }

    /// Replace the editor text. The constants only change when it validates.
    pub fn set_text(&mut self, text: &str) -> Result<&Map<String, Value>, FieldError> {
        self.text = text.to_string();
        self.constants = self.parse()?;
        Ok(&self.constants)
    }

    pub fn to_fields(&self) -> Vec<NamedValue> {
        vec![NamedValue::raw(self.field.clone(), self.text.clone())]
    }

    /// Unparseable text never reaches the serialized form, so it shows up
    /// here as a missing value.
    pub fn to_json(&self) -> Option<Value> {
        serialize(&self.to_fields()).ok()?.remove(&self.field)
    }

    fn parse(&self) -> Result<Map<String, Value>, FieldError> {
        let map = match self.to_json() {
            Some(Value::Object(map)) => map,
            _ => {
                return Err(FieldError::new(
                    self.field.clone(),
                    "Please enter valid JSON representing a JSON object",
                ))
            }
        };
        for key in map.keys() {
            if key.is_empty() {
                return Err(FieldError::new(self.field.clone(), "An empty key was provided"));
            }
            if !is_identifier(key) {
                return Err(FieldError::new(
                    self.field.clone(),
                    format!("Variable names should be alpha-numeric + underscore. Found: '{}'", key),
                ));
            }
        }
        Ok(map)
    }

    pub fn validate(&self) -> Result<(), FieldError> {
        self.parse().map(|_| ()).map_err(|e| {
            log_validation(&e.field, &e.msg);
            e
        })
    }
}
