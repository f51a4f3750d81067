//! Test name, description, salt and the other top-level fields.

use crate::forms::{FieldError, NamedValue};
use crate::logging::log_validation;
use crate::model::{is_identifier, TestDefinition};

/// `&name`, or empty for an empty name.
pub fn salt_for_test_name(name: &str) -> String {
    if name.trim().is_empty() {
        String::new()
    } else {
        format!("&{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicEditor {
    is_create: bool,
    pub test_name: String,
    pub description: String,
    pub test_type: String,
    pub salt: String,
    pub rule: String,
    pub silent: bool,
}

impl BasicEditor {
    pub fn new(test_name: &str, definition: &TestDefinition, is_create: bool) -> Self {
        Self {
            is_create,
            test_name: test_name.to_string(),
            description: definition.description.clone().unwrap_or_default(),
            test_type: definition.test_type.clone(),
            salt: definition.salt.clone(),
            rule: definition.rule.clone().unwrap_or_default(),
            silent: definition.silent,
        }
    }

    /// Renaming a test re-derives its salt.
    pub fn set_test_name(&mut self, name: &str) {
        self.test_name = name.to_string();
        self.salt = salt_for_test_name(name);
    }

    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.is_create {
            if self.test_name.trim().is_empty() {
                errors.push(FieldError::new("testName", "Test Name cannot be empty."));
            } else if !is_identifier(&self.test_name) {
                errors.push(FieldError::new("testName", "Test Name must be alpha-numeric underscore."));
            }
        }
        if self.description.trim().is_empty() {
            errors.push(FieldError::new("description", "Description cannot be empty."));
        }
        if self.salt.trim().is_empty() {
            errors.push(FieldError::new("salt", "Salt cannot be empty."));
        }
        if errors.is_empty() {
            return Ok(());
        }
        for e in &errors {
            log_validation(&e.field, &e.msg);
        }
        Err(errors)
    }

    pub fn to_fields(&self) -> Vec<NamedValue> {
        vec![
            NamedValue::text("description", self.description.clone()),
            NamedValue::text("testType", self.test_type.clone()),
            NamedValue::text("salt", self.salt.clone()),
            NamedValue::json("silent", self.silent.into()),
            // written even when blank
            NamedValue::text("rule", self.rule.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_editor(name: &str) -> BasicEditor {
        let def = TestDefinition { description: Some("d".into()), ..Default::default() };
        let mut ed = BasicEditor::new("", &def, true);
        ed.set_test_name(name);
        ed
    }

    #[test]
    fn test_salt_follows_name() {
        assert_eq!(salt_for_test_name("abc"), "&abc");
        assert_eq!(salt_for_test_name(""), "");
        assert_eq!(create_editor("my_test").salt, "&my_test");
    }

    #[test]
    fn test_create_requires_valid_name() {
        assert!(create_editor("ok_1").validate().is_ok());
        let errs = create_editor("bad name").validate().unwrap_err();
        assert_eq!(errs[0].msg, "Test Name must be alpha-numeric underscore.");
        let errs = create_editor("").validate().unwrap_err();
        let msgs: Vec<_> = errs.iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(msgs, vec!["Test Name cannot be empty.", "Salt cannot be empty."]);
    }

    #[test]
    fn test_edit_ignores_name() {
        let def = TestDefinition { description: Some("d".into()), salt: "&x".into(), ..Default::default() };
        assert!(BasicEditor::new("", &def, false).validate().is_ok());
    }

    #[test]
    fn test_description_required() {
        let def = TestDefinition { salt: "&x".into(), ..Default::default() };
        let errs = BasicEditor::new("x", &def, false).validate().unwrap_err();
        assert_eq!(errs[0].msg, "Description cannot be empty.");
    }
}
