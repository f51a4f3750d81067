//! The whole definition form: every section editor plus the save request.

use std::fmt;

use serde_json::{Map, Value};

use super::allocation::{AllocationsEditor, RangeError};
use super::basic::BasicEditor;
use super::buckets::{BucketInput, BucketsEditor};
use super::constants::ConstantsEditor;
use super::events::EditorEvent;
use crate::forms::{serialize, validate_required, FieldError, FormError, NamedValue};
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::model::{PayloadType, TestDefinition};

pub const SILENT_WARNING: &str = "Logging is automatically enabled for this test because you change allocations. If you don't need logging, please check the 'Silent' checkbox at the top of the page.";

/// Placeholder in the create action URL, percent-encoded.
const TEST_NAME_PLACEHOLDER: &str = "%7BtestName%7D";

// =============================================================================
// Save inputs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutopromoteTarget {
    None,
    Qa,
    QaAndProd,
}

impl AutopromoteTarget {
    /// Prod promotion always includes QA.
    pub fn from_flags(qa: bool, prod: bool) -> Self {
        if prod {
            AutopromoteTarget::QaAndProd
        } else if qa {
            AutopromoteTarget::Qa
        } else {
            AutopromoteTarget::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AutopromoteTarget::None => "none",
            AutopromoteTarget::Qa => "qa",
            AutopromoteTarget::QaAndProd => "qa-and-prod",
        }
    }

    pub fn is_autopromote(&self) -> bool {
        *self != AutopromoteTarget::None
    }
}

/// Commit metadata entered next to the save button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveInfo {
    pub comment: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub autopromote: AutopromoteTarget,
}

impl SaveInfo {
    pub fn new(comment: &str) -> Self {
        Self {
            comment: comment.to_string(),
            username: None,
            password: None,
            autopromote: AutopromoteTarget::None,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_autopromote(mut self, target: AutopromoteTarget) -> Self {
        self.autopromote = target;
        self
    }

    /// Credentials are optional, but when a field is present it must be filled.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let checks = [
            validate_required("comment", Some(&self.comment)),
            self.username.as_deref().map_or(Ok(()), |u| validate_required("username", Some(u))),
            self.password.as_deref().map_or(Ok(()), |p| validate_required("password", Some(p))),
        ];
        let errors: Vec<FieldError> = checks.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A form-encoded POST ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub url: String,
    pub form: Vec<(String, String)>,
}

impl SaveRequest {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
pub enum SaveError {
    /// One or more sections failed validation.
    Invalid(Vec<FieldError>),
    Form(FormError),
    Json(serde_json::Error),
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Invalid(_) => write!(f, "Errors in above sections, not saving."),
            SaveError::Form(e) => write!(f, "{}", e),
            SaveError::Json(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SaveError {}

impl From<FormError> for SaveError {
    fn from(e: FormError) -> Self {
        SaveError::Form(e)
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Json(e)
    }
}

// =============================================================================
// DefinitionEditor
// =============================================================================

#[derive(Debug)]
pub struct DefinitionEditor {
    test_name: String,
    is_create: bool,
    prev_revision: String,
    loaded: TestDefinition,
    basic: BasicEditor,
    buckets: BucketsEditor,
    allocations: AllocationsEditor,
    constants: Vec<ConstantsEditor>,
    /// Loaded as silent on an existing test: allocation edits may force logging on.
    watch_silent: bool,
    silent_warning: Option<&'static str>,
}

impl DefinitionEditor {
    pub fn new(test_name: &str, definition: TestDefinition, prev_revision: &str, is_create: bool) -> Self {
        let basic = BasicEditor::new(test_name, &definition, is_create);
        let buckets = BucketsEditor::new(&definition.buckets, definition.payload_type());
        let allocations = AllocationsEditor::new(&definition.buckets, &definition.allocations);
        let constants = vec![ConstantsEditor::new("constants", &definition.constants)];
        Self {
            test_name: test_name.to_string(),
            is_create,
            prev_revision: prev_revision.to_string(),
            watch_silent: !is_create && definition.silent,
            loaded: definition,
            basic,
            buckets,
            allocations,
            constants,
            silent_warning: None,
        }
    }

    pub fn is_create(&self) -> bool {
        self.is_create
    }

    pub fn basic(&self) -> &BasicEditor {
        &self.basic
    }

    pub fn basic_mut(&mut self) -> &mut BasicEditor {
        &mut self.basic
    }

    pub fn buckets(&self) -> &BucketsEditor {
        &self.buckets
    }

    pub fn allocations(&self) -> &AllocationsEditor {
        &self.allocations
    }

    /// Allocation add/delete and rule edits; ratio edits go through the
    /// methods below so the silent check runs.
    pub fn allocations_mut(&mut self) -> &mut AllocationsEditor {
        &mut self.allocations
    }

    pub fn constants(&self) -> &[ConstantsEditor] {
        &self.constants
    }

    pub fn constants_mut(&mut self, index: usize) -> Option<&mut ConstantsEditor> {
        self.constants.get_mut(index)
    }

    pub fn silent_warning(&self) -> Option<&'static str> {
        self.silent_warning
    }

    // -------------------------------------------------------------------------
    // Bucket edits, propagated to every allocation
    // -------------------------------------------------------------------------

    fn propagate_buckets(&mut self) -> Vec<FieldError> {
        let buckets = self.buckets.buckets().to_vec();
        self.allocations.buckets_updated(&buckets)
    }

    /// On success returns the allocation notices produced by the change.
    pub fn add_bucket(&mut self, input: BucketInput) -> Result<Vec<FieldError>, FieldError> {
        self.buckets.add_bucket(input)?;
        Ok(self.propagate_buckets())
    }

    pub fn change_bucket(&mut self, index: usize, input: BucketInput) -> Result<Vec<FieldError>, FieldError> {
        self.buckets.change_bucket(index, input)?;
        Ok(self.propagate_buckets())
    }

    pub fn delete_bucket(&mut self, index: usize) -> Result<Vec<FieldError>, FieldError> {
        self.buckets.delete_bucket(index)?;
        Ok(self.propagate_buckets())
    }

    /// Returns payload errors followed by allocation notices.
    pub fn set_payload_type(&mut self, payload_type: PayloadType) -> Vec<FieldError> {
        let mut errors = self.buckets.set_payload_type(payload_type);
        errors.extend(self.propagate_buckets());
        errors
    }

    // -------------------------------------------------------------------------
    // Ratio edits
    // -------------------------------------------------------------------------

    pub fn add_ratio(&mut self, allocation: usize, bucket_value: i32, length: f64) -> Result<EditorEvent, RangeError> {
        let ev = self.allocations.add_ratio(allocation, bucket_value, length)?;
        self.on_ratio_event(&ev);
        Ok(ev)
    }

    pub fn split_range(&mut self, allocation: usize, range: usize) -> Result<EditorEvent, RangeError> {
        let ev = self.allocations.split_range(allocation, range)?;
        self.on_ratio_event(&ev);
        Ok(ev)
    }

    pub fn delete_range(&mut self, allocation: usize, range: usize) -> Result<EditorEvent, RangeError> {
        let ev = self.allocations.delete_range(allocation, range)?;
        self.on_ratio_event(&ev);
        Ok(ev)
    }

    pub fn change_range(
        &mut self,
        allocation: usize,
        range: usize,
        bucket_value: i32,
        length: f64,
    ) -> Result<EditorEvent, RangeError> {
        let ev = self.allocations.change_range(allocation, range, bucket_value, length)?;
        self.on_ratio_event(&ev);
        Ok(ev)
    }

    fn on_ratio_event(&mut self, ev: &EditorEvent) {
        if matches!(ev, EditorEvent::RatioAdded(_) | EditorEvent::RatioChange(_)) {
            self.on_ratio_change();
        }
    }

    /// A silent test that becomes a live experiment gets logging back.
    pub fn on_ratio_change(&mut self) -> Option<&'static str> {
        if !self.watch_silent || !self.basic.silent {
            return None;
        }
        if self.allocations.validate().is_ok() && self.allocations.check_active() {
            self.basic.silent = false;
            self.silent_warning = Some(SILENT_WARNING);
            log(
                Level::Info,
                Domain::Editor,
                "silent_disabled",
                obj(&[("test", v_str(&self.test_name))]),
            );
        }
        self.silent_warning
    }

    // -------------------------------------------------------------------------
    // Validation and save
    // -------------------------------------------------------------------------

    /// Runs every section; errors from all of them are returned together.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Err(e) = self.basic.validate() {
            errors.extend(e);
        }
        if let Err(e) = self.buckets.validate() {
            errors.extend(e);
        }
        if let Err(e) = self.allocations.validate() {
            errors.extend(e);
        }
        for c in &self.constants {
            if let Err(e) = c.validate() {
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_fields(&self) -> Vec<NamedValue> {
        let mut fields = self.basic.to_fields();
        fields.extend(self.buckets.to_fields());
        fields.extend(self.allocations.to_fields());
        for c in &self.constants {
            fields.extend(c.to_fields());
        }
        fields
    }

    /// The edited definition: the loaded one with every edited key replaced.
    pub fn to_definition(&self) -> Result<Map<String, Value>, SaveError> {
        let edited = serialize(&self.to_fields())?;
        let mut out = match serde_json::to_value(&self.loaded)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in edited {
            out.insert(key, value);
        }
        // allocations keep fields the editor doesn't know about
        let allocations = self.allocations.to_json().map_err(|e| SaveError::Invalid(vec![
            FieldError::new("allocations", e.to_string()),
        ]))?;
        out.insert("allocations".to_string(), serde_json::to_value(allocations)?);
        if !matches!(out.get("constants"), Some(Value::Object(_))) {
            out.insert("constants".to_string(), Value::Object(Map::new()));
        }
        Ok(out)
    }

    /// Validate everything and build the POST for `action_url`.
    pub fn build_save_request(&self, action_url: &str, info: &SaveInfo) -> Result<SaveRequest, SaveError> {
        self.validate().map_err(SaveError::Invalid)?;
        info.validate().map_err(SaveError::Invalid)?;

        let definition = serde_json::to_string(&Value::Object(self.to_definition()?))?;
        let name = if self.is_create { &self.basic.test_name } else { &self.test_name };

        let computed = vec![
            ("testName".to_string(), name.clone()),
            ("testDefinition".to_string(), definition),
            ("comment".to_string(), info.comment.clone()),
            ("previousRevision".to_string(), self.prev_revision.clone()),
            ("isCreate".to_string(), self.is_create.to_string()),
            ("isAutopromote".to_string(), info.autopromote.is_autopromote().to_string()),
            ("autopromoteTarget".to_string(), info.autopromote.as_str().to_string()),
        ];
        // every form field first; computed fields replace any of the same name
        let mut form: Vec<(String, String)> = self
            .to_fields()
            .iter()
            .filter_map(form_pair)
            .filter(|(k, _)| !computed.iter().any(|(c, _)| c == k))
            .collect();
        form.extend(computed);
        if let (Some(u), Some(p)) = (&info.username, &info.password) {
            form.push(("username".to_string(), u.clone()));
            form.push(("password".to_string(), p.clone()));
        }

        let url = if self.is_create {
            action_url.replace(TEST_NAME_PLACEHOLDER, &self.basic.test_name)
        } else {
            action_url.to_string()
        };
        log(
            Level::Info,
            Domain::Editor,
            "save_request_built",
            obj(&[("url", v_str(&url)), ("test", v_str(name))]),
        );
        Ok(SaveRequest { url, form })
    }
}

/// A field as the browser would post it: text as-is, anything else as JSON.
fn form_pair(field: &NamedValue) -> Option<(String, String)> {
    if field.name.is_empty() || field.disabled {
        return None;
    }
    let value = match field.value.as_ref()? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some((field.name.clone(), value))
}
