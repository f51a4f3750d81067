//! Bucket list editing and validation.

use serde_json::Value;

use super::events::{EditorEvent, EventKind, Listeners, SubscriptionId};
use crate::forms::{FieldError, NamedValue};
use crate::logging::{log, log_validation, obj, v_str, Domain, Level};
use crate::model::{is_identifier, Bucket, PayloadType};

pub const ADD_AFTER_DELETE: &str = "You deleted an original bucket and can no longer add a new bucket.";
pub const DELETE_AFTER_ADD: &str = "You added a new bucket and can no longer delete any original bucket.";

/// Raw text of one bucket row as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BucketInput {
    pub value: String,
    pub name: String,
    pub description: String,
    pub payload: String,
}

impl BucketInput {
    pub fn new(value: &str, name: &str, description: &str, payload: &str) -> Self {
        Self {
            value: value.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            payload: payload.to_string(),
        }
    }

    pub fn from_bucket(bucket: &Bucket) -> Self {
        Self {
            value: bucket.value.to_string(),
            name: bucket.name.clone(),
            description: bucket.description.clone(),
            payload: bucket.payload.as_ref().map(|p| p.value().to_string()).unwrap_or_default(),
        }
    }
}

/// Field prefix for a row: `buckets[i]` or `add-bucket` for the new-bucket row.
fn row_path(index: Option<usize>) -> String {
    match index {
        Some(i) => format!("buckets[{}]", i),
        None => "add-bucket".to_string(),
    }
}

#[derive(Debug)]
pub struct BucketsEditor {
    rows: Vec<BucketInput>,
    buckets: Vec<Bucket>,
    payload_type: PayloadType,
    original_len: usize,
    added: bool,
    removed: bool,
    listeners: Listeners,
}

impl BucketsEditor {
    pub fn new(buckets: &[Bucket], payload_type: PayloadType) -> Self {
        Self {
            rows: buckets.iter().map(BucketInput::from_bucket).collect(),
            buckets: buckets.to_vec(),
            payload_type,
            original_len: buckets.len(),
            added: false,
            removed: false,
            listeners: Listeners::new(),
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn rows(&self) -> &[BucketInput] {
        &self.rows
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// Whether a delete control should be offered for the bucket at `index`.
    pub fn can_delete(&self, index: usize) -> bool {
        index < self.buckets.len() && (index >= self.original_len || !self.added)
    }

    pub fn can_add(&self) -> bool {
        !self.removed
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&EditorEvent) + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn emit(&mut self, event: EditorEvent) -> EditorEvent {
        self.listeners.publish(&event);
        event
    }

    /// Validate one row against the current payload type and the other
    /// buckets. `index` is the row being edited, `None` for a new bucket.
    pub fn validate_bucket(&self, input: &BucketInput, index: Option<usize>) -> Result<Bucket, FieldError> {
        let path = row_path(index);
        let field = |name: &str| format!("{}.{}", path, name);

        let value: i32 = input
            .value
            .trim()
            .parse()
            .map_err(|_| FieldError::new(field("value"), "Bucket value must be a number"))?;
        let name = input.name.as_str();
        if name.trim().is_empty() {
            return Err(FieldError::new(field("name"), "Bucket name must not be blank"));
        }
        if !is_identifier(name) {
            return Err(FieldError::new(field("name"), "Bucket name should be alpha-numeric"));
        }
        let payload = self
            .payload_type
            .parse_payload(&input.payload)
            .map_err(|e| FieldError::new(field("payload"), e.to_string()))?;

        for (i, other) in self.buckets.iter().enumerate() {
            if Some(i) == index {
                continue;
            }
            if other.name == name {
                return Err(FieldError::new(
                    field("name"),
                    format!("Bucket name cannot be the same as bucket[{}]", i),
                ));
            }
            if other.value == value {
                return Err(FieldError::new(
                    field("value"),
                    format!("Bucket value cannot be the same as bucket[{}]", i),
                ));
            }
        }

        Ok(Bucket { value, name: name.to_string(), description: input.description.clone(), payload })
    }

    pub fn add_bucket(&mut self, input: BucketInput) -> Result<EditorEvent, FieldError> {
        if self.removed {
            return Err(FieldError::new("buckets", ADD_AFTER_DELETE));
        }
        let bucket = self.validate_bucket(&input, None)?;
        log(
            Level::Info,
            Domain::Editor,
            "bucket_added",
            obj(&[("name", v_str(&bucket.name)), ("value", Value::from(bucket.value))]),
        );
        self.rows.push(input);
        self.buckets.push(bucket);
        self.added = true;
        let list = self.buckets.clone();
        Ok(self.emit(EditorEvent::BucketAdded(list)))
    }

    pub fn change_bucket(&mut self, index: usize, input: BucketInput) -> Result<EditorEvent, FieldError> {
        if index >= self.buckets.len() {
            return Err(FieldError::new(row_path(Some(index)), "No such bucket"));
        }
        let bucket = self.validate_bucket(&input, Some(index))?;
        self.rows[index] = input;
        self.buckets[index] = bucket;
        let list = self.buckets.clone();
        Ok(self.emit(EditorEvent::BucketChanged(list)))
    }

    /// Originals can't be deleted once a bucket was added, and nothing can be
    /// added once an original was deleted.
    pub fn delete_bucket(&mut self, index: usize) -> Result<EditorEvent, FieldError> {
        if index >= self.buckets.len() {
            return Err(FieldError::new(row_path(Some(index)), "No such bucket"));
        }
        if !self.can_delete(index) {
            return Err(FieldError::new("buckets", DELETE_AFTER_ADD));
        }
        let removed = self.buckets.remove(index);
        self.rows.remove(index);
        if index < self.original_len {
            self.removed = true;
        }
        if self.buckets.len() == self.original_len {
            self.added = false;
        }
        log(
            Level::Info,
            Domain::Editor,
            "bucket_deleted",
            obj(&[("name", v_str(&removed.name)), ("value", Value::from(removed.value))]),
        );
        let list = self.buckets.clone();
        Ok(self.emit(EditorEvent::BucketDeleted(list)))
    }

    /// Switch every bucket to a new payload type.
    ///
    /// Each row's payload text is re-read under the new type. Rows that don't
    /// parse keep their previous payload and are reported.
    pub fn set_payload_type(&mut self, payload_type: PayloadType) -> Vec<FieldError> {
        self.payload_type = payload_type;
        let mut errors = Vec::new();
        for i in 0..self.rows.len() {
            match payload_type.parse_payload(&self.rows[i].payload) {
                Ok(p) => self.buckets[i].payload = p,
                Err(e) => errors.push(FieldError::new(format!("buckets[{}].payload", i), e.to_string())),
            }
        }
        let list = self.buckets.clone();
        self.emit(EditorEvent::BucketChanged(list));
        errors
    }

    /// Every row is checked; at least one bucket is required.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        if self.rows.is_empty() {
            log_validation("buckets", "no buckets");
            return Err(vec![FieldError::new("buckets", "At least one bucket is required")]);
        }
        let errors: Vec<FieldError> = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| self.validate_bucket(row, Some(i)).err())
            .collect();
        for e in &errors {
            log_validation(&e.field, &e.msg);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `buckets[i].value|name|description|payload.<type>`.
    pub fn to_fields(&self) -> Vec<NamedValue> {
        let mut fields = Vec::with_capacity(self.buckets.len() * 4);
        for (i, b) in self.buckets.iter().enumerate() {
            fields.push(NamedValue::json(format!("buckets[{}].value", i), Value::from(b.value)));
            fields.push(NamedValue::text(format!("buckets[{}].name", i), b.name.clone()));
            fields.push(NamedValue::text(format!("buckets[{}].description", i), b.description.clone()));
            if let Some(p) = &b.payload {
                let field = NamedValue::json(
                    format!("buckets[{}].payload.{}", i, self.payload_type.as_str()),
                    p.value(),
                );
                fields.push(if self.payload_type == PayloadType::None { field.disabled() } else { field });
            }
        }
        fields
    }
}
