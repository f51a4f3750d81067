//! Allocation range editing.
//!
//! An allocation partitions the unit interval into ordered ranges, each owned
//! by a bucket. [`AllocationEditor`] mutates one allocation's ranges and
//! derives the percentage bar plus its warnings; [`AllocationsEditor`] keeps
//! the ordered list of allocations, the last of which is the default.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use serde_json::{Map, Value};

use super::events::{EditorEvent, EventKind, Listeners, RangeEvent, SubscriptionId};
use crate::forms::{serialize, FieldError, NamedValue};
use crate::logging::{log, log_validation, obj, v_num, v_str, Domain, Level};
use crate::model::{bucket_by_value, bucket_by_value_or_name, Allocation, Bucket, Range};

/// Sum tolerance for a complete allocation.
pub const SUM_EPSILON: f64 = 1e-6;
/// Smallest positive range length (0.01%).
pub const MIN_POSITIVE_LENGTH: f64 = 1e-4;

pub const SYMMETRY_WARNING: &str = "Positive buckets should be the same size as the control bucket.";
pub const CONTROL_WARNING: &str = "You should have a zero bucket (control).";
pub const DRIFT_WARNING: &str = "The allocation changing may cause a user drift.";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RangeError {
    NoSuchRange { index: usize },
    NoSuchAllocation { index: usize },
    /// The default allocation is always last and cannot be removed.
    DefaultAllocation,
    OutOfBounds { length: f64 },
    TooSmall { length: f64 },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::NoSuchRange { index } => write!(f, "No range at index {}", index),
            RangeError::NoSuchAllocation { index } => write!(f, "No allocation at index {}", index),
            RangeError::DefaultAllocation => write!(f, "The default allocation cannot be deleted"),
            RangeError::OutOfBounds { .. } => write!(f, "values in [0, 1.0]"),
            RangeError::TooSmall { .. } => write!(f, "Should be at least 0.01%"),
        }
    }
}

impl std::error::Error for RangeError {}

// =============================================================================
// Formatting helpers
// =============================================================================

/// Accepts either a fraction or a percentage: values in `(1, 100]` are
/// divided by 100, everything else passes through.
pub fn normalize_ratio(ratio: f64) -> f64 {
    if ratio > 1.0 && ratio <= 100.0 {
        ratio / 100.0
    } else {
        ratio
    }
}

/// `0.123456` → `"12.345%"`. Truncates, never rounds.
///
/// The cut after three decimals matches the percentages the console has
/// always shown; keep it.
pub fn format_percent(value: f64) -> String {
    let percent = (value * 100.0).to_string();
    let cut = match percent.find('.') {
        Some(dot) if dot > 0 => (dot + 4).min(percent.len()),
        _ => percent.len(),
    };
    format!("{}%", &percent[..cut])
}

pub fn format_sum_error(sum: f64) -> String {
    format!(
        "Allocation sum must be exactly 1.0 : sum = {} difference = {}",
        format_percent(sum),
        format_percent(1.0 - sum)
    )
}

/// Whether some point of `[0, 1]` changes bucket between two partitions.
///
/// Positions past the end of either partition have no owner and never count
/// as drift.
pub fn check_user_drift(prev: &[Range], next: &[Range]) -> bool {
    let mut boundaries = Vec::with_capacity(prev.len() + next.len());
    for ranges in [prev, next] {
        let mut sum = 0.0;
        for r in ranges {
            sum += r.length;
            boundaries.push(sum);
        }
    }
    boundaries.sort_by(|a, b| a.total_cmp(b));

    let mut left = 0.0;
    for right in boundaries {
        if right - left > MIN_POSITIVE_LENGTH {
            let mid = (left + right) / 2.0;
            match (owner_at(prev, mid), owner_at(next, mid)) {
                (Some(a), Some(b)) if a != b => return true,
                _ => {}
            }
        }
        left = right;
    }
    false
}

fn owner_at(ranges: &[Range], pos: f64) -> Option<i32> {
    let mut sum = 0.0;
    for r in ranges {
        sum += r.length;
        if pos < sum {
            return Some(r.bucket_value);
        }
    }
    None
}

// =============================================================================
// Allocation bar
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BarSegment {
    pub bucket_value: i32,
    pub label: String,
    /// Formatted percent, also the segment width.
    pub percent: String,
    pub color_class: String,
}

/// Read-only view of one allocation: one segment per drawable range plus
/// the messages shown under the bar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllocationBar {
    pub segments: Vec<BarSegment>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// =============================================================================
// AllocationEditor
// =============================================================================

pub struct AllocationEditor {
    index: usize,
    is_default: bool,
    rule: Option<String>,
    ranges: Vec<Range>,
    prev_ranges: Vec<Range>,
    buckets: Vec<Bucket>,
    extra: Map<String, Value>,
    listeners: Listeners,
}

impl AllocationEditor {
    pub fn new(index: usize, buckets: &[Bucket], allocation: &Allocation, is_default: bool) -> Self {
        Self {
            index,
            is_default,
            rule: allocation.rule.clone(),
            ranges: allocation.ranges.clone(),
            prev_ranges: allocation.ranges.clone(),
            buckets: buckets.to_vec(),
            extra: allocation.extra.clone(),
            listeners: Listeners::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Ranges as loaded, used for drift detection.
    pub fn prev_ranges(&self) -> &[Range] {
        &self.prev_ranges
    }

    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    pub fn set_rule(&mut self, rule: Option<&str>) {
        self.rule = rule.map(str::to_string);
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

    fn range_event(&self, range_index: usize) -> RangeEvent {
        let r = self.ranges[range_index];
        RangeEvent { range_index, bucket_value: r.bucket_value, length: r.length }
    }

    /// Append a range. The length is normalized but not validated.
    pub fn add_ratio(&mut self, bucket_value: i32, length: f64) -> EditorEvent {
        self.ranges.push(Range::new(bucket_value, normalize_ratio(length)));
        let ev = self.range_event(self.ranges.len() - 1);
        self.emit(EditorEvent::RatioAdded(ev))
    }

    /// Halve the range at `index`; the other half is inserted right after it.
    pub fn split_range(&mut self, index: usize) -> Result<EditorEvent, RangeError> {
        let from = self.ranges.get_mut(index).ok_or(RangeError::NoSuchRange { index })?;
        from.length /= 2.0;
        let half = *from;
        self.ranges.insert(index + 1, half);
        let ev = self.range_event(index + 1);
        Ok(self.emit(EditorEvent::RatioAdded(ev)))
    }

    /// Remove the range at `index`. When the range before it belongs to the
    /// same bucket (the two halves of a split), that range absorbs the length
    /// so the partition is unchanged.
    pub fn delete_range(&mut self, index: usize) -> Result<EditorEvent, RangeError> {
        if index >= self.ranges.len() {
            return Err(RangeError::NoSuchRange { index });
        }
        let ev = self.range_event(index);
        let removed = self.ranges.remove(index);
        if let Some(prev) = index.checked_sub(1).and_then(|i| self.ranges.get_mut(i)) {
            if prev.bucket_value == removed.bucket_value {
                prev.length += removed.length;
            }
        }
        Ok(self.emit(EditorEvent::RatioDeleted(ev)))
    }

    /// Replace the bucket and length of the range at `index`.
    ///
    /// The length is normalized first and must then lie in `[0, 1]` and be
    /// either zero or at least 0.01%.
    pub fn change_range(
        &mut self,
        index: usize,
        bucket_value: i32,
        length: f64,
    ) -> Result<EditorEvent, RangeError> {
        if index >= self.ranges.len() {
            return Err(RangeError::NoSuchRange { index });
        }
        let length = normalize_ratio(length);
        if !(0.0..=1.0).contains(&length) {
            return Err(RangeError::OutOfBounds { length });
        }
        if length > 0.0 && length < MIN_POSITIVE_LENGTH {
            return Err(RangeError::TooSmall { length });
        }
        self.ranges[index] = Range::new(bucket_value, length);
        let ev = self.range_event(index);
        Ok(self.emit(EditorEvent::RatioChange(ev)))
    }

    fn path(&self) -> String {
        format!("allocations[{}]", self.index)
    }

    /// The form fields this allocation contributes to the definition form.
    pub fn to_fields(&self) -> Vec<NamedValue> {
        let base = self.path();
        let mut fields = Vec::with_capacity(1 + self.ranges.len() * 2);
        if let Some(rule) = &self.rule {
            fields.push(NamedValue::text(format!("{}.rule", base), rule.clone()));
        }
        for (i, r) in self.ranges.iter().enumerate() {
            fields.push(NamedValue::json(
                format!("{}.ranges[{}].bucketValue", base, i),
                Value::from(r.bucket_value),
            ));
            fields.push(NamedValue::raw(format!("{}.ranges[{}].length", base, i), r.length.to_string()));
        }
        fields
    }

    /// Serialize this editor's fields and read the allocation back out.
    pub fn to_json(&self) -> anyhow::Result<Allocation> {
        let root = serialize(&self.to_fields()).context("serializing allocation fields")?;
        let mut allocation = root
            .get("allocations")
            .and_then(|a| a.get(self.index))
            .map(allocation_from_value)
            .unwrap_or_default();
        allocation.extra = self.extra.clone();
        Ok(allocation)
    }

    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let section = self.path();
        let allocation = match self.to_json() {
            Ok(a) => a,
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Forms,
                    "serialize_failed",
                    obj(&[("section", v_str(&section)), ("msg", v_str(&format!("{:#}", err)))]),
                );
                return Err(vec![FieldError::new(section, err.to_string())]);
            }
        };

        let mut errors = Vec::new();
        if !self.is_default && allocation.rule.as_deref().map_or(true, |r| r.trim().is_empty()) {
            errors.push(FieldError::new(format!("{}.rule", section), "Rule cannot be empty"));
        }

        let mut sum = 0.0;
        let mut range_error = None;
        for r in &allocation.ranges {
            if r.length.is_nan() || r.length < 0.0 {
                let name = bucket_by_value(&self.buckets, r.bucket_value)
                    .map(|b| b.name.clone())
                    .unwrap_or_else(|| format!("unknown bucket {}", r.bucket_value));
                range_error = Some(format!(
                    "Non-positive or empty bucket length '{}' found for {}",
                    r.length, name
                ));
                break;
            }
            if r.length > 0.0 && r.length < MIN_POSITIVE_LENGTH {
                range_error = Some("Positive bucket length must be at least 0.01%".to_string());
                break;
            }
            if bucket_by_value(&self.buckets, r.bucket_value).is_none() {
                range_error = Some(format!("Range references unknown bucket {}", r.bucket_value));
                break;
            }
            sum += r.length;
        }
        match range_error {
            Some(msg) => errors.push(FieldError::new(section.clone(), msg)),
            None if (1.0 - sum).abs() > SUM_EPSILON => {
                errors.push(FieldError::new(section.clone(), format_sum_error(sum)))
            }
            None => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            for e in &errors {
                log_validation(&e.field, &e.msg);
            }
            Err(errors)
        }
    }

    /// True when some range is neither empty nor the whole interval.
    pub fn check_active(&self) -> bool {
        self.ranges.iter().any(|r| r.length != 0.0 && r.length != 1.0)
    }

    pub fn build_allocation_bar(&self) -> AllocationBar {
        let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
        for r in &self.ranges {
            *totals.entry(r.bucket_value).or_insert(0.0) += r.length;
        }

        let mut bar = AllocationBar::default();
        let mut sum = 0.0;
        for r in &self.ranges {
            if r.length <= 0.0 || r.length > 1.0 {
                continue;
            }
            sum += r.length;
            let percent = format_percent(r.length);
            let name = bucket_by_value(&self.buckets, r.bucket_value)
                .map(|b| b.name.clone())
                .unwrap_or_else(|| format!("unknown bucket {}", r.bucket_value));
            bar.segments.push(BarSegment {
                bucket_value: r.bucket_value,
                label: format!("{} - {}", name, percent),
                percent,
                color_class: format!("ui-color{}", (1 + r.bucket_value).rem_euclid(12)),
            });
        }
        if (sum - 1.0).abs() > SUM_EPSILON {
            bar.errors.push(format_sum_error(sum));
        }

        let active = totals.values().filter(|t| **t > 0.0).count();
        match totals.get(&0) {
            Some(control) if active > 1 => {
                let asymmetric = totals
                    .iter()
                    .any(|(v, t)| *v > 0 && *t > 0.0 && (t - control).abs() >= SUM_EPSILON);
                if asymmetric {
                    bar.warnings.push(SYMMETRY_WARNING.to_string());
                }
            }
            None if active > 1 => bar.warnings.push(CONTROL_WARNING.to_string()),
            _ => {}
        }

        if check_user_drift(&self.prev_ranges, &self.ranges) {
            bar.warnings.push(DRIFT_WARNING.to_string());
        }
        bar
    }

    /// Re-point ranges after the bucket list changed.
    ///
    /// A range whose bucket kept its value or name follows it; a range whose
    /// bucket vanished falls back to the first bucket and is reported.
    pub fn buckets_updated(&mut self, buckets: &[Bucket]) -> Vec<FieldError> {
        let old = std::mem::replace(&mut self.buckets, buckets.to_vec());
        let unknown = Bucket::new(-9999, "Unknown");
        let mut notices = Vec::new();
        for i in 0..self.ranges.len() {
            let old_bucket = bucket_by_value(&old, self.ranges[i].bucket_value).unwrap_or(&unknown);
            match bucket_by_value_or_name(&self.buckets, old_bucket.value, &old_bucket.name) {
                Some(b) if b == old_bucket => {}
                Some(b) => self.ranges[i].bucket_value = b.value,
                None => {
                    if let Some(first) = self.buckets.first() {
                        self.ranges[i].bucket_value = first.value;
                    }
                    notices.push(FieldError::new(
                        format!("{}.ranges[{}].bucketValue", self.path(), i),
                        format!("{} bucket deleted", old_bucket.name),
                    ));
                }
            }
        }
        if !notices.is_empty() {
            log(
                Level::Info,
                Domain::Editor,
                "ranges_repointed",
                obj(&[("allocation", v_num(self.index as f64)), ("deleted", v_num(notices.len() as f64))]),
            );
        }
        notices
    }
}

impl fmt::Debug for AllocationEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationEditor")
            .field("index", &self.index)
            .field("is_default", &self.is_default)
            .field("rule", &self.rule)
            .field("ranges", &self.ranges)
            .finish()
    }
}

/// Missing or non-numeric lengths come back as NaN so validation reports them.
fn allocation_from_value(v: &Value) -> Allocation {
    let rule = v.get("rule").and_then(Value::as_str).map(str::to_string);
    let ranges = v
        .get("ranges")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|r| {
                    let bucket_value = r
                        .get("bucketValue")
                        .and_then(Value::as_i64)
                        .and_then(|n| i32::try_from(n).ok())
                        .unwrap_or(-1);
                    let length = r.get("length").and_then(Value::as_f64).unwrap_or(f64::NAN);
                    Range::new(bucket_value, length)
                })
                .collect()
        })
        .unwrap_or_default();
    Allocation { rule, ranges, extra: Map::new() }
}

// =============================================================================
// AllocationsEditor
// =============================================================================

#[derive(Debug)]
pub struct AllocationsEditor {
    editors: Vec<AllocationEditor>,
    buckets: Vec<Bucket>,
    listeners: Listeners,
}

impl AllocationsEditor {
    /// The last allocation is the default one.
    pub fn new(buckets: &[Bucket], allocations: &[Allocation]) -> Self {
        let last = allocations.len().saturating_sub(1);
        let editors = allocations
            .iter()
            .enumerate()
            .map(|(i, a)| AllocationEditor::new(i, buckets, a, i == last))
            .collect();
        Self { editors, buckets: buckets.to_vec(), listeners: Listeners::new() }
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }

    pub fn editor(&self, index: usize) -> Option<&AllocationEditor> {
        self.editors.get(index)
    }

    pub fn editor_mut(&mut self, index: usize) -> Result<&mut AllocationEditor, RangeError> {
        self.editors.get_mut(index).ok_or(RangeError::NoSuchAllocation { index })
    }

    pub fn editors(&self) -> &[AllocationEditor] {
        &self.editors
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

    /// Re-publish a child editor's event on this container.
    fn bubble(&mut self, event: EditorEvent) -> EditorEvent {
        self.listeners.publish(&event);
        event
    }

    pub fn add_ratio(&mut self, allocation: usize, bucket_value: i32, length: f64) -> Result<EditorEvent, RangeError> {
        let ev = self.editor_mut(allocation)?.add_ratio(bucket_value, length);
        Ok(self.bubble(ev))
    }

    pub fn split_range(&mut self, allocation: usize, range: usize) -> Result<EditorEvent, RangeError> {
        let ev = self.editor_mut(allocation)?.split_range(range)?;
        Ok(self.bubble(ev))
    }

    pub fn delete_range(&mut self, allocation: usize, range: usize) -> Result<EditorEvent, RangeError> {
        let ev = self.editor_mut(allocation)?.delete_range(range)?;
        Ok(self.bubble(ev))
    }

    pub fn change_range(
        &mut self,
        allocation: usize,
        range: usize,
        bucket_value: i32,
        length: f64,
    ) -> Result<EditorEvent, RangeError> {
        let ev = self.editor_mut(allocation)?.change_range(range, bucket_value, length)?;
        Ok(self.bubble(ev))
    }

    /// Insert an empty, non-default allocation before `before`.
    pub fn add_allocation(&mut self, before: usize) -> Result<usize, RangeError> {
        if before >= self.editors.len() {
            return Err(RangeError::NoSuchAllocation { index: before });
        }
        let editor = AllocationEditor::new(before, &self.buckets, &Allocation::default(), false);
        self.editors.insert(before, editor);
        self.renumber();
        self.bubble(EditorEvent::AllocationAdded { index: before });
        Ok(before)
    }

    pub fn delete_allocation(&mut self, index: usize) -> Result<(), RangeError> {
        let editor = self.editors.get(index).ok_or(RangeError::NoSuchAllocation { index })?;
        if editor.is_default() {
            return Err(RangeError::DefaultAllocation);
        }
        self.editors.remove(index);
        self.renumber();
        self.bubble(EditorEvent::AllocationDeleted { index });
        Ok(())
    }

    fn renumber(&mut self) {
        for (i, e) in self.editors.iter_mut().enumerate() {
            e.index = i;
        }
    }

    pub fn buckets_updated(&mut self, buckets: &[Bucket]) -> Vec<FieldError> {
        self.buckets = buckets.to_vec();
        self.editors.iter_mut().flat_map(|e| e.buckets_updated(buckets)).collect()
    }

    /// Every editor is validated so all errors surface at once.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        if self.editors.is_empty() {
            return Err(vec![FieldError::new("allocations", "At least one allocation is required")]);
        }
        let errors: Vec<FieldError> = self
            .editors
            .iter()
            .filter_map(|e| e.validate().err())
            .flatten()
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn check_active(&self) -> bool {
        self.editors.iter().any(AllocationEditor::check_active)
    }

    pub fn to_fields(&self) -> Vec<NamedValue> {
        self.editors.iter().flat_map(AllocationEditor::to_fields).collect()
    }

    pub fn to_json(&self) -> anyhow::Result<Vec<Allocation>> {
        self.editors.iter().map(AllocationEditor::to_json).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn buckets() -> Vec<Bucket> {
        vec![Bucket::new(0, "control"), Bucket::new(1, "test")]
    }

    fn editor(ranges: &[(i32, f64)]) -> AllocationEditor {
        let ranges = ranges.iter().map(|(v, l)| Range::new(*v, *l)).collect();
        AllocationEditor::new(0, &buckets(), &Allocation::new(None, ranges), true)
    }

    #[test]
    fn test_format_percent_truncates() {
        assert_eq!(format_percent(0.5), "50%");
        assert_eq!(format_percent(0.123456), "12.345%");
        assert_eq!(format_percent(1.0 / 3.0), "33.333%");
        assert_eq!(format_percent(0.0), "0%");
    }

    #[test]
    fn test_format_sum_error() {
        assert_eq!(
            format_sum_error(0.5),
            "Allocation sum must be exactly 1.0 : sum = 50% difference = 50%"
        );
    }

    #[test]
    fn test_normalize_ratio() {
        assert_eq!(normalize_ratio(50.0), 0.5);
        assert_eq!(normalize_ratio(100.0), 1.0);
        assert_eq!(normalize_ratio(1.0), 1.0);
        assert_eq!(normalize_ratio(0.25), 0.25);
        assert_eq!(normalize_ratio(150.0), 150.0);
    }

    #[test]
    fn test_add_ratio_normalizes_and_emits() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut ed = editor(&[]);
        let sink = seen.clone();
        ed.subscribe(EventKind::RatioAdded, move |e| sink.borrow_mut().push(e.clone()));

        ed.add_ratio(1, 25.0);

        assert_eq!(ed.ranges(), &[Range::new(1, 0.25)]);
        assert_eq!(
            *seen.borrow(),
            vec![EditorEvent::RatioAdded(RangeEvent { range_index: 0, bucket_value: 1, length: 0.25 })]
        );
    }

    #[test]
    fn test_split_then_delete_restores_length() {
        let mut ed = editor(&[(0, 0.6), (1, 0.4)]);
        ed.split_range(0).unwrap();
        assert_eq!(ed.ranges(), &[Range::new(0, 0.3), Range::new(0, 0.3), Range::new(1, 0.4)]);
        ed.delete_range(1).unwrap();
        assert_eq!(ed.ranges(), &[Range::new(0, 0.6), Range::new(1, 0.4)]);
    }

    #[test]
    fn test_delete_other_bucket_leaves_gap() {
        let mut ed = editor(&[(0, 0.6), (1, 0.4)]);
        ed.delete_range(1).unwrap();
        assert_eq!(ed.ranges(), &[Range::new(0, 0.6)]);
        assert!(ed.validate().is_err());
    }

    #[test]
    fn test_change_range_bounds() {
        let mut ed = editor(&[(0, 0.5), (1, 0.5)]);
        assert_eq!(ed.change_range(0, 0, 0.00005), Err(RangeError::TooSmall { length: 0.00005 }));
        assert!(ed.change_range(0, 0, 0.0).is_ok());
        assert!(ed.change_range(0, 0, 1e-4).is_ok());
        assert!(matches!(ed.change_range(0, 0, -0.1), Err(RangeError::OutOfBounds { .. })));
        assert!(matches!(ed.change_range(0, 0, 150.0), Err(RangeError::OutOfBounds { .. })));
        assert_eq!(ed.change_range(5, 0, 0.5), Err(RangeError::NoSuchRange { index: 5 }));
    }

    #[test]
    fn test_validate_sum() {
        assert!(editor(&[(0, 0.5), (1, 0.5)]).validate().is_ok());
        let errs = editor(&[(0, 0.5), (1, 0.4)]).validate().unwrap_err();
        assert!(errs[0].msg.starts_with("Allocation sum must be exactly 1.0"));
    }

    #[test]
    fn test_validate_negative_length_names_bucket() {
        let errs = editor(&[(1, -0.5), (0, 1.5)]).validate().unwrap_err();
        assert_eq!(errs[0].msg, "Non-positive or empty bucket length '-0.5' found for test");
    }

    #[test]
    fn test_validate_rule_required_off_default() {
        let ranges = vec![Range::new(0, 1.0)];
        let ed = AllocationEditor::new(0, &buckets(), &Allocation::new(Some("  "), ranges), false);
        let errs = ed.validate().unwrap_err();
        assert_eq!(errs[0].field, "allocations[0].rule");
        assert_eq!(errs[0].msg, "Rule cannot be empty");
    }

    #[test]
    fn test_check_active() {
        assert!(!editor(&[(0, 1.0), (1, 0.0)]).check_active());
        assert!(editor(&[(0, 0.5), (1, 0.5)]).check_active());
    }

    #[test]
    fn test_bar_segments_skip_empty_ranges() {
        let bar = editor(&[(0, 0.0), (1, 1.0)]).build_allocation_bar();
        assert_eq!(bar.segments.len(), 1);
        assert_eq!(bar.segments[0].label, "test - 100%");
        assert_eq!(bar.segments[0].color_class, "ui-color2");
        assert!(bar.errors.is_empty());
    }

    #[test]
    fn test_missing_control_warning() {
        let bs = vec![Bucket::new(1, "a"), Bucket::new(2, "b")];
        let ranges = vec![Range::new(1, 0.5), Range::new(2, 0.5)];
        let ed = AllocationEditor::new(0, &bs, &Allocation::new(None, ranges), true);
        assert_eq!(ed.build_allocation_bar().warnings, vec![CONTROL_WARNING.to_string()]);
    }

    #[test]
    fn test_drift_past_end_is_ignored() {
        let prev = [Range::new(0, 0.5)];
        let next = [Range::new(0, 0.5), Range::new(1, 0.5)];
        assert!(!check_user_drift(&prev, &next));
    }

    #[test]
    fn test_buckets_updated_follows_renamed_value_and_reports_deleted() {
        let mut ed = editor(&[(0, 0.5), (1, 0.5)]);
        // control moved to value 5 (same name), test removed
        let notices = ed.buckets_updated(&[Bucket::new(5, "control")]);
        assert_eq!(ed.ranges(), &[Range::new(5, 0.5), Range::new(5, 0.5)]);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].msg, "test bucket deleted");
    }

    #[test]
    fn test_to_json_round_trips_through_fields() {
        let ranges = vec![Range::new(0, 0.25), Range::new(1, 0.75)];
        let mut alloc = Allocation::new(Some("country == 'US'"), ranges.clone());
        alloc.extra.insert("id".into(), Value::from("#A1"));
        let ed = AllocationEditor::new(2, &buckets(), &alloc, false);
        let json = ed.to_json().unwrap();
        assert_eq!(json.rule.as_deref(), Some("country == 'US'"));
        assert_eq!(json.ranges, ranges);
        assert_eq!(json.extra["id"], "#A1");
    }

    #[test]
    fn test_add_and_delete_allocation_renumbers() {
        let default = Allocation::new(None, vec![Range::new(0, 1.0)]);
        let mut all = AllocationsEditor::new(&buckets(), &[default]);
        assert_eq!(all.add_allocation(0), Ok(0));
        assert_eq!(all.len(), 2);
        assert!(!all.editors()[0].is_default());
        assert_eq!(all.editors()[1].index(), 1);
        assert!(all.editors()[1].is_default());

        assert_eq!(all.delete_allocation(1), Err(RangeError::DefaultAllocation));
        all.delete_allocation(0).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.editors()[0].index(), 0);
    }

    #[test]
    fn test_ratio_events_bubble_to_container() {
        let seen = Rc::new(RefCell::new(0));
        let default = Allocation::new(None, vec![Range::new(0, 1.0)]);
        let mut all = AllocationsEditor::new(&buckets(), &[default]);
        let c = seen.clone();
        all.subscribe(EventKind::RatioAdded, move |_| *c.borrow_mut() += 1);
        all.split_range(0, 0).unwrap();
        all.add_ratio(0, 1, 0.0).unwrap();
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn test_empty_container_is_invalid() {
        let all = AllocationsEditor::new(&buckets(), &[]);
        assert!(all.validate().is_err());
    }
}
