//! Allocation editor behavior as seen from the definition form.
//!
//! Covers the split/delete/change range operations, the sum and bound rules
//! of validation, and the warnings drawn on the allocation bar.

use proctor_console::editor::allocation::{DRIFT_WARNING, SYMMETRY_WARNING};
use proctor_console::editor::{
    check_user_drift, AllocationEditor, AllocationsEditor, EditorEvent, EventKind, RangeError,
};
use proctor_console::model::{Allocation, Bucket, Range};
use std::cell::RefCell;
use std::rc::Rc;

fn buckets() -> Vec<Bucket> {
    vec![Bucket::new(0, "control"), Bucket::new(1, "test")]
}

fn ranges(pairs: &[(i32, f64)]) -> Vec<Range> {
    pairs.iter().map(|(v, l)| Range::new(*v, *l)).collect()
}

fn editor(pairs: &[(i32, f64)]) -> AllocationEditor {
    AllocationEditor::new(0, &buckets(), &Allocation::new(None, ranges(pairs)), true)
}

#[test]
fn symmetric_allocation_has_no_warnings() {
    let ed = editor(&[(0, 0.5), (1, 0.5)]);
    assert!(ed.validate().is_ok());
    let bar = ed.build_allocation_bar();
    assert!(bar.errors.is_empty());
    assert!(bar.warnings.is_empty());
    assert_eq!(bar.segments[0].label, "control - 50%");
}

#[test]
fn asymmetric_allocation_validates_with_warning() {
    let ed = editor(&[(0, 0.3), (1, 0.7)]);
    assert!(ed.validate().is_ok());
    let bar = ed.build_allocation_bar();
    assert!(bar.warnings.iter().any(|w| w == SYMMETRY_WARNING));
}

#[test]
fn moving_a_boundary_is_drift() {
    let prev = ranges(&[(0, 0.5), (1, 0.5)]);
    let next = ranges(&[(0, 0.3), (1, 0.7)]);
    assert!(check_user_drift(&prev, &next));
    assert!(!check_user_drift(&prev, &prev));
}

#[test]
fn editing_ranges_raises_drift_warning() {
    let mut ed = editor(&[(0, 0.5), (1, 0.5)]);
    ed.change_range(0, 0, 0.3).unwrap();
    ed.change_range(1, 1, 0.7).unwrap();
    assert!(ed.build_allocation_bar().warnings.iter().any(|w| w == DRIFT_WARNING));
}

#[test]
fn split_then_delete_restores_length() {
    let mut ed = editor(&[(0, 0.5), (1, 0.5)]);
    ed.split_range(1).unwrap();
    assert_eq!(ed.ranges().len(), 3);
    assert_eq!(ed.ranges()[1].length, 0.25);
    ed.delete_range(2).unwrap();
    assert_eq!(ed.ranges(), &ranges(&[(0, 0.5), (1, 0.5)])[..]);
}

#[test]
fn change_range_lower_bound() {
    let mut ed = editor(&[(0, 0.5), (1, 0.5)]);
    let err = ed.change_range(0, 0, 0.00005).unwrap_err();
    assert!(matches!(err, RangeError::TooSmall { .. }));
    assert!(err.to_string().contains("at least 0.01%"));
    assert!(ed.change_range(0, 0, 0.0).is_ok());
    assert!(ed.change_range(0, 0, 1e-4).is_ok());
    assert!(matches!(ed.change_range(0, 0, 150.0), Err(RangeError::OutOfBounds { .. })));
}

#[test]
fn sum_must_be_one() {
    let ed = editor(&[(0, 0.5), (1, 0.4)]);
    let errs = ed.validate().unwrap_err();
    assert!(errs[0].msg.starts_with("Allocation sum must be exactly 1.0"));
}

#[test]
fn container_bubbles_child_events() {
    let allocs = vec![
        Allocation::new(Some("${mobile}"), ranges(&[(0, 1.0)])),
        Allocation::new(None, ranges(&[(0, 0.5), (1, 0.5)])),
    ];
    let mut container = AllocationsEditor::new(&buckets(), &allocs);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    container.subscribe(EventKind::RatioChange, move |e: &EditorEvent| sink.borrow_mut().push(e.clone()));

    container.change_range(1, 0, 0, 0.6).unwrap();
    container.change_range(1, 1, 1, 0.4).unwrap();
    assert_eq!(seen.borrow().len(), 2);

    assert!(matches!(container.delete_allocation(1), Err(RangeError::DefaultAllocation)));
    container.delete_allocation(0).unwrap();
    assert_eq!(container.len(), 1);
    assert!(container.editor(0).unwrap().is_default());
}
