//! Editor change notifications.
//!
//! Each editor owns a [`Listeners`] registry. Handlers subscribe to one
//! [`EventKind`] and receive every matching [`EditorEvent`] in publish order.

use crate::model::Bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RatioAdded,
    RatioDeleted,
    RatioChange,
    BucketAdded,
    BucketChanged,
    BucketDeleted,
    AllocationAdded,
    AllocationDeleted,
}

/// Payload of the ratio events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEvent {
    pub range_index: usize,
    pub bucket_value: i32,
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    RatioAdded(RangeEvent),
    RatioDeleted(RangeEvent),
    RatioChange(RangeEvent),
    /// Bucket events carry the full bucket list after the edit.
    BucketAdded(Vec<Bucket>),
    BucketChanged(Vec<Bucket>),
    BucketDeleted(Vec<Bucket>),
    AllocationAdded { index: usize },
    AllocationDeleted { index: usize },
}

impl EditorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EditorEvent::RatioAdded(_) => EventKind::RatioAdded,
            EditorEvent::RatioDeleted(_) => EventKind::RatioDeleted,
            EditorEvent::RatioChange(_) => EventKind::RatioChange,
            EditorEvent::BucketAdded(_) => EventKind::BucketAdded,
            EditorEvent::BucketChanged(_) => EventKind::BucketChanged,
            EditorEvent::BucketDeleted(_) => EventKind::BucketDeleted,
            EditorEvent::AllocationAdded { .. } => EventKind::AllocationAdded,
            EditorEvent::AllocationDeleted { .. } => EventKind::AllocationDeleted,
        }
    }

    pub fn is_ratio(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::RatioAdded | EventKind::RatioDeleted | EventKind::RatioChange
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&EditorEvent)>;

#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    handlers: Vec<(SubscriptionId, EventKind, Handler)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&EditorEvent) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, kind, Box::new(handler)));
        id
    }

    /// Returns false when the id was unknown (already removed).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _, _)| *sid != id);
        self.handlers.len() != before
    }

    pub fn publish(&mut self, event: &EditorEvent) {
        let kind = event.kind();
        for (_, k, handler) in self.handlers.iter_mut() {
            if *k == kind {
                handler(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("subscriptions", &self.handlers.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ratio(range_index: usize) -> EditorEvent {
        EditorEvent::RatioChange(RangeEvent { range_index, bucket_value: 1, length: 0.5 })
    }

    #[test]
    fn test_publish_reaches_matching_kind_only() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        let sink = seen.clone();
        listeners.subscribe(EventKind::RatioChange, move |e| sink.borrow_mut().push(e.clone()));

        listeners.publish(&ratio(0));
        listeners.publish(&EditorEvent::AllocationAdded { index: 0 });
        listeners.publish(&ratio(1));

        assert_eq!(*seen.borrow(), vec![ratio(0), ratio(1)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::new();
        let c = count.clone();
        let id = listeners.subscribe(EventKind::RatioChange, move |_| *c.borrow_mut() += 1);

        listeners.publish(&ratio(0));
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.publish(&ratio(0));

        assert_eq!(*count.borrow(), 1);
        assert!(listeners.is_empty());
    }
}
