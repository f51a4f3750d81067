//! Section editors of the test definition form.

pub mod allocation;
pub mod basic;
pub mod buckets;
pub mod constants;
pub mod definition;
pub mod events;

pub use allocation::{
    check_user_drift, format_percent, format_sum_error, normalize_ratio, AllocationBar,
    AllocationEditor, AllocationsEditor, BarSegment, RangeError,
};
pub use basic::{salt_for_test_name, BasicEditor};
pub use buckets::{BucketInput, BucketsEditor};
pub use constants::ConstantsEditor;
pub use definition::{AutopromoteTarget, DefinitionEditor, SaveError, SaveInfo, SaveRequest};
pub use events::{EditorEvent, EventKind, Listeners, RangeEvent, SubscriptionId};
