use chrono::{DateTime, Utc};

/// A domain event: an immutable, versioned fact appended to a stream.
///
/// Goods-in events are never edited. A corrected count is a new
/// `ReceivedItemAdded`, an extra defect is a new `DefectRegistered`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type name (e.g. "receiving.record.item_added").
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
