//! Domain event trait.

use chrono::{DateTime, Utc};

/// A domain event: an immutable, append-only fact about a business record.
pub trait DomainEvent: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "purchasing.order.rejected").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
