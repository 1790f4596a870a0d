use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use goodsin_core::{AggregateId, ExpectedVersion, TenantId};
use goodsin_events::{Event, EventEnvelope};

/// A decided event serialized for the store, not yet positioned in a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Serialize a typed domain event, keeping its type name, schema version
    /// and business time next to the JSON payload.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| EventStoreError::Payload {
            event_type: event.event_type().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    /// Assign the stream position. Only a store calls this, inside its append.
    pub fn commit(self, sequence_number: u64) -> StoredEvent {
        StoredEvent {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            sequence_number,
            event_type: self.event_type,
            event_version: self.event_version,
            occurred_at: self.occurred_at,
            payload: self.payload,
        }
    }
}

/// A committed event. `sequence_number` is 1-based and gap-free per stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Deserialize the payload back into the aggregate's event type.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        E::deserialize(&self.payload)
    }
}

impl From<&StoredEvent> for EventEnvelope<JsonValue> {
    fn from(stored: &StoredEvent) -> Self {
        EventEnvelope::new(
            stored.event_id,
            stored.tenant_id,
            stored.aggregate_id,
            stored.aggregate_type.clone(),
            stored.event_type.clone(),
            stored.sequence_number,
            stored.payload.clone(),
        )
    }
}

/// Version of a stream: the sequence number of its last event, 0 when empty.
pub fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// Infrastructure-level store failure (as opposed to a domain rejection).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream is not at the expected version; another writer got there first.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("cannot serialize {event_type}: {reason}")]
    Payload { event_type: String, reason: String },

    #[error("event store lock poisoned")]
    LockPoisoned,
}

/// Append-only, tenant-scoped event store.
///
/// Implementations must:
/// - reject batches that mix tenants or aggregates
/// - check `expected_version` against the current stream version and append the
///   whole batch or nothing, under one critical section
/// - assign sequence numbers `current + 1, current + 2, ...`
///
/// `load_stream` returns events in sequence order, or an empty vector for a
/// stream that does not exist yet.
///
/// `list_streams` returns the ids of one tenant's streams of one aggregate type,
/// oldest first (by the first event's `occurred_at`, then id).
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn list_streams(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }

    fn list_streams(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        (**self).list_streams(tenant_id, aggregate_type)
    }
}
