//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the stream (tenant-scoped)
//!   ↓
//! 2. Rehydrate the aggregate
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish committed events to the bus
//! ```
//!
//! Step 4 is what makes read-validate-write sequences atomic per stream: if
//! another writer appended between 1 and 4, the append fails with
//! [`DispatchError::Concurrency`] and nothing is written. [`CommandDispatcher::dispatch_with_retry`]
//! re-runs the whole pipeline in that case, so the command is re-validated against
//! the state that won.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use goodsin_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use goodsin_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, stream_version};

/// Default bound on optimistic retries for one command.
pub const DEFAULT_MAX_RETRIES: u32 = 16;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The stream moved on between load and append. Retryable.
    #[error("concurrent modification: {0}")]
    Concurrency(String),
    /// The command collides with committed state (e.g. a second inspection).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    /// Input rejected; `field` names the offending request field when known.
    #[error("validation failed: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(String),
    /// A historical payload no longer matches the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl DispatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::validation(msg),
            DomainError::InvalidField { field, reason } => {
                let message = format!("{field} {reason}");
                DispatchError::invalid_field(field, message)
            }
            DomainError::InvalidId(msg) => DispatchError::validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound(what) => DispatchError::NotFound(what),
        }
    }
}

/// Outcome of a successful dispatch: the aggregate as of the committed events.
#[derive(Debug, Clone)]
pub struct Dispatched<A> {
    pub aggregate: A,
    pub committed: Vec<StoredEvent>,
    /// Optimistic retries spent before the append went through.
    pub retries: u32,
}

/// Reusable command execution engine, generic over store and bus so tests and
/// the server share the same pipeline.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    max_retries: u32,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run one command once. A lost race surfaces as [`DispatchError::Concurrency`].
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: goodsin_events::Event + Serialize + DeserializeOwned,
    {
        self.run(tenant_id, aggregate_id, aggregate_type, &command, make_aggregate)
            .map(|(_, committed)| committed)
    }

    /// Run one command, re-running the pipeline on lost races.
    ///
    /// After `max_retries` lost races the command gives up with
    /// [`DispatchError::Conflict`].
    pub fn dispatch_with_retry<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(TenantId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: goodsin_events::Event + Serialize + DeserializeOwned,
    {
        let mut retries = 0u32;
        loop {
            match self.run(tenant_id, aggregate_id, aggregate_type, &command, &make_aggregate) {
                Ok((aggregate, committed)) => {
                    return Ok(Dispatched {
                        aggregate,
                        committed,
                        retries,
                    });
                }
                Err(DispatchError::Concurrency(msg)) if retries < self.max_retries => {
                    retries += 1;
                    tracing::debug!(
                        tenant_id = %tenant_id,
                        aggregate_id = %aggregate_id,
                        aggregate_type,
                        retries,
                        reason = %msg,
                        "lost optimistic race, retrying"
                    );
                    std::thread::yield_now();
                }
                Err(DispatchError::Concurrency(msg)) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        aggregate_id = %aggregate_id,
                        aggregate_type,
                        retries,
                        "giving up after repeated concurrent modifications"
                    );
                    return Err(DispatchError::Conflict(format!(
                        "too much contention on {aggregate_type} {aggregate_id}: {msg}"
                    )));
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Rehydrate an aggregate from its stream without dispatching anything.
    ///
    /// The result may be a not-yet-created aggregate; callers decide whether that
    /// is a not-found. A stream written for another aggregate type is
    /// [`DispatchError::NotFound`].
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, aggregate_type, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    fn run<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<(A, Vec<StoredEvent>), DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: goodsin_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history (tenant-scoped)
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, aggregate_type, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide
        let decided = aggregate.handle(command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok((aggregate, vec![]));
        }

        // 4) Persist
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(tenant_id, aggregate_id, aggregate_type, Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        // 5) Publish (after append)
        for stored in &committed {
            self.bus
                .publish(EventEnvelope::from(stored))
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok((aggregate, committed))
    }
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Ids are shared across aggregate kinds; a stream of another kind simply
    // isn't the aggregate the caller asked for.
    if let Some(found) = stream
        .first()
        .map(|e| e.aggregate_type.as_str())
        .filter(|found| *found != aggregate_type)
    {
        tracing::debug!(
            tenant_id = %tenant_id,
            aggregate_id = %aggregate_id,
            expected = aggregate_type,
            found,
            "stream belongs to another aggregate type"
        );
        return Err(DispatchError::not_found(format!("{aggregate_type} {aggregate_id}")));
    }

    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = stored.decode().map_err(|e| {
            DispatchError::Deserialize(format!(
                "{} #{}: {e}",
                stored.event_type, stored.sequence_number
            ))
        })?;
        aggregate.apply(&ev);
    }

    Ok(())
}
