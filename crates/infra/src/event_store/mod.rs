//! Append-only, tenant-scoped event store boundary.
//!
//! Every aggregate (material, defect type, plan, invoice, receiving record,
//! inspection) is one stream keyed by `(tenant_id, aggregate_id)`. The exact
//! version check on append is the only concurrency primitive the services use.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, stream_version};
