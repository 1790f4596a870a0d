//! Event primitives: the `Event` trait, tenant-scoped envelopes and the bus.
//!
//! Receiving, plan, invoice and inspection events all flow through these types
//! after they have been appended to the event store.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
