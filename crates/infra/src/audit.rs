//! Audit trail: logs every committed event as a structured tracing record.

use std::thread::JoinHandle;

use serde_json::Value as JsonValue;

use goodsin_events::{EventBus, EventEnvelope, Subscription};

/// Subscribe to `bus` and log each envelope on a dedicated thread.
///
/// The subscription is taken before this returns, so no event published after
/// the call is missed. The thread exits once the bus is dropped.
pub fn spawn_event_logger<B>(bus: &B) -> std::io::Result<JoinHandle<()>>
where
    B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
{
    let subscription = bus.subscribe();
    std::thread::Builder::new()
        .name("goodsin-audit".to_string())
        .spawn(move || run(subscription))
}

fn run(subscription: Subscription<EventEnvelope<JsonValue>>) {
    while let Ok(envelope) = subscription.recv() {
        log_envelope(&envelope);
    }
    tracing::debug!("event bus closed, audit logger stopping");
}

fn log_envelope(envelope: &EventEnvelope<JsonValue>) {
    tracing::info!(
        target: "goodsin::audit",
        event_id = %envelope.event_id(),
        tenant_id = %envelope.tenant_id(),
        aggregate_type = envelope.aggregate_type(),
        aggregate_id = %envelope.aggregate_id(),
        event_type = envelope.event_type(),
        sequence = envelope.sequence_number(),
        "event committed"
    );
}
