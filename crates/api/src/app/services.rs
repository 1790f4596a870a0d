use std::sync::Arc;

use serde_json::Value as JsonValue;

use goodsin_events::{EventEnvelope, InMemoryEventBus};
use goodsin_infra::{
    audit,
    command_dispatcher::CommandDispatcher,
    event_store::InMemoryEventStore,
    services::GoodsInService,
};

pub type Store = Arc<InMemoryEventStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

/// Shared state handed to every handler.
pub struct AppServices {
    pub goods_in: GoodsInService<Store, Bus>,
}

/// Wire the in-memory store and bus, and attach the audit logger to the bus.
pub fn build_services(max_retries: u32) -> std::io::Result<AppServices> {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    audit::spawn_event_logger(bus.as_ref())?;

    let dispatcher = CommandDispatcher::new(store, bus).with_max_retries(max_retries);
    let goods_in = GoodsInService::new(dispatcher);
    tracing::info!(
        max_retries = goods_in.dispatcher().max_retries(),
        "goods-in services ready (in-memory event store)"
    );
    Ok(AppServices { goods_in })
}
