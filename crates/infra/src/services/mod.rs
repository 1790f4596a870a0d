//! Application services: the operations exposed to the HTTP layer.
//!
//! Each operation is one or more commands dispatched through the
//! [`CommandDispatcher`]. Reads rehydrate aggregates straight from their streams,
//! so a read issued after a successful write always observes it.
//!
//! - [`catalog`]: materials, defect types and suppliers
//! - [`purchasing`]: purchase plans
//! - [`invoicing`]: supplier invoices
//! - [`receiving`]: receiving records and reconciliation
//! - [`inspection`]: quality inspections and the defect ledger

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use goodsin_core::{Aggregate, AggregateId, DomainError, TenantId};
use goodsin_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::EventStore;

pub mod catalog;
pub mod inspection;
pub mod invoicing;
pub mod purchasing;
pub mod receiving;

pub use catalog::{NewDefectType, NewMaterial, NewSupplier};
pub use inspection::RegisterDefectRequest;
pub use invoicing::{NewInvoice, NewInvoiceItem};
pub use purchasing::{NewPlan, NewPlanItem};
pub use receiving::OpenReceivingRequest;

/// Stream type names recorded on every stored event.
pub mod aggregate_types {
    pub const MATERIAL: &str = "catalog.material";
    pub const DEFECT: &str = "catalog.defect";
    pub const SUPPLIER: &str = "catalog.supplier";
    pub const PURCHASE_PLAN: &str = "purchasing.plan";
    pub const INVOICE: &str = "invoicing.invoice";
    pub const RECEIVING_RECORD: &str = "receiving.record";
    pub const QUALITY_INSPECTION: &str = "quality.inspection";
}

/// Goods-in application service over any store/bus pair.
#[derive(Debug)]
pub struct GoodsInService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
}

impl<S, B> GoodsInService<S, B> {
    pub fn new(dispatcher: CommandDispatcher<S, B>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }
}

impl<S, B> GoodsInService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn execute<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: goodsin_events::Event + Serialize + DeserializeOwned,
    {
        let Dispatched {
            aggregate,
            committed,
            retries,
        } = self.dispatcher.dispatch_with_retry(
            tenant_id,
            aggregate_id,
            aggregate_type,
            command,
            make_aggregate,
        )?;

        for e in &committed {
            tracing::info!(
                tenant_id = %tenant_id,
                aggregate_id = %aggregate_id,
                event_type = %e.event_type,
                sequence = e.sequence_number,
                retries,
                "command committed"
            );
        }

        Ok(aggregate)
    }

    /// Rehydrate an aggregate, treating a never-created stream or a stream of
    /// another aggregate type as not found.
    fn load_existing<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        what: &str,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
        is_created: impl FnOnce(&A) -> bool,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let aggregate = self
            .dispatcher
            .load(tenant_id, aggregate_id, aggregate_type, make_aggregate)
            .map_err(|e| match e {
                DispatchError::NotFound(_) => DispatchError::not_found(what),
                other => other,
            })?;
        if is_created(&aggregate) {
            Ok(aggregate)
        } else {
            Err(DispatchError::not_found(what))
        }
    }

    /// Every created aggregate of one type for a tenant, oldest first.
    fn list_existing<A>(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
        make_aggregate: impl Fn(TenantId, AggregateId) -> A,
        is_created: impl Fn(&A) -> bool,
    ) -> Result<Vec<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let ids = self
            .dispatcher
            .store()
            .list_streams(tenant_id, aggregate_type)?;

        let mut out = Vec::with_capacity(ids.len());
        for aggregate_id in ids {
            let aggregate =
                self.dispatcher
                    .load(tenant_id, aggregate_id, aggregate_type, &make_aggregate)?;
            if is_created(&aggregate) {
                out.push(aggregate);
            }
        }
        Ok(out)
    }
}
