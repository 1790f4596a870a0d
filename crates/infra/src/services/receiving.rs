use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value as JsonValue;

use goodsin_catalog::MaterialId;
use goodsin_core::{Quantity, TenantId, UserId};
use goodsin_events::{EventBus, EventEnvelope};
use goodsin_invoicing::{Invoice, InvoiceCommand, InvoiceId, LockInvoiceForReceiving};
use goodsin_purchasing::{LockPlanForReceiving, PurchasePlan, PurchasePlanCommand, PurchasePlanId};
use goodsin_receiving::{
    AddReceivedItem, DivergenceReport, OpenReceiving, ReceivingCommand, ReceivingRecord,
    ReceivingRecordId, reconcile_record,
};

use super::{GoodsInService, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

#[derive(Debug, Clone)]
pub struct OpenReceivingRequest {
    pub plan_id: PurchasePlanId,
    pub invoice_id: InvoiceId,
    pub notes: Option<String>,
}

impl<S, B> GoodsInService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Open a receiving record against one plan and one invoice.
    ///
    /// Plan and invoice must come from the same supplier. Both references are
    /// locked first, which freezes their item lists for reconciliation. Locking
    /// is idempotent, so a plan or invoice may back more than one record.
    pub fn open_receiving(
        &self,
        tenant_id: TenantId,
        received_by: UserId,
        input: OpenReceivingRequest,
    ) -> Result<ReceivingRecord, DispatchError> {
        // Plan status is checked by the lock itself.
        let plan = self.get_plan(tenant_id, input.plan_id)?;
        let invoice = self.get_invoice(tenant_id, input.invoice_id)?;
        if plan.supplier_id() != invoice.supplier_id() {
            return Err(DispatchError::invalid_field(
                "invoice_id",
                format!(
                    "invoice {} was issued by another supplier than purchase plan {}",
                    invoice.number(),
                    plan.code()
                ),
            ));
        }

        let record_id = ReceivingRecordId::generate();
        let plan_id = input.plan_id;
        let invoice_id = input.invoice_id;

        self.execute(
            tenant_id,
            plan_id.aggregate_id(),
            aggregate_types::PURCHASE_PLAN,
            PurchasePlanCommand::LockPlanForReceiving(LockPlanForReceiving {
                tenant_id,
                plan_id,
                receiving_record: record_id.aggregate_id(),
                occurred_at: Utc::now(),
            }),
            move |_, _| PurchasePlan::empty(plan_id),
        )?;

        self.execute(
            tenant_id,
            invoice_id.aggregate_id(),
            aggregate_types::INVOICE,
            InvoiceCommand::LockInvoiceForReceiving(LockInvoiceForReceiving {
                tenant_id,
                invoice_id,
                receiving_record: record_id.aggregate_id(),
                occurred_at: Utc::now(),
            }),
            move |_, _| Invoice::empty(invoice_id),
        )?;

        self.execute(
            tenant_id,
            record_id.aggregate_id(),
            aggregate_types::RECEIVING_RECORD,
            ReceivingCommand::OpenReceiving(OpenReceiving {
                tenant_id,
                record_id,
                plan_id,
                invoice_id,
                received_by,
                notes: input.notes,
                occurred_at: Utc::now(),
            }),
            move |_, _| ReceivingRecord::empty(record_id),
        )
    }

    /// Append one counted entry (`quantity >= 0`) to a record.
    pub fn add_received_item(
        &self,
        tenant_id: TenantId,
        record_id: ReceivingRecordId,
        material_id: MaterialId,
        quantity: Quantity,
    ) -> Result<ReceivingRecord, DispatchError> {
        self.get_receiving(tenant_id, record_id)?;
        quantity.ensure_non_negative("quantity")?;
        self.require_material(tenant_id, material_id, "material_id")?;

        self.execute(
            tenant_id,
            record_id.aggregate_id(),
            aggregate_types::RECEIVING_RECORD,
            ReceivingCommand::AddReceivedItem(AddReceivedItem {
                tenant_id,
                record_id,
                material_id,
                counted_quantity: quantity,
                occurred_at: Utc::now(),
            }),
            move |_, _| ReceivingRecord::empty(record_id),
        )
    }

    pub fn get_receiving(
        &self,
        tenant_id: TenantId,
        record_id: ReceivingRecordId,
    ) -> Result<ReceivingRecord, DispatchError> {
        self.load_existing(
            tenant_id,
            record_id.aggregate_id(),
            aggregate_types::RECEIVING_RECORD,
            "receiving record",
            |_, _| ReceivingRecord::empty(record_id),
            ReceivingRecord::is_created,
        )
    }

    /// Divergence report for one record. Read-only; nothing is persisted.
    pub fn reconcile(
        &self,
        tenant_id: TenantId,
        record_id: ReceivingRecordId,
    ) -> Result<DivergenceReport, DispatchError> {
        let record = self.get_receiving(tenant_id, record_id)?;
        let (plan_id, invoice_id) = match (record.plan_id(), record.invoice_id()) {
            (Some(p), Some(i)) => (p, i),
            _ => return Err(DispatchError::not_found("receiving record")),
        };
        let plan = self.get_plan(tenant_id, plan_id)?;
        let invoice = self.get_invoice(tenant_id, invoice_id)?;

        let mut codes: HashMap<MaterialId, String> = HashMap::new();
        let referenced = plan
            .items()
            .iter()
            .map(|i| i.material_id)
            .chain(invoice.items().iter().map(|i| i.material_id))
            .chain(record.items().iter().map(|i| i.material_id));
        for material_id in referenced {
            if codes.contains_key(&material_id) {
                continue;
            }
            match self.get_material(tenant_id, material_id) {
                Ok(m) => {
                    codes.insert(material_id, m.code().to_string());
                }
                Err(DispatchError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let report = reconcile_record(&record, plan.items(), invoice.items(), |id| {
            codes.get(id).cloned()
        })?;

        tracing::debug!(
            tenant_id = %tenant_id,
            record_id = %record_id,
            divergent_materials = report.len(),
            "reconciled receiving record"
        );

        Ok(report)
    }
}
