use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use goodsin_catalog::{MaterialId, SupplierId};
use goodsin_core::{Quantity, TenantId};
use goodsin_events::{EventBus, EventEnvelope};
use goodsin_invoicing::{
    AddInvoiceItem, Invoice, InvoiceCommand, InvoiceId, RegisterInvoice,
};

use super::{GoodsInService, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub material_id: MaterialId,
    pub quantity: Quantity,
    pub unit_value: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub supplier_id: SupplierId,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub total_value: Decimal,
    pub items: Vec<NewInvoiceItem>,
}

impl<S, B> GoodsInService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Register an invoice and its items.
    ///
    /// The invoice id is derived from supplier and number, so a number the
    /// supplier already used is a [`DispatchError::Conflict`] even when two
    /// registrations race.
    pub fn register_invoice(
        &self,
        tenant_id: TenantId,
        input: NewInvoice,
    ) -> Result<Invoice, DispatchError> {
        self.require_supplier(tenant_id, input.supplier_id, "supplier_id")?;
        for (idx, item) in input.items.iter().enumerate() {
            self.require_material(tenant_id, item.material_id, &format!("items[{idx}].material_id"))?;
            item.quantity.ensure_positive(&format!("items[{idx}].quantity"))?;
        }

        let invoice_id = InvoiceId::for_supplier_number(input.supplier_id, &input.number);
        let mut invoice = self.execute(
            tenant_id,
            invoice_id.aggregate_id(),
            aggregate_types::INVOICE,
            InvoiceCommand::RegisterInvoice(RegisterInvoice {
                tenant_id,
                invoice_id,
                supplier_id: input.supplier_id,
                number: input.number,
                issued_on: input.issued_on,
                total_value: input.total_value,
                occurred_at: Utc::now(),
            }),
            move |_, _| Invoice::empty(invoice_id),
        )?;

        for item in input.items {
            invoice = self.dispatch_invoice_item(tenant_id, invoice_id, item)?;
        }

        Ok(invoice)
    }

    pub fn add_invoice_item(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        item: NewInvoiceItem,
    ) -> Result<Invoice, DispatchError> {
        self.require_material(tenant_id, item.material_id, "material_id")?;
        self.dispatch_invoice_item(tenant_id, invoice_id, item)
    }

    pub fn get_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, DispatchError> {
        self.load_existing(
            tenant_id,
            invoice_id.aggregate_id(),
            aggregate_types::INVOICE,
            "invoice",
            |_, _| Invoice::empty(invoice_id),
            Invoice::is_created,
        )
    }

    fn dispatch_invoice_item(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        item: NewInvoiceItem,
    ) -> Result<Invoice, DispatchError> {
        self.execute(
            tenant_id,
            invoice_id.aggregate_id(),
            aggregate_types::INVOICE,
            InvoiceCommand::AddInvoiceItem(AddInvoiceItem {
                tenant_id,
                invoice_id,
                material_id: item.material_id,
                quantity: item.quantity,
                unit_value: item.unit_value,
                occurred_at: Utc::now(),
            }),
            move |_, _| Invoice::empty(invoice_id),
        )
    }
}
