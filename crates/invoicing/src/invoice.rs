use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goodsin_catalog::{MaterialId, SupplierId};
use goodsin_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, TenantId, next_line_no,
};
use goodsin_events::Event;

goodsin_core::aggregate_id!(
    /// Supplier invoice identifier, derived from supplier and invoice number.
    InvoiceId
);

impl InvoiceId {
    /// A supplier never issues two invoices with the same number, so the pair
    /// names exactly one stream.
    pub fn for_supplier_number(supplier_id: SupplierId, number: &str) -> Self {
        Self(AggregateId::from_natural_key(
            "invoicing.invoice",
            &format!("{supplier_id}/{}", number.trim()),
        ))
    }
}

/// Billed material line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub line_no: u32,
    pub material_id: MaterialId,
    pub quantity: Quantity,
    pub unit_value: Decimal,
}

/// Aggregate root: Invoice.
///
/// Reference data for reconciliation: once a receiving record points at it, the
/// item list is frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    supplier_id: Option<SupplierId>,
    number: String,
    issued_on: Option<NaiveDate>,
    total_value: Decimal,
    items: Vec<InvoiceItem>,
    locked_by: Option<AggregateId>,
    version: u64,
    created: bool,
}

impl Invoice {
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            supplier_id: None,
            number: String::new(),
            issued_on: None,
            total_value: Decimal::ZERO,
            items: Vec::new(),
            locked_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn issued_on(&self) -> Option<NaiveDate> {
        self.issued_on
    }

    /// Declared total as printed on the document (never recomputed).
    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub supplier_id: SupplierId,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub total_value: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddInvoiceItem {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub material_id: MaterialId,
    pub quantity: Quantity,
    pub unit_value: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInvoiceForReceiving {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub receiving_record: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    RegisterInvoice(RegisterInvoice),
    AddInvoiceItem(AddInvoiceItem),
    LockInvoiceForReceiving(LockInvoiceForReceiving),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRegistered {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub supplier_id: SupplierId,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub total_value: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItemAdded {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub item: InvoiceItem,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLockedForReceiving {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub receiving_record: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceRegistered(InvoiceRegistered),
    InvoiceItemAdded(InvoiceItemAdded),
    InvoiceLockedForReceiving(InvoiceLockedForReceiving),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceRegistered(_) => "invoicing.invoice.registered",
            InvoiceEvent::InvoiceItemAdded(_) => "invoicing.invoice.item_added",
            InvoiceEvent::InvoiceLockedForReceiving(_) => "invoicing.invoice.locked_for_receiving",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceRegistered(e) => e.occurred_at,
            InvoiceEvent::InvoiceItemAdded(e) => e.occurred_at,
            InvoiceEvent::InvoiceLockedForReceiving(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceRegistered(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.supplier_id = Some(e.supplier_id);
                self.number = e.number.clone();
                self.issued_on = e.issued_on;
                self.total_value = e.total_value;
                self.items.clear();
                self.created = true;
            }
            InvoiceEvent::InvoiceItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            InvoiceEvent::InvoiceLockedForReceiving(e) => {
                self.locked_by = Some(e.receiving_record);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::RegisterInvoice(cmd) => self.handle_register(cmd),
            InvoiceCommand::AddInvoiceItem(cmd) => self.handle_add_item(cmd),
            InvoiceCommand::LockInvoiceForReceiving(cmd) => self.handle_lock(cmd),
        }
    }
}

impl Invoice {
    fn ensure_existing(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("invoice"));
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        let number = cmd.number.trim();
        if self.created {
            return Err(DomainError::conflict(format!(
                "invoice {number} already registered for supplier {}",
                cmd.supplier_id
            )));
        }
        if number.is_empty() {
            return Err(DomainError::invalid_field("number", "cannot be empty"));
        }
        if cmd.invoice_id != InvoiceId::for_supplier_number(cmd.supplier_id, number) {
            return Err(DomainError::invariant("invoice id does not match supplier and number"));
        }
        if cmd.total_value.is_sign_negative() && !cmd.total_value.is_zero() {
            return Err(DomainError::invalid_field("total_value", "must not be negative"));
        }

        Ok(vec![InvoiceEvent::InvoiceRegistered(InvoiceRegistered {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            supplier_id: cmd.supplier_id,
            number: number.to_string(),
            issued_on: cmd.issued_on,
            total_value: cmd.total_value,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddInvoiceItem) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;

        if self.locked_by.is_some() {
            return Err(DomainError::invariant(
                "invoice is referenced by a receiving record and can no longer change",
            ));
        }

        let quantity = cmd.quantity.ensure_positive("quantity")?;
        if cmd.unit_value.is_sign_negative() && !cmd.unit_value.is_zero() {
            return Err(DomainError::invalid_field("unit_value", "must not be negative"));
        }

        Ok(vec![InvoiceEvent::InvoiceItemAdded(InvoiceItemAdded {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            item: InvoiceItem {
                line_no: next_line_no(self.items.len())?,
                material_id: cmd.material_id,
                quantity,
                unit_value: cmd.unit_value,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_lock(&self, cmd: &LockInvoiceForReceiving) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;

        if self.locked_by.is_some() {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceEvent::InvoiceLockedForReceiving(
            InvoiceLockedForReceiving {
                tenant_id: cmd.tenant_id,
                invoice_id: cmd.invoice_id,
                receiving_record: cmd.receiving_record,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_cmd(tenant_id: TenantId, supplier_id: SupplierId, number: &str) -> InvoiceCommand {
        InvoiceCommand::RegisterInvoice(RegisterInvoice {
            tenant_id,
            invoice_id: InvoiceId::for_supplier_number(supplier_id, number),
            supplier_id,
            number: number.to_string(),
            issued_on: NaiveDate::from_ymd_opt(2024, 3, 1),
            total_value: Decimal::new(1_500_00, 2),
            occurred_at: Utc::now(),
        })
    }

    fn registered(tenant_id: TenantId) -> Invoice {
        registered_with(tenant_id, SupplierId::generate(), "NF-000123")
    }

    fn registered_with(tenant_id: TenantId, supplier_id: SupplierId, number: &str) -> Invoice {
        let mut invoice = Invoice::empty(InvoiceId::for_supplier_number(supplier_id, number));
        let events = invoice
            .handle(&register_cmd(tenant_id, supplier_id, number))
            .unwrap();
        invoice.apply(&events[0]);
        invoice
    }

    fn add_item(
        invoice: &mut Invoice,
        tenant_id: TenantId,
        quantity: Quantity,
    ) -> Result<(), DomainError> {
        let events = invoice.handle(&InvoiceCommand::AddInvoiceItem(AddInvoiceItem {
            tenant_id,
            invoice_id: invoice.id_typed(),
            material_id: MaterialId::generate(),
            quantity,
            unit_value: Decimal::new(15_00, 2),
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            invoice.apply(e);
        }
        Ok(())
    }

    #[test]
    fn register_and_add_items() {
        let tenant_id = TenantId::new();
        let mut invoice = registered(tenant_id);

        add_item(&mut invoice, tenant_id, Quantity::from(100)).unwrap();
        add_item(&mut invoice, tenant_id, "12.5".parse().unwrap()).unwrap();

        assert_eq!(invoice.number(), "NF-000123");
        assert_eq!(invoice.items().len(), 2);
        assert_eq!(invoice.items()[1].line_no, 2);
        assert_eq!(invoice.total_value(), Decimal::new(150_000, 2));
    }

    #[test]
    fn number_is_unique_per_supplier() {
        let tenant_id = TenantId::new();
        let supplier = SupplierId::generate();
        let other_supplier = SupplierId::generate();

        let mut invoice = registered_with(tenant_id, supplier, " NF-7 ");
        assert_eq!(invoice.number(), "NF-7");
        assert_eq!(invoice.supplier_id(), Some(supplier));

        // Same stream again: the number is taken for this supplier.
        let err = invoice.handle(&register_cmd(tenant_id, supplier, "NF-7")).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(ref msg) if msg.contains("NF-7")), "{err:?}");

        // Another supplier's NF-7 is a different stream.
        assert_ne!(
            InvoiceId::for_supplier_number(supplier, "NF-7"),
            InvoiceId::for_supplier_number(other_supplier, "NF-7")
        );
        invoice = registered_with(tenant_id, other_supplier, "NF-7");
        assert!(invoice.is_created());
    }

    #[test]
    fn invoice_id_must_match_supplier_and_number() {
        let supplier = SupplierId::generate();
        let invoice = Invoice::empty(InvoiceId::generate());
        let err = invoice
            .handle(&InvoiceCommand::RegisterInvoice(RegisterInvoice {
                invoice_id: invoice.id_typed(),
                ..match register_cmd(TenantId::new(), supplier, "NF-1") {
                    InvoiceCommand::RegisterInvoice(cmd) => cmd,
                    other => panic!("unexpected command: {other:?}"),
                }
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let tenant_id = TenantId::new();
        let mut invoice = registered(tenant_id);

        let err = add_item(&mut invoice, tenant_id, Quantity::ZERO).unwrap_err();
        assert_eq!(err, DomainError::invalid_field("quantity", "must be greater than zero"));
    }

    #[test]
    fn locked_invoice_is_frozen() {
        let tenant_id = TenantId::new();
        let mut invoice = registered(tenant_id);
        let events = invoice
            .handle(&InvoiceCommand::LockInvoiceForReceiving(LockInvoiceForReceiving {
                tenant_id,
                invoice_id: invoice.id_typed(),
                receiving_record: AggregateId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);

        assert!(invoice.is_locked());
        assert!(matches!(
            add_item(&mut invoice, tenant_id, Quantity::from(1)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn other_tenant_cannot_touch_invoice() {
        let mut invoice = registered(TenantId::new());
        let err = add_item(&mut invoice, TenantId::new(), Quantity::from(1)).unwrap_err();
        assert_eq!(err, DomainError::invariant("tenant mismatch"));
    }
}
