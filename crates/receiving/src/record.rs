use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use goodsin_catalog::MaterialId;
use goodsin_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Entity, Quantity, TenantId, UserId,
    next_line_no,
};
use goodsin_events::Event;
use goodsin_invoicing::InvoiceId;
use goodsin_purchasing::PurchasePlanId;

goodsin_core::aggregate_id!(
    /// Receiving record identifier.
    ReceivingRecordId
);

/// One counted entry. Entries are never edited; a correction is a new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedItem {
    pub line_no: u32,
    pub material_id: MaterialId,
    pub counted_quantity: Quantity,
}

impl Entity for ReceivedItem {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.line_no
    }
}

/// Aggregate root: ReceivingRecord.
///
/// The record stream doubles as the uniqueness guard for its quality inspection:
/// `InspectionStarted` can only be appended once, at the version the decision
/// was taken on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivingRecord {
    id: ReceivingRecordId,
    tenant_id: Option<TenantId>,
    plan_id: Option<PurchasePlanId>,
    invoice_id: Option<InvoiceId>,
    received_by: Option<UserId>,
    received_at: Option<DateTime<Utc>>,
    notes: String,
    items: Vec<ReceivedItem>,
    inspection_id: Option<AggregateId>,
    version: u64,
    created: bool,
}

impl ReceivingRecord {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ReceivingRecordId) -> Self {
        Self {
            id,
            tenant_id: None,
            plan_id: None,
            invoice_id: None,
            received_by: None,
            received_at: None,
            notes: String::new(),
            items: Vec::new(),
            inspection_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReceivingRecordId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn plan_id(&self) -> Option<PurchasePlanId> {
        self.plan_id
    }

    pub fn invoice_id(&self) -> Option<InvoiceId> {
        self.invoice_id
    }

    pub fn received_by(&self) -> Option<UserId> {
        self.received_by
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn items(&self) -> &[ReceivedItem] {
        &self.items
    }

    pub fn inspection_id(&self) -> Option<AggregateId> {
        self.inspection_id
    }
}

impl AggregateRoot for ReceivingRecord {
    type Id = ReceivingRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenReceiving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReceiving {
    pub tenant_id: TenantId,
    pub record_id: ReceivingRecordId,
    pub plan_id: PurchasePlanId,
    pub invoice_id: InvoiceId,
    pub received_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddReceivedItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReceivedItem {
    pub tenant_id: TenantId,
    pub record_id: ReceivingRecordId,
    pub material_id: MaterialId,
    pub counted_quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartInspection.
///
/// `inspection_id` is chosen by the caller so the same id can be used to open the
/// inspection stream once the link is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartInspection {
    pub tenant_id: TenantId,
    pub record_id: ReceivingRecordId,
    pub inspection_id: AggregateId,
    pub inspector: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceivingCommand {
    OpenReceiving(OpenReceiving),
    AddReceivedItem(AddReceivedItem),
    StartInspection(StartInspection),
}

/// Event: ReceivingOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingOpened {
    pub tenant_id: TenantId,
    pub record_id: ReceivingRecordId,
    pub plan_id: PurchasePlanId,
    pub invoice_id: InvoiceId,
    pub received_by: UserId,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReceivedItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedItemAdded {
    pub tenant_id: TenantId,
    pub record_id: ReceivingRecordId,
    pub item: ReceivedItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InspectionStarted.
///
/// Carries a value copy of the items as they were when the inspection began.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionStarted {
    pub tenant_id: TenantId,
    pub record_id: ReceivingRecordId,
    pub inspection_id: AggregateId,
    pub inspector: UserId,
    pub items: Vec<ReceivedItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceivingEvent {
    ReceivingOpened(ReceivingOpened),
    ReceivedItemAdded(ReceivedItemAdded),
    InspectionStarted(InspectionStarted),
}

impl Event for ReceivingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReceivingEvent::ReceivingOpened(_) => "receiving.record.opened",
            ReceivingEvent::ReceivedItemAdded(_) => "receiving.record.item_added",
            ReceivingEvent::InspectionStarted(_) => "receiving.record.inspection_started",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReceivingEvent::ReceivingOpened(e) => e.occurred_at,
            ReceivingEvent::ReceivedItemAdded(e) => e.occurred_at,
            ReceivingEvent::InspectionStarted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ReceivingRecord {
    type Command = ReceivingCommand;
    type Event = ReceivingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReceivingEvent::ReceivingOpened(e) => {
                self.id = e.record_id;
                self.tenant_id = Some(e.tenant_id);
                self.plan_id = Some(e.plan_id);
                self.invoice_id = Some(e.invoice_id);
                self.received_by = Some(e.received_by);
                self.received_at = Some(e.occurred_at);
                self.notes = e.notes.clone();
                self.items.clear();
                self.inspection_id = None;
                self.created = true;
            }
            ReceivingEvent::ReceivedItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            ReceivingEvent::InspectionStarted(e) => {
                self.inspection_id = Some(e.inspection_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReceivingCommand::OpenReceiving(cmd) => self.handle_open(cmd),
            ReceivingCommand::AddReceivedItem(cmd) => self.handle_add_item(cmd),
            ReceivingCommand::StartInspection(cmd) => self.handle_start_inspection(cmd),
        }
    }
}

impl ReceivingRecord {
    fn ensure_existing(
        &self,
        tenant_id: TenantId,
        record_id: ReceivingRecordId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("receiving record"));
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != record_id {
            return Err(DomainError::invariant("record_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenReceiving) -> Result<Vec<ReceivingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("receiving record already exists"));
        }

        Ok(vec![ReceivingEvent::ReceivingOpened(ReceivingOpened {
            tenant_id: cmd.tenant_id,
            record_id: cmd.record_id,
            plan_id: cmd.plan_id,
            invoice_id: cmd.invoice_id,
            received_by: cmd.received_by,
            notes: cmd.notes.as_deref().map(str::trim).unwrap_or_default().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddReceivedItem) -> Result<Vec<ReceivingEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.record_id)?;

        let counted_quantity = cmd.counted_quantity.ensure_non_negative("quantity")?;

        Ok(vec![ReceivingEvent::ReceivedItemAdded(ReceivedItemAdded {
            tenant_id: cmd.tenant_id,
            record_id: cmd.record_id,
            item: ReceivedItem {
                line_no: next_line_no(self.items.len())?,
                material_id: cmd.material_id,
                counted_quantity,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_inspection(
        &self,
        cmd: &StartInspection,
    ) -> Result<Vec<ReceivingEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.record_id)?;

        if let Some(existing) = self.inspection_id {
            return Err(DomainError::conflict(format!(
                "receiving record already has inspection {existing}"
            )));
        }

        Ok(vec![ReceivingEvent::InspectionStarted(InspectionStarted {
            tenant_id: cmd.tenant_id,
            record_id: cmd.record_id,
            inspection_id: cmd.inspection_id,
            inspector: cmd.inspector,
            items: self.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(tenant_id: TenantId) -> ReceivingRecord {
        let record_id = ReceivingRecordId::generate();
        let mut record = ReceivingRecord::empty(record_id);
        let events = record
            .handle(&ReceivingCommand::OpenReceiving(OpenReceiving {
                tenant_id,
                record_id,
                plan_id: PurchasePlanId::generate(),
                invoice_id: InvoiceId::generate(),
                received_by: UserId::new(),
                notes: Some("  caixa 3 avariada ".to_string()),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        record.apply(&events[0]);
        record
    }

    fn count(
        record: &mut ReceivingRecord,
        tenant_id: TenantId,
        material_id: MaterialId,
        qty: i64,
    ) -> Result<(), DomainError> {
        let events = record.handle(&ReceivingCommand::AddReceivedItem(AddReceivedItem {
            tenant_id,
            record_id: record.id_typed(),
            material_id,
            counted_quantity: Quantity::from(qty),
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            record.apply(e);
        }
        Ok(())
    }

    fn start(record: &ReceivingRecord, tenant_id: TenantId) -> Result<Vec<ReceivingEvent>, DomainError> {
        record.handle(&ReceivingCommand::StartInspection(StartInspection {
            tenant_id,
            record_id: record.id_typed(),
            inspection_id: AggregateId::new(),
            inspector: UserId::new(),
            occurred_at: Utc::now(),
        }))
    }

    #[test]
    fn open_trims_notes() {
        let record = opened(TenantId::new());
        assert!(record.is_created());
        assert_eq!(record.notes(), "caixa 3 avariada");
        assert!(record.inspection_id().is_none());
    }

    #[test]
    fn items_are_appended_with_line_numbers() {
        let tenant_id = TenantId::new();
        let mut record = opened(tenant_id);
        let m1 = MaterialId::generate();

        count(&mut record, tenant_id, m1, 90).unwrap();
        count(&mut record, tenant_id, m1, 0).unwrap();

        assert_eq!(record.items().len(), 2);
        assert_eq!(*record.items()[1].id(), 2);
        assert_eq!(record.items()[0].counted_quantity, Quantity::from(90));
    }

    #[test]
    fn negative_count_is_rejected() {
        let tenant_id = TenantId::new();
        let mut record = opened(tenant_id);

        let err = count(&mut record, tenant_id, MaterialId::generate(), -1).unwrap_err();
        assert_eq!(err, DomainError::invalid_field("quantity", "must not be negative"));
    }

    #[test]
    fn oversized_count_is_rejected_before_it_is_recorded() {
        let tenant_id = TenantId::new();
        let mut record = opened(tenant_id);

        let err = count(&mut record, tenant_id, MaterialId::generate(), 100_000_000).unwrap_err();
        assert_eq!(err, DomainError::invalid_field("quantity", "must not exceed 99999999.99"));
        assert!(record.items().is_empty());
    }

    #[test]
    fn inspection_snapshot_copies_current_items() {
        let tenant_id = TenantId::new();
        let mut record = opened(tenant_id);
        count(&mut record, tenant_id, MaterialId::generate(), 20).unwrap();

        let events = start(&record, tenant_id).unwrap();
        let snapshot = match &events[0] {
            ReceivingEvent::InspectionStarted(e) => e.items.clone(),
            other => panic!("unexpected event: {other:?}"),
        };
        record.apply(&events[0]);

        // Later counts don't change the snapshot carried by the event.
        count(&mut record, tenant_id, MaterialId::generate(), 5).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(record.items().len(), 2);
    }

    #[test]
    fn second_inspection_conflicts() {
        let tenant_id = TenantId::new();
        let mut record = opened(tenant_id);

        let events = start(&record, tenant_id).unwrap();
        record.apply(&events[0]);

        match start(&record, tenant_id).unwrap_err() {
            DomainError::Conflict(msg) => assert!(msg.contains("already has inspection")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inspection_on_missing_record_is_not_found() {
        let record = ReceivingRecord::empty(ReceivingRecordId::generate());
        assert_eq!(
            start(&record, TenantId::new()).unwrap_err(),
            DomainError::not_found("receiving record")
        );
    }
}
