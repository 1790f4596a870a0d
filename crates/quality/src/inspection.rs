use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use goodsin_catalog::{DefectId, MaterialId};
use goodsin_core::{Aggregate, AggregateRoot, DomainError, Entity, Quantity, TenantId, UserId};
use goodsin_events::Event;
use goodsin_receiving::{ReceivedItem, ReceivingRecordId};

goodsin_core::aggregate_id!(
    /// Quality inspection identifier.
    QualityInspectionId
);

/// One registration of a defective quantity. Never edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub defect_id: DefectId,
    pub defective_quantity: Quantity,
    pub registered_by: UserId,
    pub registered_at: DateTime<Utc>,
}

/// Inspected copy of a received item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionItem {
    /// Line number of the received entry this item was copied from.
    pub item_no: u32,
    pub material_id: MaterialId,
    pub counted_quantity: Quantity,
    pub defects: Vec<DefectRecord>,
}

impl InspectionItem {
    fn from_received(item: &ReceivedItem) -> Self {
        Self {
            item_no: item.line_no,
            material_id: item.material_id,
            counted_quantity: item.counted_quantity,
            defects: Vec::new(),
        }
    }

    /// Sum of all registered defective quantities.
    pub fn defective_quantity(&self) -> Quantity {
        self.defects
            .iter()
            .fold(Quantity::ZERO, |acc, d| acc.saturating_add(d.defective_quantity))
    }

    /// Quantity still available for new defect registrations.
    pub fn remaining_quantity(&self) -> Quantity {
        self.counted_quantity.saturating_sub(self.defective_quantity())
    }
}

impl Entity for InspectionItem {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.item_no
    }
}

/// Aggregate root: QualityInspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityInspection {
    id: QualityInspectionId,
    tenant_id: Option<TenantId>,
    record_id: Option<ReceivingRecordId>,
    inspector: Option<UserId>,
    started_at: Option<DateTime<Utc>>,
    items: Vec<InspectionItem>,
    version: u64,
    created: bool,
}

impl QualityInspection {
    pub fn empty(id: QualityInspectionId) -> Self {
        Self {
            id,
            tenant_id: None,
            record_id: None,
            inspector: None,
            started_at: None,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> QualityInspectionId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn record_id(&self) -> Option<ReceivingRecordId> {
        self.record_id
    }

    pub fn inspector(&self) -> Option<UserId> {
        self.inspector
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn items(&self) -> &[InspectionItem] {
        &self.items
    }

    pub fn item(&self, item_no: u32) -> Option<&InspectionItem> {
        self.items.iter().find(|i| i.item_no == item_no)
    }
}

impl AggregateRoot for QualityInspection {
    type Id = QualityInspectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenInspection.
///
/// `items` is the snapshot committed on the receiving record when the inspection
/// was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInspection {
    pub tenant_id: TenantId,
    pub inspection_id: QualityInspectionId,
    pub record_id: ReceivingRecordId,
    pub inspector: UserId,
    pub items: Vec<ReceivedItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterDefect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDefect {
    pub tenant_id: TenantId,
    pub inspection_id: QualityInspectionId,
    pub item_no: u32,
    pub defect_id: DefectId,
    pub defective_quantity: Quantity,
    pub registered_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionCommand {
    OpenInspection(OpenInspection),
    RegisterDefect(RegisterDefect),
}

/// Event: InspectionOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionOpened {
    pub tenant_id: TenantId,
    pub inspection_id: QualityInspectionId,
    pub record_id: ReceivingRecordId,
    pub inspector: UserId,
    pub items: Vec<InspectionItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DefectRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectRegistered {
    pub tenant_id: TenantId,
    pub inspection_id: QualityInspectionId,
    pub item_no: u32,
    pub defect: DefectRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionEvent {
    InspectionOpened(InspectionOpened),
    DefectRegistered(DefectRegistered),
}

impl Event for InspectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InspectionEvent::InspectionOpened(_) => "quality.inspection.opened",
            InspectionEvent::DefectRegistered(_) => "quality.inspection.defect_registered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InspectionEvent::InspectionOpened(e) => e.occurred_at,
            InspectionEvent::DefectRegistered(e) => e.defect.registered_at,
        }
    }
}

impl Aggregate for QualityInspection {
    type Command = InspectionCommand;
    type Event = InspectionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InspectionEvent::InspectionOpened(e) => {
                self.id = e.inspection_id;
                self.tenant_id = Some(e.tenant_id);
                self.record_id = Some(e.record_id);
                self.inspector = Some(e.inspector);
                self.started_at = Some(e.occurred_at);
                self.items = e.items.clone();
                self.created = true;
            }
            InspectionEvent::DefectRegistered(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.item_no == e.item_no) {
                    item.defects.push(e.defect.clone());
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InspectionCommand::OpenInspection(cmd) => self.handle_open(cmd),
            InspectionCommand::RegisterDefect(cmd) => self.handle_register_defect(cmd),
        }
    }
}

impl QualityInspection {
    fn handle_open(&self, cmd: &OpenInspection) -> Result<Vec<InspectionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("inspection already exists"));
        }

        Ok(vec![InspectionEvent::InspectionOpened(InspectionOpened {
            tenant_id: cmd.tenant_id,
            inspection_id: cmd.inspection_id,
            record_id: cmd.record_id,
            inspector: cmd.inspector,
            items: cmd.items.iter().map(InspectionItem::from_received).collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_defect(
        &self,
        cmd: &RegisterDefect,
    ) -> Result<Vec<InspectionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("inspection"));
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }

        let item = self
            .item(cmd.item_no)
            .ok_or_else(|| DomainError::not_found(format!("inspection item {}", cmd.item_no)))?;

        let quantity = cmd.defective_quantity.ensure_positive("quantity")?;

        let already = item.defective_quantity();
        let total = already
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invalid_field("quantity", "out of range"))?;
        if total > item.counted_quantity {
            return Err(DomainError::validation(format!(
                "defective quantity {total} would exceed counted quantity {} (already recorded {already})",
                item.counted_quantity
            )));
        }

        Ok(vec![InspectionEvent::DefectRegistered(DefectRegistered {
            tenant_id: cmd.tenant_id,
            inspection_id: cmd.inspection_id,
            item_no: cmd.item_no,
            defect: DefectRecord {
                defect_id: cmd.defect_id,
                defective_quantity: quantity,
                registered_by: cmd.registered_by,
                registered_at: cmd.occurred_at,
            },
        })])
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    struct Fixture {
        tenant_id: TenantId,
        inspection: QualityInspection,
    }

    impl Fixture {
        fn with_counts(counts: &[i64]) -> Self {
            let tenant_id = TenantId::new();
            let inspection_id = QualityInspectionId::generate();
            let mut inspection = QualityInspection::empty(inspection_id);

            let items = counts
                .iter()
                .enumerate()
                .map(|(idx, c)| ReceivedItem {
                    line_no: idx as u32 + 1,
                    material_id: MaterialId::generate(),
                    counted_quantity: Quantity::from(*c),
                })
                .collect();

            let events = inspection
                .handle(&InspectionCommand::OpenInspection(OpenInspection {
                    tenant_id,
                    inspection_id,
                    record_id: ReceivingRecordId::generate(),
                    inspector: UserId::new(),
                    items,
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            inspection.apply(&events[0]);

            Self {
                tenant_id,
                inspection,
            }
        }

        fn register(&mut self, item_no: u32, qty: i64) -> Result<(), DomainError> {
            let events = self
                .inspection
                .handle(&InspectionCommand::RegisterDefect(RegisterDefect {
                    tenant_id: self.tenant_id,
                    inspection_id: self.inspection.id_typed(),
                    item_no,
                    defect_id: DefectId::generate(),
                    defective_quantity: Quantity::from(qty),
                    registered_by: UserId::new(),
                    occurred_at: Utc::now(),
                }))?;
            for e in &events {
                self.inspection.apply(e);
            }
            Ok(())
        }
    }

    #[test]
    fn open_copies_items_without_defects() {
        let f = Fixture::with_counts(&[20, 7]);
        assert_eq!(f.inspection.items().len(), 2);
        let second = f.inspection.item(2).unwrap();
        assert_eq!(second.counted_quantity, Quantity::from(7));
        assert!(second.defects.is_empty());
        assert_eq!(second.remaining_quantity(), Quantity::from(7));
    }

    #[test]
    fn defect_beyond_counted_quantity_is_rejected() {
        let mut f = Fixture::with_counts(&[20]);
        f.register(1, 15).unwrap();

        let err = f.register(1, 6).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{err:?}");
        assert_eq!(f.inspection.item(1).unwrap().defects.len(), 1);

        f.register(1, 5).unwrap();
        let item = f.inspection.item(1).unwrap();
        assert_eq!(item.defective_quantity(), Quantity::from(20));
        assert_eq!(item.remaining_quantity(), Quantity::ZERO);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut f = Fixture::with_counts(&[3]);
        assert_eq!(
            f.register(1, 0).unwrap_err(),
            DomainError::invalid_field("quantity", "must be greater than zero")
        );
    }

    #[test]
    fn unknown_item_is_not_found() {
        let mut f = Fixture::with_counts(&[3]);
        assert!(matches!(f.register(9, 1), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn register_on_unopened_inspection_is_not_found() {
        let inspection = QualityInspection::empty(QualityInspectionId::generate());
        let err = inspection
            .handle(&InspectionCommand::RegisterDefect(RegisterDefect {
                tenant_id: TenantId::new(),
                inspection_id: inspection.id_typed(),
                item_no: 1,
                defect_id: DefectId::generate(),
                defective_quantity: Quantity::from(1),
                registered_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("inspection"));
    }

    #[test]
    fn reopening_conflicts() {
        let f = Fixture::with_counts(&[1]);
        let err = f
            .inspection
            .handle(&InspectionCommand::OpenInspection(OpenInspection {
                tenant_id: f.tenant_id,
                inspection_id: f.inspection.id_typed(),
                record_id: ReceivingRecordId::generate(),
                inspector: UserId::new(),
                items: Vec::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    proptest! {
        #[test]
        fn accepted_defects_never_exceed_count(
            counted in 0i64..50,
            attempts in proptest::collection::vec(1i64..20, 0..12),
        ) {
            let mut f = Fixture::with_counts(&[counted]);
            for qty in attempts {
                let _ = f.register(1, qty);
                let item = f.inspection.item(1).unwrap();
                prop_assert!(item.defective_quantity() <= item.counted_quantity);
            }
        }
    }
}
