use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use goodsin_catalog::{MaterialId, SupplierId};
use goodsin_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, TenantId, UserId, next_line_no,
};
use goodsin_events::Event;

goodsin_core::aggregate_id!(
    /// Purchase plan identifier (tenant-scoped via `tenant_id` fields in events/commands).
    PurchasePlanId
);

/// Purchase plan status lifecycle.
///
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchasePlanStatus {
    Open,
    PartiallyReceived,
    Completed,
    Cancelled,
}

impl PurchasePlanStatus {
    pub fn can_transition_to(self, next: PurchasePlanStatus) -> bool {
        use PurchasePlanStatus::*;
        matches!(
            (self, next),
            (Open, PartiallyReceived)
                | (Open, Completed)
                | (Open, Cancelled)
                | (PartiallyReceived, Completed)
                | (PartiallyReceived, Cancelled)
        )
    }

    /// Whether goods may still be received against a plan in this status.
    pub fn accepts_receiving(self) -> bool {
        matches!(
            self,
            PurchasePlanStatus::Open | PurchasePlanStatus::PartiallyReceived
        )
    }
}

/// Expected material line of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub line_no: u32,
    pub material_id: MaterialId,
    pub expected_quantity: Quantity,
    pub color: Option<String>,
}

/// Aggregate root: PurchasePlan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasePlan {
    id: PurchasePlanId,
    tenant_id: Option<TenantId>,
    code: String,
    supplier_id: Option<SupplierId>,
    created_by: Option<UserId>,
    expected_delivery: Option<NaiveDate>,
    status: PurchasePlanStatus,
    items: Vec<PlanItem>,
    /// Receiving record that first referenced this plan; items are frozen from then on.
    locked_by: Option<AggregateId>,
    version: u64,
    created: bool,
}

impl PurchasePlan {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchasePlanId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            supplier_id: None,
            created_by: None,
            expected_delivery: None,
            status: PurchasePlanStatus::Open,
            items: Vec::new(),
            locked_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchasePlanId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn expected_delivery(&self) -> Option<NaiveDate> {
        self.expected_delivery
    }

    pub fn status(&self) -> PurchasePlanStatus {
        self.status
    }

    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    pub fn locked_by(&self) -> Option<AggregateId> {
        self.locked_by
    }
}

impl AggregateRoot for PurchasePlan {
    type Id = PurchasePlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchasePlan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchasePlan {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub code: String,
    pub supplier_id: SupplierId,
    pub created_by: UserId,
    pub expected_delivery: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddPlanItem (only while open and not yet referenced by a receiving record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPlanItem {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub material_id: MaterialId,
    pub expected_quantity: Quantity,
    pub color: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePlanStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePlanStatus {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub status: PurchasePlanStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LockPlanForReceiving.
///
/// Issued when a receiving record is opened against the plan. Locking an already
/// locked plan is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPlanForReceiving {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub receiving_record: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchasePlanCommand {
    CreatePurchasePlan(CreatePurchasePlan),
    AddPlanItem(AddPlanItem),
    ChangePlanStatus(ChangePlanStatus),
    LockPlanForReceiving(LockPlanForReceiving),
}

/// Event: PurchasePlanCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasePlanCreated {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub code: String,
    pub supplier_id: SupplierId,
    pub created_by: UserId,
    pub expected_delivery: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PlanItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItemAdded {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub item: PlanItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PlanStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatusChanged {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub from: PurchasePlanStatus,
    pub to: PurchasePlanStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PlanLockedForReceiving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLockedForReceiving {
    pub tenant_id: TenantId,
    pub plan_id: PurchasePlanId,
    pub receiving_record: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchasePlanEvent {
    PurchasePlanCreated(PurchasePlanCreated),
    PlanItemAdded(PlanItemAdded),
    PlanStatusChanged(PlanStatusChanged),
    PlanLockedForReceiving(PlanLockedForReceiving),
}

impl Event for PurchasePlanEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchasePlanEvent::PurchasePlanCreated(_) => "purchasing.plan.created",
            PurchasePlanEvent::PlanItemAdded(_) => "purchasing.plan.item_added",
            PurchasePlanEvent::PlanStatusChanged(_) => "purchasing.plan.status_changed",
            PurchasePlanEvent::PlanLockedForReceiving(_) => "purchasing.plan.locked_for_receiving",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchasePlanEvent::PurchasePlanCreated(e) => e.occurred_at,
            PurchasePlanEvent::PlanItemAdded(e) => e.occurred_at,
            PurchasePlanEvent::PlanStatusChanged(e) => e.occurred_at,
            PurchasePlanEvent::PlanLockedForReceiving(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchasePlan {
    type Command = PurchasePlanCommand;
    type Event = PurchasePlanEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchasePlanEvent::PurchasePlanCreated(e) => {
                self.id = e.plan_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.supplier_id = Some(e.supplier_id);
                self.created_by = Some(e.created_by);
                self.expected_delivery = e.expected_delivery;
                self.status = PurchasePlanStatus::Open;
                self.items.clear();
                self.created = true;
            }
            PurchasePlanEvent::PlanItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            PurchasePlanEvent::PlanStatusChanged(e) => {
                self.status = e.to;
            }
            PurchasePlanEvent::PlanLockedForReceiving(e) => {
                self.locked_by = Some(e.receiving_record);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchasePlanCommand::CreatePurchasePlan(cmd) => self.handle_create(cmd),
            PurchasePlanCommand::AddPlanItem(cmd) => self.handle_add_item(cmd),
            PurchasePlanCommand::ChangePlanStatus(cmd) => self.handle_change_status(cmd),
            PurchasePlanCommand::LockPlanForReceiving(cmd) => self.handle_lock(cmd),
        }
    }
}

impl PurchasePlan {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_plan_id(&self, plan_id: PurchasePlanId) -> Result<(), DomainError> {
        if self.id != plan_id {
            return Err(DomainError::invariant("plan_id mismatch"));
        }
        Ok(())
    }

    fn ensure_existing(&self, tenant_id: TenantId, plan_id: PurchasePlanId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("purchase plan"));
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_plan_id(plan_id)
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchasePlan,
    ) -> Result<Vec<PurchasePlanEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase plan already exists"));
        }

        let code = cmd.code.trim();
        if code.is_empty() {
            return Err(DomainError::invalid_field("code", "cannot be empty"));
        }

        Ok(vec![PurchasePlanEvent::PurchasePlanCreated(PurchasePlanCreated {
            tenant_id: cmd.tenant_id,
            plan_id: cmd.plan_id,
            code: code.to_string(),
            supplier_id: cmd.supplier_id,
            created_by: cmd.created_by,
            expected_delivery: cmd.expected_delivery,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddPlanItem) -> Result<Vec<PurchasePlanEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.plan_id)?;

        if self.locked_by.is_some() {
            return Err(DomainError::invariant(
                "purchase plan is referenced by a receiving record and can no longer change",
            ));
        }
        if self.status != PurchasePlanStatus::Open {
            return Err(DomainError::invariant("only open purchase plans accept new items"));
        }

        let expected_quantity = cmd.expected_quantity.ensure_positive("expected_quantity")?;
        let color = cmd
            .color
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let line_no = next_line_no(self.items.len())?;
        Ok(vec![PurchasePlanEvent::PlanItemAdded(PlanItemAdded {
            tenant_id: cmd.tenant_id,
            plan_id: cmd.plan_id,
            item: PlanItem {
                line_no,
                material_id: cmd.material_id,
                expected_quantity,
                color,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangePlanStatus,
    ) -> Result<Vec<PurchasePlanEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.plan_id)?;

        if self.status == cmd.status {
            return Ok(vec![]);
        }
        if !self.status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "cannot move purchase plan from {:?} to {:?}",
                self.status, cmd.status
            )));
        }

        Ok(vec![PurchasePlanEvent::PlanStatusChanged(PlanStatusChanged {
            tenant_id: cmd.tenant_id,
            plan_id: cmd.plan_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_lock(
        &self,
        cmd: &LockPlanForReceiving,
    ) -> Result<Vec<PurchasePlanEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.plan_id)?;

        if !self.status.accepts_receiving() {
            return Err(DomainError::invalid_field(
                "plan_id",
                format!("purchase plan is {:?} and cannot be received", self.status),
            ));
        }
        if self.locked_by.is_some() {
            return Ok(vec![]);
        }

        Ok(vec![PurchasePlanEvent::PlanLockedForReceiving(
            PlanLockedForReceiving {
                tenant_id: cmd.tenant_id,
                plan_id: cmd.plan_id,
                receiving_record: cmd.receiving_record,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
