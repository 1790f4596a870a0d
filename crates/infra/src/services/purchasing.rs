use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;

use goodsin_catalog::{MaterialId, SupplierId};
use goodsin_core::{Quantity, TenantId, UserId};
use goodsin_events::{EventBus, EventEnvelope};
use goodsin_purchasing::{
    AddPlanItem, ChangePlanStatus, CreatePurchasePlan, PurchasePlan, PurchasePlanCommand,
    PurchasePlanId, PurchasePlanStatus,
};

use super::{GoodsInService, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

#[derive(Debug, Clone)]
pub struct NewPlanItem {
    pub material_id: MaterialId,
    pub expected_quantity: Quantity,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub code: String,
    pub supplier_id: SupplierId,
    pub expected_delivery: Option<NaiveDate>,
    pub items: Vec<NewPlanItem>,
}

impl<S, B> GoodsInService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create a plan and its initial items.
    ///
    /// The supplier and every referenced material are resolved before anything
    /// is written.
    pub fn create_plan(
        &self,
        tenant_id: TenantId,
        created_by: UserId,
        input: NewPlan,
    ) -> Result<PurchasePlan, DispatchError> {
        self.require_supplier(tenant_id, input.supplier_id, "supplier_id")?;
        for (idx, item) in input.items.iter().enumerate() {
            self.require_material(tenant_id, item.material_id, &format!("items[{idx}].material_id"))?;
            item.expected_quantity
                .ensure_positive(&format!("items[{idx}].expected_quantity"))?;
        }

        let plan_id = PurchasePlanId::generate();
        let mut plan = self.execute(
            tenant_id,
            plan_id.aggregate_id(),
            aggregate_types::PURCHASE_PLAN,
            PurchasePlanCommand::CreatePurchasePlan(CreatePurchasePlan {
                tenant_id,
                plan_id,
                code: input.code,
                supplier_id: input.supplier_id,
                created_by,
                expected_delivery: input.expected_delivery,
                occurred_at: Utc::now(),
            }),
            move |_, _| PurchasePlan::empty(plan_id),
        )?;

        for item in input.items {
            plan = self.dispatch_plan_item(tenant_id, plan_id, item)?;
        }

        Ok(plan)
    }

    pub fn add_plan_item(
        &self,
        tenant_id: TenantId,
        plan_id: PurchasePlanId,
        item: NewPlanItem,
    ) -> Result<PurchasePlan, DispatchError> {
        self.require_material(tenant_id, item.material_id, "material_id")?;
        self.dispatch_plan_item(tenant_id, plan_id, item)
    }

    pub fn change_plan_status(
        &self,
        tenant_id: TenantId,
        plan_id: PurchasePlanId,
        status: PurchasePlanStatus,
    ) -> Result<PurchasePlan, DispatchError> {
        self.execute(
            tenant_id,
            plan_id.aggregate_id(),
            aggregate_types::PURCHASE_PLAN,
            PurchasePlanCommand::ChangePlanStatus(ChangePlanStatus {
                tenant_id,
                plan_id,
                status,
                occurred_at: Utc::now(),
            }),
            move |_, _| PurchasePlan::empty(plan_id),
        )
    }

    pub fn get_plan(
        &self,
        tenant_id: TenantId,
        plan_id: PurchasePlanId,
    ) -> Result<PurchasePlan, DispatchError> {
        self.load_existing(
            tenant_id,
            plan_id.aggregate_id(),
            aggregate_types::PURCHASE_PLAN,
            "purchase plan",
            |_, _| PurchasePlan::empty(plan_id),
            PurchasePlan::is_created,
        )
    }

    fn dispatch_plan_item(
        &self,
        tenant_id: TenantId,
        plan_id: PurchasePlanId,
        item: NewPlanItem,
    ) -> Result<PurchasePlan, DispatchError> {
        self.execute(
            tenant_id,
            plan_id.aggregate_id(),
            aggregate_types::PURCHASE_PLAN,
            PurchasePlanCommand::AddPlanItem(AddPlanItem {
                tenant_id,
                plan_id,
                material_id: item.material_id,
                expected_quantity: item.expected_quantity,
                color: item.color,
                occurred_at: Utc::now(),
            }),
            move |_, _| PurchasePlan::empty(plan_id),
        )
    }
}
