use chrono::Utc;
use serde_json::Value as JsonValue;

use goodsin_catalog::DefectId;
use goodsin_core::{Quantity, TenantId, UserId};
use goodsin_events::{EventBus, EventEnvelope};
use goodsin_quality::{
    InspectionCommand, InspectionItem, OpenInspection, QualityInspection, QualityInspectionId,
    RegisterDefect,
};
use goodsin_receiving::{ReceivingCommand, ReceivingRecord, ReceivingRecordId, StartInspection};

use super::{GoodsInService, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

#[derive(Debug, Clone)]
pub struct RegisterDefectRequest {
    pub item_no: u32,
    pub defect_id: DefectId,
    pub quantity: Quantity,
}

impl<S, B> GoodsInService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Start the one quality inspection a receiving record may have.
    ///
    /// The link is committed on the record stream first; that append is what
    /// makes concurrent callers race for a single version, so exactly one of them
    /// wins and the rest get [`DispatchError::Conflict`]. The inspection stream is
    /// then opened from the items captured by the winning append.
    pub fn start_inspection(
        &self,
        tenant_id: TenantId,
        inspector: UserId,
        record_id: ReceivingRecordId,
    ) -> Result<QualityInspection, DispatchError> {
        let inspection_id = QualityInspectionId::generate();

        let record = self.execute(
            tenant_id,
            record_id.aggregate_id(),
            aggregate_types::RECEIVING_RECORD,
            ReceivingCommand::StartInspection(StartInspection {
                tenant_id,
                record_id,
                inspection_id: inspection_id.aggregate_id(),
                inspector,
                occurred_at: Utc::now(),
            }),
            move |_, _| ReceivingRecord::empty(record_id),
        )?;

        self.execute(
            tenant_id,
            inspection_id.aggregate_id(),
            aggregate_types::QUALITY_INSPECTION,
            InspectionCommand::OpenInspection(OpenInspection {
                tenant_id,
                inspection_id,
                record_id,
                inspector,
                items: record.items().to_vec(),
                occurred_at: Utc::now(),
            }),
            move |_, _| QualityInspection::empty(inspection_id),
        )
    }

    /// Inspection already linked to a record, if any.
    pub fn inspection_of(
        &self,
        tenant_id: TenantId,
        record_id: ReceivingRecordId,
    ) -> Result<Option<QualityInspectionId>, DispatchError> {
        let record = self.get_receiving(tenant_id, record_id)?;
        Ok(record.inspection_id().map(QualityInspectionId::new))
    }

    pub fn get_inspection(
        &self,
        tenant_id: TenantId,
        inspection_id: QualityInspectionId,
    ) -> Result<QualityInspection, DispatchError> {
        self.load_existing(
            tenant_id,
            inspection_id.aggregate_id(),
            aggregate_types::QUALITY_INSPECTION,
            "inspection",
            |_, _| QualityInspection::empty(inspection_id),
            QualityInspection::is_created,
        )
    }

    /// Record a defective quantity against one inspected item.
    ///
    /// Returns the item with its full defect list as of the committed append.
    /// Concurrent registrations on the same inspection serialize through the
    /// stream version; a caller that loses the race is re-validated against the
    /// winner's total.
    pub fn register_defect(
        &self,
        tenant_id: TenantId,
        registered_by: UserId,
        inspection_id: QualityInspectionId,
        request: RegisterDefectRequest,
    ) -> Result<InspectionItem, DispatchError> {
        self.get_inspection(tenant_id, inspection_id)?;

        match self.get_defect_type(tenant_id, request.defect_id) {
            Ok(_) => {}
            Err(DispatchError::NotFound(_)) => {
                return Err(DispatchError::invalid_field(
                    "defect_id",
                    format!("unknown defect type {}", request.defect_id),
                ));
            }
            Err(e) => return Err(e),
        }

        let item_no = request.item_no;
        let inspection = self.execute(
            tenant_id,
            inspection_id.aggregate_id(),
            aggregate_types::QUALITY_INSPECTION,
            InspectionCommand::RegisterDefect(RegisterDefect {
                tenant_id,
                inspection_id,
                item_no,
                defect_id: request.defect_id,
                defective_quantity: request.quantity,
                registered_by,
                occurred_at: Utc::now(),
            }),
            move |_, _| QualityInspection::empty(inspection_id),
        )?;

        inspection
            .item(item_no)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(format!("inspection item {item_no}")))
    }
}
