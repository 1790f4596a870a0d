use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goodsin_catalog::{Defect, Material, MaterialId, Supplier, UnitOfMeasure};
use goodsin_core::{Quantity, UserId};
use goodsin_infra::services::{NewInvoiceItem, NewPlanItem};
use goodsin_invoicing::Invoice;
use goodsin_purchasing::{PurchasePlan, PurchasePlanStatus};
use goodsin_quality::{DefectRecord, InspectionItem, QualityInspection};
use goodsin_receiving::{ReceivedItem, ReceivingRecord};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateMaterialRequest {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub unit: UnitOfMeasure,
}

#[derive(Debug, Deserialize)]
pub struct CreateDefectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub cnpj: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanItemRequest {
    pub material_id: String,
    pub quantity: Quantity,
    pub color: Option<String>,
}

impl PlanItemRequest {
    pub fn into_new(self) -> Result<NewPlanItem, axum::response::Response> {
        Ok(NewPlanItem {
            material_id: errors::parse_id::<MaterialId>(&self.material_id, "material_id")?,
            expected_quantity: self.quantity,
            color: self.color,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub code: String,
    pub supplier_id: String,
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<PlanItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanStatusRequest {
    pub status: PurchasePlanStatus,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceItemRequest {
    pub material_id: String,
    pub quantity: Quantity,
    #[serde(default)]
    pub unit_value: Decimal,
}

impl InvoiceItemRequest {
    pub fn into_new(self) -> Result<NewInvoiceItem, axum::response::Response> {
        Ok(NewInvoiceItem {
            material_id: errors::parse_id::<MaterialId>(&self.material_id, "material_id")?,
            quantity: self.quantity,
            unit_value: self.unit_value,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub supplier_id: String,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    #[serde(default)]
    pub total_value: Decimal,
    #[serde(default)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OpenReceivingBody {
    pub plan_id: String,
    pub invoice_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddReceivedItemRequest {
    pub material_id: String,
    pub quantity: Quantity,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDefectBody {
    pub defect_id: String,
    pub quantity: Quantity,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MaterialResponse {
    pub id: String,
    pub code: String,
    pub description: String,
    pub unit: UnitOfMeasure,
}

impl From<&Material> for MaterialResponse {
    fn from(m: &Material) -> Self {
        Self {
            id: m.id_typed().to_string(),
            code: m.code().to_string(),
            description: m.description().to_string(),
            unit: m.unit(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DefectResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Defect> for DefectResponse {
    fn from(d: &Defect) -> Self {
        Self {
            id: d.id_typed().to_string(),
            name: d.name().to_string(),
            description: d.description().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SupplierResponse {
    pub id: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub display_name: String,
    pub cnpj: Option<String>,
}

impl From<&Supplier> for SupplierResponse {
    fn from(s: &Supplier) -> Self {
        Self {
            id: s.id_typed().to_string(),
            legal_name: s.legal_name().to_string(),
            trade_name: s.trade_name().map(str::to_string),
            display_name: s.display_name().to_string(),
            cnpj: s.cnpj().map(|c| c.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanItemResponse {
    pub line_no: u32,
    pub material_id: String,
    pub expected_quantity: Quantity,
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub id: String,
    pub code: String,
    pub supplier_id: Option<String>,
    pub status: PurchasePlanStatus,
    pub created_by: Option<UserId>,
    pub expected_delivery: Option<NaiveDate>,
    pub locked: bool,
    pub items: Vec<PlanItemResponse>,
}

impl From<&PurchasePlan> for PlanResponse {
    fn from(p: &PurchasePlan) -> Self {
        Self {
            id: p.id_typed().to_string(),
            code: p.code().to_string(),
            supplier_id: p.supplier_id().map(|id| id.to_string()),
            status: p.status(),
            created_by: p.created_by(),
            expected_delivery: p.expected_delivery(),
            locked: p.is_locked(),
            items: p
                .items()
                .iter()
                .map(|i| PlanItemResponse {
                    line_no: i.line_no,
                    material_id: i.material_id.to_string(),
                    expected_quantity: i.expected_quantity,
                    color: i.color.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceItemResponse {
    pub line_no: u32,
    pub material_id: String,
    pub quantity: Quantity,
    pub unit_value: Decimal,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub supplier_id: Option<String>,
    pub number: String,
    pub issued_on: Option<NaiveDate>,
    pub total_value: Decimal,
    pub locked: bool,
    pub items: Vec<InvoiceItemResponse>,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(inv: &Invoice) -> Self {
        Self {
            id: inv.id_typed().to_string(),
            supplier_id: inv.supplier_id().map(|id| id.to_string()),
            number: inv.number().to_string(),
            issued_on: inv.issued_on(),
            total_value: inv.total_value(),
            locked: inv.is_locked(),
            items: inv
                .items()
                .iter()
                .map(|i| InvoiceItemResponse {
                    line_no: i.line_no,
                    material_id: i.material_id.to_string(),
                    quantity: i.quantity,
                    unit_value: i.unit_value,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceivedItemResponse {
    pub line_no: u32,
    pub material_id: String,
    pub counted_quantity: Quantity,
}

impl From<&ReceivedItem> for ReceivedItemResponse {
    fn from(i: &ReceivedItem) -> Self {
        Self {
            line_no: i.line_no,
            material_id: i.material_id.to_string(),
            counted_quantity: i.counted_quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceivingResponse {
    pub id: String,
    pub plan_id: Option<String>,
    pub invoice_id: Option<String>,
    pub received_by: Option<UserId>,
    pub received_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub inspection_id: Option<String>,
    pub items: Vec<ReceivedItemResponse>,
}

impl From<&ReceivingRecord> for ReceivingResponse {
    fn from(r: &ReceivingRecord) -> Self {
        Self {
            id: r.id_typed().to_string(),
            plan_id: r.plan_id().map(|id| id.to_string()),
            invoice_id: r.invoice_id().map(|id| id.to_string()),
            received_by: r.received_by(),
            received_at: r.received_at(),
            notes: r.notes().to_string(),
            inspection_id: r.inspection_id().map(|id| id.to_string()),
            items: r.items().iter().map(ReceivedItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DefectRecordResponse {
    pub defect_id: String,
    pub quantity: Quantity,
    pub registered_by: UserId,
    pub registered_at: DateTime<Utc>,
}

impl From<&DefectRecord> for DefectRecordResponse {
    fn from(d: &DefectRecord) -> Self {
        Self {
            defect_id: d.defect_id.to_string(),
            quantity: d.defective_quantity,
            registered_by: d.registered_by,
            registered_at: d.registered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InspectionItemResponse {
    pub item_no: u32,
    pub material_id: String,
    pub counted_quantity: Quantity,
    pub defective_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub defects: Vec<DefectRecordResponse>,
}

impl From<&InspectionItem> for InspectionItemResponse {
    fn from(i: &InspectionItem) -> Self {
        Self {
            item_no: i.item_no,
            material_id: i.material_id.to_string(),
            counted_quantity: i.counted_quantity,
            defective_quantity: i.defective_quantity(),
            remaining_quantity: i.remaining_quantity(),
            defects: i.defects.iter().map(DefectRecordResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InspectionResponse {
    pub id: String,
    pub record_id: Option<String>,
    pub inspector: Option<UserId>,
    pub started_at: Option<DateTime<Utc>>,
    pub items: Vec<InspectionItemResponse>,
}

impl From<&QualityInspection> for InspectionResponse {
    fn from(q: &QualityInspection) -> Self {
        Self {
            id: q.id_typed().to_string(),
            record_id: q.record_id().map(|id| id.to_string()),
            inspector: q.inspector(),
            started_at: q.started_at(),
            items: q.items().iter().map(InspectionItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterDefectResponse {
    pub inspection_id: String,
    #[serde(flatten)]
    pub item: InspectionItemResponse,
}
