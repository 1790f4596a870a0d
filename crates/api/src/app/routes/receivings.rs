use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use goodsin_auth::Permission;
use goodsin_catalog::MaterialId;
use goodsin_infra::command_dispatcher::DispatchError;
use goodsin_infra::services::OpenReceivingRequest;
use goodsin_invoicing::InvoiceId;
use goodsin_purchasing::PurchasePlanId;
use goodsin_receiving::ReceivingRecordId;

use crate::app::routes::common::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_receiving))
        .route("/:id", get(get_receiving))
        .route("/:id/items", post(add_received_item))
        .route("/:id/reconcile", get(reconcile))
        .route("/:id/inspection", post(start_inspection))
}

pub async fn open_receiving(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenReceivingBody>,
) -> Response {
    let plan_id: PurchasePlanId = match errors::parse_id(&body.plan_id, "plan_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let invoice_id: InvoiceId = match errors::parse_id(&body.invoice_id, "invoice_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let input = OpenReceivingRequest {
        plan_id,
        invoice_id,
        notes: body.notes,
    };
    let input = match authorized(&tenant, &principal, Permission::RECEIVING_WRITE, input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .goods_in
        .open_receiving(tenant.tenant_id(), principal.user_id(), input)
    {
        Ok(record) => {
            (StatusCode::CREATED, Json(dto::ReceivingResponse::from(&record))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_receiving(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let record_id: ReceivingRecordId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.get_receiving(tenant.tenant_id(), record_id) {
        Ok(record) => Json(dto::ReceivingResponse::from(&record)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_received_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddReceivedItemRequest>,
) -> Response {
    let record_id: ReceivingRecordId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let material_id: MaterialId = match errors::parse_id(&body.material_id, "material_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let quantity = match authorized(&tenant, &principal, Permission::RECEIVING_WRITE, body.quantity) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .goods_in
        .add_received_item(tenant.tenant_id(), record_id, material_id, quantity)
    {
        Ok(record) => Json(dto::ReceivingResponse::from(&record)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Divergence report: one entry per material whose plan, invoice and counted
/// quantities disagree. Read-only.
pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let record_id: ReceivingRecordId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.reconcile(tenant.tenant_id(), record_id) {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn start_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let record_id: ReceivingRecordId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record_id = match authorized(&tenant, &principal, Permission::QUALITY_WRITE, record_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .goods_in
        .start_inspection(tenant.tenant_id(), principal.user_id(), record_id)
    {
        Ok(inspection) => (
            StatusCode::CREATED,
            Json(json!({
                "inspection_id": inspection.id_typed().to_string(),
                "record_id": record_id.to_string(),
            })),
        )
            .into_response(),
        Err(DispatchError::Conflict(message)) => {
            // Point the loser at the inspection that won.
            let existing = services
                .goods_in
                .inspection_of(tenant.tenant_id(), record_id)
                .ok()
                .flatten()
                .map(|id| id.to_string());
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "conflict",
                    "message": message,
                    "inspection_id": existing,
                })),
            )
                .into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
