use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use goodsin_auth::Permission;
use goodsin_catalog::DefectId;
use goodsin_infra::services::RegisterDefectRequest;
use goodsin_quality::QualityInspectionId;

use crate::app::routes::common::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_inspection))
        .route("/:id/items/:item_no/defects", post(register_defect))
}

pub async fn get_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let inspection_id: QualityInspectionId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.get_inspection(tenant.tenant_id(), inspection_id) {
        Ok(inspection) => Json(dto::InspectionResponse::from(&inspection)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Register a defective quantity on one inspected item.
///
/// 400 when the item's defect total would exceed its counted quantity.
pub async fn register_defect(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, item_no)): Path<(String, String)>,
    Json(body): Json<dto::RegisterDefectBody>,
) -> Response {
    let inspection_id: QualityInspectionId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_no: u32 = match errors::parse_id(&item_no, "item_no") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let defect_id: DefectId = match errors::parse_id(&body.defect_id, "defect_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request = RegisterDefectRequest {
        item_no,
        defect_id,
        quantity: body.quantity,
    };
    let request = match authorized(&tenant, &principal, Permission::QUALITY_WRITE, request) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.register_defect(
        tenant.tenant_id(),
        principal.user_id(),
        inspection_id,
        request,
    ) {
        Ok(item) => Json(dto::RegisterDefectResponse {
            inspection_id: inspection_id.to_string(),
            item: dto::InspectionItemResponse::from(&item),
        })
        .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
