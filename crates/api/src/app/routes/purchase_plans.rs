use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use goodsin_auth::Permission;
use goodsin_catalog::SupplierId;
use goodsin_infra::services::NewPlan;
use goodsin_purchasing::PurchasePlanId;

use crate::app::routes::common::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_plan))
        .route("/:id", get(get_plan))
        .route("/:id/items", post(add_plan_item))
        .route("/:id/status", post(change_plan_status))
}

pub async fn create_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreatePlanRequest>,
) -> Response {
    let supplier_id: SupplierId = match errors::parse_id(&body.supplier_id, "supplier_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let items = match body
        .items
        .into_iter()
        .map(dto::PlanItemRequest::into_new)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let input = NewPlan {
        code: body.code,
        supplier_id,
        expected_delivery: body.expected_delivery,
        items,
    };
    let input = match authorized(&tenant, &principal, Permission::PURCHASING_WRITE, input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .goods_in
        .create_plan(tenant.tenant_id(), principal.user_id(), input)
    {
        Ok(plan) => (StatusCode::CREATED, Json(dto::PlanResponse::from(&plan))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let plan_id: PurchasePlanId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.get_plan(tenant.tenant_id(), plan_id) {
        Ok(plan) => Json(dto::PlanResponse::from(&plan)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_plan_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PlanItemRequest>,
) -> Response {
    let plan_id: PurchasePlanId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item = match body.into_new() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item = match authorized(&tenant, &principal, Permission::PURCHASING_WRITE, item) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.add_plan_item(tenant.tenant_id(), plan_id, item) {
        Ok(plan) => Json(dto::PlanResponse::from(&plan)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn change_plan_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangePlanStatusRequest>,
) -> Response {
    let plan_id: PurchasePlanId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match authorized(&tenant, &principal, Permission::PURCHASING_WRITE, body.status) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .goods_in
        .change_plan_status(tenant.tenant_id(), plan_id, status)
    {
        Ok(plan) => Json(dto::PlanResponse::from(&plan)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
