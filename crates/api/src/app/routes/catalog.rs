use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use goodsin_auth::Permission;
use goodsin_catalog::{DefectId, MaterialId, SupplierId};
use goodsin_infra::services::{NewDefectType, NewMaterial, NewSupplier};

use crate::app::routes::common::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn materials_router() -> Router {
    Router::new()
        .route("/", post(create_material))
        .route("/:id", get(get_material))
}

pub fn defects_router() -> Router {
    Router::new()
        .route("/", post(create_defect).get(list_defects))
        .route("/:id", get(get_defect))
}

pub fn suppliers_router() -> Router {
    Router::new()
        .route("/", post(create_supplier).get(list_suppliers))
        .route("/:id", get(get_supplier))
}

pub async fn create_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateMaterialRequest>,
) -> Response {
    let input = NewMaterial {
        code: body.code,
        description: body.description,
        unit: body.unit,
    };
    let input = match authorized(&tenant, &principal, Permission::CATALOG_WRITE, input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.register_material(tenant.tenant_id(), input) {
        Ok(material) => (
            StatusCode::CREATED,
            Json(dto::MaterialResponse::from(&material)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let material_id: MaterialId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.get_material(tenant.tenant_id(), material_id) {
        Ok(material) => Json(dto::MaterialResponse::from(&material)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn create_defect(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateDefectRequest>,
) -> Response {
    let input = NewDefectType {
        name: body.name,
        description: body.description,
    };
    let input = match authorized(&tenant, &principal, Permission::CATALOG_WRITE, input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.register_defect_type(tenant.tenant_id(), input) {
        Ok(defect) => (StatusCode::CREATED, Json(dto::DefectResponse::from(&defect))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_defect(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let defect_id: DefectId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.get_defect_type(tenant.tenant_id(), defect_id) {
        Ok(defect) => Json(dto::DefectResponse::from(&defect)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_defects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    match services.goods_in.list_defect_types(tenant.tenant_id()) {
        Ok(defects) => Json(
            defects
                .iter()
                .map(dto::DefectResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateSupplierRequest>,
) -> Response {
    let input = NewSupplier {
        legal_name: body.legal_name,
        trade_name: body.trade_name,
        cnpj: body.cnpj,
    };
    let input = match authorized(&tenant, &principal, Permission::PURCHASING_WRITE, input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.register_supplier(tenant.tenant_id(), input) {
        Ok(supplier) => (
            StatusCode::CREATED,
            Json(dto::SupplierResponse::from(&supplier)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    match services.goods_in.list_suppliers(tenant.tenant_id()) {
        Ok(suppliers) => Json(
            suppliers
                .iter()
                .map(dto::SupplierResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let supplier_id: SupplierId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.get_supplier(tenant.tenant_id(), supplier_id) {
        Ok(supplier) => Json(dto::SupplierResponse::from(&supplier)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
