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
use goodsin_infra::services::NewInvoice;
use goodsin_invoicing::InvoiceId;

use crate::app::routes::common::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_invoice))
        .route("/:id", get(get_invoice))
        .route("/:id/items", post(add_invoice_item))
}

pub async fn register_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> Response {
    let supplier_id: SupplierId = match errors::parse_id(&body.supplier_id, "supplier_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let items = match body
        .items
        .into_iter()
        .map(dto::InvoiceItemRequest::into_new)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let input = NewInvoice {
        supplier_id,
        number: body.number,
        issued_on: body.issued_on,
        total_value: body.total_value,
        items,
    };
    let input = match authorized(&tenant, &principal, Permission::INVOICING_WRITE, input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.register_invoice(tenant.tenant_id(), input) {
        Ok(invoice) => {
            (StatusCode::CREATED, Json(dto::InvoiceResponse::from(&invoice))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let invoice_id: InvoiceId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.goods_in.get_invoice(tenant.tenant_id(), invoice_id) {
        Ok(invoice) => Json(dto::InvoiceResponse::from(&invoice)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_invoice_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::InvoiceItemRequest>,
) -> Response {
    let invoice_id: InvoiceId = match errors::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item = match body.into_new() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item = match authorized(&tenant, &principal, Permission::INVOICING_WRITE, item) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .goods_in
        .add_invoice_item(tenant.tenant_id(), invoice_id, item)
    {
        Ok(invoice) => Json(dto::InvoiceResponse::from(&invoice)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
