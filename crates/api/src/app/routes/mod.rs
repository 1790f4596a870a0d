use axum::{routing::get, Router};

pub mod catalog;
pub mod common;
pub mod inspections;
pub mod invoices;
pub mod purchase_plans;
pub mod receivings;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/materials", catalog::materials_router())
        .nest("/defects", catalog::defects_router())
        .nest("/suppliers", catalog::suppliers_router())
        .nest("/purchase-plans", purchase_plans::router())
        .nest("/invoices", invoices::router())
        .nest("/receivings", receivings::router())
        .nest("/inspections", inspections::router())
}
