//! Per-request context extracted from the bearer token.
//!
//! Every goods-in route runs for one company (tenant) and one principal: the
//! clerk counting a delivery, the inspector booking defects, or the buyer
//! registering plans and invoices. Handlers never read tenant ids from bodies.

use goodsin_auth::{PrincipalId, Role};
use goodsin_core::{TenantId, UserId};

/// Company whose plans, invoices and receiving records this request may touch.
///
/// Immutable and present on every goods-in route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    /// The principal as the actor recorded on domain events
    /// (`received_by`, `inspector`, `registered_by`).
    pub fn user_id(&self) -> UserId {
        self.principal_id.into()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
