use axum::response::Response;

use goodsin_auth::{CommandAuthorization, Permission};

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Authorize `inner` for `permission`, handing it back on success and a 403
/// response otherwise.
pub fn authorized<C>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: Permission,
    inner: C,
) -> Result<C, Response> {
    let cmd_auth = CmdAuth {
        inner,
        required: vec![permission],
    };
    crate::authz::authorize_command(tenant, principal, &cmd_auth).map_err(errors::forbidden)?;
    Ok(cmd_auth.inner)
}
