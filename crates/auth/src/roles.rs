use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC (a user group in the tenant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role→permission policy.
///
/// - `admin`: everything
/// - `purchasing`: catalog, plans and invoices
/// - `receiving`: receiving records, plus opening inspections on them
/// - `quality`: inspections and defect registration
///
/// Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out: Vec<Permission> = Vec::new();
    for role in roles {
        let granted: Vec<Permission> = match role.as_str() {
            "admin" => return vec![Permission::WILDCARD],
            "purchasing" => vec![
                Permission::CATALOG_WRITE,
                Permission::PURCHASING_WRITE,
                Permission::INVOICING_WRITE,
            ],
            "receiving" => vec![Permission::RECEIVING_WRITE, Permission::QUALITY_WRITE],
            "quality" => vec![Permission::QUALITY_WRITE, Permission::CATALOG_WRITE],
            _ => Vec::new(),
        };
        for p in granted {
            if !out.contains(&p) {
                out.push(p);
            }
        }
    }
    out
}
