//! Who is acting on the goods-in dock.
//!
//! A principal is a receiving clerk, a quality inspector, a buyer, or a service
//! account, always scoped to one company (tenant). Its id becomes the
//! [`UserId`] recorded as `received_by`, `inspector` or `registered_by`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use goodsin_core::{TenantId, UserId};

/// Identity of an authenticated principal (clerk, inspector, buyer, service account).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// The authenticated principal acts as the domain user recorded on events.
impl From<PrincipalId> for UserId {
    fn from(value: PrincipalId) -> Self {
        UserId::from_uuid(value.0)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A principal's membership in a tenant: which roles and permissions apply there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<crate::Role>,
    pub permissions: Vec<crate::Permission>,
}
