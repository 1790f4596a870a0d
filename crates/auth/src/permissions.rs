use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. "receiving.write").
///
/// The wildcard `"*"` grants everything within the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    /// Register materials and defect types.
    pub const CATALOG_WRITE: Permission = Permission(Cow::Borrowed("catalog.write"));
    pub const PURCHASING_WRITE: Permission = Permission(Cow::Borrowed("purchasing.write"));
    pub const INVOICING_WRITE: Permission = Permission(Cow::Borrowed("invoicing.write"));
    /// Open receiving records and append counts.
    pub const RECEIVING_WRITE: Permission = Permission(Cow::Borrowed("receiving.write"));
    /// Start inspections and register defects.
    pub const QUALITY_WRITE: Permission = Permission(Cow::Borrowed("quality.write"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
