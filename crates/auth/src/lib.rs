//! `goodsin-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage. The API layer verifies a bearer token with a
//! [`JwtValidator`], then checks command permissions with [`authorize`].

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::{Role, permissions_for_roles};
