use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use goodsin_auth::JwtValidator;

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Resolve the bearer token into tenant + principal request extensions.
///
/// Every failure is a 401; the reason is only logged.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let claims = match bearer_token(req.headers()).and_then(|token| {
        state
            .jwt
            .validate(token, Utc::now())
            .map_err(|e| e.to_string())
    }) {
        Ok(claims) => claims,
        Err(reason) => {
            tracing::warn!(%reason, path = %req.uri().path(), "rejecting request");
            return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid bearer token");
        }
    };

    tracing::debug!(
        tenant_id = %claims.tenant_id,
        principal_id = %claims.sub,
        "authenticated request"
    );

    req.extensions_mut().insert(TenantContext::new(claims.tenant_id));
    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.roles));

    next.run(req).await
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, String> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| "missing authorization header".to_string())?
        .to_str()
        .map_err(|_| "authorization header is not ascii".to_string())?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| "authorization scheme is not Bearer".to_string())?
        .trim();

    if token.is_empty() {
        return Err("empty bearer token".to_string());
    }
    Ok(token)
}
