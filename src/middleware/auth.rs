//! Authentication middleware.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::ROLE_ADMIN;
use crate::AppState;

/// Validates JWT access tokens and stores claims in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(
                    json!({"error": "Missing authorization header", "code": "MISSING_AUTH_HEADER"}),
                ),
            )
                .into_response()
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid authorization header format", "code": "INVALID_AUTH_FORMAT"})),
        )
            .into_response()
    })?;

    let claims = state.jwt_config.verify_access_token(token).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid or expired token", "code": "INVALID_TOKEN"})),
        )
            .into_response()
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Requires business context in the token.
///
/// Users that authenticated but were never provisioned into a business
/// (the degraded no-business state) are rejected here.
pub async fn business_auth_middleware(req: Request, next: Next) -> Result<Response, Response> {
    let claims = req.extensions().get::<crate::auth::jwt::Claims>().cloned();

    match claims {
        Some(c) if c.business_id.is_some() => Ok(next.run(req).await),
        _ => Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Your account is not linked to a business. Sign up with a business name or ask an admin for an invite.", "code": "NO_BUSINESS"})),
        )
            .into_response()),
    }
}

/// Requires the admin role within the business context.
pub async fn admin_auth_middleware(req: Request, next: Next) -> Result<Response, Response> {
    let claims = req.extensions().get::<crate::auth::jwt::Claims>().cloned();

    match claims {
        Some(c) if c.role.as_deref() == Some(ROLE_ADMIN) => Ok(next.run(req).await),
        _ => Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Admin role required", "code": "ADMIN_REQUIRED"})),
        )
            .into_response()),
    }
}
