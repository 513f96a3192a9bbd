//! Shared helper functions for handlers.

use axum::{http::StatusCode, Json};
use uuid::Uuid;

use crate::auth::jwt::Claims;
use crate::error::ApiError;

pub fn get_business_id(claims: &Claims) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
    claims
        .business_id
        .as_ref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| ApiError::forbidden("No business context", "NO_BUSINESS"))
}

pub fn get_user_id(claims: &Claims) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))
}
