//! Business roster handlers. Admin-only.

use axum::{extract::State, Extension, Json};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    handlers::auth::ErrorResponse,
    helpers::get_business_id,
    models::Member,
    schema::members,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "bob@example.com")]
    pub email: String,
    #[schema(example = "Bob Jones")]
    pub name: String,
    #[schema(example = "member")]
    pub role: String,
    #[schema(example = "active")]
    pub status: String,
    pub invited_at: NaiveDateTime,
}

impl From<Member> for MemberResponse {
    fn from(m: Member) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            email: m.email,
            name: m.name,
            role: m.role,
            status: m.status,
            invited_at: m.invited_at,
        }
    }
}

/// Lists the members of the caller's business.
#[utoipa::path(
    get,
    path = "/members",
    tag = "Members",
    responses(
        (status = 200, description = "Business roster", body = Vec<MemberResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let business_id = get_business_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let results: Vec<Member> = members::table
        .filter(members::business_id.eq(business_id))
        .order(members::email.asc())
        .load(&mut conn)
        .map_err(|e| {
            error!(error = %e, "Failed to list members");
            ApiError::db_error()
        })?;

    Ok(Json(results.into_iter().map(Into::into).collect()))
}
