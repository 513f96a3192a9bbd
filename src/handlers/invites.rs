//! Invite management handlers. Admin-only.
//!
//! An invite is a single-use, email-scoped credential for joining a
//! business. Redemption (and deletion-on-redemption) lives in the
//! registration flow; these handlers cover issuance, listing and manual
//! revocation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    handlers::auth::ErrorResponse,
    helpers::{get_business_id, get_user_id},
    models::{is_valid_role, Invite, NewInvite},
    schema::invites,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInviteRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "bob@example.com")]
    pub email: String,
    #[schema(example = "member")]
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InviteResponse {
    pub id: Uuid,
    #[schema(example = "bob@example.com")]
    pub email: String,
    #[schema(example = "member")]
    pub role: String,
    /// Redemption link to hand to the invitee.
    #[schema(example = "http://localhost:3000/login?invite=2f4c...")]
    pub link: String,
    pub created_at: NaiveDateTime,
}

fn invite_link(base_url: &str, invite_id: Uuid) -> String {
    format!("{}/login?invite={}", base_url.trim_end_matches('/'), invite_id)
}

fn to_response(invite: Invite, base_url: &str) -> InviteResponse {
    InviteResponse {
        link: invite_link(base_url, invite.id),
        id: invite.id,
        email: invite.email,
        role: invite.role,
        created_at: invite.created_at,
    }
}

/// Creates an invite for the caller's business.
#[utoipa::path(
    post,
    path = "/invites",
    tag = "Invites",
    request_body = CreateInviteRequest,
    responses(
        (status = 201, description = "Invite created", body = InviteResponse),
        (status = 400, description = "Validation error or invalid role", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<InviteResponse>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    if !is_valid_role(&payload.role) {
        return Err(ApiError::bad_request(
            "Role must be 'admin' or 'member'",
            "INVALID_ROLE",
        ));
    }

    let business_id = get_business_id(&claims)?;
    let created_by = get_user_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    // Stored lowercase; redemption compares case-insensitively anyway.
    let invite: Invite = diesel::insert_into(invites::table)
        .values(&NewInvite {
            business_id,
            email: payload.email.trim().to_lowercase(),
            role: payload.role,
            created_by,
        })
        .get_result(&mut conn)
        .map_err(|e| {
            error!(error = %e, business_id = %business_id, "Failed to create invite");
            ApiError::db_error()
        })?;

    info!(
        invite_id = %invite.id,
        business_id = %business_id,
        email = %invite.email,
        role = %invite.role,
        "Invite created"
    );

    Ok((
        StatusCode::CREATED,
        Json(to_response(invite, &state.invite_base_url)),
    ))
}

/// Lists outstanding invites for the caller's business.
#[utoipa::path(
    get,
    path = "/invites",
    tag = "Invites",
    responses(
        (status = 200, description = "Outstanding invites", body = Vec<InviteResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_invites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<InviteResponse>>> {
    let business_id = get_business_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let results: Vec<Invite> = invites::table
        .filter(invites::business_id.eq(business_id))
        .order(invites::created_at.desc())
        .load(&mut conn)
        .map_err(|e| {
            error!(error = %e, "Failed to list invites");
            ApiError::db_error()
        })?;

    Ok(Json(
        results
            .into_iter()
            .map(|i| to_response(i, &state.invite_base_url))
            .collect(),
    ))
}

/// Revokes an outstanding invite. Scoped to the caller's business, so an
/// admin cannot revoke another business's invite even with its ID.
#[utoipa::path(
    delete,
    path = "/invites/{invite_id}",
    tag = "Invites",
    params(("invite_id" = Uuid, Path, description = "Invite ID")),
    responses(
        (status = 204, description = "Invite revoked"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Invite not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(invite_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let business_id = get_business_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(
        invites::table
            .filter(invites::id.eq(invite_id))
            .filter(invites::business_id.eq(business_id)),
    )
    .execute(&mut conn)
    .map_err(|e| {
        error!(error = %e, "Failed to revoke invite");
        ApiError::db_error()
    })?;

    if deleted == 0 {
        return Err(ApiError::not_found("Invite not found", "INVITE_NOT_FOUND"));
    }

    info!(invite_id = %invite_id, business_id = %business_id, "Invite revoked");

    Ok(StatusCode::NO_CONTENT)
}
