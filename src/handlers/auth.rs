//! Authentication and account provisioning handlers.
//!
//! Registration is the entry point of the provisioning flow: an
//! authenticated identity plus an optional invite becomes a persisted
//! user/member pair. The founder path creates a fresh business with the
//! caller as admin; the invite path joins the caller to the invite's
//! business with its pre-assigned role and consumes the invite.

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        jwt::{Claims, JwtConfig},
        password::PasswordService,
    },
    error::{get_db_conn, ApiError, ApiResult},
    helpers::get_user_id,
    models::{
        Business, Invite, NewBusiness, NewMember, NewUser, User, ROLE_ADMIN, STATUS_ACTIVE,
    },
    schema::{businesses, invites, members, refresh_tokens, users},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "securepassword123", min_length = 8)]
    pub password: String,
    #[schema(example = "Alice Smith")]
    pub full_name: Option<String>,
    /// Required on the founder path (no invite).
    #[schema(example = "Acme Ltd")]
    pub business_name: Option<String>,
    /// Invite token from a redemption link; selects the invite path.
    pub invite_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "Alice Smith")]
    pub name: Option<String>,
    /// Absent for accounts not yet linked to a business.
    pub business_id: Option<Uuid>,
    #[schema(example = "admin")]
    pub role: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            business_id: user.business_id,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, Default)]
pub struct ErrorResponse {
    #[schema(example = "Invalid credentials")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "INVALID_CREDENTIALS")]
    pub code: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: chrono::NaiveDateTime,
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn store_refresh_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    token: &str,
    expires_in_days: i64,
) -> Result<(), diesel::result::Error> {
    let token_hash = hash_token(token);
    let expires_at = (Utc::now() + Duration::days(expires_in_days)).naive_utc();

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            user_id,
            token_hash,
            expires_at,
        })
        .execute(conn)?;

    Ok(())
}

fn verify_stored_token(conn: &mut PgConnection, token: &str) -> Result<Uuid, &'static str> {
    let token_hash = hash_token(token);
    let now = Utc::now().naive_utc();

    let result: Result<(Uuid, chrono::NaiveDateTime), _> = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&token_hash))
        .select((refresh_tokens::user_id, refresh_tokens::expires_at))
        .first(conn);

    match result {
        Ok((user_id, expires_at)) => {
            if expires_at < now {
                let _ = diesel::delete(
                    refresh_tokens::table.filter(refresh_tokens::token_hash.eq(&token_hash)),
                )
                .execute(conn);
                Err("Refresh token has expired")
            } else {
                Ok(user_id)
            }
        }
        Err(_) => Err("Invalid refresh token"),
    }
}

fn invalidate_token(conn: &mut PgConnection, token: &str) -> Result<(), diesel::result::Error> {
    let token_hash = hash_token(token);
    diesel::delete(refresh_tokens::table.filter(refresh_tokens::token_hash.eq(&token_hash)))
        .execute(conn)?;
    Ok(())
}

fn cleanup_expired_tokens(conn: &mut PgConnection, user_id: Uuid) {
    let now = Utc::now().naive_utc();
    let result = diesel::delete(
        refresh_tokens::table
            .filter(refresh_tokens::user_id.eq(user_id))
            .filter(refresh_tokens::expires_at.lt(now)),
    )
    .execute(conn);

    if let Ok(count) = result {
        if count > 0 {
            info!(user_id = %user_id, deleted_count = count, "Cleaned up expired refresh tokens");
        }
    }
}

fn generate_tokens(
    jwt_config: &Arc<JwtConfig>,
    conn: &mut PgConnection,
    user: &User,
) -> ApiResult<(String, String)> {
    let access_token = jwt_config
        .generate_access_token(user.id, &user.email, user.business_id, user.role.clone())
        .map_err(|e| {
            error!(error = %e, "Token generation failed");
            ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
        })?;

    let refresh_token = jwt_config.generate_refresh_token(user.id).map_err(|e| {
        error!(error = %e, "Token generation failed");
        ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
    })?;

    store_refresh_token(conn, user.id, &refresh_token, 7).map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        ApiError::internal("Token storage failed", "TOKEN_STORAGE_ERROR")
    })?;

    Ok((access_token, refresh_token))
}

/// Errors raised inside the provisioning transaction. Invite lookup and the
/// email check happen in the same transaction as the writes so that a
/// failure never leaves a consumed invite behind.
#[derive(Debug)]
enum ProvisionError {
    InvalidInvite,
    EmailMismatch,
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for ProvisionError {
    fn from(e: diesel::result::Error) -> Self {
        ProvisionError::Db(e)
    }
}

/// Invite path: joins the user to the invite's business with the invite's
/// pre-assigned role and consumes the invite. Redemption overwrites any
/// existing membership: a user already attached to another business is
/// moved, and their old member row is retired here. All writes plus the
/// invite delete are one transaction; the delete goes last so a failed
/// redemption leaves the invite intact and redeemable.
fn redeem_invite(
    conn: &mut PgConnection,
    user: &User,
    email: &str,
    name: &str,
    invite_id: Uuid,
) -> Result<(), ProvisionError> {
    conn.transaction::<_, ProvisionError, _>(|conn| {
        let invite: Option<Invite> = invites::table
            .find(invite_id)
            .first(conn)
            .optional()
            .map_err(ProvisionError::Db)?;

        // A redeemed (deleted) invite is indistinguishable from one that
        // never existed.
        let invite = invite.ok_or(ProvisionError::InvalidInvite)?;

        if !invite.email.eq_ignore_ascii_case(email) {
            return Err(ProvisionError::EmailMismatch);
        }

        // Retire any membership in a previous business before the move.
        diesel::delete(
            members::table
                .filter(members::user_id.eq(user.id))
                .filter(members::business_id.ne(invite.business_id)),
        )
        .execute(conn)?;

        diesel::insert_into(members::table)
            .values(&NewMember {
                business_id: invite.business_id,
                user_id: user.id,
                email: email.to_string(),
                name: name.to_string(),
                role: invite.role.clone(),
                status: STATUS_ACTIVE.to_string(),
            })
            .on_conflict((members::business_id, members::user_id))
            .do_update()
            .set((
                members::email.eq(email),
                members::name.eq(name),
                members::role.eq(&invite.role),
                members::status.eq(STATUS_ACTIVE),
            ))
            .execute(conn)?;

        diesel::update(users::table.find(user.id))
            .set((
                users::business_id.eq(Some(invite.business_id)),
                users::role.eq(Some(&invite.role)),
                users::name.eq(Some(name)),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        diesel::delete(invites::table.find(invite.id)).execute(conn)?;

        info!(
            user_id = %user.id,
            business_id = %invite.business_id,
            role = %invite.role,
            "Invite redeemed"
        );

        Ok(())
    })
}

/// Founder path: creates the business and its first (admin) member in one
/// transaction. Exactly one admin is created per new business here.
fn create_business_account(
    conn: &mut PgConnection,
    user: &User,
    email: &str,
    name: &str,
    business_name: &str,
) -> Result<Business, diesel::result::Error> {
    conn.transaction(|conn| {
        let business: Business = diesel::insert_into(businesses::table)
            .values(&NewBusiness {
                name: business_name.to_string(),
                owner_id: user.id,
            })
            .get_result(conn)?;

        diesel::insert_into(members::table)
            .values(&NewMember {
                business_id: business.id,
                user_id: user.id,
                email: email.to_string(),
                name: name.to_string(),
                role: ROLE_ADMIN.to_string(),
                status: STATUS_ACTIVE.to_string(),
            })
            .execute(conn)?;

        diesel::update(users::table.find(user.id))
            .set((
                users::business_id.eq(Some(business.id)),
                users::role.eq(Some(ROLE_ADMIN)),
                users::name.eq(Some(name)),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        info!(
            business_id = %business.id,
            business_name = %business.name,
            owner_id = %user.id,
            "Created business"
        );

        Ok(business)
    })
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account provisioned", body = AuthResponse),
        (status = 400, description = "Validation error or invalid invite", body = ErrorResponse),
        (status = 401, description = "Email already registered with a different password", body = ErrorResponse),
        (status = 403, description = "Invite issued for a different email", body = ErrorResponse),
        (status = 409, description = "Founder path on an account that already belongs to a business", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let email = payload.email.trim().to_lowercase();
    let full_name = payload
        .full_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let business_name = payload
        .business_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    // Both paths need a display name; the founder path also needs the
    // business name. Checked before any write happens.
    if full_name.is_empty() {
        return Err(ApiError::bad_request(
            "Full name is required",
            "VALIDATION_ERROR",
        ));
    }
    if payload.invite_id.is_none() && business_name.is_empty() {
        return Err(ApiError::bad_request(
            "Business name is required",
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let existing: Option<User> = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()
        .map_err(|e| {
            error!(error = %e, "Database error looking up user");
            ApiError::db_error()
        })?;

    // Account creation first; if the email is taken, fall back to signing
    // in with the same credentials.
    let user: User = match existing {
        Some(user) => {
            let is_valid = PasswordService::verify_password(&payload.password, &user.password_hash)
                .map_err(|e| {
                    error!(error = %e, "Password verification error");
                    ApiError::internal("Password verification error", "PASSWORD_VERIFY_ERROR")
                })?;

            if !is_valid {
                warn!(email = %email, "Registration fallback sign-in with invalid password");
                return Err(ApiError::unauthorized(
                    "Invalid credentials",
                    "INVALID_CREDENTIALS",
                ));
            }

            user
        }
        None => {
            let password_hash = PasswordService::hash_password_with_cost(
                &payload.password,
                state.password_hash_cost,
            )
            .map_err(|e| {
                error!(error = %e, "Password hashing failed");
                ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
            })?;

            diesel::insert_into(users::table)
                .values(&NewUser {
                    email: email.clone(),
                    password_hash,
                    name: Some(full_name.clone()),
                })
                .get_result(&mut conn)
                .map_err(|e| {
                    warn!(error = %e, email = %email, "Failed to create user");
                    ApiError::conflict("User with this email already exists", "USER_EXISTS")
                })?
        }
    };

    if let Some(invite_id) = payload.invite_id {
        redeem_invite(&mut conn, &user, &email, &full_name, invite_id).map_err(|e| match e {
            ProvisionError::InvalidInvite => {
                warn!(invite_id = %invite_id, "Redemption attempt for unknown invite");
                ApiError::bad_request("Invite link is invalid or expired", "INVALID_INVITE")
            }
            ProvisionError::EmailMismatch => {
                warn!(invite_id = %invite_id, "Redemption attempt with mismatched email");
                ApiError::forbidden(
                    "This invite was sent to a different email",
                    "INVITE_EMAIL_MISMATCH",
                )
            }
            ProvisionError::Db(e) => {
                error!(error = %e, "Invite redemption failed");
                ApiError::db_error()
            }
        })?;
    } else {
        if user.business_id.is_some() {
            return Err(ApiError::conflict(
                "Account already belongs to a business",
                "ALREADY_IN_BUSINESS",
            ));
        }

        create_business_account(&mut conn, &user, &email, &full_name, &business_name).map_err(
            |e| {
                error!(error = %e, "Business creation failed");
                ApiError::internal("Failed to create business", "BUSINESS_CREATE_ERROR")
            },
        )?;
    }

    // Re-read so the tokens and response carry the new business context.
    let user: User = users::table
        .find(user.id)
        .first(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (access_token, refresh_token) = generate_tokens(&state.jwt_config, &mut conn, &user)?;

    info!(user_id = %user.id, email = %user.email, "User provisioned");

    Ok(Json(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::email.eq(payload.email.trim().to_lowercase()))
        .first(&mut conn)
        .map_err(|_| {
            warn!(email = %payload.email, "Login attempt for non-existent user");
            ApiError::unauthorized("Invalid credentials", "INVALID_CREDENTIALS")
        })?;

    let is_valid = PasswordService::verify_password(&payload.password, &user.password_hash)
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error", "PASSWORD_VERIFY_ERROR")
        })?;

    if !is_valid {
        warn!(user_id = %user.id, "Failed login attempt - invalid password");
        return Err(ApiError::unauthorized(
            "Invalid credentials",
            "INVALID_CREDENTIALS",
        ));
    }

    cleanup_expired_tokens(&mut conn, user.id);

    let (access_token, refresh_token) = generate_tokens(&state.jwt_config, &mut conn, &user)?;

    info!(
        user_id = %user.id,
        email = %user.email,
        has_business_context = user.business_id.is_some(),
        "User logged in"
    );

    Ok(Json(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let refresh_claims = state
        .jwt_config
        .verify_refresh_token(&payload.refresh_token)
        .map_err(|_| {
            ApiError::unauthorized("Invalid or expired refresh token", "INVALID_REFRESH_TOKEN")
        })?;

    let user_id = Uuid::parse_str(&refresh_claims.sub).map_err(|e| {
        error!(error = %e, "Invalid user ID in refresh token");
        ApiError::bad_request("Invalid token format", "INVALID_TOKEN_FORMAT")
    })?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let stored_user_id = verify_stored_token(&mut conn, &payload.refresh_token).map_err(|msg| {
        warn!(user_id = %user_id, "Refresh token not found in database");
        ApiError::unauthorized(msg, "INVALID_REFRESH_TOKEN")
    })?;

    if stored_user_id != user_id {
        warn!(claimed_user_id = %user_id, stored_user_id = %stored_user_id, "Refresh token user mismatch");
        return Err(ApiError::unauthorized(
            "Invalid refresh token",
            "TOKEN_USER_MISMATCH",
        ));
    }

    // Re-read the user so refreshed tokens carry the current business
    // context, including one acquired since the refresh token was issued.
    let user: User = users::table
        .filter(users::id.eq(user_id))
        .first(&mut conn)
        .map_err(|_| ApiError::unauthorized("User not found", "USER_NOT_FOUND"))?;

    if state.rotate_refresh_tokens {
        invalidate_token(&mut conn, &payload.refresh_token).map_err(|e| {
            error!(error = %e, "Failed to invalidate old refresh token");
            ApiError::internal("Token invalidation failed", "TOKEN_INVALIDATION_ERROR")
        })?;

        let (access_token, refresh_token) = generate_tokens(&state.jwt_config, &mut conn, &user)?;

        info!(user_id = %user.id, "Tokens refreshed (rotated)");

        Ok(Json(RefreshResponse {
            access_token,
            refresh_token,
        }))
    } else {
        let access_token = state
            .jwt_config
            .generate_access_token(user.id, &user.email, user.business_id, user.role.clone())
            .map_err(|e| {
                error!(error = %e, "Token generation failed");
                ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
            })?;

        info!(user_id = %user.id, "Access token refreshed");

        Ok(Json(RefreshResponse {
            access_token,
            refresh_token: payload.refresh_token,
        }))
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Logged out"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let _ = invalidate_token(&mut conn, &payload.refresh_token);
    info!("User logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUserResponse {
    pub user: UserResponse,
    pub business: Option<BusinessContext>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BusinessContext {
    pub business_id: Uuid,
    #[schema(example = "Acme Ltd")]
    pub name: String,
    #[schema(example = "admin")]
    pub role: String,
}

/// Returns the currently authenticated user's information.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user information", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<CurrentUserResponse>> {
    let user_id = get_user_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::id.eq(user_id))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    let business = match (user.business_id, &user.role) {
        (Some(business_id), Some(role)) => businesses::table
            .find(business_id)
            .select(businesses::name)
            .first::<String>(&mut conn)
            .optional()
            .map_err(|_| ApiError::db_error())?
            .map(|name| BusinessContext {
                business_id,
                name,
                role: role.clone(),
            }),
        _ => None,
    };

    Ok(Json(CurrentUserResponse {
        user: user.into(),
        business,
    }))
}
