//! OpenAPI documentation configuration.
//!
//! This module provides the OpenAPI (Swagger) documentation for the Cashbox
//! API. It uses `utoipa` to generate the OpenAPI specification and serves it
//! via Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::auth::{
    AuthResponse, ErrorResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest,
    UserResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cashbox API",
        version = "1.0.0",
        description = "Multi-tenant expense tracking with invite-based provisioning.\n\n\
        ## Features\n\
        - JWT Authentication with access and refresh tokens\n\
        - Business provisioning: found a new business or join one via invite\n\
        - Single-use, email-scoped invites with pre-assigned roles\n\
        - Append-only ledger of deposits and withdrawals with a derived balance\n\
        - Receipt image hosting for ledger entries\n\n\
        ## Authentication\n\
        Most endpoints require authentication via JWT bearer token.\n\
        1. Register or login to get an access token\n\
        2. Include the token in requests: `Authorization: Bearer <token>`\n\
        3. Use the refresh token to get new access tokens when expired\n\n\
        ## Business Context\n\
        Business-scoped endpoints (transactions, receipts, invites, members)\n\
        require a token carrying a business context. Tokens issued before an\n\
        account joins a business carry none; re-authenticate or refresh after\n\
        provisioning.",
        contact(
            name = "Cashbox API Support"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "User authentication and account provisioning"),
        (name = "Invites", description = "Invite issuance and revocation (admin)"),
        (name = "Members", description = "Business roster (admin)"),
        (name = "Transactions", description = "Ledger entries and balance"),
        (name = "Receipts", description = "Receipt image uploads")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::logout,
        crate::handlers::auth::get_current_user,

        crate::handlers::invites::create_invite,
        crate::handlers::invites::list_invites,
        crate::handlers::invites::revoke_invite,

        crate::handlers::members::list_members,

        crate::handlers::transactions::list_transactions,
        crate::handlers::transactions::create_transaction,
        crate::handlers::transactions::delete_transaction,

        crate::handlers::receipts::upload_receipt,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            RefreshResponse,
            AuthResponse,
            UserResponse,
            ErrorResponse,
            crate::handlers::auth::CurrentUserResponse,
            crate::handlers::auth::BusinessContext,

            crate::handlers::invites::CreateInviteRequest,
            crate::handlers::invites::InviteResponse,

            crate::handlers::members::MemberResponse,

            crate::handlers::transactions::TransactionKind,
            crate::handlers::transactions::CreateTransactionRequest,
            crate::handlers::transactions::TransactionResponse,
            crate::handlers::transactions::TransactionListResponse,

            crate::handlers::receipts::ReceiptResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "JWT access token obtained from /auth/login or /auth/register.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Cashbox API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let spec = ApiDoc::openapi();
        assert!(spec.components.is_some());
        let components = spec.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_has_tags() {
        let spec = ApiDoc::openapi();
        assert!(spec.tags.is_some());
        let tags = spec.tags.unwrap();
        assert!(tags.iter().any(|t| t.name == "Authentication"));
        assert!(tags.iter().any(|t| t.name == "Transactions"));
        assert!(tags.iter().any(|t| t.name == "Health"));
    }
}
