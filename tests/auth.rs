//! Authentication and provisioning integration tests.
//!
//! These tests verify founder registration, login, token refresh, and the
//! authentication middleware.

mod common;

use common::{create_test_founder, TestApp};
use serde_json::json;
use serial_test::serial;

// ============================================================================
// Founder Registration Tests
// ============================================================================

#[tokio::test]
#[serial]
async fn founder_registration_provisions_a_business() {
    // Arrange
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();

    // Act
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": email,
                "password": "password123",
                "full_name": "Test Founder",
                "business_name": "Founder's Business"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["user"]["email"].as_str().unwrap(), email);
    assert_eq!(body["user"]["role"].as_str().unwrap(), "admin");
    assert!(body["user"]["business_id"].as_str().is_some());
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
}

#[tokio::test]
#[serial]
async fn founder_appears_in_member_roster_as_admin() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    // Act
    let response = app.get("/members", &founder.access_token).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    let members = body.as_array().expect("Expected an array");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["email"].as_str().unwrap(), founder.email);
    assert_eq!(members[0]["role"].as_str().unwrap(), "admin");
    assert_eq!(members[0]["status"].as_str().unwrap(), "active");
}

#[tokio::test]
#[serial]
async fn register_returns_400_for_invalid_email() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": "not-an-email",
                "password": "password123",
                "full_name": "Test User",
                "business_name": "Biz"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert!(body["error"].as_str().unwrap().contains("Validation"));
}

#[tokio::test]
#[serial]
async fn register_returns_400_for_short_password() {
    // Arrange
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();

    // Act
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": email,
                "password": "short",
                "full_name": "Test User",
                "business_name": "Biz"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
#[serial]
async fn founder_registration_requires_business_name() {
    // Arrange
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();

    // Act - no invite_id and no business_name
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": email,
                "password": "password123",
                "full_name": "Test User"
            }),
        )
        .await;

    // Assert - rejected before any account is created
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"].as_str().unwrap(), "VALIDATION_ERROR");

    // The failed attempt must not have created the account
    let login = app
        .post_public(
            "/auth/login",
            json!({"email": email, "password": "password123"}),
        )
        .await;
    assert_eq!(login.status().as_u16(), 401);
}

#[tokio::test]
#[serial]
async fn registration_requires_full_name() {
    // Arrange
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();

    // Act
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": email,
                "password": "password123",
                "business_name": "Biz"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
#[serial]
async fn register_with_taken_email_and_wrong_password_returns_401() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    // Act - the email exists, so registration falls back to sign-in
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": founder.email,
                "password": "wrong_password",
                "full_name": "Someone Else",
                "business_name": "Another Biz"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"].as_str().unwrap(), "INVALID_CREDENTIALS");
}

#[tokio::test]
#[serial]
async fn founder_path_returns_409_when_account_already_has_a_business() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    // Act - same credentials, attempting to found a second business
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": founder.email,
                "password": founder.password,
                "full_name": "Test Founder",
                "business_name": "Second Business"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"].as_str().unwrap(), "ALREADY_IN_BUSINESS");
}

#[tokio::test]
#[serial]
async fn register_normalizes_email_case() {
    // Arrange
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();
    let mixed_case = email.to_uppercase();

    // Act
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": mixed_case,
                "password": "password123",
                "full_name": "Test User",
                "business_name": "Biz"
            }),
        )
        .await;

    // Assert - stored lowercase, login with lowercase works
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["user"]["email"].as_str().unwrap(), email);

    let login = app
        .post_public(
            "/auth/login",
            json!({"email": email, "password": "password123"}),
        )
        .await;
    assert_eq!(login.status().as_u16(), 200);
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
#[serial]
async fn login_returns_tokens_with_business_context() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    // Act
    let user = app
        .login_user(&founder.email, &founder.password)
        .await
        .expect("Failed to login");

    // Assert
    assert_eq!(user.business_id, founder.business_id);
    assert_eq!(user.role.as_deref(), Some("admin"));
    assert!(!user.access_token.is_empty());
}

#[tokio::test]
#[serial]
async fn login_returns_401_for_wrong_password() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    // Act
    let response = app
        .post_public(
            "/auth/login",
            json!({"email": founder.email, "password": "wrong_password"}),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
#[serial]
async fn login_returns_401_for_unknown_email() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let response = app
        .post_public(
            "/auth/login",
            json!({"email": TestApp::unique_email(), "password": "password123"}),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}

// ============================================================================
// Token Refresh Tests
// ============================================================================

#[tokio::test]
#[serial]
async fn refresh_returns_new_tokens() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    // Act
    let response = app
        .post_public(
            "/auth/refresh",
            json!({"refresh_token": founder.refresh_token}),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
}

#[tokio::test]
#[serial]
async fn rotated_refresh_token_cannot_be_reused() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    let first = app
        .post_public(
            "/auth/refresh",
            json!({"refresh_token": founder.refresh_token}),
        )
        .await;
    assert_eq!(first.status().as_u16(), 200);

    // Act - replay the original token after rotation
    let second = app
        .post_public(
            "/auth/refresh",
            json!({"refresh_token": founder.refresh_token}),
        )
        .await;

    // Assert
    assert_eq!(second.status().as_u16(), 401);
}

#[tokio::test]
#[serial]
async fn refresh_returns_401_for_garbage_token() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let response = app
        .post_public("/auth/refresh", json!({"refresh_token": "not-a-token"}))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}

// ============================================================================
// Logout Tests
// ============================================================================

#[tokio::test]
#[serial]
async fn logout_invalidates_refresh_token() {
    // Arrange
    let app = TestApp::spawn().await;
    let founder = create_test_founder(&app).await;

    let logout = app
        .post_public(
            "/auth/logout",
            json!({"refresh_token": founder.refresh_token}),
        )
        .await;
    assert_eq!(logout.status().as_u16(), 204);

    // Act
    let response = app
        .post_public(
            "/auth/refresh",
            json!({"refresh_token": founder.refresh_token}),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}

// ============================================================================
// Current User Tests
// ============================================================================

#[tokio::test]
#[serial]
async fn me_returns_user_and_business_context() {
    // Arrange
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();
    let business_name = TestApp::unique_business_name();
    let founder = app
        .register_founder(&email, "password123", "Test Founder", &business_name)
        .await
        .expect("Failed to register founder");

    // Act
    let response = app.get("/auth/me", &founder.access_token).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["user"]["email"].as_str().unwrap(), email);
    assert_eq!(body["business"]["name"].as_str().unwrap(), business_name);
    assert_eq!(body["business"]["role"].as_str().unwrap(), "admin");
}

#[tokio::test]
#[serial]
async fn me_requires_authentication() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let response = app.get_public("/auth/me").await;

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
#[serial]
async fn requests_with_malformed_bearer_token_are_rejected() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let response = app.get("/auth/me", "not-a-valid-jwt").await;

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}
