//! Health endpoint integration tests.

mod common;

use common::TestApp;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn health_returns_ok() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health").await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
#[serial]
async fn health_status_reports_service_metadata() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health/status").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"].as_str().unwrap(), "healthy");
    assert_eq!(body["service"].as_str().unwrap(), "cashbox");
}

#[tokio::test]
#[serial]
async fn ready_check_reports_database_up() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health/ready").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"].as_str().unwrap(), "ready");
    assert_eq!(body["checks"]["database"]["status"].as_str().unwrap(), "up");
}

#[tokio::test]
#[serial]
async fn live_check_returns_200() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health/live").await;

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
#[serial]
async fn unknown_route_returns_404() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/no-such-route").await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"].as_str().unwrap(), "NOT_FOUND");
}
