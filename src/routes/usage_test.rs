use super::*;
use crate::routes::{USAGE_API, spawn_test_server};
use crate::state::test_helpers;
use serde_json::json;

#[test]
fn usage_error_response_maps_statuses() {
    assert_eq!(usage_error_response(UsageError::NotFound(3)).0, StatusCode::NOT_FOUND);
    assert_eq!(usage_error_response(UsageError::PartNotFound("R-1".into())).0, StatusCode::NOT_FOUND);
    assert_eq!(usage_error_response(UsageError::Invalid("x".into())).0, StatusCode::BAD_REQUEST);
    assert_eq!(
        usage_error_response(UsageError::Database(sqlx::Error::PoolClosed)).0,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn insufficient_stock_is_bad_request_with_counts() {
    let (status, message) = usage_error_response(UsageError::InsufficientStock { current: 2, requested: 5 });
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "insufficient stock (current: 2, requested: 5)");
}

#[tokio::test]
async fn register_rejects_zero_quantity() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}{USAGE_API}"))
        .json(&json!({ "partNumber": "R-1", "quantityUsed": 0, "usageLocation": "Line A" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_rejects_blank_location() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::Client::new()
        .put(format!("{base}{USAGE_API}/4"))
        .json(&json!({ "usageLocation": " " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_numeric_id_is_bad_request() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::get(format!("{base}{USAGE_API}/abc")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn date_range_rejects_reversed_dates() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::get(format!("{base}{USAGE_API}/date-range?startDate=2024-12-31&endDate=2024-01-01"))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(resp.text().await.unwrap().contains("after end date"));
}

#[tokio::test]
async fn date_range_rejects_malformed_date() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::get(format!("{base}{USAGE_API}/date-range?startDate=yesterday&endDate=2024-01-01"))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sort_rejects_unknown_column() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::get(format!("{base}{USAGE_API}/sort?column=note")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[test]
fn today_is_a_plausible_date() {
    assert!(today().year() >= 2024);
}
