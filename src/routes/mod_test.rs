use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn healthz_returns_ok() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn unknown_static_path_is_not_found() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::get(format!("{base}/no-such-page.html")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn part_number_path_rejects_get() {
    let base = spawn_test_server(test_helpers::test_app_state()).await;
    let resp = reqwest::get(format!("{base}{PARTS_API}/R-100")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn api_paths_match_page_constants() {
    assert_eq!(PARTS_API, "/livewalk/parts");
    assert_eq!(USAGE_API, "/livewalk/part-usage");
}
