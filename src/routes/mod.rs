//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the inventory REST endpoints under `/livewalk` and
//! serves the page's static assets for every other path. The page reaches
//! the API at the same origin, so CORS is permissive only to keep local
//! tooling working.

pub mod parts;
pub mod usage;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Base path of the parts resource.
pub const PARTS_API: &str = "/livewalk/parts";
/// Base path of the part-usage resource.
pub const USAGE_API: &str = "/livewalk/part-usage";

/// Inventory API routes.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(PARTS_API, get(parts::list_parts))
        .route(&format!("{PARTS_API}/insert"), post(parts::insert_part))
        .route(&format!("{PARTS_API}/bulk"), post(parts::bulk_insert_parts))
        .route(&format!("{PARTS_API}/low-stock"), get(parts::low_stock_parts))
        .route(&format!("{PARTS_API}/sort-asc"), get(parts::sorted_parts_asc))
        .route(&format!("{PARTS_API}/sort-desc"), get(parts::sorted_parts_desc))
        .route(&format!("{PARTS_API}/export.csv"), get(parts::export_csv))
        .route(
            &format!("{PARTS_API}/{{part_number}}"),
            put(parts::update_part).delete(parts::delete_part),
        )
        .route(USAGE_API, get(usage::list_usage).post(usage::register_usage))
        .route(&format!("{USAGE_API}/search"), get(usage::search_usage))
        .route(&format!("{USAGE_API}/search-advanced"), get(usage::search_advanced))
        .route(&format!("{USAGE_API}/location"), get(usage::usage_by_location))
        .route(&format!("{USAGE_API}/part/{{part_number}}"), get(usage::usage_by_part))
        .route(&format!("{USAGE_API}/date-range"), get(usage::usage_by_date_range))
        .route(&format!("{USAGE_API}/sort"), get(usage::sorted_usage))
        .route(&format!("{USAGE_API}/summary"), get(usage::usage_summary))
        .route(
            &format!("{USAGE_API}/{{id}}"),
            get(usage::get_usage).put(usage::update_usage),
        )
        .route("/healthz", get(healthz))
}

/// Full application: API routes, static page assets as fallback, and the
/// tracing / compression / CORS layers.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_service = ServeDir::new(&state.config.static_dir).append_index_html_on_directories(true);

    api_routes()
        .fallback_service(static_service)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Serve `app(state)` on an ephemeral local port and return its base URL.
#[cfg(test)]
pub(crate) async fn spawn_test_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.expect("test server failed");
    });
    format!("http://{addr}")
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
