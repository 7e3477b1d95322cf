//! Part-usage routes under `/livewalk/part-usage`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use time::{Date, OffsetDateTime};
use tracing::{error, warn};

use crate::services::sort::SortOrder;
use crate::services::usage::{
    self, AdvancedSearch, UsageError, UsageInput, UsageRecord, UsageSortColumn, UsageSummary, UsageUpdate,
};
use crate::state::AppState;

type ApiResult<T> = Result<T, (StatusCode, String)>;

pub(crate) fn usage_error_response(err: UsageError) -> (StatusCode, String) {
    match err {
        UsageError::NotFound(_) | UsageError::PartNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        UsageError::InsufficientStock { current, requested } => {
            warn!(current, requested, "usage rejected for insufficient stock");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        UsageError::Invalid(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        UsageError::Database(_) => {
            error!(error = %err, "usage request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
        }
    }
}

/// The server's calendar date, in local time when the offset is known.
fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// `POST /livewalk/part-usage`: register usage and take it out of stock.
pub async fn register_usage(
    State(state): State<AppState>,
    Json(body): Json<UsageInput>,
) -> ApiResult<(StatusCode, Json<UsageRecord>)> {
    let new_usage = body.validate(today()).map_err(usage_error_response)?;
    let record = usage::register_usage(&state.pool, &new_usage)
        .await
        .map_err(usage_error_response)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /livewalk/part-usage/:id`: edit a usage record.
pub async fn update_usage(
    State(state): State<AppState>,
    Path(usage_id): Path<i32>,
    Json(body): Json<UsageUpdate>,
) -> ApiResult<Json<UsageRecord>> {
    let change = body.validate().map_err(usage_error_response)?;
    let record = usage::update_usage(&state.pool, usage_id, &change)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(record))
}

/// `GET /livewalk/part-usage/:id`
pub async fn get_usage(State(state): State<AppState>, Path(usage_id): Path<i32>) -> ApiResult<Json<UsageRecord>> {
    let record = usage::find_usage(&state.pool, usage_id)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(record))
}

/// `GET /livewalk/part-usage`: all usage, newest first.
pub async fn list_usage(State(state): State<AppState>) -> ApiResult<Json<Vec<UsageRecord>>> {
    let records = usage::list_usage(&state.pool).await.map_err(usage_error_response)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct KeywordQuery {
    #[serde(default)]
    pub keyword: String,
}

/// `GET /livewalk/part-usage/search?keyword=K`
pub async fn search_usage(
    State(state): State<AppState>,
    Query(query): Query<KeywordQuery>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let records = usage::search_usage(&state.pool, &query.keyword)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct AdvancedQuery {
    pub keyword: Option<String>,
    pub column: Option<String>,
    pub order: Option<String>,
}

/// `GET /livewalk/part-usage/search-advanced?keyword=K&column=C&order=O`
pub async fn search_advanced(
    State(state): State<AppState>,
    Query(query): Query<AdvancedQuery>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let search = AdvancedSearch::from_query(query.keyword.as_deref(), query.column.as_deref(), query.order.as_deref());
    let records = usage::search_advanced(&state.pool, &search)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub name: String,
}

/// `GET /livewalk/part-usage/location?name=L`
pub async fn usage_by_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let records = usage::list_usage_by_location(&state.pool, &query.name)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(records))
}

/// `GET /livewalk/part-usage/part/:part_number`
pub async fn usage_by_part(
    State(state): State<AppState>,
    Path(part_number): Path<String>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let records = usage::list_usage_by_part(&state.pool, &part_number)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub start_date: String,
    pub end_date: String,
}

/// `GET /livewalk/part-usage/date-range?startDate=D&endDate=D`: inclusive.
pub async fn usage_by_date_range(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let start = usage::parse_used_date(&query.start_date).map_err(usage_error_response)?;
    let end = usage::parse_used_date(&query.end_date).map_err(usage_error_response)?;
    let records = usage::list_usage_by_date_range(&state.pool, start, end)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct UsageSortQuery {
    pub column: String,
    pub order: Option<String>,
}

/// `GET /livewalk/part-usage/sort?column=C&order=O`: order defaults to `desc`.
pub async fn sorted_usage(
    State(state): State<AppState>,
    Query(query): Query<UsageSortQuery>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let column = UsageSortColumn::parse(&query.column).ok_or_else(|| {
        usage_error_response(UsageError::Invalid(format!("unknown sort column: {}", query.column)))
    })?;
    let order = SortOrder::parse_or(query.order.as_deref(), SortOrder::Desc);
    let records = usage::list_usage_sorted(&state.pool, column, order)
        .await
        .map_err(usage_error_response)?;
    Ok(Json(records))
}

/// `GET /livewalk/part-usage/summary`: per-part totals.
pub async fn usage_summary(State(state): State<AppState>) -> ApiResult<Json<Vec<UsageSummary>>> {
    let summary = usage::usage_summary(&state.pool).await.map_err(usage_error_response)?;
    Ok(Json(summary))
}

#[cfg(test)]
#[path = "usage_test.rs"]
mod tests;
