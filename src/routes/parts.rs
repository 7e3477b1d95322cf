//! Parts routes under `/livewalk/parts`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::error;

use crate::services::part::{self, BulkOutcome, InsertOutcome, Part, PartError, PartInput, PartSortColumn, PartUpdate};
use crate::services::sort::SortOrder;
use crate::state::AppState;

type ApiResult<T> = Result<T, (StatusCode, String)>;

pub(crate) fn part_error_response(err: PartError) -> (StatusCode, String) {
    match err {
        PartError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PartError::Invalid(_)
        | PartError::InvalidRow { .. }
        | PartError::UnknownColumn(_)
        | PartError::QuantityOverflow(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        PartError::Export(_) | PartError::Database(_) => {
            error!(error = %err, "parts request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
        }
    }
}

pub(crate) fn insert_message(outcome: InsertOutcome) -> String {
    match outcome {
        InsertOutcome::Inserted => "part registered".to_owned(),
        InsertOutcome::Merged { quantity } => format!("stock added to existing part (now {quantity})"),
    }
}

/// `POST /livewalk/parts/insert`: register a part or add to its stock.
pub async fn insert_part(
    State(state): State<AppState>,
    Json(body): Json<PartInput>,
) -> ApiResult<(StatusCode, String)> {
    let new_part = body.validate().map_err(part_error_response)?;
    let outcome = part::insert_part(&state.pool, &new_part)
        .await
        .map_err(part_error_response)?;
    Ok((StatusCode::CREATED, insert_message(outcome)))
}

/// `POST /livewalk/parts/bulk`: register many parts in one transaction.
pub async fn bulk_insert_parts(
    State(state): State<AppState>,
    Json(rows): Json<Vec<PartInput>>,
) -> ApiResult<(StatusCode, Json<BulkOutcome>)> {
    let parts = part::validate_bulk(rows).map_err(part_error_response)?;
    let outcome = part::bulk_insert_parts(&state.pool, &parts)
        .await
        .map_err(part_error_response)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `PUT /livewalk/parts/:part_number`: edit a part.
pub async fn update_part(
    State(state): State<AppState>,
    Path(part_number): Path<String>,
    Json(body): Json<PartUpdate>,
) -> ApiResult<Json<Part>> {
    let updated = part::update_part(&state.pool, &part_number, body)
        .await
        .map_err(part_error_response)?;
    Ok(Json(updated))
}

/// `DELETE /livewalk/parts/:part_number`: hide a part from all listings.
pub async fn delete_part(State(state): State<AppState>, Path(part_number): Path<String>) -> ApiResult<String> {
    part::soft_delete_part(&state.pool, &part_number)
        .await
        .map_err(part_error_response)?;
    Ok("part deleted".to_owned())
}

/// `GET /livewalk/parts`: all live parts.
pub async fn list_parts(State(state): State<AppState>) -> ApiResult<Json<Vec<Part>>> {
    let parts = part::list_parts(&state.pool).await.map_err(part_error_response)?;
    Ok(Json(parts))
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<String>,
}

/// Parse `?threshold=`; anything that is not an integer counts as absent.
pub(crate) fn requested_threshold(raw: Option<&str>) -> Option<i32> {
    raw.and_then(|t| t.trim().parse().ok())
}

/// `GET /livewalk/parts/low-stock?threshold=N`: parts at or below `N`.
pub async fn low_stock_parts(
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> ApiResult<Json<Vec<Part>>> {
    let threshold = part::effective_threshold(
        requested_threshold(query.threshold.as_deref()),
        state.default_low_stock_threshold(),
    );
    let parts = part::list_low_stock_parts(&state.pool, threshold)
        .await
        .map_err(part_error_response)?;
    Ok(Json(parts))
}

#[derive(Debug, Deserialize)]
pub struct SortQuery {
    pub column: String,
}

pub(crate) fn parse_sort_column(raw: &str) -> Result<PartSortColumn, PartError> {
    PartSortColumn::parse(raw).ok_or_else(|| PartError::UnknownColumn(raw.to_owned()))
}

async fn sorted_parts(state: &AppState, column: &str, order: SortOrder) -> ApiResult<Json<Vec<Part>>> {
    let column = parse_sort_column(column).map_err(part_error_response)?;
    let parts = part::list_parts_sorted(&state.pool, column, order)
        .await
        .map_err(part_error_response)?;
    Ok(Json(parts))
}

/// `GET /livewalk/parts/sort-asc?column=C`
pub async fn sorted_parts_asc(
    State(state): State<AppState>,
    Query(query): Query<SortQuery>,
) -> ApiResult<Json<Vec<Part>>> {
    sorted_parts(&state, &query.column, SortOrder::Asc).await
}

/// `GET /livewalk/parts/sort-desc?column=C`
pub async fn sorted_parts_desc(
    State(state): State<AppState>,
    Query(query): Query<SortQuery>,
) -> ApiResult<Json<Vec<Part>>> {
    sorted_parts(&state, &query.column, SortOrder::Desc).await
}

/// `GET /livewalk/parts/export.csv`: download all live parts as CSV.
pub async fn export_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let parts = part::list_parts(&state.pool).await.map_err(part_error_response)?;
    let body = part::parts_to_csv(&parts).map_err(part_error_response)?;

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=\"parts.csv\""),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
#[path = "parts_test.rs"]
mod tests;
