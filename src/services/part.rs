//! Part service: catalogue CRUD, stock merge on insert, low-stock queries.
//!
//! DESIGN
//! ======
//! Part numbers are the natural key. Inserting a number that already exists
//! adds the submitted quantity to the stored stock instead of failing, and a
//! soft-deleted part is revived with the submitted data. Deletion only sets
//! `is_deleted`, so usage history keeps its foreign key.
//!
//! ERROR HANDLING
//! ==============
//! Input is validated before any SQL runs. Bulk inserts validate every row
//! first and then write inside one transaction, so a bad row never leaves a
//! half-applied batch.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::info;

use super::sort::SortOrder;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PartError {
    #[error("part not found: {0}")]
    NotFound(String),
    #[error("invalid part: {0}")]
    Invalid(String),
    #[error("row {index}: {reason}")]
    InvalidRow { index: usize, reason: String },
    #[error("unknown sort column: {0}")]
    UnknownColumn(String),
    #[error("stock for part {0} would overflow")]
    QuantityOverflow(String),
    #[error("csv export failed: {0}")]
    Export(#[from] csv::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A live (not deleted) part as returned by every listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub part_number: String,
    pub part_name: String,
    pub quantity: i32,
    pub unit: Option<String>,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

type PartRow = (String, String, i32, Option<String>, Option<String>, OffsetDateTime, OffsetDateTime);

impl From<PartRow> for Part {
    fn from(
        (part_number, part_name, quantity, unit, description, created_at, updated_at): PartRow,
    ) -> Self {
        Self { part_number, part_name, quantity, unit, description, created_at, updated_at }
    }
}

/// Request body for inserting a part, as sent by the insert and bulk forms.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInput {
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub part_name: String,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// Request body for `PUT /livewalk/parts/{partNumber}`. Absent fields keep
/// their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUpdate {
    pub part_name: Option<String>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// A validated, trimmed insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPart {
    pub part_number: String,
    pub part_name: String,
    pub quantity: i32,
    pub unit: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created (or a deleted one revived).
    Inserted,
    /// Stock was added to an existing part; carries the new total.
    Merged { quantity: i32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub inserted: usize,
    pub merged: usize,
}

/// Columns accepted by the sorted listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSortColumn {
    PartNumber,
    PartName,
    Quantity,
    Unit,
    CreatedAt,
    UpdatedAt,
}

impl PartSortColumn {
    /// Parse a column name. Accepts both `snake_case` and the `camelCase`
    /// names used in JSON.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "part_number" | "partNumber" => Some(Self::PartNumber),
            "part_name" | "partName" => Some(Self::PartName),
            "quantity" => Some(Self::Quantity),
            "unit" => Some(Self::Unit),
            "created_at" | "createdAt" => Some(Self::CreatedAt),
            "updated_at" | "updatedAt" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::PartNumber => "part_number",
            Self::PartName => "part_name",
            Self::Quantity => "quantity",
            Self::Unit => "unit",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl PartInput {
    /// Trim and validate an insert.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` when the part number or name is blank, or the
    /// quantity is missing or negative.
    pub fn validate(self) -> Result<NewPart, PartError> {
        let part_number = self.part_number.trim().to_owned();
        if part_number.is_empty() {
            return Err(PartError::Invalid("part number is required".into()));
        }
        let part_name = self.part_name.trim().to_owned();
        if part_name.is_empty() {
            return Err(PartError::Invalid("part name is required".into()));
        }
        let quantity = self
            .quantity
            .ok_or_else(|| PartError::Invalid("quantity is required".into()))?;
        if quantity < 0 {
            return Err(PartError::Invalid(format!("quantity must not be negative (got {quantity})")));
        }

        Ok(NewPart {
            part_number,
            part_name,
            quantity,
            unit: non_blank(self.unit),
            description: non_blank(self.description),
        })
    }
}

/// Validate every row of a bulk request. Row indexes in errors are 1-based
/// to match the rows shown on the page.
///
/// # Errors
///
/// Returns `InvalidRow` for the first failing row, or `Invalid` for an empty
/// batch.
pub fn validate_bulk(rows: Vec<PartInput>) -> Result<Vec<NewPart>, PartError> {
    if rows.is_empty() {
        return Err(PartError::Invalid("no rows to insert".into()));
    }
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.validate().map_err(|e| PartError::InvalidRow {
                index: i + 1,
                reason: match e {
                    PartError::Invalid(reason) => reason,
                    other => other.to_string(),
                },
            })
        })
        .collect()
}

/// Low-stock threshold actually applied: a missing or non-positive request
/// falls back to `default`.
#[must_use]
pub fn effective_threshold(requested: Option<i32>, default: i32) -> i32 {
    match requested {
        Some(t) if t > 0 => t,
        _ => default,
    }
}

// =============================================================================
// WRITES
// =============================================================================

/// SQLSTATE `numeric_value_out_of_range`, raised when merged stock overflows.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Insert a part or merge it into the existing row in one statement.
///
/// `ON CONFLICT` serialises concurrent inserts of the same new number: the
/// second writer waits for the first and then merges. A soft-deleted row is
/// revived with the submitted fields. `prior` reads the row as it stood
/// before the statement so a revival reports `Inserted`.
async fn upsert_part(conn: &mut PgConnection, part: &NewPart) -> Result<InsertOutcome, PartError> {
    let (inserted, quantity) = sqlx::query_as::<_, (bool, i32)>(
        "WITH prior AS (SELECT is_deleted FROM parts WHERE part_number = $1)
         INSERT INTO parts (part_number, part_name, quantity, unit, description)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (part_number) DO UPDATE SET
             quantity = CASE WHEN parts.is_deleted THEN EXCLUDED.quantity
                             ELSE parts.quantity + EXCLUDED.quantity END,
             part_name = CASE WHEN parts.is_deleted THEN EXCLUDED.part_name ELSE parts.part_name END,
             unit = CASE WHEN parts.is_deleted THEN EXCLUDED.unit ELSE parts.unit END,
             description = CASE WHEN parts.is_deleted THEN EXCLUDED.description ELSE parts.description END,
             is_deleted = FALSE,
             updated_at = now()
         RETURNING (xmax = 0) OR COALESCE((SELECT is_deleted FROM prior), FALSE), quantity",
    )
    .bind(&part.part_number)
    .bind(&part.part_name)
    .bind(part.quantity)
    .bind(&part.unit)
    .bind(&part.description)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| overflow_or_database(e, &part.part_number))?;

    if inserted {
        Ok(InsertOutcome::Inserted)
    } else {
        Ok(InsertOutcome::Merged { quantity })
    }
}

fn overflow_or_database(err: sqlx::Error, part_number: &str) -> PartError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) => {
            PartError::QuantityOverflow(part_number.to_owned())
        }
        _ => PartError::Database(err),
    }
}

/// Insert one part, merging stock into an existing part with the same number.
///
/// # Errors
///
/// Returns a database error if the statement fails, or `QuantityOverflow`
/// if the merged stock does not fit.
pub async fn insert_part(pool: &PgPool, part: &NewPart) -> Result<InsertOutcome, PartError> {
    let mut conn = pool.acquire().await?;
    let outcome = upsert_part(&mut conn, part).await?;

    match outcome {
        InsertOutcome::Inserted => info!(part_number = %part.part_number, quantity = part.quantity, "part inserted"),
        InsertOutcome::Merged { quantity } => {
            info!(part_number = %part.part_number, added = part.quantity, total = quantity, "part stock merged");
        }
    }
    Ok(outcome)
}

/// Insert a validated batch in a single transaction.
///
/// Rows are written in part-number order so two overlapping batches lock
/// their rows in the same order.
///
/// # Errors
///
/// Returns the first failing row's error; nothing is committed in that case.
pub async fn bulk_insert_parts(pool: &PgPool, parts: &[NewPart]) -> Result<BulkOutcome, PartError> {
    let mut ordered: Vec<&NewPart> = parts.iter().collect();
    ordered.sort_by(|a, b| a.part_number.cmp(&b.part_number));

    let mut tx = pool.begin().await?;
    let mut outcome = BulkOutcome::default();
    for part in ordered {
        match upsert_part(&mut tx, part).await? {
            InsertOutcome::Inserted => outcome.inserted += 1,
            InsertOutcome::Merged { .. } => outcome.merged += 1,
        }
    }
    tx.commit().await?;

    info!(inserted = outcome.inserted, merged = outcome.merged, "bulk part insert committed");
    Ok(outcome)
}

/// Update a live part. Absent fields keep their stored values.
///
/// # Errors
///
/// Returns `NotFound` when the part does not exist or is deleted, and
/// `Invalid` for a blank name or negative quantity.
pub async fn update_part(pool: &PgPool, part_number: &str, update: PartUpdate) -> Result<Part, PartError> {
    if let Some(name) = update.part_name.as_deref()
        && name.trim().is_empty()
    {
        return Err(PartError::Invalid("part name must not be blank".into()));
    }
    if let Some(quantity) = update.quantity
        && quantity < 0
    {
        return Err(PartError::Invalid(format!("quantity must not be negative (got {quantity})")));
    }

    let row = sqlx::query_as::<_, PartRow>(
        "UPDATE parts
         SET part_name = COALESCE($2, part_name),
             quantity = COALESCE($3, quantity),
             unit = COALESCE($4, unit),
             description = COALESCE($5, description),
             updated_at = now()
         WHERE part_number = $1 AND NOT is_deleted
         RETURNING part_number, part_name, quantity, unit, description, created_at, updated_at",
    )
    .bind(part_number)
    .bind(update.part_name.map(|n| n.trim().to_owned()))
    .bind(update.quantity)
    .bind(non_blank(update.unit))
    .bind(non_blank(update.description))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PartError::NotFound(part_number.to_owned()))?;

    info!(%part_number, "part updated");
    Ok(row.into())
}

/// Soft-delete a part.
///
/// # Errors
///
/// Returns `NotFound` when no live part has that number.
pub async fn soft_delete_part(pool: &PgPool, part_number: &str) -> Result<(), PartError> {
    let result = sqlx::query(
        "UPDATE parts SET is_deleted = TRUE, updated_at = now() WHERE part_number = $1 AND NOT is_deleted",
    )
    .bind(part_number)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PartError::NotFound(part_number.to_owned()));
    }
    info!(%part_number, "part soft-deleted");
    Ok(())
}

// =============================================================================
// READS
// =============================================================================

/// Fetch one live part.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_part(pool: &PgPool, part_number: &str) -> Result<Option<Part>, PartError> {
    let row = sqlx::query_as::<_, PartRow>(
        "SELECT part_number, part_name, quantity, unit, description, created_at, updated_at
         FROM parts WHERE part_number = $1 AND NOT is_deleted",
    )
    .bind(part_number)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Part::from))
}

/// All live parts ordered by part number.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_parts(pool: &PgPool) -> Result<Vec<Part>, PartError> {
    list_parts_sorted(pool, PartSortColumn::PartNumber, SortOrder::Asc).await
}

/// Live parts whose stock is at or below `threshold`, lowest stock first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_low_stock_parts(pool: &PgPool, threshold: i32) -> Result<Vec<Part>, PartError> {
    let rows = sqlx::query_as::<_, PartRow>(
        "SELECT part_number, part_name, quantity, unit, description, created_at, updated_at
         FROM parts
         WHERE NOT is_deleted AND quantity <= $1
         ORDER BY quantity ASC, part_number ASC",
    )
    .bind(threshold)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Part::from).collect())
}

/// Live parts ordered by a whitelisted column. Ties break on part number.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_parts_sorted(
    pool: &PgPool,
    column: PartSortColumn,
    order: SortOrder,
) -> Result<Vec<Part>, PartError> {
    let sql = format!(
        "SELECT part_number, part_name, quantity, unit, description, created_at, updated_at
         FROM parts
         WHERE NOT is_deleted
         ORDER BY {} {} NULLS LAST, part_number ASC",
        column.as_sql(),
        order.as_sql(),
    );
    let rows = sqlx::query_as::<_, PartRow>(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Part::from).collect())
}

// =============================================================================
// EXPORT
// =============================================================================

/// Render parts as CSV with a header row.
///
/// # Errors
///
/// Returns `Export` if the CSV writer fails.
pub fn parts_to_csv(parts: &[Part]) -> Result<Vec<u8>, PartError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["part_number", "part_name", "quantity", "unit", "description", "created_at", "updated_at"])?;
    for part in parts {
        let created_at = part
            .created_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let updated_at = part
            .updated_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let quantity = part.quantity.to_string();
        writer.write_record([
            part.part_number.as_str(),
            part.part_name.as_str(),
            quantity.as_str(),
            part.unit.as_deref().unwrap_or(""),
            part.description.as_deref().unwrap_or(""),
            created_at.as_str(),
            updated_at.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| PartError::Export(csv::Error::from(e.into_error())))
}

#[cfg(test)]
#[path = "part_test.rs"]
mod tests;
