//! Part-usage service: stock-checked consumption records and their queries.
//!
//! DESIGN
//! ======
//! Registering usage decrements the part's stock in the same transaction that
//! inserts the usage row. The part row is locked with `FOR UPDATE` first, so
//! two concurrent registrations cannot both pass the stock check on the same
//! units. Editing a record's quantity applies only the difference: an
//! increase needs that much spare stock, a decrease returns stock.
//!
//! Listings always join the part name and unit so the page can render rows
//! without a second lookup.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use tracing::info;

use super::sort::SortOrder;

/// Recorded as `created_by` when the request does not name anyone.
pub const DEFAULT_CREATED_BY: &str = "system";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("usage record not found: {0}")]
    NotFound(i32),
    #[error("part not found: {0}")]
    PartNotFound(String),
    #[error("insufficient stock (current: {current}, requested: {requested})")]
    InsufficientStock { current: i32, requested: i32 },
    #[error("invalid usage: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A usage record joined with its part's name and unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub usage_id: i32,
    pub part_number: String,
    pub part_name: String,
    pub unit: Option<String>,
    pub quantity_used: i32,
    pub usage_location: String,
    pub used_date: Date,
    pub note: Option<String>,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

type UsageRow = (
    i32,
    String,
    String,
    Option<String>,
    i32,
    String,
    Date,
    Option<String>,
    String,
    OffsetDateTime,
);

impl From<UsageRow> for UsageRecord {
    fn from(
        (
            usage_id,
            part_number,
            part_name,
            unit,
            quantity_used,
            usage_location,
            used_date,
            note,
            created_by,
            created_at,
        ): UsageRow,
    ) -> Self {
        Self {
            usage_id,
            part_number,
            part_name,
            unit,
            quantity_used,
            usage_location,
            used_date,
            note,
            created_by,
            created_at,
        }
    }
}

const USAGE_SELECT: &str = "SELECT u.usage_id, u.part_number, p.part_name, p.unit, u.quantity_used, \
     u.usage_location, u.used_date, u.note, u.created_by, u.created_at \
     FROM part_usage u JOIN parts p ON p.part_number = u.part_number";

/// Request body for `POST /livewalk/part-usage`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageInput {
    #[serde(default)]
    pub part_number: String,
    pub quantity_used: Option<i32>,
    #[serde(default)]
    pub usage_location: String,
    /// `YYYY-MM-DD`; a `YYYY-MM-DDTHH:MM` value from a datetime input is
    /// accepted and truncated to its date.
    pub used_date: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<String>,
}

/// Request body for `PUT /livewalk/part-usage/{id}`. Absent fields keep
/// their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageUpdate {
    pub quantity_used: Option<i32>,
    pub usage_location: Option<String>,
    pub used_date: Option<String>,
    pub note: Option<String>,
}

/// A validated usage registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUsage {
    pub part_number: String,
    pub quantity_used: i32,
    pub usage_location: String,
    pub used_date: Date,
    pub note: Option<String>,
    pub created_by: String,
}

/// A validated usage edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageChange {
    pub quantity_used: Option<i32>,
    pub usage_location: Option<String>,
    pub used_date: Option<Date>,
    pub note: Option<String>,
}

/// Per-part consumption totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub part_number: String,
    pub part_name: String,
    pub total_used: i64,
    pub usage_count: i64,
}

/// Columns accepted by the sorted usage listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsageSortColumn {
    #[default]
    UsedDate,
    PartNumber,
    PartName,
    QuantityUsed,
    UsageLocation,
    CreatedAt,
}

impl UsageSortColumn {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "used_date" | "usedDate" => Some(Self::UsedDate),
            "part_number" | "partNumber" => Some(Self::PartNumber),
            "part_name" | "partName" => Some(Self::PartName),
            "quantity_used" | "quantityUsed" => Some(Self::QuantityUsed),
            "usage_location" | "usageLocation" => Some(Self::UsageLocation),
            "created_at" | "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::UsedDate => "u.used_date",
            Self::PartNumber => "u.part_number",
            Self::PartName => "p.part_name",
            Self::QuantityUsed => "u.quantity_used",
            Self::UsageLocation => "u.usage_location",
            Self::CreatedAt => "u.created_at",
        }
    }
}

/// Parsed form of the advanced search box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedSearch {
    /// Bare tokens re-joined with single spaces.
    pub keyword: Option<String>,
    /// `+token`: every one must match.
    pub include: Vec<String>,
    /// `-token`: none may match.
    pub exclude: Vec<String>,
    pub column: UsageSortColumn,
    pub order: SortOrder,
}

impl AdvancedSearch {
    /// Build a search from raw query parameters. Unknown columns sort by
    /// `used_date`; an order other than `asc`/`desc` means ascending.
    #[must_use]
    pub fn from_query(keyword: Option<&str>, column: Option<&str>, order: Option<&str>) -> Self {
        let (keyword, include, exclude) = parse_search_terms(keyword.unwrap_or(""));
        Self {
            keyword,
            include,
            exclude,
            column: column.and_then(UsageSortColumn::parse).unwrap_or_default(),
            order: SortOrder::parse_or(order, SortOrder::Asc),
        }
    }
}

// =============================================================================
// PARSING / VALIDATION
// =============================================================================

/// Split a search string into base keyword, `+include` and `-exclude` terms.
/// A lone `+` or `-` is treated as an ordinary token.
#[must_use]
pub fn parse_search_terms(raw: &str) -> (Option<String>, Vec<String>, Vec<String>) {
    let mut base = Vec::new();
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for token in raw.split_whitespace() {
        if let Some(term) = token.strip_prefix('+').filter(|t| !t.is_empty()) {
            include.push(term.to_owned());
        } else if let Some(term) = token.strip_prefix('-').filter(|t| !t.is_empty()) {
            exclude.push(term.to_owned());
        } else {
            base.push(token);
        }
    }

    let keyword = if base.is_empty() { None } else { Some(base.join(" ")) };
    (keyword, include, exclude)
}

/// Wrap a term for `ILIKE`, escaping its wildcards.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// Parse a used date. Only the leading `YYYY-MM-DD` is read, so values from
/// date and datetime inputs are both accepted.
///
/// # Errors
///
/// Returns `Invalid` when the value does not start with a calendar date.
pub fn parse_used_date(raw: &str) -> Result<Date, UsageError> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    Date::parse(date_part, time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|_| UsageError::Invalid(format!("invalid used date: {raw}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn validate_quantity(quantity: i32) -> Result<i32, UsageError> {
    if quantity <= 0 {
        return Err(UsageError::Invalid(format!("quantity used must be positive (got {quantity})")));
    }
    Ok(quantity)
}

impl UsageInput {
    /// Trim and validate a registration. A missing used date means `today`.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a blank part number or location, a missing or
    /// non-positive quantity, or a malformed date.
    pub fn validate(self, today: Date) -> Result<NewUsage, UsageError> {
        let part_number = self.part_number.trim().to_owned();
        if part_number.is_empty() {
            return Err(UsageError::Invalid("part number is required".into()));
        }
        let quantity_used = validate_quantity(
            self.quantity_used
                .ok_or_else(|| UsageError::Invalid("quantity used is required".into()))?,
        )?;
        let usage_location = self.usage_location.trim().to_owned();
        if usage_location.is_empty() {
            return Err(UsageError::Invalid("usage location is required".into()));
        }
        let used_date = match non_blank(self.used_date) {
            Some(raw) => parse_used_date(&raw)?,
            None => today,
        };

        Ok(NewUsage {
            part_number,
            quantity_used,
            usage_location,
            used_date,
            note: non_blank(self.note),
            created_by: non_blank(self.created_by).unwrap_or_else(|| DEFAULT_CREATED_BY.to_owned()),
        })
    }
}

impl UsageUpdate {
    /// Validate an edit.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a non-positive quantity, a blank location, or a
    /// malformed date.
    pub fn validate(self) -> Result<UsageChange, UsageError> {
        let quantity_used = self.quantity_used.map(validate_quantity).transpose()?;
        let usage_location = match self.usage_location {
            Some(loc) if loc.trim().is_empty() => {
                return Err(UsageError::Invalid("usage location must not be blank".into()));
            }
            Some(loc) => Some(loc.trim().to_owned()),
            None => None,
        };
        let used_date = non_blank(self.used_date)
            .map(|raw| parse_used_date(&raw))
            .transpose()?;
        Ok(UsageChange { quantity_used, usage_location, used_date, note: non_blank(self.note) })
    }
}

/// Stock left after consuming `requested` units.
///
/// # Errors
///
/// Returns `InsufficientStock` when `requested` exceeds `current`.
pub fn stock_after_usage(current: i32, requested: i32) -> Result<i32, UsageError> {
    if requested > current {
        return Err(UsageError::InsufficientStock { current, requested });
    }
    Ok(current - requested)
}

/// Stock left after changing a record from `old_used` to `new_used` units.
///
/// # Errors
///
/// Returns `InsufficientStock` (with the extra units as `requested`) when an
/// increase exceeds the current stock.
pub fn stock_after_change(current: i32, old_used: i32, new_used: i32) -> Result<i32, UsageError> {
    let extra = new_used - old_used;
    if extra > 0 {
        stock_after_usage(current, extra)
    } else {
        current
            .checked_sub(extra)
            .ok_or_else(|| UsageError::Invalid("stock would overflow".into()))
    }
}

// =============================================================================
// WRITES
// =============================================================================

async fn fetch_usage(conn: &mut PgConnection, usage_id: i32) -> Result<UsageRecord, UsageError> {
    let sql = format!("{USAGE_SELECT} WHERE u.usage_id = $1");
    sqlx::query_as::<_, UsageRow>(&sql)
        .bind(usage_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(UsageRecord::from)
        .ok_or(UsageError::NotFound(usage_id))
}

/// Register usage and decrement the part's stock atomically.
///
/// # Errors
///
/// Returns `PartNotFound` for an unknown or deleted part and
/// `InsufficientStock` when the part has fewer units than requested.
pub async fn register_usage(pool: &PgPool, usage: &NewUsage) -> Result<UsageRecord, UsageError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_scalar::<_, i32>(
        "SELECT quantity FROM parts WHERE part_number = $1 AND NOT is_deleted FOR UPDATE",
    )
    .bind(&usage.part_number)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| UsageError::PartNotFound(usage.part_number.clone()))?;

    let remaining = stock_after_usage(current, usage.quantity_used)?;

    sqlx::query("UPDATE parts SET quantity = $2, updated_at = now() WHERE part_number = $1")
        .bind(&usage.part_number)
        .bind(remaining)
        .execute(&mut *tx)
        .await?;

    let usage_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO part_usage (part_number, quantity_used, usage_location, used_date, note, created_by)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING usage_id",
    )
    .bind(&usage.part_number)
    .bind(usage.quantity_used)
    .bind(&usage.usage_location)
    .bind(usage.used_date)
    .bind(&usage.note)
    .bind(&usage.created_by)
    .fetch_one(&mut *tx)
    .await?;

    let record = fetch_usage(&mut tx, usage_id).await?;
    tx.commit().await?;

    info!(
        usage_id,
        part_number = %usage.part_number,
        quantity = usage.quantity_used,
        location = %usage.usage_location,
        remaining,
        "usage registered"
    );
    Ok(record)
}

/// Edit a usage record, adjusting stock by the quantity difference.
///
/// # Errors
///
/// Returns `NotFound` for an unknown record and `InsufficientStock` when an
/// increase exceeds the part's remaining stock.
pub async fn update_usage(pool: &PgPool, usage_id: i32, change: &UsageChange) -> Result<UsageRecord, UsageError> {
    let mut tx = pool.begin().await?;

    let (part_number, old_used) = sqlx::query_as::<_, (String, i32)>(
        "SELECT part_number, quantity_used FROM part_usage WHERE usage_id = $1 FOR UPDATE",
    )
    .bind(usage_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(UsageError::NotFound(usage_id))?;

    if let Some(new_used) = change.quantity_used
        && new_used != old_used
    {
        let current = sqlx::query_scalar::<_, i32>("SELECT quantity FROM parts WHERE part_number = $1 FOR UPDATE")
            .bind(&part_number)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| UsageError::PartNotFound(part_number.clone()))?;
        let remaining = stock_after_change(current, old_used, new_used)?;
        sqlx::query("UPDATE parts SET quantity = $2, updated_at = now() WHERE part_number = $1")
            .bind(&part_number)
            .bind(remaining)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        "UPDATE part_usage
         SET quantity_used = COALESCE($2, quantity_used),
             usage_location = COALESCE($3, usage_location),
             used_date = COALESCE($4, used_date),
             note = COALESCE($5, note)
         WHERE usage_id = $1",
    )
    .bind(usage_id)
    .bind(change.quantity_used)
    .bind(&change.usage_location)
    .bind(change.used_date)
    .bind(&change.note)
    .execute(&mut *tx)
    .await?;

    let record = fetch_usage(&mut tx, usage_id).await?;
    tx.commit().await?;

    info!(usage_id, %part_number, "usage updated");
    Ok(record)
}

// =============================================================================
// READS
// =============================================================================

async fn fetch_all(pool: &PgPool, sql: &str) -> Result<Vec<UsageRecord>, UsageError> {
    let rows = sqlx::query_as::<_, UsageRow>(sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(UsageRecord::from).collect())
}

/// One usage record.
///
/// # Errors
///
/// Returns `NotFound` when the id is unknown.
pub async fn find_usage(pool: &PgPool, usage_id: i32) -> Result<UsageRecord, UsageError> {
    let mut conn = pool.acquire().await?;
    fetch_usage(&mut conn, usage_id).await
}

/// All usage, most recent `used_date` first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_usage(pool: &PgPool) -> Result<Vec<UsageRecord>, UsageError> {
    fetch_all(pool, &format!("{USAGE_SELECT} ORDER BY u.used_date DESC, u.usage_id DESC")).await
}

/// Case-insensitive match on part name, part number or usage location. A
/// blank keyword lists everything.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn search_usage(pool: &PgPool, keyword: &str) -> Result<Vec<UsageRecord>, UsageError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return list_usage(pool).await;
    }
    let mut builder = QueryBuilder::<Postgres>::new(USAGE_SELECT);
    builder.push(" WHERE ");
    push_text_match(&mut builder, like_pattern(keyword));
    builder.push(" ORDER BY u.used_date DESC, u.usage_id DESC");

    let rows = builder.build_query_as::<UsageRow>().fetch_all(pool).await?;
    Ok(rows.into_iter().map(UsageRecord::from).collect())
}

fn push_text_match(builder: &mut QueryBuilder<'_, Postgres>, pattern: String) {
    builder.push("(p.part_name ILIKE ");
    builder.push_bind(pattern.clone());
    builder.push(" OR u.part_number ILIKE ");
    builder.push_bind(pattern.clone());
    builder.push(" OR u.usage_location ILIKE ");
    builder.push_bind(pattern);
    builder.push(")");
}

/// Keyword search with `+include` / `-exclude` terms and a chosen sort.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn search_advanced(pool: &PgPool, search: &AdvancedSearch) -> Result<Vec<UsageRecord>, UsageError> {
    let mut builder = QueryBuilder::<Postgres>::new(USAGE_SELECT);
    builder.push(" WHERE TRUE");

    for term in search.keyword.iter().chain(search.include.iter()) {
        builder.push(" AND ");
        push_text_match(&mut builder, like_pattern(term));
    }
    for term in &search.exclude {
        builder.push(" AND NOT ");
        push_text_match(&mut builder, like_pattern(term));
    }

    builder.push(format!(
        " ORDER BY {} {}, u.usage_id DESC",
        search.column.as_sql(),
        search.order.as_sql()
    ));

    let rows = builder.build_query_as::<UsageRow>().fetch_all(pool).await?;
    Ok(rows.into_iter().map(UsageRecord::from).collect())
}

/// Usage at one exact location.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_usage_by_location(pool: &PgPool, location: &str) -> Result<Vec<UsageRecord>, UsageError> {
    let sql = format!("{USAGE_SELECT} WHERE u.usage_location = $1 ORDER BY u.used_date DESC, u.usage_id DESC");
    let rows = sqlx::query_as::<_, UsageRow>(&sql)
        .bind(location.trim())
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(UsageRecord::from).collect())
}

/// Usage of one part.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_usage_by_part(pool: &PgPool, part_number: &str) -> Result<Vec<UsageRecord>, UsageError> {
    let sql = format!("{USAGE_SELECT} WHERE u.part_number = $1 ORDER BY u.used_date DESC, u.usage_id DESC");
    let rows = sqlx::query_as::<_, UsageRow>(&sql)
        .bind(part_number)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(UsageRecord::from).collect())
}

/// Usage with `used_date` in `start..=end`.
///
/// # Errors
///
/// Returns `Invalid` when `start` is after `end`.
pub async fn list_usage_by_date_range(pool: &PgPool, start: Date, end: Date) -> Result<Vec<UsageRecord>, UsageError> {
    if start > end {
        return Err(UsageError::Invalid(format!("start date {start} is after end date {end}")));
    }
    let sql = format!("{USAGE_SELECT} WHERE u.used_date BETWEEN $1 AND $2 ORDER BY u.used_date DESC, u.usage_id DESC");
    let rows = sqlx::query_as::<_, UsageRow>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(UsageRecord::from).collect())
}

/// All usage ordered by a whitelisted column.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_usage_sorted(
    pool: &PgPool,
    column: UsageSortColumn,
    order: SortOrder,
) -> Result<Vec<UsageRecord>, UsageError> {
    fetch_all(
        pool,
        &format!("{USAGE_SELECT} ORDER BY {} {}, u.usage_id DESC", column.as_sql(), order.as_sql()),
    )
    .await
}

/// Total units used and record count per part, heaviest use first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn usage_summary(pool: &PgPool) -> Result<Vec<UsageSummary>, UsageError> {
    let rows = sqlx::query_as::<_, (String, String, i64, i64)>(
        "SELECT u.part_number, p.part_name, SUM(u.quantity_used)::BIGINT, COUNT(*)
         FROM part_usage u JOIN parts p ON p.part_number = u.part_number
         GROUP BY u.part_number, p.part_name
         ORDER BY 3 DESC, u.part_number ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(part_number, part_name, total_used, usage_count)| UsageSummary {
            part_number,
            part_name,
            total_used,
            usage_count,
        })
        .collect())
}

#[cfg(test)]
#[path = "usage_test.rs"]
mod tests;
