//! Wire types shared with the inventory API.
//!
//! Timestamps stay as the strings the server sends; the page only displays
//! and sorts them, and RFC 3339 strings in one offset sort chronologically.

use serde::{Deserialize, Serialize};

/// A live part as returned by `/livewalk/parts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub part_number: String,
    pub part_name: String,
    pub quantity: i32,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A usage record as returned by `/livewalk/part-usage`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub usage_id: i32,
    pub part_number: String,
    pub part_name: String,
    pub unit: Option<String>,
    pub quantity_used: i32,
    pub usage_location: String,
    /// `YYYY-MM-DD`.
    pub used_date: String,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: String,
}

/// Body of `POST /livewalk/parts/insert` and one row of `POST /bulk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPartRequest {
    pub part_number: String,
    pub part_name: String,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /livewalk/part-usage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    pub part_number: String,
    pub quantity_used: i32,
    pub usage_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Result of a bulk insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BulkOutcome {
    pub inserted: usize,
    pub merged: usize,
}
