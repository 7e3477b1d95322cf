//! REST client for the inventory API.
//!
//! ERROR HANDLING
//! ==============
//! The server answers failures with a plain-text body and a 4xx/5xx status.
//! [`ApiError::Server`] carries that body verbatim so the page can show the
//! server's own wording ("insufficient stock (current: 3, requested: 4)").

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::types::{BulkOutcome, NewPartRequest, Part, UsageRecord, UsageRequest};

/// Base path of the parts resource.
pub const PARTS_API: &str = "/livewalk/parts";
/// Base path of the part-usage resource.
pub const USAGE_API: &str = "/livewalk/part-usage";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Server { status: u16, message: String },
}

/// Operations the page performs against the inventory API.
#[async_trait::async_trait]
pub trait InventoryApi: Send + Sync {
    /// `GET /livewalk/parts`
    async fn list_parts(&self) -> Result<Vec<Part>, ApiError>;

    /// `GET /livewalk/parts/low-stock?threshold=N`
    async fn list_low_stock_parts(&self, threshold: i32) -> Result<Vec<Part>, ApiError>;

    /// `GET /livewalk/part-usage`
    async fn list_usage(&self) -> Result<Vec<UsageRecord>, ApiError>;

    /// `POST /livewalk/parts/insert`; returns the server's confirmation text.
    async fn insert_part(&self, part: &NewPartRequest) -> Result<String, ApiError>;

    /// `POST /livewalk/part-usage`
    async fn register_usage(&self, usage: &UsageRequest) -> Result<UsageRecord, ApiError>;

    /// `POST /livewalk/parts/bulk`
    async fn bulk_insert_parts(&self, parts: &[NewPartRequest]) -> Result<BulkOutcome, ApiError>;
}

/// HTTP implementation of [`InventoryApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Client for the API served at `base_url` (e.g. `http://127.0.0.1:3000`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let resp = request.send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(server_error(status.as_u16(), body))
}

async fn read_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    Ok(send(request).await?.json::<T>().await?)
}

/// Build a `Server` error, falling back to the status when the body is blank.
fn server_error(status: u16, body: String) -> ApiError {
    let message = if body.trim().is_empty() {
        format!("request failed: {status}")
    } else {
        body.trim().to_owned()
    };
    ApiError::Server { status, message }
}

#[async_trait::async_trait]
impl InventoryApi for ApiClient {
    async fn list_parts(&self) -> Result<Vec<Part>, ApiError> {
        read_json(self.http.get(self.url(PARTS_API))).await
    }

    async fn list_low_stock_parts(&self, threshold: i32) -> Result<Vec<Part>, ApiError> {
        let request = self
            .http
            .get(self.url(&format!("{PARTS_API}/low-stock")))
            .query(&[("threshold", threshold)]);
        read_json(request).await
    }

    async fn list_usage(&self) -> Result<Vec<UsageRecord>, ApiError> {
        read_json(self.http.get(self.url(USAGE_API))).await
    }

    async fn insert_part(&self, part: &NewPartRequest) -> Result<String, ApiError> {
        let request = self.http.post(self.url(&format!("{PARTS_API}/insert"))).json(part);
        Ok(send(request).await?.text().await?)
    }

    async fn register_usage(&self, usage: &UsageRequest) -> Result<UsageRecord, ApiError> {
        read_json(self.http.post(self.url(USAGE_API)).json(usage)).await
    }

    async fn bulk_insert_parts(&self, parts: &[NewPartRequest]) -> Result<BulkOutcome, ApiError> {
        let request = self.http.post(self.url(&format!("{PARTS_API}/bulk"))).json(parts);
        read_json(request).await
    }
}
