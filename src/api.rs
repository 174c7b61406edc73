// src/api.rs

use crate::config::ApiConfig;
use crate::invoice::{InvoicePayload, PersistedInvoice};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// One page of `GET /invoices`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InvoicePage {
    #[serde(default)]
    pub data: Vec<PersistedInvoice>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(rename = "totalPages", default)]
    pub total_pages: u32,
    #[serde(rename = "totalItems", default)]
    pub total_items: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn to_query_string(self) -> String {
        let mut parts = Vec::new();
        if let Some(page) = self.page {
            parts.push(format!("page={page}"));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={limit}"));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }
}

/// The REST collaborator that owns invoice persistence.
#[async_trait]
pub trait InvoiceApi: Send + Sync {
    async fn list(&self, query: PageQuery) -> Result<InvoicePage, ApiError>;
    async fn get(&self, id: i64) -> Result<PersistedInvoice, ApiError>;
    /// Returns the new id when the server reports one.
    async fn create(&self, payload: &InvoicePayload) -> Result<Option<i64>, ApiError>;
    async fn update(&self, id: i64, payload: &InvoicePayload) -> Result<(), ApiError>;
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
}

/// `{ data: T }`
#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// The list endpoint answers either with the page directly or wrapped in
/// `{ status, message, data: <page> }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(InvoicePage),
    Wrapped(DataEnvelope<InvoicePage>),
}

/// New id from either `{ id }` or `{ data: { id } }`, given as a number or
/// numeric text.
fn created_id(body: &serde_json::Value) -> Option<i64> {
    let as_id = |v: &serde_json::Value| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    };
    body.get("id")
        .and_then(as_id)
        .or_else(|| body.get("data")?.get("id").and_then(as_id))
}

pub struct HttpInvoiceApi {
    client: Client,
    base_url: String,
    timeout: Duration,
    cancel: CancellationToken,
}

impl HttpInvoiceApi {
    pub fn new(cfg: &ApiConfig, cancel: CancellationToken) -> Result<Self, ApiError> {
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            timeout,
            cancel,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, honouring the cancellation token, and reject non-2xx replies.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
            result = request.send() => result.map_err(|e| {
                if e.is_timeout() { ApiError::Timeout(self.timeout) } else { ApiError::Http(e) }
            })?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "API returned error status");
            return Err(ApiError::Status { status, body });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let body = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
            body = response.text() => body?,
        };
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl InvoiceApi for HttpInvoiceApi {
    async fn list(&self, query: PageQuery) -> Result<InvoicePage, ApiError> {
        let url = self.url(&format!("/invoices{}", query.to_query_string()));
        info!(url = %url, "Fetching invoices");
        let response = self.send(self.client.get(&url)).await?;
        let page = match self.read_json::<ListBody>(response).await? {
            ListBody::Wrapped(envelope) => envelope.data,
            ListBody::Bare(page) => page,
        };
        info!(count = page.data.len(), page = page.page, limit = page.limit, total = page.total_items, "Invoices fetched");
        Ok(page)
    }

    async fn get(&self, id: i64) -> Result<PersistedInvoice, ApiError> {
        let url = self.url(&format!("/invoices/{id}"));
        info!(id, "Fetching invoice");
        let response = self.send(self.client.get(&url)).await?;
        let envelope: DataEnvelope<PersistedInvoice> = self.read_json(response).await?;
        Ok(envelope.data)
    }

    async fn create(&self, payload: &InvoicePayload) -> Result<Option<i64>, ApiError> {
        let url = self.url("/invoices");
        info!(customer = %payload.customer_name, items = payload.items.len(), "Saving invoice");
        let response = self.send(self.client.post(&url).json(payload)).await?;
        // The write already succeeded; an unreadable body only loses the id.
        let id = self
            .read_json::<serde_json::Value>(response)
            .await
            .ok()
            .as_ref()
            .and_then(created_id);
        info!(id = ?id, "Invoice created");
        Ok(id)
    }

    async fn update(&self, id: i64, payload: &InvoicePayload) -> Result<(), ApiError> {
        let url = self.url(&format!("/invoices/{id}"));
        info!(id, items = payload.items.len(), "Updating invoice");
        self.send(self.client.put(&url).json(payload)).await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let url = self.url(&format!("/invoices/{id}"));
        info!(id, "Deleting invoice");
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }
}
