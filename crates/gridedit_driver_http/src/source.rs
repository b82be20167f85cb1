use std::time::Duration;

use async_trait::async_trait;
use gridedit_core::{
    Aggregates, GridConfig, GridError, PageData, PageRequest, RecordSource, SaveBatch,
    SaveReceipt, Session, TableInfo, TableRef,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// `RecordSource` backed by the grid's JSON HTTP API.
///
/// Every non-2xx answer is an error; nothing is retried.
#[derive(Clone)]
pub struct HttpRecordSource {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Deserialize)]
struct SaveResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpRecordSource {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, GridError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("gridedit/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GridError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GridConfig) -> Result<Self, GridError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub(crate) fn data_url(&self, table: &TableRef) -> String {
        format!(
            "{}/api/data/{}/{}",
            self.api_base,
            urlencoding::encode(&table.schema),
            urlencoding::encode(&table.name)
        )
    }

    pub(crate) fn aggregates_url(&self, table: &TableRef) -> String {
        format!(
            "{}/api/aggregates/{}/{}",
            self.api_base,
            urlencoding::encode(&table.schema),
            urlencoding::encode(&table.name)
        )
    }

    pub(crate) fn tables_url(&self, schema: &str) -> String {
        format!("{}/api/tables/{}", self.api_base, urlencoding::encode(schema))
    }

    pub(crate) fn save_url(&self) -> String {
        format!("{}/api/save", self.api_base)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, GridError> {
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &body));
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GridError> {
        log::debug!("[HTTP] GET {}", url);
        let body = self.send(self.http.get(url).query(query)).await?;
        decode_body(&body)
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageData, GridError> {
        let url = self.data_url(&request.table);
        let page: Option<PageData> = self.get_json(&url, &request.query_pairs()).await?;
        Ok(page.unwrap_or_default())
    }

    async fn fetch_aggregates(&self, table: &TableRef) -> Result<Aggregates, GridError> {
        let url = self.aggregates_url(table);
        let aggregates: Option<Aggregates> = self.get_json(&url, &[]).await?;
        Ok(aggregates.unwrap_or_default())
    }

    async fn list_tables(
        &self,
        schema: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<TableInfo>, GridError> {
        let url = self.tables_url(schema);
        let query = [("pattern", pattern.unwrap_or("%").to_string())];
        let tables: Option<Vec<TableInfo>> = self.get_json(&url, &query).await?;
        Ok(tables.unwrap_or_default())
    }

    async fn save_batch(
        &self,
        batch: &SaveBatch,
        session: &Session,
    ) -> Result<SaveReceipt, GridError> {
        let url = self.save_url();
        log::info!(
            "[HTTP] POST {} ({}.{}: {} insert(s), {} update(s), {} delete(s))",
            url,
            batch.schema_name,
            batch.table_name,
            batch.inserts.len(),
            batch.updates.len(),
            batch.deletes.len()
        );

        let request = self
            .http
            .post(&url)
            .bearer_auth(session.access_token())
            .json(batch);

        let body = self.send(request).await?;
        decode_receipt(&body)
    }
}

fn transport_error(error: reqwest::Error) -> GridError {
    if error.is_timeout() {
        GridError::Timeout
    } else if error.is_decode() {
        GridError::Decode(error.to_string())
    } else {
        log::warn!("[HTTP] {}", error);
        GridError::Network(error.to_string())
    }
}

/// Map a non-2xx response. The API reports failures as `{"error": "..."}`;
/// anything else is passed through as the raw body.
pub(crate) fn error_from_status(status: u16, body: &str) -> GridError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.trim().to_string());

    let message = if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        message
    };

    match status {
        401 | 403 => GridError::Auth(message),
        _ => GridError::remote(status, message),
    }
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, GridError> {
    serde_json::from_str(body).map_err(|e| GridError::Decode(e.to_string()))
}

/// A 2xx answer is a success unless the body says otherwise.
pub(crate) fn decode_receipt(body: &str) -> Result<SaveReceipt, GridError> {
    if body.trim().is_empty() {
        return Ok(SaveReceipt {
            success: true,
            message: None,
        });
    }

    let response: SaveResponse = decode_body(body)?;
    Ok(SaveReceipt {
        success: response.success.unwrap_or(true),
        message: response.message,
    })
}
