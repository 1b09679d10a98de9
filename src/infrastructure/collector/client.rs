//! Signed HTTP client for the product-list endpoint

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{Credentials, ProductPage, ProductQuery};
use crate::shared::errors::CollectorError;
use crate::shared::types::CollectorConfig;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const MAX_ERROR_BODY: usize = 256;

/// Anything that can serve pages of the product list
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Fetch page `page_index` (1-based) for `query`
    async fn fetch_page(&self, query: &ProductQuery, page_index: u32) -> Result<ProductPage, CollectorError>;

    fn page_size(&self) -> u32;
}

/// Body shapes the endpoint answers with
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Error { code: i64, msg: String },
    Page(ProductPage),
}

/// Classify a raw response. An object with `code`/`msg` is an API error
/// whatever the status; any other non-2xx status is an HTTP error.
pub fn parse_response(status: u16, body: &str) -> Result<ProductPage, CollectorError> {
    let parsed = serde_json::from_str::<ApiResponse>(body);
    if !(200..300).contains(&status) {
        return Err(match parsed {
            Ok(ApiResponse::Error { code, msg }) => CollectorError::Api { code, msg },
            _ => CollectorError::HttpStatus {
                status,
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            },
        });
    }
    match parsed? {
        ApiResponse::Error { code, msg } => Err(CollectorError::Api { code, msg }),
        ApiResponse::Page(page) => Ok(page),
    }
}

pub struct BinanceProductClient {
    http_client: Client,
    endpoint: String,
    credentials: Credentials,
    page_size: u32,
    recv_window_ms: u64,
}

impl BinanceProductClient {
    pub fn new(config: &CollectorConfig, credentials: Credentials) -> Result<Self, CollectorError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            credentials,
            page_size: config.page_size,
            recv_window_ms: config.recv_window_ms,
        })
    }

    fn query_params(&self, query: &ProductQuery, page_index: u32, timestamp_ms: i64) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("optionType", query.option_type.to_string()),
            ("exercisedCoin", query.exercised_coin().to_string()),
            ("investCoin", query.invest_coin().to_string()),
            ("pageSize", self.page_size.to_string()),
            ("pageIndex", page_index.to_string()),
            ("recvWindow", self.recv_window_ms.to_string()),
            ("timestamp", timestamp_ms.to_string()),
        ])
    }
}

#[async_trait]
impl ProductSource for BinanceProductClient {
    async fn fetch_page(&self, query: &ProductQuery, page_index: u32) -> Result<ProductPage, CollectorError> {
        let params = self.query_params(query, page_index, Utc::now().timestamp_millis());
        let url = format!("{}?{}", self.endpoint, self.credentials.signed_query(&params)?);

        debug!("Fetching {} page {}", query, page_index);
        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, self.credentials.api_key())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_response(status, &body)
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}
