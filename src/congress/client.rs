use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::BillKey;
use crate::services::DocumentSource;
use crate::sync::pager::BillSource;

use super::types::{ActionsPage, BillsPage, TextVersionsResponse, WireAction, WireBill};

const API_BASE_URL: &str = "https://api.congress.gov/v3/bill";

pub struct CongressClient {
    client: Client,
    api_key: String,
}

impl CongressClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.congress_api_key.clone().ok_or_else(|| {
            AppError::Config(
                "congress_api_key is not set; add it to config.toml".to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("billwatch/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self { client, api_key })
    }

    /// One page of the congress-wide bill list, sorted by descending
    /// update date as the pagination walk requires.
    pub async fn list_bills(
        &self,
        congress: i64,
        offset: u32,
        limit: u32,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WireBill>> {
        let url = format!("{API_BASE_URL}/{congress}");
        let mut query: Vec<(&str, String)> = vec![
            ("format", "json".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
            ("sort", "updateDate+desc".to_string()),
            ("api_key", self.api_key.clone()),
        ];
        if let Some((from, to)) = window {
            query.push(("fromDateTime", from.format("%Y-%m-%dT00:00:00Z").to_string()));
            query.push(("toDateTime", to.format("%Y-%m-%dT00:00:00Z").to_string()));
        }

        let page: BillsPage = self.get_json(&url, &query).await?;
        Ok(page.bills)
    }

    pub async fn bill_actions(&self, key: BillKey) -> Result<Vec<WireAction>> {
        let url = format!(
            "{API_BASE_URL}/{}/{}/{}/actions",
            key.congress, key.bill_type, key.number
        );
        let query = [
            ("format", "json".to_string()),
            ("limit", "250".to_string()),
            ("api_key", self.api_key.clone()),
        ];

        let page: ActionsPage = self.get_json(&url, &query).await?;
        Ok(page.actions)
    }

    pub async fn text_versions(&self, key: BillKey) -> Result<TextVersionsResponse> {
        let url = format!(
            "{API_BASE_URL}/{}/{}/{}/text",
            key.congress, key.bill_type, key.number
        );
        let query = [
            ("format", "json".to_string()),
            ("api_key", self.api_key.clone()),
        ];

        self.get_json(&url, &query).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.client.get(url).query(query).send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            AppError::Api(format!(
                "unexpected response from {}: {} (body starts: {})",
                url,
                e,
                snippet(&body)
            ))
        })
    }
}

impl DocumentSource for CongressClient {
    /// Fetch a secondary document (bill text HTML) by absolute URL. These
    /// URLs come from the provider's own metadata and need no API key.
    async fn fetch_document(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url)
            .map_err(|e| AppError::Api(format!("invalid document URL {url}: {e}")))?;

        let response = self.client.get(parsed).send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

/// Binds the client to one congress so the pager can walk its bill list.
pub struct CongressBillSource<'a> {
    client: &'a CongressClient,
    congress: i64,
}

impl<'a> CongressBillSource<'a> {
    pub fn new(client: &'a CongressClient, congress: i64) -> Self {
        Self { client, congress }
    }
}

impl BillSource for CongressBillSource<'_> {
    async fn fetch_page(
        &mut self,
        offset: u32,
        limit: u32,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WireBill>> {
        self.client
            .list_bills(self.congress, offset, limit, window)
            .await
    }
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
