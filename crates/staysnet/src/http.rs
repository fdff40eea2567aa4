//! reqwest-backed Stays.net client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rendizy_core::config::SyncConfig;
use rendizy_core::types::StaysNetSettings;
use rendizy_core::{SyncError, SyncResult};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::client::{
    CalendarQuery, ChannelClient, ChannelProvider, ChannelResponse, ReservationLookup,
    ReservationQuery,
};
use crate::payload::EntityList;

/// Longest response body excerpt kept in an error message.
const MAX_ERROR_BODY: usize = 300;

pub struct StaysNetClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: Option<String>,
    page_limit: usize,
    max_pages: usize,
}

impl StaysNetClient {
    pub fn new(
        http: reqwest::Client,
        settings: &StaysNetSettings,
        page_limit: usize,
        max_pages: usize,
    ) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone().filter(|s| !s.is_empty()),
            page_limit: page_limit.max(1),
            max_pages: max_pages.max(1),
        }
    }

    fn endpoint_url(&self, path: &str, query: &[(&str, String)]) -> SyncResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| SyncError::Config(format!("invalid Stays.net base URL '{}': {}", self.base_url, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Basic auth when a secret is configured, bearer token otherwise.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_secret {
            Some(secret) => request.basic_auth(&self.api_key, Some(secret)),
            None => request.bearer_auth(&self.api_key),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> ChannelResponse {
        let url = match self.endpoint_url(path, query) {
            Ok(url) => url,
            Err(e) => return ChannelResponse::failure(0, e.to_string()),
        };
        debug!(url = %url, "Stays.net request");

        let request = self
            .authorize(self.http.get(url.clone()))
            .header(reqwest::header::ACCEPT, "application/json");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Stays.net request failed");
                return ChannelResponse::failure(0, format!("Request failed: {}", e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return ChannelResponse::failure(
                    status.as_u16(),
                    format!("Failed to read response body from {}: {}", url, e),
                )
            }
        };

        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(_) => {
                return ChannelResponse::failure(
                    status.as_u16(),
                    format!(
                        "API returned non-JSON response (HTTP {}) from {}: {}",
                        status.as_u16(),
                        url,
                        truncate(&body)
                    ),
                )
            }
        };

        if !status.is_success() {
            let message = error_message_from_body(&data)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return ChannelResponse {
                success: false,
                status: status.as_u16(),
                data: Some(data),
                error: Some(message),
            };
        }

        ChannelResponse {
            success: true,
            status: status.as_u16(),
            data: Some(data),
            error: None,
        }
    }

    /// Walk `limit`/`skip` pages until a short page or the page cap.
    async fn get_all(
        &self,
        path: &str,
        entity_keys: &[&str],
        base_query: &[(&str, String)],
    ) -> ChannelResponse {
        let mut all = Vec::new();
        let mut skip = 0usize;
        let mut pages = 0usize;
        let mut has_more = true;

        while has_more && pages < self.max_pages {
            let mut query = base_query.to_vec();
            query.push(("limit", self.page_limit.to_string()));
            query.push(("skip", skip.to_string()));

            let response = self.get(path, &query).await;
            if !response.success {
                return response;
            }

            let page = match EntityList::decode(response.data.as_ref(), entity_keys) {
                Ok(page) => page.into_items(),
                Err(e) => return ChannelResponse::failure(response.status, e.to_string()),
            };

            has_more = page.len() == self.page_limit;
            all.extend(page);
            skip += self.page_limit;
            pages += 1;
        }

        if has_more {
            warn!(
                path = path,
                pages = pages,
                fetched = all.len(),
                "Stays.net pagination stopped at page cap"
            );
        }

        ChannelResponse::ok(Value::Array(all))
    }
}

#[async_trait]
impl ChannelClient for StaysNetClient {
    async fn get_clients(&self) -> ChannelResponse {
        self.get_all("/booking/clients", &["clients"], &[]).await
    }

    async fn get_listings(&self) -> ChannelResponse {
        self.get_all("/content/listings", &["listings"], &[]).await
    }

    async fn get_reservations(&self, query: &ReservationQuery) -> ChannelResponse {
        let params = [
            ("from", query.start_date.format("%Y-%m-%d").to_string()),
            ("to", query.end_date.format("%Y-%m-%d").to_string()),
            ("dateType", query.date_type.as_str().to_string()),
        ];
        self.get_all("/booking/reservations", &["reservations"], &params)
            .await
    }

    async fn get_reservation(&self, external_id: &str) -> ReservationLookup {
        let response = self
            .get(&format!("/booking/reservations/{}", external_id), &[])
            .await;

        if response.status == 404 {
            return ReservationLookup::NotFound;
        }
        if !response.success {
            return ReservationLookup::Error(response.error_message());
        }
        match response.data {
            Some(data) if is_not_found_body(&data) => ReservationLookup::NotFound,
            Some(Value::Null) | None => ReservationLookup::NotFound,
            Some(data) => ReservationLookup::Found(data),
        }
    }

    async fn get_availability_calendar(&self, query: &CalendarQuery) -> ChannelResponse {
        self.get("/availability/calendar", &calendar_params(query))
            .await
    }

    async fn get_rates_calendar(&self, query: &CalendarQuery) -> ChannelResponse {
        self.get("/rates/calendar", &calendar_params(query)).await
    }

    async fn get_owners(&self) -> ChannelResponse {
        self.get("/content/owners", &[]).await
    }

    async fn test_connection(&self) -> ChannelResponse {
        self.get(
            "/content/listings",
            &[("limit", "1".to_string()), ("skip", "0".to_string())],
        )
        .await
    }
}

fn calendar_params(query: &CalendarQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("start_date", query.start_date.format("%Y-%m-%d").to_string()),
        ("end_date", query.end_date.format("%Y-%m-%d").to_string()),
    ];
    if let Some(property_id) = &query.property_id {
        params.push(("property_id", property_id.clone()));
    }
    params
}

fn error_message_from_body(data: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn is_not_found_body(data: &Value) -> bool {
    error_message_from_body(data)
        .map(|m| m.eq_ignore_ascii_case("not found"))
        .unwrap_or(false)
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

/// Hands out [`StaysNetClient`]s that share one pooled `reqwest::Client`.
pub struct StaysNetProvider {
    http: reqwest::Client,
    page_limit: usize,
    max_pages: usize,
}

impl StaysNetProvider {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            page_limit: config.page_limit,
            max_pages: config.max_pages,
        })
    }
}

impl ChannelProvider for StaysNetProvider {
    fn client(&self, settings: &StaysNetSettings) -> SyncResult<Arc<dyn ChannelClient>> {
        Ok(Arc::new(StaysNetClient::new(
            self.http.clone(),
            settings,
            self.page_limit,
            self.max_pages,
        )))
    }
}
