//! Marketplace client: release search and listing creation against a
//! Discogs-style JSON API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AdapterError, Throttle};

/// Configuration for the marketplace API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Personal access token.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_endpoint() -> String {
    "https://api.discogs.example".to_string()
}
fn default_currency() -> String {
    "USD".to_string()
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            currency: default_currency(),
        }
    }
}

/// One release returned by a marketplace search.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceMatch {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub lowest_price_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<MarketplaceMatch>,
}

#[derive(Debug, Serialize)]
struct CreateListingRequest<'a> {
    release_id: &'a str,
    description: &'a str,
    price_cents: i64,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateListingResponse {
    listing_id: String,
}

/// Client for marketplace search and listing creation.
pub struct MarketplaceClient {
    config: MarketplaceConfig,
    client: Client,
    throttle: Throttle,
}

impl MarketplaceClient {
    pub fn new(config: MarketplaceConfig, throttle: Throttle) -> Self {
        let client = Client::builder()
            .user_agent(concat!("waxworks/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .gzip(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            throttle,
        }
    }

    /// Search releases by artist and title.
    pub async fn search(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Vec<MarketplaceMatch>, AdapterError> {
        let url = format!("{}/database/search", self.config.endpoint);
        debug!("Marketplace search: {} - {}", artist, title);

        let body = self
            .request(|client| {
                client
                    .get(&url)
                    .query(&[("artist", artist), ("release_title", title)])
            })
            .await?;

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| AdapterError::Parse(e.to_string()))?;
        Ok(parsed.results)
    }

    /// Create a marketplace listing; returns the remote listing reference.
    pub async fn create_listing(
        &self,
        release_id: &str,
        description: &str,
        price_cents: i64,
    ) -> Result<String, AdapterError> {
        let url = format!("{}/marketplace/listings", self.config.endpoint);
        let request = CreateListingRequest {
            release_id,
            description,
            price_cents,
            currency: &self.config.currency,
        };

        let body = self
            .request(|client| client.post(&url).json(&request))
            .await?;

        let parsed: CreateListingResponse =
            serde_json::from_str(&body).map_err(|e| AdapterError::Parse(e.to_string()))?;
        if parsed.listing_id.is_empty() {
            return Err(AdapterError::Parse("empty listing id".to_string()));
        }
        Ok(parsed.listing_id)
    }

    /// Issue one logical request with pacing and the fixed 429 cooldown.
    async fn request<F>(&self, build: F) -> Result<String, AdapterError>
    where
        F: Fn(&Client) -> reqwest::RequestBuilder,
    {
        let mut cooldowns = 0u32;
        loop {
            self.throttle.pace().await;

            let mut builder = build(&self.client);
            if let Some(token) = &self.config.token {
                builder = builder.header("Authorization", format!("Discogs token={}", token));
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?;

            let status = resp.status().as_u16();
            if status == 429 {
                if self.throttle.cooldown(cooldowns, "marketplace").await {
                    cooldowns += 1;
                    continue;
                }
                return Err(AdapterError::RateLimited(cooldowns));
            }

            if !resp.status().is_success() {
                return Err(AdapterError::Api {
                    status,
                    body: resp.text().await.unwrap_or_default(),
                });
            }

            return resp
                .text()
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MarketplaceConfig::default();
        assert_eq!(config.currency, "USD");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_search_response_parsing() {
        let body = r#"{
            "results": [
                {"id": "r1", "title": "Kind of Blue", "year": 1959, "lowest_price_cents": 2500},
                {"id": "r2", "title": "Kind of Blue (Reissue)"}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].year, Some(1959));
        assert_eq!(parsed.results[1].lowest_price_cents, None);
    }

    #[test]
    fn test_listing_response_parsing() {
        let body = r#"{"listing_id": "L-991"}"#;
        let parsed: CreateListingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.listing_id, "L-991");
    }
}
