//! Social publishing client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AdapterError, Throttle};

/// Configuration for the social publishing API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Page access token.
    #[serde(default)]
    pub token: Option<String>,
    /// Page or account to publish as.
    #[serde(default)]
    pub page_id: Option<String>,
}

fn default_endpoint() -> String {
    "https://graph.social.example".to_string()
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            page_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    post_id: String,
}

/// Client for publishing posts.
pub struct SocialClient {
    config: SocialConfig,
    client: Client,
    throttle: Throttle,
}

impl SocialClient {
    pub fn new(config: SocialConfig, throttle: Throttle) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            throttle,
        }
    }

    /// Publish a post; returns the remote post reference.
    pub async fn publish(
        &self,
        message: &str,
        image_url: Option<&str>,
        link: Option<&str>,
    ) -> Result<String, AdapterError> {
        let page = self.config.page_id.as_deref().unwrap_or("me");
        let url = format!("{}/{}/feed", self.config.endpoint, page);
        let request = PublishRequest {
            message,
            image_url,
            link,
        };
        debug!("Publishing post to {}", page);

        let mut cooldowns = 0u32;
        loop {
            self.throttle.pace().await;

            let mut builder = self.client.post(&url).json(&request);
            if let Some(token) = &self.config.token {
                builder = builder.bearer_auth(token);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?;

            let status = resp.status().as_u16();
            if status == 429 {
                if self.throttle.cooldown(cooldowns, "social API").await {
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

            let body: PublishResponse = resp
                .json()
                .await
                .map_err(|e| AdapterError::Parse(e.to_string()))?;
            return Ok(body.post_id);
        }
    }
}
