//! Image service client: render an illustration from a brief and store
//! it, returning a public URL.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AdapterError, Throttle};

/// Configuration for the image service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageStoreConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token for the image service.
    #[serde(default)]
    pub token: Option<String>,
    /// Output size hint, e.g. "1024x1024".
    #[serde(default = "default_size")]
    pub size: String,
}

fn default_endpoint() -> String {
    "http://localhost:7860".to_string()
}
fn default_size() -> String {
    "1024x1024".to_string()
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            size: default_size(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    prompt: &'a str,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    url: String,
}

/// Client for the image render/store service.
pub struct ImageStoreClient {
    config: ImageStoreConfig,
    client: Client,
    throttle: Throttle,
}

impl ImageStoreClient {
    pub fn new(config: ImageStoreConfig, throttle: Throttle) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            throttle,
        }
    }

    /// Render an illustration from a brief; returns the stored image URL.
    ///
    /// Rate limit responses sleep the fixed cooldown and retry the same
    /// request; the caller's attempt counter is not involved.
    pub async fn render(&self, brief: &str) -> Result<String, AdapterError> {
        let url = format!("{}/api/render", self.config.endpoint);
        let request = RenderRequest {
            prompt: brief,
            size: &self.config.size,
        };

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
                if self.throttle.cooldown(cooldowns, "image service").await {
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

            let body: RenderResponse = resp
                .json()
                .await
                .map_err(|e| AdapterError::Parse(e.to_string()))?;

            if body.url.is_empty() {
                return Err(AdapterError::Parse("empty image url".to_string()));
            }
            return Ok(body.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ImageStoreConfig::default();
        assert_eq!(config.size, "1024x1024");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"url": "https://img.waxworks.example/a1.png"}"#;
        let parsed: RenderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.url, "https://img.waxworks.example/a1.png");
    }
}
