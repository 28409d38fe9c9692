//! Text generation client for story and caption writing.
//!
//! Talks to an Ollama-compatible endpoint. Prompts are templates with
//! `{placeholder}` substitution so operators can tune the voice without
//! rebuilding.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AdapterError;

/// Default prompt for generating a collector story about a record.
pub const DEFAULT_STORY_PROMPT: &str = r#"You are writing for a music collectors' blog. Write a short story-style feature about the record below: where it sits in the artist's run, what collectors look for in original pressings, and why it still matters.

Artist: {artist}
Album: {title}
Angle: {theme}

Respond with ONLY the story text, 3-5 paragraphs, no headings or preamble."#;

/// Default prompt for turning a story into an image brief.
pub const DEFAULT_IMAGE_PROMPT: &str = r#"Write a single-sentence art brief for an illustration accompanying a music story. Describe mood, palette and composition. No camera jargon, no text in the image.

Artist: {artist}
Album: {title}

Respond with ONLY the brief."#;

/// Configuration for the generation client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Whether generation features are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ollama-compatible endpoint (default: http://localhost:11434)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Custom story prompt ({artist}, {title}, {theme} placeholders)
    #[serde(default)]
    pub story_prompt: Option<String>,
    /// Custom image-brief prompt ({artist}, {title} placeholders)
    #[serde(default)]
    pub image_prompt: Option<String>,
}

fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.2:instruct".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            story_prompt: None,
            image_prompt: None,
        }
    }
}

impl GenerationConfig {
    pub fn get_story_prompt(&self) -> &str {
        self.story_prompt.as_deref().unwrap_or(DEFAULT_STORY_PROMPT)
    }

    pub fn get_image_prompt(&self) -> &str {
        self.image_prompt.as_deref().unwrap_or(DEFAULT_IMAGE_PROMPT)
    }
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

/// Client for the text generation endpoint.
pub struct GenerationClient {
    config: GenerationConfig,
    client: Client,
}

impl GenerationClient {
    /// Create a new generation client with the given configuration.
    pub fn new(config: GenerationConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // slow models
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Check if the generation service is reachable.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = format!("{}/api/tags", self.config.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List models available on the endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}/api/tags", self.config.endpoint);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AdapterError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelInfo>,
        }

        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Generate a collector story for a record.
    pub async fn generate_story(
        &self,
        artist: &str,
        title: &str,
        theme: Option<&str>,
    ) -> Result<String, AdapterError> {
        let prompt = render_prompt(
            self.config.get_story_prompt(),
            artist,
            title,
            theme.unwrap_or("an overlooked classic"),
        );
        debug!("Generating story for {} - {}", artist, title);
        self.generate(&prompt).await
    }

    /// Generate an illustration brief for a record.
    pub async fn generate_image_brief(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<String, AdapterError> {
        let prompt = render_prompt(self.config.get_image_prompt(), artist, title, "");
        self.generate(&prompt).await
    }

    async fn generate(&self, prompt: &str) -> Result<String, AdapterError> {
        let url = format!("{}/api/generate", self.config.endpoint);
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AdapterError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        let text = body.response.trim().to_string();
        if text.is_empty() {
            return Err(AdapterError::Parse("empty generation response".to_string()));
        }
        Ok(text)
    }
}

fn render_prompt(template: &str, artist: &str, title: &str, theme: &str) -> String {
    template
        .replace("{artist}", artist)
        .replace("{title}", title)
        .replace("{theme}", theme)
}
