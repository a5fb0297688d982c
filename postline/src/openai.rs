#![doc = "OpenAI integration for CLI and core: bridges the generation trait abstractions to the OpenAI HTTP API."]
//
//! # Generation Clients (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the generation
//! abstractions in [`postline_core::contract`]. It wires up the
//! [`IdeaGenerator`], [`CopyWriter`] and [`ImageGenerator`] traits for real
//! use against the OpenAI API, and provides the `OpenAiClient` used by the CLI.
//!
//! ## Client Usage
//!
//! - Construct [`OpenAiClient`] from the environment (`OPENAI_API_KEY`) plus
//!   the loaded YAML config (models, image size, prompt overrides).
//! - Use trait methods for end-to-end generation (idea, draft, image).
//! - All transport, serialization, retry and error handling are encapsulated
//!   in the client implementation.
//!
//! For full trait documentation, see core's [`contract`] module.
//!
//! [`contract`]: postline_core::contract

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use postline_core::contract::{CopyWriter, GenerateError, IdeaGenerator, ImageGenerator};
use postline_core::prompts::{
    self, StyleProfile, DEFAULT_IDEA_PROMPT, SYSTEM_PROMPT,
};

use crate::load_config::CliConfig;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const IMAGE_GENERATIONS_URL: &str = "https://api.openai.com/v1/images/generations";

const MAX_COMPLETION_TOKENS: u32 = 1000;
const COMPLETION_TEMPERATURE: f32 = 0.7;

/// How many characters of a description end up in an image filename slug.
const FILENAME_SLUG_CHARS: usize = 40;

/// Client for all OpenAI-backed generation: ideas, post copy and images.
/// Designed for asynchronous usage and bounded retries on transport failure.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    text_model: String,
    image_model: String,
    image_size: String,
    image_quality: String,
    images_dir: PathBuf,
    base_post_prompt: String,
    style: StyleProfile,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u32,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl OpenAiClient {
    /// Construct the client from `OPENAI_API_KEY` and the loaded config.
    pub fn new_from_env(config: &CliConfig) -> Result<Self, GenerateError> {
        dotenvy::dotenv().ok(); // loads environment variables from .env if present
        let api_key = match env::var("OPENAI_API_KEY") {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(error = ?e, "OPENAI_API_KEY missing in environment");
                return Err(Box::new(e));
            }
        };

        let base_post_prompt =
            prompts::load_post_prompt(config.content.prompts_file.as_deref());

        tracing::info!(
            text_model = %config.openai.text_model,
            image_model = %config.openai.image_model,
            "Initialized OpenAiClient from environment"
        );

        Ok(OpenAiClient {
            http: reqwest::Client::new(),
            api_key,
            text_model: config.openai.text_model.clone(),
            image_model: config.openai.image_model.clone(),
            image_size: config.openai.image_size.clone(),
            image_quality: config.openai.image_quality.clone(),
            images_dir: config.images.output_dir.clone(),
            base_post_prompt,
            style: StyleProfile {
                tone: config.content.tone.clone(),
                style: config.content.style.clone(),
            },
            max_retries: config.schedule.max_retries,
            retry_delay: Duration::from_secs(5),
        })
    }

    /// One chat-completions call with bounded, linearly backed-off retries.
    async fn chat(&self, user_prompt: &str) -> Result<String, GenerateError> {
        let mut last_error: Option<GenerateError> = None;
        for attempt in 1..=self.max_retries.max(1) {
            match self.try_chat(user_prompt).await {
                Ok(content) => {
                    tracing::info!(model = %self.text_model, attempt, "Text generated successfully");
                    return Ok(content);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Chat completion attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| "chat completion failed with no attempts".into()))
    }

    async fn try_chat(&self, user_prompt: &str) -> Result<String, GenerateError> {
        let body = ChatRequest {
            model: &self.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature: COMPLETION_TEMPERATURE,
        };

        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("OpenAI API returned status {status}: {text}").into());
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        content.ok_or_else(|| "OpenAI returned an empty completion".into())
    }

    /// One image-generations call returning raw base64 PNG data.
    async fn image_b64(&self, prompt: &str) -> Result<String, GenerateError> {
        let mut last_error: Option<GenerateError> = None;
        for attempt in 1..=self.max_retries.max(1) {
            match self.try_image(prompt).await {
                Ok(data) => {
                    tracing::info!(model = %self.image_model, attempt, "Image generated successfully");
                    return Ok(data);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Image generation attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| "image generation failed with no attempts".into()))
    }

    async fn try_image(&self, prompt: &str) -> Result<String, GenerateError> {
        // The quality knob only exists on dall-e-3.
        let quality = (self.image_model == "dall-e-3").then_some(self.image_quality.as_str());
        let body = ImageRequest {
            model: &self.image_model,
            prompt,
            size: &self.image_size,
            n: 1,
            response_format: "b64_json",
            quality,
        };

        let response = self
            .http
            .post(IMAGE_GENERATIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("OpenAI API returned status {status}: {text}").into());
        }

        let parsed: ImageResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| "OpenAI returned no image data".into())
    }

    /// Decode base64 image data and store it under the images directory with a
    /// slug-plus-content-hash filename. Returns the stored path.
    fn save_image(&self, description: &str, b64_data: &str) -> Result<String, GenerateError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(b64_data)?;

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        };

        let slug: String = description
            .chars()
            .take(FILENAME_SLUG_CHARS)
            .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .trim()
            .replace(' ', "_");

        std::fs::create_dir_all(&self.images_dir)?;
        let path = self
            .images_dir
            .join(format!("{}_{}.png", slug, &content_hash[..12]));
        std::fs::write(&path, &bytes)?;

        tracing::info!(path = %path.display(), "Image artifact stored");
        Ok(path.to_string_lossy().into_owned())
    }
}

#[async_trait]
impl IdeaGenerator for OpenAiClient {
    async fn generate_idea<'a>(
        &self,
        custom_prompt: Option<&'a str>,
    ) -> Result<String, GenerateError> {
        let prompt = custom_prompt.unwrap_or(DEFAULT_IDEA_PROMPT);
        tracing::info!("Generating content idea");
        let idea = self.chat(prompt).await?;
        // Strip quotes or stray formatting around the returned topic.
        let idea = idea.trim().trim_matches('"').trim_matches('\'').to_string();
        if idea.is_empty() {
            return Err("idea generation returned empty topic".into());
        }
        tracing::info!(idea = %idea, "Content idea generated");
        Ok(idea)
    }
}

#[async_trait]
impl CopyWriter for OpenAiClient {
    async fn draft_post<'a>(
        &self,
        topic: &'a str,
        style: Option<&'a str>,
    ) -> Result<String, GenerateError> {
        let style = style.unwrap_or(&self.style.style);
        let prompt = prompts::compose_post_prompt(
            &self.base_post_prompt,
            topic,
            style,
            &self.style.tone,
        );
        tracing::info!(topic = %topic, style = %style, "Drafting post copy");
        self.chat(&prompt).await
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image<'a>(
        &self,
        description: &'a str,
        style: Option<&'a str>,
    ) -> Result<String, GenerateError> {
        let template = prompts::compose_image_prompt(description, style);

        // Refine the template into a tighter generation prompt; fall back to
        // the template itself if refinement fails.
        let refine_request = format!(
            "Convert this into a concise, effective image generation prompt (max 400 chars): {template}"
        );
        let prompt = match self.chat(&refine_request).await {
            Ok(refined) => refined,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt refinement failed, using raw template");
                template
            }
        };

        let b64_data = self.image_b64(&prompt).await?;
        self.save_image(description, &b64_data)
    }
}
