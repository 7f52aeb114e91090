// src/core/service_client.rs
//! HTTP client for the chat-completions LLM API used by Facebook extraction

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::core::config_manager::LlmSettings;

const CHAT_COMPLETIONS_ENDPOINT: &str = "/chat/completions";

/// An image attached to a completion request
#[derive(Debug, Clone)]
pub struct LlmImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl LlmImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.data))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub images: Vec<LlmImage>,
}

/// Anything that can answer a completion request with raw text
#[rocket::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<String>;
}

pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

// ===== Wire types =====

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ServiceClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("LLM API key not configured"))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
        })
    }

    fn build_body<'a>(&'a self, request: &LlmRequest) -> ChatCompletionRequest<'a> {
        let mut user_content = vec![ContentPart::Text {
            text: request.user_prompt.clone(),
        }];
        user_content.extend(request.images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.data_url(),
            },
        }));

        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: vec![ContentPart::Text {
                        text: request.system_prompt.clone(),
                    }],
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[rocket::async_trait]
impl LlmClient for ServiceClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_ENDPOINT);
        let body = self.build_body(request);

        app_log!(
            info,
            "Calling LLM API: {} (model: {}, images: {})",
            url,
            self.model,
            request.images.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to LLM API")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read LLM API response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&response_text)
                .map(|body| body.error.message)
                .unwrap_or(response_text);
            app_log!(error, "LLM API error {}: {}", status, message);
            anyhow::bail!("LLM API returned error {}: {}", status, message);
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse LLM API response: {}", response_text))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("LLM API response contained no content"))?;

        app_log!(trace, "LLM raw content: {}", content);
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: Option<&str>) -> LlmSettings {
        LlmSettings {
            api_url: "https://llm.example.com/v1/".to_string(),
            api_key: api_key.map(String::from),
            ..LlmSettings::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        assert!(ServiceClient::new(&settings(None)).is_err());
        let client = ServiceClient::new(&settings(Some("sk-1"))).unwrap();
        assert_eq!(client.base_url, "https://llm.example.com/v1");
    }

    #[test]
    fn test_body_attaches_images_as_data_urls() {
        let client = ServiceClient::new(&settings(Some("sk-1"))).unwrap();
        let request = LlmRequest {
            system_prompt: "extract".to_string(),
            user_prompt: "post text".to_string(),
            images: vec![LlmImage {
                media_type: "image/png".to_string(),
                data: b"abc".to_vec(),
            }],
        };

        let body = serde_json::to_value(client.build_body(&request)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"][0]["type"], "text");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,YWJj"
        );
    }
}
