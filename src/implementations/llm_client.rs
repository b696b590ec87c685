use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{ debug, info, warn };
use serde::{ Deserialize, Serialize };

use crate::config::{ ApiConfig, Provider };
use crate::errors::OracleError;
use crate::traits::metrics::MetricsCollector;
use crate::traits::oracle::{ ChatMessage, Completion, CompletionBackend, CompletionRequest, Role };

/// OpenAI API request and response types
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatResponseChoice>,
}

/// Completion backend speaking either the OpenAI-compatible chat format or
/// the Anthropic messages format over HTTP.
///
/// # API Keys
/// The key comes from the `api_key` config field, or from the provider's
/// environment variable (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`). Ollama
/// needs none.
pub struct HttpCompletionClient {
    config: ApiConfig,
    http_client: reqwest::Client,
    metrics: Arc<dyn MetricsCollector>,
}

impl HttpCompletionClient {
    pub fn new(config: ApiConfig, metrics: Arc<dyn MetricsCollector>) -> Result<Self, OracleError> {
        let http_client = reqwest::Client
            ::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OracleError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http_client, metrics })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        let api_key = self.config.get_api_key()?;
        let endpoint = self.config.endpoint();
        let model = self.config.model_name();
        let temperature = request.temperature.or(self.config.temperature).unwrap_or(0.2);
        let max_tokens = self.config.max_tokens.unwrap_or(4096);

        info!("Making LLM API request to {:?} for task '{}'", self.config.provider, request.task);
        debug!("API endpoint: {}", endpoint);
        debug!("Model: {}", model);
        debug!("Temperature: {}", temperature);

        let started = Instant::now();
        let builder = match self.config.provider {
            Provider::Anthropic => {
                let system = request.messages
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let messages: Vec<&ChatMessage> = request.messages
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .collect();

                let body =
                    serde_json::json!({
                    "model": model,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "system": system,
                    "messages": messages,
                });

                self.http_client
                    .post(&endpoint)
                    .header("Content-Type", "application/json")
                    .header("x-api-key", api_key.unwrap_or_default())
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
            }
            Provider::OpenAi | Provider::Ollama => {
                let body = ChatRequest {
                    model: &model,
                    messages: &request.messages,
                    temperature,
                    max_tokens,
                    stream: Some(false),
                };

                let mut builder = self.http_client
                    .post(&endpoint)
                    .header("Content-Type", "application/json")
                    .json(&body);
                if let Some(key) = api_key {
                    builder = builder.header("Authorization", format!("Bearer {}", key));
                }
                builder
            }
        };

        let response = builder.send().await.map_err(|e| {
            let error_msg = format!("Network error when calling LLM API: {}", e);
            warn!("{}", error_msg);
            if e.is_timeout() {
                warn!("Request timed out");
            }
            if e.is_connect() {
                warn!("Connection error - check network connectivity");
            }
            OracleError::Network(error_msg)
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text().await
                .unwrap_or_else(|_| "Failed to get error message".to_string());

            warn!("API error: HTTP {} - {}", status, error_text);
            return Err(OracleError::Http { status, message: error_text });
        }

        let response_text = response.text().await.map_err(|e| {
            warn!("Failed to get response text: {}", e);
            OracleError::Parse(e.to_string())
        })?;
        debug!("Response length: {} characters", response_text.len());

        let (content, reported_model) = match self.config.provider {
            Provider::Anthropic => parse_anthropic_response(&response_text)?,
            Provider::OpenAi | Provider::Ollama => parse_chat_response(&response_text)?,
        };

        Ok(Completion {
            content,
            model: reported_model.unwrap_or(model),
            latency: started.elapsed(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        let started = Instant::now();
        let result = self.send(request).await;
        self.metrics.record_call(&request.task, started.elapsed(), result.is_ok());

        if let Ok(completion) = &result {
            info!(
                "API call for '{}' completed in {:?} ({} characters)",
                request.task,
                completion.latency,
                completion.content.len()
            );
        }
        result
    }
}

pub(crate) fn parse_chat_response(
    response_text: &str
) -> Result<(String, Option<String>), OracleError> {
    let response: ChatResponse = serde_json
        ::from_str(response_text)
        .map_err(|e| OracleError::Parse(format!("Failed to parse API response: {}", e)))?;

    let choice = response.choices
        .into_iter()
        .next()
        .ok_or_else(|| OracleError::Api("No response from API".to_string()))?;

    Ok((choice.message.content, response.model))
}

pub(crate) fn parse_anthropic_response(
    response_text: &str
) -> Result<(String, Option<String>), OracleError> {
    let response_json: serde_json::Value = serde_json
        ::from_str(response_text)
        .map_err(|e| OracleError::Parse(e.to_string()))?;

    let model = response_json["model"].as_str().map(str::to_string);
    let text = response_json["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"].as_str().unwrap_or("text") == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .filter(|text| !text.is_empty())
        .ok_or_else(|| {
            OracleError::Parse("Unable to find content in Anthropic response".to_string())
        })?;

    Ok((text, model))
}
