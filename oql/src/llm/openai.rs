//! OpenAI-compatible chat completions provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{ChatRequest, ChatResponse, LlmError, LlmProvider, ToolCall};
use crate::config::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.timeout_seconds.unwrap_or(60),
            ))
            .build()
            .map_err(|e| LlmError::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
        )
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_openai_tool_json())
                    .collect(),
            );
        }
        if request.response_format.is_some() {
            // The shape name drives client-side parsing; on the wire we only
            // constrain the model to emit a JSON object.
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn convert_tool_calls(calls: Vec<ApiToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .enumerate()
        .map(|(idx, call)| {
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| json!({ "raw_arguments": call.function.arguments }));
            ToolCall {
                id: call
                    .id
                    .unwrap_or_else(|| format!("tool_call_{}", idx + 1)),
                name: call.function.name,
                arguments,
            }
        })
        .collect()
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Http("no API key configured".to_string()))?;

        let body = self.build_body(&request);
        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            shape = request.response_format.map(|s| s.name()),
            "issuing chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Http(format!(
                "chat completion request failed with HTTP {}: {}",
                status.as_u16(),
                raw_body.chars().take(500).collect::<String>()
            )));
        }

        let parsed: ApiResponse = serde_json::from_str(&raw_body)
            .map_err(|e| LlmError::Protocol(format!("failed to parse API response: {}", e)))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Protocol("response carried no choices".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: convert_tool_calls(choice.message.tool_calls),
        })
    }
}
