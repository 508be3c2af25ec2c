//! Language collaborator abstraction.
//!
//! Requests are a transcript of role-tagged turns plus the tool definitions
//! the collaborator may invoke and the name of the output shape it must
//! produce. Responses are either a set of tool calls (entity names to
//! resolve) or a structured answer. The interface is nondeterministic by
//! contract: callers must never assume repeatable output for identical
//! input, which is why no caching happens at this layer.

mod openai;
mod stub;

pub use openai::OpenAiProvider;
pub use stub::StubProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport failure: {0}")]
    Http(String),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// One turn in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A tool the collaborator may ask the pipeline to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn to_openai_tool_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A tool invocation requested by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Names the output shape a request is constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// The coarse intent descriptor.
    QueryIntent,
    /// The full structured query candidate.
    Query,
    /// Just `return_columns`.
    ReturnColumns,
    /// Just `sort_by`.
    SortBy,
    /// `sort_by` and `return_columns` together.
    SortAndColumns,
}

impl ResponseShape {
    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::QueryIntent => "query_intent",
            ResponseShape::Query => "query_object",
            ResponseShape::ReturnColumns => "return_columns",
            ResponseShape::SortBy => "sort_by",
            ResponseShape::SortAndColumns => "sort_by_and_return_columns",
        }
    }
}

/// A single request to the collaborator.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub response_format: Option<ResponseShape>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: vec![],
            response_format: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.response_format = Some(shape);
        self
    }
}

/// The collaborator's reply: a structured answer, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// A scripted structured answer (for stubs and tests).
    pub fn answer(value: &Value) -> Self {
        Self {
            content: Some(value.to_string()),
            tool_calls: vec![],
        }
    }

    /// A scripted tool-call response (for stubs and tests).
    pub fn calling(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("tool_call_{}", uuid::Uuid::new_v4()),
                name: name.into(),
                arguments,
            }],
        }
    }

    /// The structured answer content, or a protocol error if the
    /// collaborator returned none.
    pub fn require_content(&self) -> Result<&str, LlmError> {
        self.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::Protocol("response carried no content".to_string()))
    }
}

/// Abstract interface for language collaborators.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// Deterministic scripted provider for tests.
    Stub,
    /// OpenAI-compatible chat completions API.
    OpenAi,
}

/// Build a provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider_type {
        LlmProviderType::Stub => Ok(Arc::new(StubProvider::default())),
        LlmProviderType::OpenAi => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
    }
}

/// Extract a JSON object from answer content that may be wrapped in prose
/// or markdown fences.
pub fn extract_json_object(content: &str) -> Result<Value, LlmError> {
    let start = content.find('{').ok_or_else(|| {
        LlmError::Protocol("answer did not contain a JSON object".to_string())
    })?;
    // Only look for the closing brace after the opening one; a stray '}'
    // earlier in the prose must not invert the range.
    let end = content[start..]
        .rfind('}')
        .map(|i| start + i + 1)
        .unwrap_or(content.len());
    serde_json::from_str(&content[start..end])
        .map_err(|e| LlmError::Protocol(format!("answer was not valid JSON: {}", e)))
}
