//! Multi-turn query composition with bounded retry.
//!
//! Each attempt runs through an explicit state machine: compose a candidate
//! (with the resolution tools on offer), resolve any requested entity
//! lookups, then validate. A validation failure is appended into the
//! conversation as corrective feedback and the next attempt begins; the
//! transport itself failing is not retried. When the attempt bound is
//! reached without a valid candidate the composer reports exhaustion
//! carrying the last validation message.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::EntitySchemaRegistry;
use crate::error::TranslateError;
use crate::llm::{
    extract_json_object, ChatMessage, ChatRequest, LlmProvider, ResponseShape, ToolCall,
    ToolDefinition,
};
use crate::prompts;
use crate::query::QueryCandidate;
use crate::resolver::{resolution_tools, EntityResolver};
use crate::validator::QueryValidator;

enum ComposeState {
    Composing { attempt: u32 },
    Resolving { attempt: u32, calls: Vec<ToolCall> },
    Validating { attempt: u32, content: String },
    Done(QueryCandidate),
    Failed { attempts: u32, last_error: String },
}

pub struct QueryComposer {
    provider: Arc<dyn LlmProvider>,
    resolver: EntityResolver,
    max_attempts: u32,
}

impl QueryComposer {
    pub fn new(provider: Arc<dyn LlmProvider>, resolver: EntityResolver, max_attempts: u32) -> Self {
        Self {
            provider,
            resolver,
            max_attempts,
        }
    }

    /// Compose a validated query candidate for the prompt.
    pub async fn compose(
        &self,
        prompt: &str,
        registry: &EntitySchemaRegistry,
        validator: &QueryValidator,
    ) -> Result<QueryCandidate, TranslateError> {
        let tools: Vec<ToolDefinition> = resolution_tools();
        let mut messages = prompts::composer_messages(registry);
        messages.push(ChatMessage::user(prompt));

        let mut last_error = String::new();
        let mut state = ComposeState::Composing { attempt: 1 };

        loop {
            state = match state {
                ComposeState::Composing { attempt } => {
                    if attempt > self.max_attempts {
                        ComposeState::Failed {
                            attempts: self.max_attempts,
                            last_error: last_error.clone(),
                        }
                    } else {
                        debug!(attempt, "requesting a query candidate");
                        let request = ChatRequest::new(messages.clone())
                            .with_tools(tools.clone())
                            .with_shape(ResponseShape::Query);
                        let response = self.provider.chat(request).await?;
                        if response.has_tool_calls() {
                            ComposeState::Resolving {
                                attempt,
                                calls: response.tool_calls,
                            }
                        } else {
                            let content = response.require_content()?.to_string();
                            ComposeState::Validating { attempt, content }
                        }
                    }
                }

                ComposeState::Resolving { attempt, calls } => {
                    debug!(attempt, count = calls.len(), "resolving entity mentions");
                    let bindings = self.resolver.resolve(&calls).await;
                    let rendered: Vec<_> = bindings.iter().map(|b| b.to_json()).collect();
                    messages.push(ChatMessage::assistant(prompts::render_tool_calls(&calls)));
                    messages.push(ChatMessage::user(json!(rendered).to_string()));

                    // Re-issue without tools so this round must produce the
                    // candidate instead of another lookup.
                    let request =
                        ChatRequest::new(messages.clone()).with_shape(ResponseShape::Query);
                    let response = self.provider.chat(request).await?;
                    let content = response.require_content()?.to_string();
                    ComposeState::Validating { attempt, content }
                }

                ComposeState::Validating { attempt, content } => {
                    let candidate = extract_json_object(&content)
                        .map_err(|e| e.to_string())
                        .and_then(|value| {
                            serde_json::from_value::<QueryCandidate>(value)
                                .map_err(|e| format!("the query object was malformed: {e}"))
                        });

                    let problem = match candidate {
                        Ok(candidate) => match validator.validate_candidate(&candidate) {
                            Ok(()) => {
                                info!(attempt, "composed a valid query candidate");
                                state = ComposeState::Done(candidate);
                                continue;
                            }
                            Err(e) => e.to_string(),
                        },
                        Err(e) => e,
                    };

                    warn!(attempt, problem = %problem, "candidate rejected");
                    last_error = problem;
                    messages.push(ChatMessage::assistant(content));
                    messages.push(ChatMessage::user(format!(
                        "That was not correct. The following error message was received:\n\
                         {last_error}\n\nPlease try again."
                    )));
                    ComposeState::Composing {
                        attempt: attempt + 1,
                    }
                }

                ComposeState::Done(candidate) => return Ok(candidate),

                ComposeState::Failed {
                    attempts,
                    last_error,
                } => {
                    return Err(TranslateError::CompositionExhausted {
                        attempts,
                        last_error,
                    })
                }
            };
        }
    }
}
