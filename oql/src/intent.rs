//! Intent classification.
//!
//! One collaborator call decides which structural pieces of the query the
//! prompt actually asks for. Trivial prompts (pure enumeration, pure column
//! listing) can then skip the multi-turn composition loop entirely.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::EntitySchemaRegistry;
use crate::error::TranslateError;
use crate::llm::{extract_json_object, ChatMessage, ChatRequest, LlmProvider, ResponseShape};
use crate::prompts;

/// Which query sections the prompt calls for. Produced once per request,
/// immutable thereafter; the wire field names are the vocabulary the worked
/// examples teach the collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    #[serde(rename = "filters_needed")]
    pub needs_row_filters: bool,
    /// Entity kind to aggregate by, or empty for plain row listings.
    #[serde(rename = "summarize_by", default)]
    pub aggregation_target: String,
    #[serde(rename = "summarize_by_filters_needed")]
    pub needs_aggregation_filters: bool,
    #[serde(rename = "sort_by_needed")]
    pub needs_sort: bool,
    #[serde(rename = "return_columns_needed")]
    pub needs_return_columns: bool,
}

impl QueryIntent {
    pub fn needs_filters(&self) -> bool {
        self.needs_row_filters || self.needs_aggregation_filters
    }

    /// No section is needed at all; the answer is empty or a bare
    /// aggregation target.
    pub fn wants_nothing(&self) -> bool {
        !self.needs_filters() && !self.needs_sort && !self.needs_return_columns
    }

    pub fn wants_columns_only(&self) -> bool {
        !self.needs_filters() && !self.needs_sort && self.needs_return_columns
    }

    pub fn wants_sort_only(&self) -> bool {
        !self.needs_filters() && self.needs_sort && !self.needs_return_columns
    }

    pub fn wants_sort_and_columns(&self) -> bool {
        !self.needs_filters() && self.needs_sort && self.needs_return_columns
    }
}

pub struct IntentClassifier {
    provider: Arc<dyn LlmProvider>,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Classify the prompt against the current schema registry.
    ///
    /// A response whose aggregation target is neither empty, `"all"`, nor a
    /// known entity kind is rejected and the call retried once with an
    /// error note; a second miss surfaces as `IntentAmbiguous`.
    pub async fn classify(
        &self,
        prompt: &str,
        registry: &EntitySchemaRegistry,
    ) -> Result<QueryIntent, TranslateError> {
        let mut messages = prompts::intent_messages(registry);
        messages.push(ChatMessage::user(prompt));

        let mut last_problem = String::new();
        for attempt in 0..2 {
            if attempt > 0 {
                messages.push(ChatMessage::user(format!(
                    "That was not correct. The following error message was received:\n\
                     {last_problem}\n\nPlease try again."
                )));
            }

            let request =
                ChatRequest::new(messages.clone()).with_shape(ResponseShape::QueryIntent);
            let response = self.provider.chat(request).await?;
            let content = response.require_content()?;

            let parsed = extract_json_object(content)
                .ok()
                .and_then(|value| serde_json::from_value::<QueryIntent>(value).ok());
            let intent = match parsed {
                Some(intent) => intent,
                None => {
                    warn!(attempt, "intent response was not a parseable intent object");
                    last_problem = "the response was not a valid intent object".to_string();
                    messages.push(ChatMessage::assistant(content));
                    continue;
                }
            };

            let target = intent.aggregation_target.as_str();
            if target.is_empty() || target == "all" || registry.contains(target) {
                debug!(?intent, "classified prompt intent");
                return Ok(intent);
            }

            warn!(attempt, target, "intent named an unknown aggregation target");
            last_problem = format!("'{target}' is not a valid summarize_by entity");
            messages.push(ChatMessage::assistant(content));
        }

        Err(TranslateError::IntentAmbiguous(last_problem))
    }
}
