//! The end-to-end translation pipeline.
//!
//! A request moves through named phases: the safety gate, intent
//! classification, either a short-circuit branch for trivial intents or the
//! full composition loop, then normalization. Successful results are
//! memoized by exact prompt text; failures never are.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::catalog::EntitySchemaRegistry;
use crate::composer::QueryComposer;
use crate::config::TranslatorConfig;
use crate::error::TranslateError;
use crate::intent::{IntentClassifier, QueryIntent};
use crate::llm::{extract_json_object, ChatMessage, ChatRequest, LlmProvider, ResponseShape};
use crate::normalize::normalize;
use crate::prompts;
use crate::query::StructuredQuery;
use crate::resolver::{EntityResolver, EntitySearch};
use crate::validator::QueryValidator;

/// Pipeline phase, carried through the logs so a failing request can be
/// placed without replaying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationState {
    Classifying,
    Composing,
    Validating,
    Normalizing,
    Done,
}

/// Reject prompts over the length bound before any collaborator call.
/// The bound is in characters, not bytes.
pub fn check_prompt(prompt: &str, max_len: usize) -> Result<(), TranslateError> {
    if prompt.chars().count() > max_len {
        Err(TranslateError::PromptRejected(format!(
            "prompt exceeds {max_len} characters"
        )))
    } else {
        Ok(())
    }
}

pub struct Translator {
    registry: Arc<EntitySchemaRegistry>,
    provider: Arc<dyn LlmProvider>,
    classifier: IntentClassifier,
    composer: QueryComposer,
    validator: QueryValidator,
    cache: Arc<dyn ResultCache>,
    max_prompt_len: usize,
}

impl Translator {
    pub fn new(
        registry: Arc<EntitySchemaRegistry>,
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn EntitySearch>,
        cache: Arc<dyn ResultCache>,
        config: &TranslatorConfig,
    ) -> Self {
        let classifier = IntentClassifier::new(Arc::clone(&provider));
        let composer = QueryComposer::new(
            Arc::clone(&provider),
            EntityResolver::new(search),
            config.max_compose_attempts,
        );
        let validator = QueryValidator::new(Arc::clone(&registry));
        Self {
            registry,
            provider,
            classifier,
            composer,
            validator,
            cache,
            max_prompt_len: config.max_prompt_len,
        }
    }

    /// Translate a free-text prompt into a structured query.
    pub async fn translate(&self, prompt: &str) -> Result<StructuredQuery, TranslateError> {
        if let Some(hit) = self.cache.get(prompt) {
            return Ok(hit);
        }

        check_prompt(prompt, self.max_prompt_len)?;

        debug!(state = ?TranslationState::Classifying, prompt);
        let intent = self.classifier.classify(prompt, &self.registry).await?;

        let result = if intent.wants_nothing() {
            self.answer_trivial(&intent)?
        } else if intent.wants_columns_only() {
            self.answer_constrained(
                format!("Give list of return columns for this text: {prompt}"),
                ResponseShape::ReturnColumns,
                &intent,
            )
            .await?
        } else if intent.wants_sort_only() {
            self.answer_constrained(
                format!("Give the sort by columns for this text: {prompt}"),
                ResponseShape::SortBy,
                &intent,
            )
            .await?
        } else if intent.wants_sort_and_columns() {
            self.answer_constrained(
                format!("Give the sort by and return columns for this text: {prompt}"),
                ResponseShape::SortAndColumns,
                &intent,
            )
            .await?
        } else {
            self.answer_composed(prompt, &intent).await?
        };

        debug!(state = ?TranslationState::Done, prompt);
        self.cache.put(prompt, result.clone());
        Ok(result)
    }

    /// No section is needed; the answer is empty or a bare aggregation.
    fn answer_trivial(&self, intent: &QueryIntent) -> Result<StructuredQuery, TranslateError> {
        if intent.aggregation_target.is_empty() {
            return Ok(StructuredQuery::empty());
        }
        self.validator
            .validate_parts(None, Some(&intent.aggregation_target), None, None)
            .map_err(|e| TranslateError::ValidationRejected(e.to_string()))?;
        let query = StructuredQuery {
            summarize_by: Some(intent.aggregation_target.clone()),
            ..StructuredQuery::empty()
        };
        Ok(normalize(query, intent))
    }

    /// One extra collaborator call constrained to just the needed sections.
    /// Validation failures here surface directly; there is no retry loop on
    /// the short-circuit branches.
    async fn answer_constrained(
        &self,
        instruction: String,
        shape: ResponseShape,
        intent: &QueryIntent,
    ) -> Result<StructuredQuery, TranslateError> {
        let mut messages = prompts::composer_messages(&self.registry);
        messages.push(ChatMessage::user(instruction));

        let request = ChatRequest::new(messages).with_shape(shape);
        let response = self.provider.chat(request).await?;
        let value = extract_json_object(response.require_content()?)?;
        let query: StructuredQuery = serde_json::from_value(value)
            .map_err(|e| TranslateError::ValidationRejected(format!("malformed answer: {e}")))?;

        debug!(state = ?TranslationState::Validating, ?shape);
        self.validator
            .validate_query(&query)
            .map_err(|e| TranslateError::ValidationRejected(e.to_string()))?;
        Ok(normalize(query, intent))
    }

    /// The full composition loop, then normalization and a final check.
    async fn answer_composed(
        &self,
        prompt: &str,
        intent: &QueryIntent,
    ) -> Result<StructuredQuery, TranslateError> {
        debug!(state = ?TranslationState::Composing, prompt);
        let candidate = self
            .composer
            .compose(prompt, &self.registry, &self.validator)
            .await?;

        debug!(state = ?TranslationState::Normalizing, prompt);
        let query = normalize(candidate.into_query(), intent);

        self.validator
            .validate_query(&query)
            .map_err(|e| TranslateError::ValidationRejected(e.to_string()))?;
        info!(prompt, "translated prompt into a structured query");
        Ok(query)
    }
}
