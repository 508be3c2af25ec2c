//! Error taxonomy for the translation pipeline.
//!
//! Every variant here maps to a user-visible failure mode. Recovery is
//! attempted locally only for validation failures (inside the composer's
//! retry loop) and for a single ambiguous-intent retry; everything else
//! propagates to the caller as-is.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::llm::LlmError;

/// Top-level error type for a translation request.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The prompt failed the safety gate. Fatal, never retried.
    #[error("the prompt did not pass the initial check: {0}")]
    PromptRejected(String),

    /// The schema catalog could not be loaded. Fatal for the process,
    /// not per-request.
    #[error("entity schema catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),

    /// The intent classifier returned an aggregation target that is not a
    /// known entity kind, even after its single retry.
    #[error("could not determine a valid aggregation target: {0}")]
    IntentAmbiguous(String),

    /// The composer exhausted its attempt bound without producing a query
    /// that passes validation. Carries the last validator message.
    #[error(
        "no valid query object was produced after {attempts} attempts; \
         the latest error message received was '{last_error}'"
    )]
    CompositionExhausted { attempts: u32, last_error: String },

    /// A structural validation failure surfaced directly. Only reachable
    /// from the short-circuit paths, which do not retry.
    #[error("query validation failed: {0}")]
    ValidationRejected(String),

    /// Transport or protocol failure talking to the language collaborator.
    #[error("language model request failed: {0}")]
    Llm(#[from] LlmError),
}

impl TranslateError {
    /// Whether this error should be reported as a client error (HTTP 400
    /// equivalent) by a surrounding request layer.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TranslateError::CatalogUnavailable(_))
    }
}
