//! Translation of free-text research questions into structured OpenAlex
//! queries.
//!
//! The pipeline classifies what the prompt asks for, resolves named
//! entities to canonical IDs through the search API, composes a candidate
//! query with a language collaborator under a bounded retry loop, validates
//! it against the entity schema, and normalizes the result into the final
//! wire shape.
//!
//! Entry point: build a [`pipeline::Translator`] from a loaded
//! [`catalog::EntitySchemaCatalog`] snapshot, an [`llm::LlmProvider`], an
//! entity search backend, and a result cache, then call
//! [`pipeline::Translator::translate`].

pub mod cache;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod error;
pub mod intent;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod query;
pub mod resolver;
pub mod validator;

pub use config::TranslatorConfig;
pub use error::TranslateError;
pub use pipeline::Translator;
pub use query::StructuredQuery;
