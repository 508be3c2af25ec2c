//! Entity-name resolution.
//!
//! The language collaborator asks for canonical IDs by emitting tool calls,
//! one per named-entity mention. Each resolvable kind is one row of a static
//! table, so dispatch is a lookup instead of string matching and adding a
//! kind is exhaustive-checked through [`ResolutionKind`].
//!
//! Resolution is deliberately forgiving: a search miss (or a failed search
//! call) binds the mention to a `"<kind> not found"` sentinel so composition
//! can continue and the miss stays visible in the produced filter value.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{ToolCall, ToolDefinition};

/// Entity kinds whose mentions are resolved through the search service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionKind {
    Institution,
    Author,
    Keyword,
    Source,
    Funder,
    Publisher,
    Topic,
}

/// One row of the resolution table.
#[derive(Debug)]
pub struct ResolutionSpec {
    pub kind: ResolutionKind,
    /// Tool name offered to the collaborator.
    pub tool_name: &'static str,
    /// Argument key carrying the mention.
    pub arg_key: &'static str,
    /// Human-readable description of the tool argument.
    pub arg_descr: &'static str,
    /// Path segment of the search endpoint.
    pub search_path: &'static str,
    /// Prefix for canonical `"kind/ID"` values.
    pub id_prefix: &'static str,
    /// Whether returned IDs are lowercased.
    pub lowercase_id: bool,
    /// Key under which the raw mention is echoed back.
    pub raw_key: &'static str,
    /// Every column path this kind can appear under in a filter.
    pub column_paths: &'static [&'static str],
    /// Singular label, used for the not-found sentinel.
    pub label: &'static str,
}

impl ResolutionSpec {
    pub fn sentinel(&self) -> String {
        format!("{} not found", self.label)
    }

    /// The tool definition offered to the collaborator for this kind.
    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.tool_name.to_string(),
            description: format!(
                "Get the OpenAlex {} ID from the API when a {} needs to be looked up to find the ID.",
                self.label, self.label
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    self.arg_key: {
                        "type": "string",
                        "description": self.arg_descr,
                    },
                },
                "required": [self.arg_key],
                "additionalProperties": false,
            }),
        }
    }
}

/// The full dispatch table, one row per resolvable kind.
pub const RESOLUTION_TABLE: &[ResolutionSpec] = &[
    ResolutionSpec {
        kind: ResolutionKind::Institution,
        tool_name: "get_institution_id",
        arg_key: "institution_name",
        arg_descr: "The name of the institution that needs to be looked up.",
        search_path: "institutions",
        id_prefix: "institutions",
        lowercase_id: false,
        raw_key: "raw_institution_name",
        column_paths: &["authorships.institutions.id", "institutions.id"],
        label: "institution",
    },
    ResolutionSpec {
        kind: ResolutionKind::Author,
        tool_name: "get_author_id",
        arg_key: "author_name",
        arg_descr: "The name of the author that needs to be looked up.",
        search_path: "authors",
        id_prefix: "authors",
        lowercase_id: false,
        raw_key: "raw_author_name",
        column_paths: &["authorships.authors.id", "authors.id"],
        label: "author",
    },
    ResolutionSpec {
        kind: ResolutionKind::Keyword,
        tool_name: "get_keyword_id",
        arg_key: "search_name",
        arg_descr: "A short phrase or word to look up in the OpenAlex keywords.",
        search_path: "keywords",
        id_prefix: "keywords",
        lowercase_id: true,
        raw_key: "raw_search_name",
        column_paths: &["keywords.id"],
        label: "keyword",
    },
    ResolutionSpec {
        kind: ResolutionKind::Source,
        tool_name: "get_source_id",
        arg_key: "search_name",
        arg_descr: "The name of a journal, repository, or other to look up the OpenAlex source ID.",
        search_path: "sources",
        id_prefix: "sources",
        lowercase_id: true,
        raw_key: "raw_search_name",
        column_paths: &["primary_location.source.id"],
        label: "source",
    },
    ResolutionSpec {
        kind: ResolutionKind::Funder,
        tool_name: "get_funder_id",
        arg_key: "search_name",
        arg_descr: "The name of a funding organization to look up the OpenAlex funder ID.",
        search_path: "funders",
        id_prefix: "funders",
        lowercase_id: true,
        raw_key: "raw_search_name",
        column_paths: &["grants.funder"],
        label: "funder",
    },
    ResolutionSpec {
        kind: ResolutionKind::Publisher,
        tool_name: "get_publisher_id",
        arg_key: "search_name",
        arg_descr: "The name of a publishing organization to look up the OpenAlex publisher ID.",
        search_path: "publishers",
        id_prefix: "publishers",
        lowercase_id: true,
        raw_key: "raw_search_name",
        column_paths: &["primary_location.source.publisher_lineage"],
        label: "publisher",
    },
    ResolutionSpec {
        kind: ResolutionKind::Topic,
        tool_name: "get_topic_id",
        arg_key: "search_name",
        arg_descr: "The name of a topic to look up the OpenAlex topic ID.",
        search_path: "topics",
        id_prefix: "topics",
        lowercase_id: true,
        raw_key: "raw_search_name",
        column_paths: &["primary_topic.id"],
        label: "topic",
    },
];

impl ResolutionKind {
    pub fn spec(&self) -> &'static ResolutionSpec {
        let index = match self {
            ResolutionKind::Institution => 0,
            ResolutionKind::Author => 1,
            ResolutionKind::Keyword => 2,
            ResolutionKind::Source => 3,
            ResolutionKind::Funder => 4,
            ResolutionKind::Publisher => 5,
            ResolutionKind::Topic => 6,
        };
        &RESOLUTION_TABLE[index]
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        RESOLUTION_TABLE
            .iter()
            .find(|s| s.tool_name == name)
            .map(|s| s.kind)
    }
}

/// All tool definitions for the collaborator, in table order.
pub fn resolution_tools() -> Vec<ToolDefinition> {
    RESOLUTION_TABLE.iter().map(|s| s.tool_definition()).collect()
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("entity search request failed: {0}")]
    Http(String),
    #[error("entity search response malformed: {0}")]
    Malformed(String),
}

/// Search-by-name lookup against the entity search service.
#[async_trait]
pub trait EntitySearch: Send + Sync {
    /// Returns the first (highest-relevance) match's bare ID, or `None`
    /// when there are no results. "No results" is a valid response, not an
    /// error.
    async fn search_id(
        &self,
        spec: &ResolutionSpec,
        name: &str,
    ) -> Result<Option<String>, SearchError>;
}

/// HTTP search against `{base}/{kind}?search={name}`.
pub struct HttpEntitySearch {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEntitySearch {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EntitySearch for HttpEntitySearch {
    async fn search_id(
        &self,
        spec: &ResolutionSpec,
        name: &str,
    ) -> Result<Option<String>, SearchError> {
        let url = format!(
            "{}/{}?search={}",
            self.base_url,
            spec.search_path,
            urlencoding::encode(name)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        let count = body["meta"]["count"].as_u64().unwrap_or(0);
        if count == 0 {
            return Ok(None);
        }
        let id = body["results"][0]["id"]
            .as_str()
            .ok_or_else(|| SearchError::Malformed("first result has no id".to_string()))?;
        let bare = id.rsplit('/').next().unwrap_or(id);
        Ok(Some(if spec.lowercase_id {
            bare.to_lowercase()
        } else {
            bare.to_string()
        }))
    }
}

/// One resolved mention, expanded to every column path its kind can appear
/// under. Request-scoped; consumed once by the composer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntityBinding {
    pub raw_mention: String,
    pub raw_key: &'static str,
    /// Column path -> canonical `"kind/ID"` value (or the bare sentinel).
    pub canonical_filter_paths: IndexMap<String, String>,
}

impl ResolvedEntityBinding {
    /// Render the binding as the flat observation object echoed back into
    /// the conversation.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            self.raw_key.to_string(),
            Value::String(self.raw_mention.clone()),
        );
        for (path, value) in &self.canonical_filter_paths {
            object.insert(path.clone(), Value::String(value.clone()));
        }
        Value::Object(object)
    }
}

/// Resolves the collaborator's tool calls against the search service.
pub struct EntityResolver {
    search: Arc<dyn EntitySearch>,
}

impl EntityResolver {
    pub fn new(search: Arc<dyn EntitySearch>) -> Self {
        Self { search }
    }

    /// Resolve every tool call in order. Unknown tools and malformed
    /// arguments are skipped with a warning; search misses bind the
    /// sentinel value instead of failing.
    pub async fn resolve(&self, tool_calls: &[ToolCall]) -> Vec<ResolvedEntityBinding> {
        let mut bindings = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let Some(kind) = ResolutionKind::from_tool_name(&call.name) else {
                warn!(tool = %call.name, "collaborator requested an unknown tool");
                continue;
            };
            let spec = kind.spec();
            let Some(mention) = call.arguments.get(spec.arg_key).and_then(Value::as_str)
            else {
                warn!(tool = %call.name, key = spec.arg_key, "tool call missing its argument");
                continue;
            };

            let value = match self.search.search_id(spec, mention).await {
                Ok(Some(id)) => format!("{}/{}", spec.id_prefix, id),
                Ok(None) => {
                    debug!(kind = spec.label, mention, "entity search found no match");
                    spec.sentinel()
                }
                Err(e) => {
                    warn!(kind = spec.label, mention, error = %e, "entity search failed");
                    spec.sentinel()
                }
            };

            let canonical_filter_paths = spec
                .column_paths
                .iter()
                .map(|path| (path.to_string(), value.clone()))
                .collect();
            bindings.push(ResolvedEntityBinding {
                raw_mention: mention.to_string(),
                raw_key: spec.raw_key,
                canonical_filter_paths,
            });
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixtureSearch {
        id: Option<&'static str>,
    }

    #[async_trait]
    impl EntitySearch for FixtureSearch {
        async fn search_id(
            &self,
            _spec: &ResolutionSpec,
            _name: &str,
        ) -> Result<Option<String>, SearchError> {
            Ok(self.id.map(str::to_string))
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: "tool_call_1".to_string(),
            name: name.to_string(),
            arguments: args,
        }
    }

    #[test]
    fn every_tool_name_maps_back_to_its_kind() {
        for spec in RESOLUTION_TABLE {
            assert_eq!(ResolutionKind::from_tool_name(spec.tool_name), Some(spec.kind));
            assert_eq!(spec.kind.spec().tool_name, spec.tool_name);
        }
        assert_eq!(ResolutionKind::from_tool_name("get_concept_id"), None);
    }

    #[tokio::test]
    async fn institution_match_expands_to_both_column_paths() {
        let resolver = EntityResolver::new(Arc::new(FixtureSearch {
            id: Some("I137902535"),
        }));
        let bindings = resolver
            .resolve(&[call(
                "get_institution_id",
                json!({"institution_name": "North Carolina State University"}),
            )])
            .await;
        assert_eq!(bindings.len(), 1);
        let rendered = bindings[0].to_json();
        assert_eq!(
            rendered["raw_institution_name"],
            "North Carolina State University"
        );
        assert_eq!(
            rendered["authorships.institutions.id"],
            "institutions/I137902535"
        );
        assert_eq!(rendered["institutions.id"], "institutions/I137902535");
    }

    #[tokio::test]
    async fn search_miss_binds_the_sentinel() {
        let resolver = EntityResolver::new(Arc::new(FixtureSearch { id: None }));
        let bindings = resolver
            .resolve(&[call(
                "get_institution_id",
                json!({"institution_name": "Unknown College"}),
            )])
            .await;
        let rendered = bindings[0].to_json();
        assert_eq!(rendered["institutions.id"], "institution not found");
    }

    #[tokio::test]
    async fn unknown_tools_are_skipped() {
        let resolver = EntityResolver::new(Arc::new(FixtureSearch { id: None }));
        let bindings = resolver
            .resolve(&[call("get_concept_id", json!({"search_name": "biology"}))])
            .await;
        assert!(bindings.is_empty());
    }

    #[tokio::test]
    async fn funder_binding_uses_the_grants_path() {
        let resolver = EntityResolver::new(Arc::new(FixtureSearch {
            id: Some("f4320306076"),
        }));
        let bindings = resolver
            .resolve(&[call("get_funder_id", json!({"search_name": "NSF"}))])
            .await;
        let rendered = bindings[0].to_json();
        assert_eq!(rendered["grants.funder"], "funders/f4320306076");
        assert_eq!(rendered["raw_search_name"], "NSF");
    }
}
