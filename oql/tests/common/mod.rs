//! Shared fixtures: a small schema registry, a canned entity search, and a
//! translator wired to a scripted collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};

use oql::cache::{NoopResultCache, ResultCache};
use oql::catalog::{EntitySchema, EntitySchemaRegistry, EntityValue};
use oql::llm::{ChatResponse, StubProvider};
use oql::resolver::{EntitySearch, ResolutionSpec, SearchError};
use oql::{Translator, TranslatorConfig};

pub fn registry() -> Arc<EntitySchemaRegistry> {
    let mut works = EntitySchema::default();
    let works_columns = [
        ("openalex_id", "OpenAlex ID of the work"),
        ("paper_title", "title of the work"),
        ("publication_year", "year the work was published"),
        ("cited_by_count", "number of citations"),
        ("authorships.institutions.id", "institutions of the authors"),
    ];
    for (id, descr) in works_columns {
        works.columns.insert(id.to_string(), descr.to_string());
        works.filterable_columns.push(id.to_string());
        works.returnable_columns.push(id.to_string());
    }
    for id in ["publication_year", "cited_by_count"] {
        works.sortable_columns.push(id.to_string());
    }

    let mut institutions = EntitySchema {
        requires_resolution: true,
        ..Default::default()
    };
    for (id, descr) in [
        ("display_name", "name of the institution"),
        ("count", "number of works"),
    ] {
        institutions.columns.insert(id.to_string(), descr.to_string());
        institutions.filterable_columns.push(id.to_string());
        institutions.returnable_columns.push(id.to_string());
    }
    institutions.sortable_columns.push("count".to_string());

    let mut countries = EntitySchema::default();
    countries
        .columns
        .insert("id".to_string(), "country id".to_string());
    countries.filterable_columns.push("id".to_string());
    countries.returnable_columns.push("id".to_string());
    countries.values.push(EntityValue {
        display_name: "France".to_string(),
        id: "countries/FR".to_string(),
    });

    let mut entities = IndexMap::new();
    entities.insert("works".to_string(), works);
    entities.insert("institutions".to_string(), institutions);
    entities.insert("countries".to_string(), countries);
    Arc::new(EntitySchemaRegistry::from_entities(entities))
}

/// Entity search answering from a fixed name-to-ID table.
pub struct FixtureSearch {
    ids: HashMap<String, String>,
}

impl FixtureSearch {
    pub fn empty() -> Self {
        Self {
            ids: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, id: &str) -> Self {
        self.ids.insert(name.to_string(), id.to_string());
        self
    }
}

#[async_trait]
impl EntitySearch for FixtureSearch {
    async fn search_id(
        &self,
        _spec: &ResolutionSpec,
        name: &str,
    ) -> Result<Option<String>, SearchError> {
        Ok(self.ids.get(name).cloned())
    }
}

pub fn translator(
    script: Vec<ChatResponse>,
    repeat_last: bool,
    search: FixtureSearch,
    cache: Arc<dyn ResultCache>,
) -> (Translator, Arc<StubProvider>) {
    let stub = StubProvider::new(script);
    let stub = Arc::new(if repeat_last { stub.with_repeat_last() } else { stub });
    let config = TranslatorConfig::default();
    let translator = Translator::new(
        registry(),
        Arc::clone(&stub) as Arc<dyn oql::llm::LlmProvider>,
        Arc::new(search),
        cache,
        &config,
    );
    (translator, stub)
}

pub fn translator_with_noop_cache(
    script: Vec<ChatResponse>,
    repeat_last: bool,
    search: FixtureSearch,
) -> (Translator, Arc<StubProvider>) {
    translator(script, repeat_last, search, Arc::new(NoopResultCache))
}

pub fn intent(
    filters: bool,
    target: &str,
    aggregation_filters: bool,
    sort: bool,
    columns: bool,
) -> ChatResponse {
    ChatResponse::answer(&json!({
        "filters_needed": filters,
        "summarize_by": target,
        "summarize_by_filters_needed": aggregation_filters,
        "sort_by_needed": sort,
        "return_columns_needed": columns,
    }))
}

/// The candidate the collaborator would produce for the worked
/// works-from-an-institution example.
pub fn institution_candidate(institution_value: &str) -> Value {
    json!({
        "filters": [
            {
                "id": "branch_work",
                "subjectEntity": "works",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_1", "leaf_2"]
            },
            {
                "id": "leaf_1",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "publication_year",
                "operator": ">=",
                "value": 2024
            },
            {
                "id": "leaf_2",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.institutions.id",
                "operator": "is",
                "value": institution_value
            }
        ],
        "summarize_by": "",
        "sort_by": {"column_id": "cited_by_count", "direction": "desc"},
        "return_columns": ["openalex_id", "paper_title", "cited_by_count"]
    })
}
