//! Entity schema catalog.
//!
//! Fetches the upstream entity configuration document once per load and
//! turns it into a typed registry: which columns of each entity kind can be
//! filtered, sorted, or returned, whether free-text mentions of the kind
//! need ID resolution, and the enumerated values of kinds that have them.
//! The registry is validated at load time and never mutated afterwards;
//! refreshing swaps the whole `Arc` so concurrent readers are unaffected.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Entity kinds whose free-text mentions are looked up through the entity
/// search service during composition.
const RESOLVABLE_KINDS: &[&str] = &[
    "institutions",
    "authors",
    "keywords",
    "sources",
    "funders",
    "publishers",
    "topics",
];

/// Entity kinds enumerated directly in the configuration document.
const ENUMERATED_KINDS: &[&str] = &[
    "works",
    "continents",
    "countries",
    "domains",
    "fields",
    "institution-types",
    "languages",
    "licenses",
    "sdgs",
    "source-types",
    "subfields",
    "types",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("schema configuration service unreachable: {0}")]
    Unreachable(String),
    #[error("schema configuration document malformed: {0}")]
    Malformed(String),
}

/// One enumerated value of an entity kind without resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityValue {
    pub display_name: String,
    pub id: String,
}

/// Per-kind schema: column sets plus resolution and enumeration data.
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
    /// Column id -> human-readable description, in document order.
    pub columns: IndexMap<String, String>,
    pub filterable_columns: Vec<String>,
    pub sortable_columns: Vec<String>,
    pub returnable_columns: Vec<String>,
    /// Whether mentions of this kind go through the entity search service.
    pub requires_resolution: bool,
    /// Enumerated values; empty for kinds that require resolution.
    pub values: Vec<EntityValue>,
}

impl EntitySchema {
    pub fn is_filterable(&self, column_id: &str) -> bool {
        self.filterable_columns.iter().any(|c| c == column_id)
    }

    pub fn is_sortable(&self, column_id: &str) -> bool {
        self.sortable_columns.iter().any(|c| c == column_id)
    }

    pub fn is_returnable(&self, column_id: &str) -> bool {
        self.returnable_columns.iter().any(|c| c == column_id)
    }
}

/// The full per-kind schema registry, built once per load.
#[derive(Debug, Clone, Default)]
pub struct EntitySchemaRegistry {
    entities: IndexMap<String, EntitySchema>,
}

impl EntitySchemaRegistry {
    pub fn get(&self, kind: &str) -> Option<&EntitySchema> {
        self.entities.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entities.contains_key(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntitySchema)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Build a registry directly from prepared schemas. Mostly useful for
    /// fixtures; production registries come from [`Self::from_config`].
    pub fn from_entities(entities: IndexMap<String, EntitySchema>) -> Self {
        Self { entities }
    }

    /// Build and validate a registry from the raw configuration document.
    ///
    /// Unknown top-level kinds (for example `concepts`, whose resolution
    /// support is not enabled) are skipped rather than rejected.
    pub fn from_config(config: &Value) -> Result<Self, CatalogError> {
        let document = config
            .as_object()
            .ok_or_else(|| CatalogError::Malformed("top level is not an object".to_string()))?;

        let mut entities = IndexMap::new();
        for (kind, entry) in document {
            let requires_resolution = if RESOLVABLE_KINDS.contains(&kind.as_str()) {
                true
            } else if ENUMERATED_KINDS.contains(&kind.as_str()) {
                false
            } else {
                debug!(kind = %kind, "skipping entity kind not enabled for querying");
                continue;
            };

            let mut schema = EntitySchema {
                requires_resolution,
                ..Default::default()
            };

            let columns = entry
                .get("columns")
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    CatalogError::Malformed(format!("entity '{}' has no columns table", kind))
                })?;
            for column in columns.values() {
                let id = column
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CatalogError::Malformed(format!(
                            "entity '{}' has a column without an id",
                            kind
                        ))
                    })?
                    .to_string();
                let descr = column
                    .get("descr")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                let sortable = column
                    .get("actions")
                    .and_then(Value::as_array)
                    .map(|actions| actions.iter().any(|a| a.as_str() == Some("sort")))
                    .unwrap_or(false);

                schema.filterable_columns.push(id.clone());
                schema.returnable_columns.push(id.clone());
                if sortable {
                    schema.sortable_columns.push(id.clone());
                }
                schema.columns.insert(id, descr);
            }

            if !requires_resolution {
                if let Some(values) = entry.get("values") {
                    schema.values = serde_json::from_value(values.clone()).map_err(|e| {
                        CatalogError::Malformed(format!(
                            "entity '{}' has a malformed values list: {}",
                            kind, e
                        ))
                    })?;
                }
            }

            entities.insert(kind.clone(), schema);
        }

        if !entities.contains_key("works") {
            return Err(CatalogError::Malformed(
                "configuration document is missing the 'works' entity".to_string(),
            ));
        }

        Ok(Self { entities })
    }
}

/// Source of the raw entity configuration document.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_config(&self) -> Result<Value, CatalogError>;
}

/// HTTP source against `{base}/entities/config`.
pub struct HttpSchemaSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSchemaSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn fetch_config(&self) -> Result<Value, CatalogError> {
        let url = format!("{}/entities/config", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CatalogError::Unreachable(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| CatalogError::Malformed(e.to_string()))
    }
}

/// Process-wide catalog: loads the registry and caches it behind an `Arc`
/// swap. A failed reload leaves the previous copy authoritative.
pub struct EntitySchemaCatalog<S> {
    source: S,
    cached: RwLock<Option<Arc<EntitySchemaRegistry>>>,
}

impl<S: SchemaSource> EntitySchemaCatalog<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Fetch, build, validate, and publish a fresh registry.
    pub async fn load(&self) -> Result<Arc<EntitySchemaRegistry>, CatalogError> {
        let config = self.source.fetch_config().await?;
        let registry = Arc::new(EntitySchemaRegistry::from_config(&config)?);
        info!(entities = registry.len(), "entity schema catalog loaded");
        let mut cached = match self.cached.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cached = Some(Arc::clone(&registry));
        Ok(registry)
    }

    /// The most recently published registry, if any load has succeeded.
    pub fn current(&self) -> Option<Arc<EntitySchemaRegistry>> {
        match self.cached.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_config() -> Value {
        json!({
            "works": {
                "descrFull": "Scholarly works",
                "columns": {
                    "publication_year": {
                        "id": "publication_year",
                        "descr": "year of publication",
                        "actions": ["filter", "sort"]
                    },
                    "cited_by_count": {
                        "id": "cited_by_count",
                        "descr": "number of citations",
                        "actions": ["sort"]
                    },
                    "paper_title": {
                        "id": "paper_title",
                        "descr": "title of the work"
                    }
                }
            },
            "institutions": {
                "descrFull": "Research institutions",
                "columns": {
                    "display_name": {"id": "display_name", "descr": "institution name"}
                }
            },
            "countries": {
                "descrFull": "Countries",
                "columns": {
                    "id": {"id": "id", "descr": "country id"}
                },
                "values": [
                    {"display_name": "Canada", "id": "countries/CA"},
                    {"display_name": "France", "id": "countries/FR"}
                ]
            },
            "concepts": {
                "descrFull": "Legacy concepts",
                "columns": {
                    "id": {"id": "id", "descr": "concept id"}
                }
            }
        })
    }

    struct FixtureSource(Value);

    #[async_trait]
    impl SchemaSource for FixtureSource {
        async fn fetch_config(&self) -> Result<Value, CatalogError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SchemaSource for FailingSource {
        async fn fetch_config(&self) -> Result<Value, CatalogError> {
            Err(CatalogError::Unreachable("connection refused".to_string()))
        }
    }

    #[test]
    fn registry_partitions_columns_by_action() {
        let registry = EntitySchemaRegistry::from_config(&sample_config()).unwrap();
        let works = registry.get("works").unwrap();
        assert!(works.is_filterable("publication_year"));
        assert!(works.is_sortable("publication_year"));
        assert!(works.is_sortable("cited_by_count"));
        assert!(!works.is_sortable("paper_title"));
        assert!(works.is_returnable("paper_title"));
        assert!(!works.requires_resolution);
    }

    #[test]
    fn resolvable_and_enumerated_kinds_are_classified() {
        let registry = EntitySchemaRegistry::from_config(&sample_config()).unwrap();
        assert!(registry.get("institutions").unwrap().requires_resolution);
        let countries = registry.get("countries").unwrap();
        assert!(!countries.requires_resolution);
        assert_eq!(countries.values.len(), 2);
        assert_eq!(countries.values[0].id, "countries/CA");
        // concepts is known upstream but not enabled for querying
        assert!(!registry.contains("concepts"));
    }

    #[test]
    fn missing_works_entity_is_malformed() {
        let config = json!({
            "countries": {"columns": {"id": {"id": "id", "descr": ""}}}
        });
        let err = EntitySchemaRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed(_)));
    }

    #[tokio::test]
    async fn load_publishes_and_caches() {
        let catalog = EntitySchemaCatalog::new(FixtureSource(sample_config()));
        assert!(catalog.current().is_none());
        let registry = catalog.load().await.unwrap();
        assert_eq!(registry.len(), 3);
        assert!(catalog.current().is_some());
    }

    #[tokio::test]
    async fn failed_load_returns_error_and_publishes_nothing() {
        let catalog = EntitySchemaCatalog::new(FailingSource);
        let err = catalog.load().await.unwrap_err();
        assert!(matches!(err, CatalogError::Unreachable(_)));
        assert!(catalog.current().is_none());
    }
}
