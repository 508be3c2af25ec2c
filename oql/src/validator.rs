//! Structural validation of composed query candidates.
//!
//! Checks run in a fixed order and stop at the first failure; the failure
//! message is fed back to the collaborator verbatim, so messages name the
//! offending value and what would have been accepted.
//!
//! Validation is purely structural. It never judges whether a filter value
//! is plausible, only whether the referenced entities and columns exist and
//! are eligible for the role they are used in.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::EntitySchemaRegistry;
use crate::query::{FilterNode, QueryCandidate, SortSpec, StructuredQuery};

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

const DIRECTIONS: [&str; 2] = ["asc", "desc"];

pub struct QueryValidator {
    registry: Arc<EntitySchemaRegistry>,
}

impl QueryValidator {
    pub fn new(registry: Arc<EntitySchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn validate_candidate(&self, candidate: &QueryCandidate) -> Result<(), ValidationError> {
        self.validate_parts(
            Some(&candidate.filters),
            Some(candidate.summarize_by.as_str()),
            candidate.sort_by.as_ref(),
            Some(&candidate.return_columns),
        )
    }

    pub fn validate_query(&self, query: &StructuredQuery) -> Result<(), ValidationError> {
        self.validate_parts(
            query.filters.as_deref(),
            query.summarize_by.as_deref(),
            query.sort_by.as_ref(),
            query.return_columns.as_deref(),
        )
    }

    /// Validate any subset of the query sections. Absent sections pass.
    pub fn validate_parts(
        &self,
        filters: Option<&[FilterNode]>,
        summarize_by: Option<&str>,
        sort_by: Option<&SortSpec>,
        return_columns: Option<&[String]>,
    ) -> Result<(), ValidationError> {
        if let Some(filters) = filters {
            self.check_filters(filters)?;
        }
        if let Some(target) = summarize_by {
            self.check_summarize_by(target)?;
        }
        if let Some(sort) = sort_by {
            self.check_sort_by(sort, summarize_by)?;
        }
        if let Some(columns) = return_columns {
            self.check_return_columns(columns, summarize_by)?;
        }
        Ok(())
    }

    fn check_filters(&self, filters: &[FilterNode]) -> Result<(), ValidationError> {
        let known_ids: HashSet<&str> = filters.iter().map(FilterNode::id).collect();

        for node in filters {
            let kind = node.subject_entity();
            let Some(schema) = self.registry.get(kind) else {
                return Err(ValidationError(format!(
                    "'{kind}' is not a valid subjectEntity"
                )));
            };

            match node {
                FilterNode::Branch { id, children, .. } => {
                    for child in children {
                        if !known_ids.contains(child.as_str()) {
                            return Err(ValidationError(format!(
                                "branch '{id}' references '{child}' which is not in the filters list"
                            )));
                        }
                    }
                }
                FilterNode::Leaf { column_id, .. } => {
                    if let Some(column) = column_id.as_deref() {
                        if !column.is_empty() && !schema.is_filterable(column) {
                            return Err(ValidationError(format!(
                                "'{column}' is not a filterable column for {kind}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_summarize_by(&self, target: &str) -> Result<(), ValidationError> {
        if target.is_empty() || target == "all" || self.registry.contains(target) {
            Ok(())
        } else {
            Err(ValidationError(format!(
                "'{target}' is not a valid summarize_by entity"
            )))
        }
    }

    /// Sort and return columns are judged against the aggregation target,
    /// or against works when there is no aggregation.
    fn target_kind<'a>(&self, summarize_by: Option<&'a str>) -> &'a str {
        match summarize_by {
            Some(target) if !target.is_empty() && target != "all" => target,
            _ => "works",
        }
    }

    fn check_sort_by(
        &self,
        sort: &SortSpec,
        summarize_by: Option<&str>,
    ) -> Result<(), ValidationError> {
        let kind = self.target_kind(summarize_by);
        let Some(schema) = self.registry.get(kind) else {
            return Err(ValidationError(format!(
                "'{kind}' is not a valid subjectEntity"
            )));
        };
        if !schema.is_sortable(&sort.column_id) {
            return Err(ValidationError(format!(
                "'{}' is not a sortable column for {kind}",
                sort.column_id
            )));
        }
        if !DIRECTIONS.contains(&sort.direction.as_str()) {
            return Err(ValidationError(format!(
                "'{}' is not a valid sort direction, must be 'asc' or 'desc'",
                sort.direction
            )));
        }
        Ok(())
    }

    fn check_return_columns(
        &self,
        columns: &[String],
        summarize_by: Option<&str>,
    ) -> Result<(), ValidationError> {
        let kind = self.target_kind(summarize_by);
        let Some(schema) = self.registry.get(kind) else {
            return Err(ValidationError(format!(
                "'{kind}' is not a valid subjectEntity"
            )));
        };
        for column in columns {
            if !schema.is_returnable(column) {
                return Err(ValidationError(format!(
                    "'{column}' is not a valid return column for {kind}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntitySchema;
    use indexmap::IndexMap;
    use serde_json::json;

    fn fixture_validator() -> QueryValidator {
        let mut works = EntitySchema::default();
        for col in ["publication_year", "authorships.institutions.id", "cited_by_count"] {
            works.columns.insert(col.to_string(), String::new());
            works.filterable_columns.push(col.to_string());
            works.returnable_columns.push(col.to_string());
        }
        works.sortable_columns.push("cited_by_count".to_string());

        let mut institutions = EntitySchema {
            requires_resolution: true,
            ..Default::default()
        };
        for col in ["display_name", "count"] {
            institutions.columns.insert(col.to_string(), String::new());
            institutions.filterable_columns.push(col.to_string());
            institutions.returnable_columns.push(col.to_string());
        }
        institutions.sortable_columns.push("count".to_string());

        let mut entities = IndexMap::new();
        entities.insert("works".to_string(), works);
        entities.insert("institutions".to_string(), institutions);
        QueryValidator::new(Arc::new(EntitySchemaRegistry::from_entities(entities)))
    }

    fn leaf(id: &str, column: &str) -> FilterNode {
        FilterNode::Leaf {
            id: id.to_string(),
            subject_entity: "works".to_string(),
            column_id: Some(column.to_string()),
            operator: Some("is".to_string()),
            value: Some(json!("2023")),
        }
    }

    fn branch(id: &str, children: &[&str]) -> FilterNode {
        FilterNode::Branch {
            id: id.to_string(),
            subject_entity: "works".to_string(),
            operator: "and".to_string(),
            children: children.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn accepts_a_well_formed_filter_tree() {
        let validator = fixture_validator();
        let filters = vec![branch("branch_work", &["leaf_1"]), leaf("leaf_1", "publication_year")];
        assert!(validator.validate_parts(Some(&filters), None, None, None).is_ok());
    }

    #[test]
    fn rejects_unknown_subject_entity() {
        let validator = fixture_validator();
        let filters = vec![FilterNode::Branch {
            id: "branch_concept".to_string(),
            subject_entity: "concepts".to_string(),
            operator: "and".to_string(),
            children: vec![],
        }];
        let err = validator
            .validate_parts(Some(&filters), None, None, None)
            .unwrap_err();
        assert_eq!(err.0, "'concepts' is not a valid subjectEntity");
    }

    #[test]
    fn rejects_dangling_branch_children() {
        let validator = fixture_validator();
        let filters = vec![branch("branch_work", &["leaf_missing"])];
        let err = validator
            .validate_parts(Some(&filters), None, None, None)
            .unwrap_err();
        assert!(err.0.contains("leaf_missing"));
    }

    #[test]
    fn rejects_unfilterable_leaf_column() {
        let validator = fixture_validator();
        let filters = vec![leaf("leaf_1", "not_a_column")];
        let err = validator
            .validate_parts(Some(&filters), None, None, None)
            .unwrap_err();
        assert_eq!(err.0, "'not_a_column' is not a filterable column for works");
    }

    #[test]
    fn empty_leaf_column_passes() {
        let validator = fixture_validator();
        let filters = vec![FilterNode::Leaf {
            id: "leaf_1".to_string(),
            subject_entity: "works".to_string(),
            column_id: None,
            operator: None,
            value: None,
        }];
        assert!(validator.validate_parts(Some(&filters), None, None, None).is_ok());
    }

    #[test]
    fn summarize_by_accepts_empty_all_and_known_kinds() {
        let validator = fixture_validator();
        for target in ["", "all", "institutions"] {
            assert!(validator.validate_parts(None, Some(target), None, None).is_ok());
        }
        let err = validator
            .validate_parts(None, Some("concepts"), None, None)
            .unwrap_err();
        assert_eq!(err.0, "'concepts' is not a valid summarize_by entity");
    }

    #[test]
    fn sort_column_is_judged_against_the_aggregation_target() {
        let validator = fixture_validator();
        let sort = SortSpec {
            column_id: "count".to_string(),
            direction: "desc".to_string(),
        };
        // count is sortable on institutions, not on works.
        assert!(validator
            .validate_parts(None, Some("institutions"), Some(&sort), None)
            .is_ok());
        let err = validator
            .validate_parts(None, None, Some(&sort), None)
            .unwrap_err();
        assert_eq!(err.0, "'count' is not a sortable column for works");
    }

    #[test]
    fn rejects_bad_sort_direction() {
        let validator = fixture_validator();
        let sort = SortSpec {
            column_id: "cited_by_count".to_string(),
            direction: "down".to_string(),
        };
        let err = validator
            .validate_parts(None, None, Some(&sort), None)
            .unwrap_err();
        assert!(err.0.contains("'down'"));
    }

    #[test]
    fn return_columns_are_judged_against_the_aggregation_target() {
        let validator = fixture_validator();
        let columns = vec!["display_name".to_string(), "count".to_string()];
        assert!(validator
            .validate_parts(None, Some("institutions"), None, Some(&columns))
            .is_ok());
        let err = validator
            .validate_parts(None, Some(""), None, Some(&columns))
            .unwrap_err();
        assert_eq!(err.0, "'display_name' is not a valid return column for works");
    }
}
