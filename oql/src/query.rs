//! The structured query object and its building blocks.
//!
//! Two shapes exist on purpose: [`QueryCandidate`] mirrors the full object
//! the language collaborator is asked to produce (every key present, empty
//! strings standing in for "not applicable"), and [`StructuredQuery`] is the
//! final artifact where inapplicable sections are omitted rather than
//! emitted empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single node in the flat, id-referenced filter tree.
///
/// Branches carry conjunction structure; leaves carry one predicate each.
/// Children reference sibling nodes by `id` inside the same `filters` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FilterNode {
    #[serde(rename = "branch")]
    Branch {
        id: String,
        #[serde(rename = "subjectEntity")]
        subject_entity: String,
        /// Only "and" is accepted by the downstream query language.
        operator: String,
        #[serde(default)]
        children: Vec<String>,
    },
    #[serde(rename = "leaf")]
    Leaf {
        id: String,
        #[serde(rename = "subjectEntity")]
        subject_entity: String,
        /// `None` serializes as null; the collaborator's empty-string
        /// sentinel is rewritten to `None` by the normalizer.
        column_id: Option<String>,
        /// Omitted entirely once the normalizer drops the implicit "is".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
        value: Option<Value>,
    },
}

impl FilterNode {
    pub fn id(&self) -> &str {
        match self {
            FilterNode::Branch { id, .. } | FilterNode::Leaf { id, .. } => id,
        }
    }

    pub fn subject_entity(&self) -> &str {
        match self {
            FilterNode::Branch { subject_entity, .. }
            | FilterNode::Leaf { subject_entity, .. } => subject_entity,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, FilterNode::Branch { .. })
    }

    /// Convenience constructor for a conjunctive branch.
    pub fn branch(id: impl Into<String>, subject_entity: impl Into<String>) -> Self {
        FilterNode::Branch {
            id: id.into(),
            subject_entity: subject_entity.into(),
            operator: "and".to_string(),
            children: vec![],
        }
    }

    /// Convenience constructor for a predicate leaf.
    pub fn leaf(
        id: impl Into<String>,
        subject_entity: impl Into<String>,
        column_id: impl Into<String>,
        operator: impl Into<String>,
        value: Value,
    ) -> Self {
        FilterNode::Leaf {
            id: id.into(),
            subject_entity: subject_entity.into(),
            column_id: Some(column_id.into()),
            operator: Some(operator.into()),
            value: Some(value),
        }
    }
}

/// Sort order for the result set.
///
/// `direction` stays a plain string on the wire; legality ("asc"/"desc") is
/// the validator's business, so a bad direction becomes retry feedback
/// instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column_id: String,
    pub direction: String,
}

/// The full shape requested from the language collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryCandidate {
    #[serde(default)]
    pub filters: Vec<FilterNode>,
    #[serde(default)]
    pub summarize_by: String,
    #[serde(default)]
    pub sort_by: Option<SortSpec>,
    #[serde(default)]
    pub return_columns: Vec<String>,
}

impl QueryCandidate {
    /// Lift the candidate into the optional-keyed result shape without any
    /// normalization; empty-string sentinels and pruning are handled by
    /// [`crate::normalize`].
    pub fn into_query(self) -> StructuredQuery {
        StructuredQuery {
            filters: Some(self.filters),
            summarize_by: Some(self.summarize_by),
            sort_by: self.sort_by,
            return_columns: Some(self.return_columns),
        }
    }
}

/// The final artifact of a translation request.
///
/// Key order is part of the contract: `filters, summarize_by, sort_by,
/// return_columns`. Absent keys mean "not applicable" and are never emitted
/// with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarize_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_columns: Option<Vec<String>>,
}

impl StructuredQuery {
    /// The empty query: serializes as `{}`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_none()
            && self.summarize_by.is_none()
            && self.sort_by.is_none()
            && self.return_columns.is_none()
    }
}
