//! Deterministic post-processing of a validated query.
//!
//! Normalization rewrites operators into the downstream vocabulary, turns
//! empty-string sentinels into absent values, repairs the filter tree shape,
//! and prunes the sections the intent classifier marked as not needed.
//! It makes no external calls and is idempotent on its own output.

use serde_json::Value;

use crate::intent::QueryIntent;
use crate::query::{FilterNode, StructuredQuery};

/// Normalize a validated query according to the classified intent.
pub fn normalize(query: StructuredQuery, intent: &QueryIntent) -> StructuredQuery {
    let StructuredQuery {
        filters,
        summarize_by,
        sort_by,
        return_columns,
    } = query;

    // "works" aggregation means "the whole corpus"; empty means none.
    let summarize_by = summarize_by
        .map(|target| {
            if target == "works" {
                "all".to_string()
            } else {
                target
            }
        })
        .filter(|target| !target.is_empty());

    let filters = filters.map(|nodes| {
        let mut nodes: Vec<FilterNode> = nodes.into_iter().map(normalize_node).collect();

        // A leaf-only set gets a synthesized root so the tree always has
        // exactly one top-level works branch.
        if !nodes.is_empty() && !nodes.iter().any(FilterNode::is_branch) {
            let children = nodes
                .iter()
                .filter(|n| n.subject_entity() == "works")
                .map(|n| n.id().to_string())
                .collect();
            nodes.insert(
                0,
                FilterNode::Branch {
                    id: "branch_work".to_string(),
                    subject_entity: "works".to_string(),
                    operator: "and".to_string(),
                    children,
                },
            );
        }

        // Without an aggregation the root branch must be over works.
        if summarize_by.is_none() {
            if let Some(FilterNode::Branch { subject_entity, .. }) =
                nodes.iter_mut().find(|n| n.is_branch())
            {
                *subject_entity = "works".to_string();
            }
        }

        nodes
    });

    StructuredQuery {
        filters: filters.filter(|_| intent.needs_filters()),
        summarize_by,
        sort_by: sort_by.filter(|_| intent.needs_sort),
        return_columns: return_columns.filter(|_| intent.needs_return_columns),
    }
}

fn normalize_node(node: FilterNode) -> FilterNode {
    let FilterNode::Leaf {
        id,
        subject_entity,
        column_id,
        operator,
        mut value,
    } = node
    else {
        return node;
    };

    let column_id = column_id.filter(|c| !c.is_empty());
    let operator = operator.and_then(|op| rewrite_operator(&op, &mut value));

    if let Some(Value::String(s)) = &value {
        if s.is_empty() {
            value = None;
        } else if let Some((_, id_part)) = s.split_once("works/W") {
            value = Some(Value::String(id_part.to_string()));
        }
    }

    FilterNode::Leaf {
        id,
        subject_entity,
        column_id,
        operator,
        value,
    }
}

/// Rewrite comparison symbols into the spelled operator vocabulary.
/// Inclusive bounds become the exclusive form the downstream query language
/// accepts, with the bound shifted by one. A bare `is` is the implicit
/// default downstream, so its key is dropped entirely.
fn rewrite_operator(operator: &str, value: &mut Option<Value>) -> Option<String> {
    match operator {
        ">=" => {
            shift_bound(value, -1);
            Some("is greater than".to_string())
        }
        "<=" => {
            shift_bound(value, 1);
            Some("is less than".to_string())
        }
        ">" => Some("is greater than".to_string()),
        "<" => Some("is less than".to_string()),
        "is" => None,
        other => Some(other.to_string()),
    }
}

/// Shift an integer bound, preserving the value's original form (number or
/// numeric string). Non-integer values, and bounds that would overflow, are
/// left untouched.
fn shift_bound(value: &mut Option<Value>, delta: i64) {
    match value {
        Some(Value::Number(n)) => {
            if let Some(shifted) = n.as_i64().and_then(|i| i.checked_add(delta)) {
                *value = Some(Value::from(shifted));
            }
        }
        Some(Value::String(s)) => {
            if let Some(shifted) = s.trim().parse::<i64>().ok().and_then(|i| i.checked_add(delta))
            {
                *s = shifted.to_string();
            }
        }
        _ => {}
    }
}
