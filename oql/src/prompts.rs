//! Prompt assembly for the two collaborator roles.
//!
//! Both conversations open with a textual rendering of the schema registry
//! so the collaborator can only pick columns that actually exist, followed
//! by worked examples. The examples are static; the schema section is
//! rebuilt from whatever registry snapshot the caller holds.

use serde_json::json;

use crate::catalog::EntitySchemaRegistry;
use crate::llm::{ChatMessage, ToolCall};

/// Render the registry as the schema briefing shared by both conversations.
pub fn system_information(registry: &EntitySchemaRegistry) -> String {
    let mut info = String::new();
    info.push_str(
        "If the name of an institution is given, use the appropriate tool in order to \
         retrieve the OpenAlex institution ID.\n\n",
    );
    info.push_str(
        "The value for country or country_code is the 2 letter representation of that \
         country.\n\n",
    );
    info.push_str(
        "Filter operator must be one of the following: \
         ['is','is not','is greater than','is less than']\n\n",
    );
    info.push_str(
        "Default to sorting by 'cited_by_count' if possible unless another sorting \
         column_id is specified by the user.\n\n",
    );
    info.push_str(
        "Please look at the following subjectEntity information to see which columns can \
         be sorted or filtered or returned and also which ones need to use a function \
         call tool in order to look up the entity:\n\n",
    );
    for (kind, schema) in registry.iter() {
        info.push_str(&format!("subjectEntity: {kind}\n\n"));

        info.push_str(&format!(
            "Columns (column_id) in {kind} that can be filtered (filters):\n"
        ));
        for col in &schema.filterable_columns {
            let descr = schema.columns.get(col).map(String::as_str).unwrap_or("");
            info.push_str(&format!("{col}: {descr}\n"));
        }
        info.push('\n');

        info.push_str(&format!(
            "Columns (column_id) in {kind} that can be sorted (sort_by):\n"
        ));
        for col in &schema.sortable_columns {
            let descr = schema.columns.get(col).map(String::as_str).unwrap_or("");
            info.push_str(&format!("{col}: {descr}\n"));
        }
        info.push('\n');

        info.push_str(&format!(
            "Columns (column_id) in {kind} that can be returned (return_columns):\n"
        ));
        for col in &schema.returnable_columns {
            let descr = schema.columns.get(col).map(String::as_str).unwrap_or("");
            info.push_str(&format!("{col}: {descr}\n"));
        }
        info.push('\n');

        if schema.requires_resolution {
            info.push_str(&format!("Function call tool needed for {kind}: Yes\n\n\n\n"));
        } else {
            info.push_str(&format!("Function call tool needed for {kind}: No\n\n"));
            info.push_str(&format!("Values for {kind}\n"));
            for value in &schema.values {
                info.push_str(&format!(
                    "{kind} value: {}\n{kind} ID: {}\n\n",
                    value.display_name, value.id
                ));
            }
            info.push_str("\n\n\n");
        }
    }
    info.trim().to_string()
}

/// Render tool calls the way they are echoed back into the conversation,
/// both in the worked examples and after a live resolution round.
pub fn render_tool_calls(calls: &[ToolCall]) -> String {
    let rendered: Vec<_> = calls
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "arguments": c.arguments,
            })
        })
        .collect();
    json!(rendered).to_string()
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args,
    }
}

/// The conversation prefix for intent classification.
pub fn intent_messages(registry: &EntitySchemaRegistry) -> Vec<ChatMessage> {
    let info = system_information(registry);

    let example_1 = "Show me all works in OpenAlex";
    let example_1_answer = json!({
        "filters_needed": false,
        "summarize_by": "",
        "summarize_by_filters_needed": false,
        "sort_by_needed": false,
        "return_columns_needed": false,
    });

    let example_2 = "Show me all works from North Carolina State University in 2023 and \
                     show me the openalex ID, title, and cited by count. Show the highest \
                     cited publications first.";
    let example_2_answer = json!({
        "filters_needed": true,
        "summarize_by": "",
        "summarize_by_filters_needed": false,
        "sort_by_needed": true,
        "return_columns_needed": true,
    });

    let example_3 = "Which institutions does NASA collaborate the most with in Africa?";
    let example_3_answer = json!({
        "filters_needed": true,
        "summarize_by": "institutions",
        "summarize_by_filters_needed": true,
        "sort_by_needed": true,
        "return_columns_needed": false,
    });

    let example_4 = "Which researchers at the University of Colorado have published the \
                     most work on SDG 13?";
    let example_4_answer = json!({
        "filters_needed": true,
        "summarize_by": "authors",
        "summarize_by_filters_needed": true,
        "sort_by_needed": true,
        "return_columns_needed": false,
    });

    let example_5 = "Which journals publish the highest cited research on coral bleaching?";
    let example_5_answer = json!({
        "filters_needed": true,
        "summarize_by": "sources",
        "summarize_by_filters_needed": true,
        "sort_by_needed": true,
        "return_columns_needed": false,
    });

    let example_6 = "authors or show me all authors or get authors";
    let example_6_answer = json!({
        "filters_needed": false,
        "summarize_by": "authors",
        "summarize_by_filters_needed": false,
        "sort_by_needed": false,
        "return_columns_needed": false,
    });

    vec![
        ChatMessage::system(
            "You are helping to take in database search requests from users and parse \
             them into different parts.",
        ),
        ChatMessage::user(info),
        ChatMessage::assistant(
            "I will refer back to this information when determining the different \
             elements of the prompt",
        ),
        ChatMessage::user(example_1),
        ChatMessage::user(example_1_answer.to_string()),
        ChatMessage::user(example_2),
        ChatMessage::user(example_2_answer.to_string()),
        ChatMessage::user(example_3),
        ChatMessage::user(example_3_answer.to_string()),
        ChatMessage::user(example_4),
        ChatMessage::user(example_4_answer.to_string()),
        ChatMessage::user(example_5),
        ChatMessage::user(example_5_answer.to_string()),
        ChatMessage::user(example_6),
        ChatMessage::user(example_6_answer.to_string()),
    ]
}

/// The conversation prefix for query composition, including two worked
/// examples of the tool-call round trip.
pub fn composer_messages(registry: &EntitySchemaRegistry) -> Vec<ChatMessage> {
    let info = system_information(registry);

    let example_1 = "What repositories are indexed in OpenAlex?";
    let example_1_answer = json!({
        "filters": [
            {
                "id": "branch_work",
                "subjectEntity": "works",
                "type": "branch",
                "operator": "and",
                "children": []
            },
            {
                "id": "branch_source",
                "subjectEntity": "sources",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_1"]
            },
            {
                "id": "leaf_1",
                "subjectEntity": "sources",
                "type": "leaf",
                "column_id": "source_type",
                "operator": "is",
                "value": "source-types/repositories"
            }
        ],
        "summarize_by": "sources",
        "sort_by": {
            "column_id": "count",
            "direction": "desc"
        },
        "return_columns": ["display_name", "count"]
    });

    let example_2 = "List all works from North Carolina State University (using the \
                     OpenAlex ID) in 2023 and show me the openalex ID, title, and cited \
                     by count. Show the highest cited publications first.";
    let example_2_tool = render_tool_calls(&[tool_call(
        "call_fcEKw4AeBTklT7HtJyakgboc",
        "get_institution_id",
        json!({"institution_name": "North Carolina State University"}),
    )]);
    let example_2_tool_response = json!([{
        "raw_institution_name": "North Carolina State University",
        "authorships.institutions.id": "institutions/I137902535",
        "institutions.id": "institutions/I137902535"
    }]);
    let example_2_answer = json!({
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
                "operator": "is",
                "value": "2023"
            },
            {
                "id": "leaf_2",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.institutions.id",
                "operator": "is",
                "value": "institutions/I137902535"
            }
        ],
        "summarize_by": "",
        "sort_by": {
            "column_id": "cited_by_count",
            "direction": "desc"
        },
        "return_columns": ["openalex_id", "paper_title", "cited_by_count"]
    });

    let example_3 = "Give me high level information for French institutions (summarize)";
    let example_3_answer = json!({
        "filters": [
            {
                "id": "branch_work",
                "subjectEntity": "works",
                "type": "branch",
                "operator": "and",
                "children": []
            },
            {
                "id": "branch_institution",
                "subjectEntity": "institutions",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_1"]
            },
            {
                "id": "leaf_1",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.countries",
                "operator": "is",
                "value": "countries/FR"
            }
        ],
        "summarize_by": "institutions",
        "sort_by": {
            "column_id": "count",
            "direction": "desc"
        },
        "return_columns": ["id", "display_name", "ids.ror", "type", "mean(fwci)", "count"]
    });

    let example_4 = "I want to see all works from Sorbonne University that are open \
                     access and in English while also being tagged with the SDG for good \
                     health and well-being.";
    let example_4_tool = render_tool_calls(&[tool_call(
        "call_DOSHfhsdiSFhsFHsAH",
        "get_institution_id",
        json!({"institution_name": "Sorbonne University"}),
    )]);
    let example_4_tool_response = json!([{
        "raw_institution_name": "Sorbonne University",
        "authorships.institutions.id": "institutions/I39804081",
        "institutions.id": "institutions/I39804081"
    }]);
    let example_4_answer = json!({
        "filters": [
            {
                "id": "branch_work",
                "subjectEntity": "works",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_1", "leaf_2", "leaf_3", "leaf_4"]
            },
            {
                "id": "leaf_1",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.institutions.id",
                "operator": "is",
                "value": "institutions/I39804081"
            },
            {
                "id": "leaf_2",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "open_access.is_oa",
                "operator": "is",
                "value": true
            },
            {
                "id": "leaf_3",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "language",
                "operator": "is",
                "value": "languages/en"
            },
            {
                "id": "leaf_4",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "sustainable_development_goals.id",
                "operator": "is",
                "value": "sdgs/3"
            }
        ],
        "summarize_by": "",
        "sort_by": {
            "column_id": "cited_by_count",
            "direction": "desc"
        },
        "return_columns": ["display_name", "publication_year", "type", "cited_by_count"]
    });

    let example_5 = "Show me African institutions that collaborate with MIT the most.";
    let example_5_tool = render_tool_calls(&[tool_call(
        "call_DOSHfhsdiSFhsFHsAH",
        "get_institution_id",
        json!({"institution_name": "MIT"}),
    )]);
    let example_5_tool_response = json!([{
        "raw_institution_name": "MIT",
        "authorships.institutions.id": "institutions/I63966007",
        "institutions.id": "institutions/I63966007"
    }]);
    let example_5_answer = json!({
        "filters": [
            {
                "id": "branch_work",
                "subjectEntity": "works",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_1"]
            },
            {
                "id": "leaf_1",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.institutions.id",
                "operator": "is",
                "value": "institutions/I63966007"
            },
            {
                "id": "branch_institution",
                "subjectEntity": "institutions",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_2"]
            },
            {
                "id": "leaf_2",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.institutions.continent",
                "operator": "is",
                "value": "continents/Q15"
            }
        ],
        "summarize_by": "institutions",
        "sort_by": {
            "column_id": "count",
            "direction": "desc"
        },
        "return_columns": ["display_name", "country_code", "ids.ror", "count", "mean(fwci)"]
    });

    let example_6 = "Which researchers collaborate with Stanford University the most?";
    let example_6_tool = render_tool_calls(&[tool_call(
        "call_JWHWkwhdOQhaVHqHYRAhCHA",
        "get_institution_id",
        json!({"institution_name": "Stanford University"}),
    )]);
    let example_6_tool_response = json!([{
        "raw_institution_name": "Stanford University",
        "authorships.institutions.id": "institutions/I97018004",
        "institutions.id": "institutions/I97018004"
    }]);
    let example_6_answer = json!({
        "filters": [
            {
                "id": "branch_work",
                "subjectEntity": "works",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_1"]
            },
            {
                "id": "leaf_1",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.institutions.id",
                "operator": "is",
                "value": "institutions/I97018004"
            },
            {
                "id": "branch_author",
                "subjectEntity": "authors",
                "type": "branch",
                "operator": "and",
                "children": ["leaf_2"]
            },
            {
                "id": "leaf_2",
                "subjectEntity": "works",
                "type": "leaf",
                "column_id": "authorships.institutions.id",
                "operator": "is not",
                "value": "institutions/I97018004"
            }
        ],
        "summarize_by": "authors",
        "sort_by": {
            "column_id": "count",
            "direction": "desc"
        },
        "return_columns": ["id", "ids.orcid", "display_name", "last_known_institutions.id", "count"]
    });

    vec![
        ChatMessage::system(
            "You are helping to take in database search requests from users for pulling \
             data from OpenAlex and turn them into a JSON object. OpenAlex indexes \
             scholarly works and their metadata.",
        ),
        ChatMessage::user(info),
        ChatMessage::assistant(
            "I will refer back to this information when determining which columns need \
             to be filtered, sorted, or returned",
        ),
        ChatMessage::user(example_1),
        ChatMessage::user(example_1_answer.to_string()),
        ChatMessage::user(example_2),
        ChatMessage::assistant(example_2_tool),
        ChatMessage::user(example_2_tool_response.to_string()),
        ChatMessage::assistant(example_2_answer.to_string()),
        ChatMessage::user(example_3),
        ChatMessage::assistant(example_3_answer.to_string()),
        ChatMessage::user(example_4),
        ChatMessage::assistant(example_4_tool),
        ChatMessage::user(example_4_tool_response.to_string()),
        ChatMessage::assistant(example_4_answer.to_string()),
        ChatMessage::user(example_5),
        ChatMessage::assistant(example_5_tool),
        ChatMessage::user(example_5_tool_response.to_string()),
        ChatMessage::assistant(example_5_answer.to_string()),
        ChatMessage::user(example_6),
        ChatMessage::assistant(example_6_tool),
        ChatMessage::user(example_6_tool_response.to_string()),
        ChatMessage::assistant(example_6_answer.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntitySchema, EntityValue};
    use indexmap::IndexMap;

    fn fixture_registry() -> EntitySchemaRegistry {
        let mut works = EntitySchema::default();
        works
            .columns
            .insert("publication_year".to_string(), "year published".to_string());
        works.filterable_columns.push("publication_year".to_string());
        works.sortable_columns.push("publication_year".to_string());
        works.returnable_columns.push("publication_year".to_string());

        let mut institutions = EntitySchema {
            requires_resolution: true,
            ..Default::default()
        };
        institutions
            .columns
            .insert("display_name".to_string(), "institution name".to_string());
        institutions.filterable_columns.push("display_name".to_string());
        institutions.returnable_columns.push("display_name".to_string());

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
        EntitySchemaRegistry::from_entities(entities)
    }

    #[test]
    fn briefing_lists_columns_and_tool_flags() {
        let info = system_information(&fixture_registry());
        assert!(info.contains("subjectEntity: works"));
        assert!(info.contains("publication_year: year published"));
        assert!(info.contains("Function call tool needed for institutions: Yes"));
        assert!(info.contains("Function call tool needed for countries: No"));
        assert!(info.contains("countries value: France"));
        assert!(info.contains("countries ID: countries/FR"));
    }

    #[test]
    fn briefing_states_the_operator_vocabulary() {
        let info = system_information(&fixture_registry());
        assert!(info.contains("['is','is not','is greater than','is less than']"));
    }

    #[test]
    fn composer_prefix_ends_with_a_worked_tool_round() {
        let messages = composer_messages(&fixture_registry());
        assert_eq!(messages[0].role, "system");
        let last = &messages[messages.len() - 1];
        assert_eq!(last.role, "assistant");
        assert!(last.content.contains("\"summarize_by\":\"authors\""));
    }

    #[test]
    fn rendered_tool_calls_round_trip_through_json() {
        let rendered = render_tool_calls(&[tool_call(
            "call_1",
            "get_institution_id",
            json!({"institution_name": "NASA"}),
        )]);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed[0]["name"], "get_institution_id");
        assert_eq!(parsed[0]["arguments"]["institution_name"], "NASA");
    }
}
