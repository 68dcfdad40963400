//! Rubric Loader — the criteria/subquestion rubric submissions are graded
//! against, plus the strict response schema handed to the judge so its reply
//! is directly parseable without fuzzy extraction.

pub mod handlers;

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct Subquestion {
    pub id: Uuid,
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Criterion {
    pub id: Uuid,
    pub name: String,
    pub subquestions: Vec<Subquestion>,
}

/// Loads the published rubric. Criteria without any subquestion are excluded —
/// there is nothing to grade under them.
///
/// Loaded fresh per evaluation so edits to the rubric take effect immediately.
pub async fn load_rubric(pool: &PgPool) -> Result<Vec<Criterion>, AppError> {
    let criteria: Vec<(Uuid, String)> = sqlx::query_as(
        "SELECT id, name FROM criteria WHERE published ORDER BY position, id",
    )
    .fetch_all(pool)
    .await?;

    let subquestions: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
        r#"
        SELECT s.id, s.criterion_id, s.question
        FROM subquestions s
        JOIN criteria c ON c.id = s.criterion_id
        WHERE c.published
        ORDER BY s.position, s.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut by_criterion: HashMap<Uuid, Vec<Subquestion>> = HashMap::new();
    for (id, criterion_id, question) in subquestions {
        by_criterion
            .entry(criterion_id)
            .or_default()
            .push(Subquestion { id, question });
    }

    let rubric: Vec<Criterion> = criteria
        .into_iter()
        .filter_map(|(id, name)| {
            let subquestions = by_criterion.remove(&id)?;
            Some(Criterion {
                id,
                name,
                subquestions,
            })
        })
        .collect();

    Ok(rubric)
}

/// Like [`load_rubric`] but fails when the rubric is empty — evaluation
/// cannot proceed without at least one criterion, and silently producing
/// zero scores would be worse than refusing.
pub async fn load_rubric_required(pool: &PgPool) -> Result<Vec<Criterion>, AppError> {
    let rubric = load_rubric(pool).await?;
    if rubric.is_empty() {
        return Err(AppError::Configuration(
            "No published criteria with subquestions — cannot evaluate submissions".to_string(),
        ));
    }
    Ok(rubric)
}

/// Builds the structured-output schema the judge reply must conform to:
/// an object keyed by criterion id, each holding a `subquestions` object keyed
/// by subquestion id, each leaf requiring a numeric `score` and string
/// `feedback`. Every level forbids additional properties and requires every
/// key, so a conforming reply covers the full rubric by construction.
pub fn build_response_schema(rubric: &[Criterion]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "criteria": criteria_schema(rubric)
        },
        "required": ["criteria"],
        "additionalProperties": false
    })
}

/// Image-pair variant: same per-criterion contract plus an optional top-level
/// `similarity` percentage (0–100) the judge may emit.
pub fn build_image_response_schema(rubric: &[Criterion]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "criteria": criteria_schema(rubric),
            "similarity": { "type": "number" }
        },
        "required": ["criteria"],
        "additionalProperties": false
    })
}

fn criteria_schema(rubric: &[Criterion]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for criterion in rubric {
        properties.insert(
            criterion.id.to_string(),
            json!({
                "type": "object",
                "properties": {
                    "subquestions": subquestions_schema(&criterion.subquestions)
                },
                "required": ["subquestions"],
                "additionalProperties": false
            }),
        );
        required.push(criterion.id.to_string());
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn subquestions_schema(subquestions: &[Subquestion]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for subquestion in subquestions {
        properties.insert(
            subquestion.id.to_string(),
            json!({
                "type": "object",
                "properties": {
                    "score": { "type": "number" },
                    "feedback": { "type": "string" }
                },
                "required": ["score", "feedback"],
                "additionalProperties": false
            }),
        );
        required.push(subquestion.id.to_string());
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rubric() -> Vec<Criterion> {
        vec![Criterion {
            id: Uuid::new_v4(),
            name: "Clarity".to_string(),
            subquestions: vec![
                Subquestion {
                    id: Uuid::new_v4(),
                    question: "Is the intent unambiguous?".to_string(),
                },
                Subquestion {
                    id: Uuid::new_v4(),
                    question: "Is the output format specified?".to_string(),
                },
            ],
        }]
    }

    #[test]
    fn test_schema_keys_every_criterion_and_subquestion() {
        let rubric = sample_rubric();
        let schema = build_response_schema(&rubric);

        let criteria = &schema["properties"]["criteria"];
        let criterion_key = rubric[0].id.to_string();
        assert_eq!(criteria["required"], json!([criterion_key]));

        let subquestions = &criteria["properties"][&criterion_key]["properties"]["subquestions"];
        let required = subquestions["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
        for subquestion in &rubric[0].subquestions {
            assert!(required.contains(&json!(subquestion.id.to_string())));
        }
    }

    #[test]
    fn test_schema_forbids_additional_properties_at_every_level() {
        let rubric = sample_rubric();
        let schema = build_response_schema(&rubric);
        let criterion_key = rubric[0].id.to_string();
        let subquestion_key = rubric[0].subquestions[0].id.to_string();

        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(
            schema["properties"]["criteria"]["additionalProperties"],
            json!(false)
        );
        let leaf = &schema["properties"]["criteria"]["properties"][&criterion_key]["properties"]
            ["subquestions"]["properties"][&subquestion_key];
        assert_eq!(leaf["additionalProperties"], json!(false));
        assert_eq!(leaf["required"], json!(["score", "feedback"]));
    }

    #[test]
    fn test_image_schema_keeps_similarity_optional() {
        let rubric = sample_rubric();
        let schema = build_image_response_schema(&rubric);

        assert!(schema["properties"]["similarity"].is_object());
        assert_eq!(schema["required"], json!(["criteria"]));
    }

    #[test]
    fn test_empty_rubric_yields_empty_criteria_schema() {
        let schema = build_response_schema(&[]);
        assert_eq!(schema["properties"]["criteria"]["required"], json!([]));
    }
}
