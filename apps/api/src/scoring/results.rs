//! Score Normalizer: pure, deterministic conversion of raw judge replies into
//! clamped, averaged result structures. No I/O happens here.
//!
//! Scoring rules:
//! - every subquestion score is clamped to [1, 5]; a missing or null score
//!   defaults to the minimum (1), never rejected
//! - a criterion score is the unweighted mean of its subquestion scores, a
//!   task score the unweighted mean of its criterion scores
//! - empty sets divide by max(1, n) and yield 0 rather than NaN
//! - the user aggregate is null whenever any in-scope task is unattempted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 5.0;

/// Structural failures of a judge reply. A reply that fails here is rejected,
/// not coerced; the only tolerated gap is a missing subquestion score.
#[derive(Debug, Error, PartialEq)]
pub enum ReplyError {
    #[error("judge reply has no `criteria` object")]
    MissingCriteria,

    #[error("criterion `{0}` has no `subquestions` object")]
    MalformedCriterion(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubquestionResult {
    pub subquestion_id: String,
    pub score: f64,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionResult {
    pub criterion_id: String,
    pub score: f64,
    pub subquestion_results: Vec<SubquestionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub submission_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub score: f64,
    pub criterion_results: Vec<CriterionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResult {
    /// `None` until every in-scope task has a completed result.
    pub score: Option<f64>,
    pub task_results: Vec<TaskResult>,
}

pub fn subquestion_result(subquestion_id: &str, entry: &Value) -> SubquestionResult {
    let score = entry
        .get("score")
        .and_then(Value::as_f64)
        .map(|s| s.clamp(MIN_SCORE, MAX_SCORE))
        .unwrap_or(MIN_SCORE);
    let feedback = entry
        .get("feedback")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    SubquestionResult {
        subquestion_id: subquestion_id.to_string(),
        score,
        feedback,
    }
}

pub fn criterion_result(criterion_id: &str, entry: &Value) -> Result<CriterionResult, ReplyError> {
    let subquestions = entry
        .get("subquestions")
        .and_then(Value::as_object)
        .ok_or_else(|| ReplyError::MalformedCriterion(criterion_id.to_string()))?;

    let subquestion_results: Vec<SubquestionResult> = subquestions
        .iter()
        .map(|(id, sub_entry)| subquestion_result(id, sub_entry))
        .collect();

    let score = mean(subquestion_results.iter().map(|r| r.score));

    Ok(CriterionResult {
        criterion_id: criterion_id.to_string(),
        score,
        subquestion_results,
    })
}

pub fn task_result(
    task_id: Uuid,
    submission_id: Uuid,
    submitted_at: DateTime<Utc>,
    reply: &Value,
) -> Result<TaskResult, ReplyError> {
    let criteria = reply
        .get("criteria")
        .and_then(Value::as_object)
        .ok_or(ReplyError::MissingCriteria)?;

    let criterion_results: Vec<CriterionResult> = criteria
        .iter()
        .map(|(id, entry)| criterion_result(id, entry))
        .collect::<Result<_, _>>()?;

    let score = mean(criterion_results.iter().map(|r| r.score));

    Ok(TaskResult {
        task_id,
        submission_id,
        submitted_at,
        score,
        criterion_results,
    })
}

/// Aggregates per-task results over the user's in-scope task set.
/// Any unattempted in-scope task makes the aggregate score null; otherwise it
/// is the mean of the present task scores.
pub fn user_result(
    in_scope_tasks: &[Uuid],
    results_by_task: &HashMap<Uuid, TaskResult>,
) -> UserResult {
    let mut task_results = Vec::new();
    let mut sum = Some(0.0);

    for task_id in in_scope_tasks {
        match results_by_task.get(task_id) {
            None => sum = None,
            Some(result) => {
                if let Some(s) = sum.as_mut() {
                    *s += result.score;
                }
                task_results.push(result.clone());
            }
        }
    }

    let score = sum.map(|s| s / in_scope_tasks.len().max(1) as f64);

    UserResult {
        score,
        task_results,
    }
}

/// Percentage form of a task score:
/// round(100 * sum of criterion scores / (criterion count * 5)).
pub fn percentage_score(criterion_results: &[CriterionResult]) -> i32 {
    let total: f64 = criterion_results.iter().map(|c| c.score).sum();
    let max_possible = (criterion_results.len().max(1) * 5) as f64;
    ((total / max_possible) * 100.0).round() as i32
}

/// Per-criterion scores of a raw reply, for population averaging.
pub fn criterion_scores(reply: &Value) -> Result<Vec<(String, f64)>, ReplyError> {
    let criteria = reply
        .get("criteria")
        .and_then(Value::as_object)
        .ok_or(ReplyError::MissingCriteria)?;

    criteria
        .iter()
        .map(|(id, entry)| criterion_result(id, entry).map(|c| (c.criterion_id, c.score)))
        .collect()
}

fn mean(scores: impl Iterator<Item = f64>) -> f64 {
    let (count, sum) = scores.fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    sum / count.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(criteria: Value) -> Value {
        json!({ "criteria": criteria })
    }

    #[test]
    fn test_subquestion_score_clamped_to_range() {
        let high = subquestion_result("sq", &json!({"score": 7, "feedback": "great"}));
        assert_eq!(high.score, 5.0);

        let low = subquestion_result("sq", &json!({"score": -3, "feedback": "poor"}));
        assert_eq!(low.score, 1.0);

        let in_range = subquestion_result("sq", &json!({"score": 3.5, "feedback": ""}));
        assert_eq!(in_range.score, 3.5);
    }

    #[test]
    fn test_missing_or_null_score_defaults_to_minimum() {
        let missing = subquestion_result("sq", &json!({"feedback": "no score"}));
        assert_eq!(missing.score, 1.0);

        let null = subquestion_result("sq", &json!({"score": null, "feedback": "null score"}));
        assert_eq!(null.score, 1.0);
        assert_eq!(null.feedback, "null score");
    }

    #[test]
    fn test_criterion_score_is_mean_of_subquestions() {
        let result = criterion_result(
            "crit",
            &json!({"subquestions": {
                "a": {"score": 2, "feedback": ""},
                "b": {"score": 4, "feedback": ""}
            }}),
        )
        .unwrap();
        assert_eq!(result.score, 3.0);
        assert_eq!(result.subquestion_results.len(), 2);
    }

    #[test]
    fn test_empty_subquestions_score_zero_not_nan() {
        let result = criterion_result("crit", &json!({"subquestions": {}})).unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_criterion_without_subquestions_object_is_rejected() {
        let err = criterion_result("crit", &json!({"score": 4})).unwrap_err();
        assert_eq!(err, ReplyError::MalformedCriterion("crit".to_string()));
    }

    #[test]
    fn test_task_score_is_mean_of_criteria() {
        let result = task_result(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now(),
            &reply(json!({
                "c1": {"subquestions": {"a": {"score": 5, "feedback": ""}}},
                "c2": {"subquestions": {"a": {"score": 1, "feedback": ""}}}
            })),
        )
        .unwrap();
        assert_eq!(result.score, 3.0);
    }

    #[test]
    fn test_reply_without_criteria_is_rejected() {
        let err = task_result(Uuid::new_v4(), Uuid::new_v4(), Utc::now(), &json!({}))
            .unwrap_err();
        assert_eq!(err, ReplyError::MissingCriteria);
    }

    #[test]
    fn test_empty_criteria_task_scores_zero() {
        let result =
            task_result(Uuid::new_v4(), Uuid::new_v4(), Utc::now(), &reply(json!({}))).unwrap();
        assert_eq!(result.score, 0.0);
        assert!(result.criterion_results.is_empty());
    }

    fn make_task_result(task_id: Uuid, score: f64) -> TaskResult {
        TaskResult {
            task_id,
            submission_id: Uuid::new_v4(),
            submitted_at: Utc::now(),
            score,
            criterion_results: vec![],
        }
    }

    #[test]
    fn test_user_score_null_when_any_task_unattempted() {
        let attempted = Uuid::new_v4();
        let unattempted = Uuid::new_v4();
        let mut results = HashMap::new();
        results.insert(attempted, make_task_result(attempted, 4.0));

        let aggregate = user_result(&[attempted, unattempted], &results);
        assert_eq!(aggregate.score, None);
        assert_eq!(aggregate.task_results.len(), 1);
    }

    #[test]
    fn test_user_score_is_mean_when_all_tasks_attempted() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let mut results = HashMap::new();
        results.insert(t1, make_task_result(t1, 4.0));
        results.insert(t2, make_task_result(t2, 2.0));

        let aggregate = user_result(&[t1, t2], &results);
        assert_eq!(aggregate.score, Some(3.0));
        assert_eq!(aggregate.task_results.len(), 2);
    }

    #[test]
    fn test_user_score_zero_for_empty_task_set() {
        let aggregate = user_result(&[], &HashMap::new());
        assert_eq!(aggregate.score, Some(0.0));
    }

    fn make_criterion_result(score: f64) -> CriterionResult {
        CriterionResult {
            criterion_id: "c".to_string(),
            score,
            subquestion_results: vec![],
        }
    }

    #[test]
    fn test_percentage_score_formula() {
        // 3.0 + 3.0 = 6 points of 10 possible -> 60%
        let results = vec![make_criterion_result(3.0), make_criterion_result(3.0)];
        assert_eq!(percentage_score(&results), 60);

        // 5 + 2.5 = 7.5 of 10 -> 75%
        let results = vec![make_criterion_result(5.0), make_criterion_result(2.5)];
        assert_eq!(percentage_score(&results), 75);
    }

    #[test]
    fn test_percentage_score_empty_is_zero() {
        assert_eq!(percentage_score(&[]), 0);
    }

    #[test]
    fn test_criterion_scores_extracts_means() {
        let scores = criterion_scores(&reply(json!({
            "c1": {"subquestions": {
                "a": {"score": 4, "feedback": ""},
                "b": {"score": 2, "feedback": ""}
            }}
        })))
        .unwrap();
        assert_eq!(scores, vec![("c1".to_string(), 3.0)]);
    }
}
