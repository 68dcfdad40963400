// Judge guideline templates. Placeholders are replaced by the builder
// functions below before sending; the rubric is always serialized by id so
// criterion renames never invalidate stored replies.

use crate::models::task::TaskRow;

const TEXT_GUIDELINES_TEMPLATE: &str = r#"You are given a task for a user to write a prompt. Analyze the user's submitted solution prompt and score it against the given ideal prompt and criteria. The ideal prompt is only a reference; base your scores primarily on the criteria. Provide a score (from 1 to 5) and feedback (up to 200 characters) for each criterion subquestion; a JSON schema for the output is provided. Do not hesitate to give low scores when deserved. If the prompt is irrelevant, e.g. empty or just a set of random words or letters, rate it with score 1. If the prompt is effectively just a reworded copy of the task, rate it with score 1 or 2.

Task for the user to write a prompt:
[{task_name}] {task_question}

Ideal prompt:
{ideal_prompt}

Criteria (as JSON, keyed by "id" values):
{rubric_json}"#;

const IMAGE_GUIDELINES_TEMPLATE: &str = r#"You are an expert image evaluator. Compare two images: the user's generated image (first) and the expected target image (second). Score how well the user's image matches the expected result using the given criteria, considering visual similarity and composition, color scheme and style, subject matter accuracy, and overall adherence to the task.

Task the user was trying to accomplish:
[{task_name}] {task_question}

Provide a score (from 1 to 5) and feedback (up to 200 characters) for each criterion subquestion. Be objective and thorough.

You may additionally report an overall "similarity" percentage using these bands:
- 90-100: nearly identical
- 70-89: very similar
- 50-69: moderately similar
- 30-49: some similarity
- 0-29: very different

Criteria (as JSON, keyed by "id" values):
{rubric_json}"#;

/// User-turn message accompanying the two image attachments.
pub const IMAGE_USER_MESSAGE: &str = "Evaluate how well the first image (the user's result) matches the second image (the expected result) based on the criteria provided.";

pub fn text_guidelines(task: &TaskRow, rubric_json: &str) -> String {
    TEXT_GUIDELINES_TEMPLATE
        .replace("{task_name}", &task.name)
        .replace("{task_question}", &task.question)
        .replace("{ideal_prompt}", &task.ideal_prompt)
        .replace("{rubric_json}", rubric_json)
}

pub fn image_guidelines(task: &TaskRow, rubric_json: &str) -> String {
    IMAGE_GUIDELINES_TEMPLATE
        .replace("{task_name}", &task.name)
        .replace("{task_question}", &task.question)
        .replace("{rubric_json}", rubric_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_task() -> TaskRow {
        TaskRow {
            id: Uuid::new_v4(),
            name: "Summarize".to_string(),
            question: "Write a prompt that summarizes an article.".to_string(),
            ideal_prompt: "Summarize the following article in three bullets.".to_string(),
            image_url: None,
            active_day: None,
            published_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_text_guidelines_fill_all_placeholders() {
        let guidelines = text_guidelines(&sample_task(), r#"{"criteria":[]}"#);
        assert!(guidelines.contains("[Summarize]"));
        assert!(guidelines.contains("three bullets"));
        assert!(guidelines.contains(r#"{"criteria":[]}"#));
        assert!(!guidelines.contains('{') || !guidelines.contains("{task_name}"));
    }

    #[test]
    fn test_image_guidelines_carry_similarity_bands() {
        let guidelines = image_guidelines(&sample_task(), "{}");
        assert!(guidelines.contains("90-100"));
        assert!(guidelines.contains("very different"));
        assert!(!guidelines.contains("{task_question}"));
    }
}
