/// Judge Adapter — the single point of entry for all calls to the external
/// LLM judge in Prompt Pal.
///
/// ARCHITECTURAL RULE: No other module may call the OpenAI API directly.
/// All judge interactions MUST go through this module.
///
/// Replies are constrained with a structured-output JSON schema built from the
/// current rubric (see `rubric::build_response_schema`), so parsing is a plain
/// `serde_json::from_str` with no fuzzy extraction.
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod handlers;
pub mod prompts;

use crate::models::task::TaskRow;
use crate::rubric::Criterion;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
/// Model used for text-prompt judging. Intentionally hardcoded to prevent
/// accidental drift between environments.
pub const TEXT_MODEL: &str = "gpt-4o-mini-2024-07-18";
/// Cheapest vision-capable model, used for image-pair judging.
pub const VISION_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 2000;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Judge returned empty content")]
    EmptyContent,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'static str,
    schema: &'a Value,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    /// Low detail keeps vision calls cheap; the rubric does not need pixels.
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// The single judge client used by the submission pipeline and the image
/// evaluation endpoint. Wraps the OpenAI Chat Completions API with retry
/// logic and the structured-output response format.
#[derive(Clone)]
pub struct JudgeClient {
    client: Client,
    api_key: String,
}

impl JudgeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Scores a submitted solution prompt against the rubric.
    ///
    /// The system guidelines embed the task, the ideal prompt and the rubric
    /// keyed by id (ids survive renaming; display order does not). Garbage
    /// handling is a judge-side instruction: irrelevant or near-empty
    /// submissions score 1, near-verbatim task restatements score 1-2.
    pub async fn evaluate_text(
        &self,
        task: &TaskRow,
        rubric: &[Criterion],
        schema: &Value,
        solution_prompt: &str,
    ) -> Result<Value, JudgeError> {
        let rubric_json = serde_json::to_string(&serde_json::json!({ "criteria": rubric }))?;
        let messages = vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(prompts::text_guidelines(task, &rubric_json)),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Text(format!("My solution:\n{solution_prompt}")),
            },
        ];

        self.call(TEXT_MODEL, &messages, "prompt_results", schema)
            .await
    }

    /// Scores a generated image against a reference image using the same
    /// rubric contract, with two low-detail image attachments. The reply may
    /// additionally carry an overall `similarity` percentage.
    pub async fn evaluate_image_pair(
        &self,
        task: &TaskRow,
        rubric: &[Criterion],
        schema: &Value,
        user_image_url: &str,
        reference_image_url: &str,
    ) -> Result<Value, JudgeError> {
        let rubric_json = serde_json::to_string(&serde_json::json!({ "criteria": rubric }))?;
        let messages = vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(prompts::image_guidelines(task, &rubric_json)),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: prompts::IMAGE_USER_MESSAGE.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: user_image_url.to_string(),
                            detail: "low",
                        },
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: reference_image_url.to_string(),
                            detail: "low",
                        },
                    },
                ]),
            },
        ];

        self.call(VISION_MODEL, &messages, "image_evaluation_results", schema)
            .await
    }

    /// Makes the API call and parses the structured reply.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn call(
        &self,
        model: &str,
        messages: &[ChatMessage],
        schema_name: &'static str,
        schema: &Value,
    ) -> Result<Value, JudgeError> {
        let request_body = ChatRequest {
            model,
            messages,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: schema_name,
                    schema,
                },
            },
        };

        let mut last_error: Option<JudgeError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Judge call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(OPENAI_API_URL)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(JudgeError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Judge API returned {}: {}", status, body);
                last_error = Some(JudgeError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<OpenAiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(JudgeError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let chat_response: ChatResponse = response.json().await?;

            if let Some(usage) = &chat_response.usage {
                debug!(
                    "Judge call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            let content = chat_response
                .choices
                .first()
                .and_then(|c| c.message.content.as_deref())
                .ok_or(JudgeError::EmptyContent)?;

            return serde_json::from_str(strip_json_fences(content)).map_err(JudgeError::Parse);
        }

        Err(last_error.unwrap_or(JudgeError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from judge output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"criteria\": {}}\n```";
        assert_eq!(strip_json_fences(input), "{\"criteria\": {}}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"criteria\": {}}\n```";
        assert_eq!(strip_json_fences(input), "{\"criteria\": {}}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"criteria\": {}}";
        assert_eq!(strip_json_fences(input), "{\"criteria\": {}}");
    }

    #[test]
    fn test_image_url_part_serializes_with_type_tag() {
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "https://example.com/a.png".to_string(),
                detail: "low",
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "image_url");
        assert_eq!(value["image_url"]["detail"], "low");
    }
}
