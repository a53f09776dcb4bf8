//! Helpers for OpenAI-compatible requests and responses

use super::LlmError;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionResponse,
};

/// Build the system + user message pair
///
/// # Errors
///
/// Returns `LlmError::Unknown` if message building fails.
pub fn build_messages(
    system_prompt: &str,
    user_text: &str,
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    Ok(vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_text)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into(),
    ])
}

/// Extract the trimmed text of the first choice
///
/// # Errors
///
/// Returns `LlmError::EmptyResponse` if there is no non-blank content.
pub fn extract_text(response: &CreateChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(LlmError::EmptyResponse)
}

/// Error codes OpenAI-compatible APIs send with HTTP 429
const RATE_LIMIT_CODES: [&str; 2] = ["rate_limit_exceeded", "insufficient_quota"];

/// Map a client error onto [`LlmError`].
///
/// The client surfaces HTTP 429 as an API error; it is recognized by its
/// error code, falling back to the message for providers that send none.
pub fn classify_openai_error(error: &OpenAIError) -> LlmError {
    match error {
        OpenAIError::Reqwest(e) => LlmError::NetworkError(e.to_string()),
        OpenAIError::ApiError(api) => {
            let limited_code = api
                .code
                .as_deref()
                .is_some_and(|code| RATE_LIMIT_CODES.contains(&code));
            if limited_code || api.message.to_lowercase().contains("rate limit") {
                LlmError::RateLimit {
                    wait_secs: None,
                    message: api.message.clone(),
                }
            } else {
                LlmError::ApiError(api.message.clone())
            }
        }
        other => LlmError::Unknown(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(body: serde_json::Value) -> OpenAIError {
        OpenAIError::ApiError(serde_json::from_value::<ApiError>(body).expect("api error"))
    }

    #[test]
    fn test_429_code_is_a_rate_limit() {
        let error = api_error(serde_json::json!({
            "message": "Please slow down",
            "type": "requests",
            "param": null,
            "code": "rate_limit_exceeded"
        }));
        assert!(matches!(
            classify_openai_error(&error),
            LlmError::RateLimit { .. }
        ));
    }

    #[test]
    fn test_rate_limit_message_without_code() {
        let error = api_error(serde_json::json!({
            "message": "Rate limit reached for requests",
            "type": null,
            "param": null,
            "code": null
        }));
        assert!(matches!(
            classify_openai_error(&error),
            LlmError::RateLimit { .. }
        ));
    }

    #[test]
    fn test_other_api_errors_pass_through() {
        let error = api_error(serde_json::json!({
            "message": "Invalid model",
            "type": "invalid_request_error",
            "param": "model",
            "code": "model_not_found"
        }));
        assert!(matches!(
            classify_openai_error(&error),
            LlmError::ApiError(message) if message == "Invalid model"
        ));
    }
}
