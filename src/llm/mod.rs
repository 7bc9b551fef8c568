mod openai;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::Question;

pub use openai::OpenAiQuestionSource;

/// Result type for question generation
pub type QuestionResult<T> = Result<T, QuestionError>;

/// Errors that can occur while generating a question.
///
/// None of these ever reach players: any failure is recovered internally by
/// substituting the built-in fallback question.
#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Trait for the external question-generation service
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Generate one trivia question, best-effort avoiding the given
    /// recently used question texts.
    async fn next_question(&self, recent: &[String]) -> QuestionResult<Question>;

    /// Get the name of this source
    fn name(&self) -> &str;
}

/// Deterministic substitute used whenever generation fails or no source is
/// configured. The round must never stall on the question service.
pub fn fallback_question() -> Question {
    Question {
        question: "How many bones does an adult human body have?".to_string(),
        answer: "206".to_string(),
        hint: "Newborns have around 270; some fuse as we grow.".to_string(),
    }
}

/// Configuration for the question source
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// OpenAI model to use
    pub openai_model: String,
    /// Timeout for generation requests
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok().and_then(|key| {
            let trimmed = key.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

        let openai_model = std::env::var("OPENAI_MODEL")
            .ok()
            .and_then(|model| {
                let trimmed = model.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        Self {
            openai_api_key,
            openai_model,
            request_timeout: std::env::var("LLM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),
        }
    }

    /// Build a question source from this configuration
    pub fn build_source(&self) -> QuestionResult<Box<dyn QuestionSource>> {
        let api_key = self.openai_api_key.as_ref().ok_or_else(|| {
            QuestionError::ConfigError(
                "No question source configured. Set OPENAI_API_KEY".to_string(),
            )
        })?;

        Ok(Box::new(OpenAiQuestionSource::new(
            api_key.clone(),
            self.openai_model.clone(),
            self.request_timeout,
        )))
    }
}

/// Strip markdown code fences the model sometimes wraps around its JSON
pub(crate) fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse a generation response into a question triple. A malformed response
/// is treated identically to a failed request.
pub(crate) fn parse_question_json(text: &str) -> QuestionResult<Question> {
    let clean = strip_code_fences(text);
    let question: Question = serde_json::from_str(&clean)
        .map_err(|e| QuestionError::ParseError(format!("Invalid question JSON: {}", e)))?;

    if question.question.trim().is_empty() || question.answer.trim().is_empty() {
        return Err(QuestionError::ParseError(
            "Question or answer text is empty".to_string(),
        ));
    }
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("OPENAI_API_KEY", "  sk-test  ");
        std::env::set_var("OPENAI_MODEL", "gpt-4o");
        std::env::set_var("LLM_TIMEOUT", "5");

        let config = LlmConfig::from_env();
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.request_timeout, Duration::from_secs(5));

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_MODEL");
        std::env::remove_var("LLM_TIMEOUT");
    }

    #[test]
    #[serial]
    fn test_build_source_requires_api_key() {
        std::env::remove_var("OPENAI_API_KEY");
        let config = LlmConfig::from_env();
        assert!(matches!(
            config.build_source(),
            Err(QuestionError::ConfigError(_))
        ));
    }

    #[test]
    fn test_parse_question_json() {
        let q = parse_question_json(
            r#"```json
{"question": "In what year was IKEA founded?", "answer": "1943", "hint": "By a 17-year-old."}
```"#,
        )
        .unwrap();
        assert_eq!(q.answer, "1943");

        assert!(parse_question_json("not json at all").is_err());
        assert!(
            parse_question_json(r#"{"question": "", "answer": "1943", "hint": ""}"#).is_err()
        );
    }
}
