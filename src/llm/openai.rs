use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

/// OpenAI-backed question source
pub struct OpenAiQuestionSource {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiQuestionSource {
    /// Create a new source with the given API key and model
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);

        Self {
            client,
            model,
            timeout,
        }
    }

    fn build_prompt(recent: &[String]) -> String {
        let avoid = if recent.is_empty() {
            String::new()
        } else {
            format!(
                "Do NOT repeat any of these already used questions: {}. ",
                recent.join("; ")
            )
        };

        format!(
            "{avoid}Generate ONE trivia question for a party game among adult friends.

REQUIREMENTS:
- Pick a random topic among: history, science, geography, sports, cinema, music, food, \
technology, nature, world records, company trivia, biology, astronomy
- MEDIUM difficulty: not trivial, but not specialist knowledge either
- The answer should surprise people who don't know it

CRITICAL RULE: the answer must be ONLY a bare number or a very short name. NEVER include \
units of measurement or words like \"years\", \"liters\", \"km/h\" in the answer. Players \
don't know these rules and write simple answers like \"4\" or \"160\" - if the correct \
answer were \"4 years\" it would stand out immediately among the others. Always phrase the \
question so the unit is already in the question text itself.

GOOD EXAMPLES:
\"In what year was IKEA founded?\" -> \"1943\"
\"How many km/h does a sneeze reach on average?\" -> \"160\"
\"How many years did Da Vinci spend painting the Mona Lisa?\" -> \"4\"
\"In what year was Nutella invented?\" -> \"1964\"

Reply ONLY with valid JSON, no text outside it: \
{{\"question\": \"...\", \"answer\": \"...\", \"hint\": \"a short, curious sentence explaining the answer\"}}"
        )
    }
}

#[async_trait]
impl QuestionSource for OpenAiQuestionSource {
    async fn next_question(&self, recent: &[String]) -> QuestionResult<Question> {
        let user_message = ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(Self::build_prompt(recent)),
            name: None,
        };

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(300u32)
            .messages([user_message.into()])
            .build()
            .map_err(|e| QuestionError::ApiError(e.to_string()))?;

        let response =
            tokio::time::timeout(self.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| QuestionError::Timeout(self.timeout))?
                .map_err(|e| QuestionError::ApiError(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| QuestionError::ParseError("No content in response".to_string()))?;

        parse_question_json(&text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_recent_questions() {
        let prompt = OpenAiQuestionSource::build_prompt(&[
            "In what year was IKEA founded?".to_string(),
            "How many bones does an adult human body have?".to_string(),
        ]);
        assert!(prompt.contains("already used questions"));
        assert!(prompt.contains("IKEA"));

        let prompt = OpenAiQuestionSource::build_prompt(&[]);
        assert!(!prompt.contains("already used questions"));
    }

    #[tokio::test]
    #[ignore] // Only run with an actual API key
    async fn test_openai_generate() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let source = OpenAiQuestionSource::new(
            api_key,
            "gpt-4o-mini".to_string(),
            Duration::from_secs(30),
        );

        let question = source.next_question(&[]).await.unwrap();
        assert!(!question.question.is_empty());
        assert!(!question.answer.is_empty());
        println!("Generated question: {:?}", question);
    }
}
