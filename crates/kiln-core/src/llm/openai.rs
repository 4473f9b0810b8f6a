use crate::core_types::{LLMResponse, Message, Role, Usage};
use crate::errors::PipelineError;
use crate::llm::LLM;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: "https://api.openai.com/v1".to_string(),
            model,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request_body(&self, messages: &[Message]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.format_messages(messages),
        });

        if let Some(temperature) = self.temperature {
            body["temperature"] = temperature.into();
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                json!({
                    "role": self.format_role(&msg.role),
                    "content": msg.content
                })
            })
            .collect()
    }

    fn format_role(&self, role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn parse_response(&self, response: Value) -> Result<LLMResponse, PipelineError> {
        let choices = response["choices"]
            .as_array()
            .ok_or_else(|| PipelineError::ParsingError("No choices in response".to_string()))?;

        if choices.is_empty() {
            return Err(PipelineError::ParsingError("Empty choices array".to_string()));
        }

        let choice = &choices[0];
        let message = &choice["message"];

        let content = message["content"]
            .as_str()
            .ok_or_else(|| PipelineError::ParsingError("Response has no content".to_string()))?
            .to_string();

        let finish_reason = choice["finish_reason"].as_str().map(|s| s.to_string());
        let usage: Option<Usage> = serde_json::from_value(response["usage"].clone()).ok();

        Ok(LLMResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(&self, messages: Vec<Message>) -> Result<LLMResponse, PipelineError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request_body(&messages);

        log::debug!("Chat completion request to {} with model {}", url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::LLMError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| PipelineError::LLMError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(PipelineError::LLMError(format!(
                "API request failed with status {}: {}",
                status, response_text
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| PipelineError::ParsingError(format!("Invalid JSON response: {}", e)))?;

        self.parse_response(response_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAIClient::new("test-key".to_string(), "qwen/qwen-2.5-72b-instruct:free".to_string())
            .with_api_base("https://openrouter.ai/api/v1/".to_string())
            .with_temperature(0.0)
            .with_max_tokens(1024);

        assert_eq!(client.api_base, "https://openrouter.ai/api/v1");
        assert_eq!(client.temperature, Some(0.0));
        assert_eq!(client.max_tokens, Some(1024));
    }

    #[test]
    fn test_message_formatting() {
        let client = OpenAIClient::new("test-key".to_string(), "m".to_string());
        let messages = vec![
            Message::system("You are a helpful assistant."),
            Message::user("Hello!"),
        ];

        let formatted = client.format_messages(&messages);
        assert_eq!(formatted.len(), 2);
        assert_eq!(formatted[0]["role"], "system");
        assert_eq!(formatted[0]["content"], "You are a helpful assistant.");
        assert_eq!(formatted[1]["role"], "user");
        assert_eq!(formatted[1]["content"], "Hello!");
    }

    #[test]
    fn test_request_body_includes_parameters() {
        let client = OpenAIClient::new("k".to_string(), "m".to_string())
            .with_temperature(0.0)
            .with_max_tokens(512);
        let body = client.build_request_body(&[Message::user("hi")]);

        assert_eq!(body["model"], "m");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_parse_response_extracts_content() {
        let client = OpenAIClient::new("k".to_string(), "m".to_string());
        let response = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "```python\nprint(1)\n```"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
        });

        let parsed = client.parse_response(response).unwrap();
        assert_eq!(parsed.content, "```python\nprint(1)\n```");
        assert_eq!(parsed.finish_reason.as_deref(), Some("stop"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 18);
    }

    #[test]
    fn test_parse_response_without_content_is_an_error() {
        let client = OpenAIClient::new("k".to_string(), "m".to_string());
        let response = json!({"choices": [{"message": {"role": "assistant"}}]});
        assert!(client.parse_response(response).is_err());
    }

    #[test]
    fn test_parse_response_without_choices_is_an_error() {
        let client = OpenAIClient::new("k".to_string(), "m".to_string());
        assert!(client.parse_response(json!({})).is_err());
        assert!(client.parse_response(json!({"choices": []})).is_err());
    }
}
