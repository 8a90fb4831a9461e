pub mod ollama;
pub mod openai;
pub mod gemini;
pub mod groq;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use self::gemini::GeminiChatClient;
use self::groq::GroqChatClient;

/// One generation call: an optional system instruction plus the user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { system: None, prompt: prompt.into() }
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    /// System instruction and prompt joined into a single user turn, for
    /// backends without a separate system slot.
    pub fn flattened(&self) -> String {
        match &self.system {
            Some(system) => format!("{}\n\n{}", system, self.prompt),
            None => self.prompt.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn provider(&self) -> LlmType;

    fn model(&self) -> String;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_prepends_system_instruction() {
        let request = CompletionRequest::new("User query: hi").with_system(
            Some("You are a Executive. Answer from this perspective.".into())
        );
        assert_eq!(
            request.flattened(),
            "You are a Executive. Answer from this perspective.\n\nUser query: hi"
        );
        assert_eq!(CompletionRequest::new("plain").flattened(), "plain");
    }

    #[test]
    fn factory_selects_requested_provider() {
        let config = LlmConfig {
            llm_type: LlmType::Ollama,
            completion_model: Some("llama3".into()),
            ..Default::default()
        };
        let client = new_client(&config).unwrap();
        assert_eq!(client.provider(), LlmType::Ollama);
        assert_eq!(client.model(), "llama3");
    }

    #[test]
    fn factory_rejects_missing_key() {
        let config = LlmConfig { llm_type: LlmType::OpenAI, ..Default::default() };
        assert!(matches!(new_client(&config), Err(LlmError::Config(_))));
    }
}
