use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;

use super::openai::{ bearer_client, chat_completion, OpenAIChatRequest };
use super::{ ChatClient, CompletionRequest, CompletionResponse };
use crate::llm::{ LlmConfig, LlmError, LlmType };

/// Groq speaks the OpenAI chat-completions dialect under `/openai/v1`.
pub struct GroqChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

impl GroqChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| "llama-3.1-8b-instant".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.groq.com".to_string());

        Ok(Self {
            http: bearer_client(&api_key)?,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.require_api_key()?;
        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/openai/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let req = OpenAIChatRequest::new(&self.model, request);

        info!("Sending request to groq LLM (model={})", self.model);
        let response = chat_completion(&self.http, &url, &req).await?;
        Ok(CompletionResponse { response })
    }

    fn provider(&self) -> LlmType {
        LlmType::Groq
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
