use async_trait::async_trait;
use log::info;

use super::{ ChatClient, CompletionRequest, CompletionResponse };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use rllm::chat::{ ChatMessage, ChatRole, MessageType };
use rllm::builder::{ LLMBackend, LLMBuilder };
use rllm::LLMProvider;

pub struct GeminiChatClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
    model: String,
    base_url: Option<String>,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| "gemini-1.5-flash-latest".to_string());

        let mut builder = LLMBuilder::new()
            .backend(LLMBackend::Google)
            .api_key(api_key)
            .model(&chat_model)
            .stream(false);

        if let Some(url) = &base_url {
            builder = builder.base_url(url);
        }
        if let Some(tokens) = max_tokens {
            builder = builder.max_tokens(tokens);
        }
        if let Some(temp) = temperature {
            builder = builder.temperature(temp);
        }

        let llm_provider = builder.build().map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            llm: llm_provider,
            model: chat_model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.require_api_key()?;
        Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), None, None)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let messages = vec![ChatMessage {
            role: ChatRole::User,
            content: request.flattened(),
            message_type: MessageType::Text,
        }];
        info!("Sending request to gemini LLM (model={} base_url={:?})", self.model, self.base_url);

        let resp = self.llm.chat(&messages).await.map_err(|e| LlmError::Provider(e.to_string()))?;
        let text = resp
            .text()
            .map(|s| s.to_string())
            .unwrap_or_else(|| resp.to_string());
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(CompletionResponse { response: text })
    }

    fn provider(&self) -> LlmType {
        LlmType::Gemini
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
