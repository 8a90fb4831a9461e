use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionRequest, CompletionResponse };
use crate::llm::{ LlmConfig, LlmError, LlmType };

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize)]
pub(super) struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
pub(super) struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

impl OpenAIChatRequest {
    pub(super) fn new(model: &str, request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        Self {
            model: model.to_string(),
            messages,
            temperature: 0.7,
            max_tokens: Some(2048),
        }
    }
}

/// Builds an HTTP client that sends the bearer key on every request.
pub(super) fn bearer_client(api_key: &str) -> Result<HttpClient, LlmError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
            LlmError::Config(format!("Invalid API key format: {}", e))
        )?
    );

    Ok(HttpClient::builder().default_headers(headers).build()?)
}

/// Posts a chat-completions request and returns the first choice's text.
pub(super) async fn chat_completion(
    http: &HttpClient,
    url: &str,
    req: &OpenAIChatRequest
) -> Result<String, LlmError> {
    let resp = http
        .post(url)
        .json(req)
        .send().await?
        .error_for_status()?
        .json::<OpenAIResponse>().await?;

    let content = resp.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| LlmError::Provider("No choices in chat completion response".into()))?;

    if content.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(content)
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| "gpt-3.5-turbo".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.openai.com".to_string());

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
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let req = OpenAIChatRequest::new(&self.model, request);

        info!("Sending request to openai LLM (model={})", self.model);
        let response = chat_completion(&self.http, &url, &req).await?;
        Ok(CompletionResponse { response })
    }

    fn provider(&self) -> LlmType {
        LlmType::OpenAI
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_becomes_leading_message() {
        let request = CompletionRequest::new("User query: hi").with_system(Some("persona".into()));
        let body = serde_json::to_value(OpenAIChatRequest::new("gpt-4o", &request)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "persona");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "User query: hi");
    }

    #[test]
    fn no_system_message_without_role() {
        let body = serde_json::to_value(
            OpenAIChatRequest::new("gpt-4o", &CompletionRequest::new("q"))
        ).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }
}
