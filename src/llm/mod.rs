pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    OpenAI,
    Ollama,
    Groq,
    Gemini,
}

impl LlmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmType::OpenAI => "openai",
            LlmType::Ollama => "ollama",
            LlmType::Groq => "groq",
            LlmType::Gemini => "gemini",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseLlmTypeError {
    message: String,
}

impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmType::OpenAI),
            "ollama" => Ok(LlmType::Ollama),
            "groq" => Ok(LlmType::Groq),
            "gemini" | "google" => Ok(LlmType::Gemini),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request to LLM provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM provider error: {0}")]
    Provider(String),
    #[error("LLM provider returned an empty response")]
    EmptyResponse,
    #[error("Invalid LLM configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::OpenAI,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

impl LlmConfig {
    pub(crate) fn require_api_key(&self) -> Result<String, LlmError> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::Config(format!("{} API key is required", self.llm_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmType>(), Ok(LlmType::OpenAI));
        assert_eq!(" ollama ".parse::<LlmType>(), Ok(LlmType::Ollama));
        assert_eq!("GROQ".parse::<LlmType>(), Ok(LlmType::Groq));
        assert_eq!("google".parse::<LlmType>(), Ok(LlmType::Gemini));
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = "gemma".parse::<LlmType>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid LLM type: 'gemma'");
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for llm_type in [LlmType::OpenAI, LlmType::Ollama, LlmType::Groq, LlmType::Gemini] {
            assert_eq!(llm_type.to_string().parse::<LlmType>(), Ok(llm_type));
        }
    }

    #[test]
    fn blank_api_key_is_missing() {
        let config = LlmConfig { api_key: Some("  ".into()), ..Default::default() };
        assert!(matches!(config.require_api_key(), Err(LlmError::Config(_))));
    }
}
