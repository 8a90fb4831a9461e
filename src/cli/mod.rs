use clap::Parser;
use crate::agent::FailurePolicy;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History chat store type (memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// Number of preceding messages included as context in each prompt.
    #[arg(long, env = "CONTEXT_WINDOW", default_value = "10")]
    pub context_window: usize,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama, groq, gemini)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (e.g., OpenAI, Groq, Gemini)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-3.5-turbo, llama3, gemini-1.5-flash-latest)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// How a failed generation is surfaced: `propagate` returns an error to the
    /// caller, `apologize` stores and returns a fixed apology instead.
    #[arg(long, env = "LLM_FAILURE_POLICY", default_value = "propagate")]
    pub llm_failure_policy: FailurePolicy,

    // --- Role Args ---
    /// Comma-separated personas a request may answer as.
    #[arg(long, env = "ROLES", value_delimiter = ',', default_value = "Executive,DataAnalyst")]
    pub roles: Vec<String>,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,

    /// Allowed CORS origin for browser clients. `*` allows any origin.
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Secret values rendered for startup logs.
    pub fn masked(value: &str) -> &'static str {
        if value.trim().is_empty() { "not set" } else { "***" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_settings() {
        let args = Args::try_parse_from(["dynamic-reporting"]).unwrap();
        assert_eq!(args.history_type, "memory");
        assert_eq!(args.context_window, 10);
        assert_eq!(args.roles, vec!["Executive".to_string(), "DataAnalyst".to_string()]);
        assert_eq!(args.llm_failure_policy, FailurePolicy::Propagate);
        assert!(!args.enable_tls);
    }

    #[test]
    fn roles_and_policy_parse_from_flags() {
        let args = Args::try_parse_from([
            "dynamic-reporting",
            "--roles",
            "CFO,Analyst",
            "--llm-failure-policy",
            "apologize",
        ]).unwrap();
        assert_eq!(args.roles, vec!["CFO".to_string(), "Analyst".to_string()]);
        assert_eq!(args.llm_failure_policy, FailurePolicy::Apologize);
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(Args::masked(""), "not set");
        assert_eq!(Args::masked("sk-123"), "***");
    }
}
