use crate::history::{ format_history_for_prompt, HistoryStore, StoreError };
use crate::llm::chat::{ ChatClient, CompletionRequest };
use crate::llm::{ LlmError, LlmType };
use crate::models::api::{ QueryRequest, QueryResponse, ResponseMetadata, ResponseStatus };
use crate::models::chat::{ Conversation, ConversationSummary, MessageRole };
use crate::roles::RoleRegistry;

use log::{ debug, error, info, warn };
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_CONTEXT_WINDOW: usize = 10;
pub const MAX_CONVERSATION_ID_LEN: usize = 128;
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I wasn't able to generate a response right now. Please try again in a moment.";
const LOG_QUERY_PREVIEW: usize = 100;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Error generating response for conversation {conversation_id}: {source}")]
    Generation {
        conversation_id: String,
        #[source]
        source: LlmError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Inconsistent conversation state: {0}")]
    Inconsistent(String),
}

/// What to do when the LLM call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the request; the user message stays recorded.
    Propagate,
    /// Record and return [`FALLBACK_REPLY`] with an error status.
    Apologize,
}

#[derive(Debug, PartialEq, Eq, Error)]
#[error("Invalid failure policy: '{0}' (expected 'propagate' or 'apologize')")]
pub struct ParseFailurePolicyError(String);

impl FromStr for FailurePolicy {
    type Err = ParseFailurePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "propagate" => Ok(FailurePolicy::Propagate),
            "apologize" | "degrade" => Ok(FailurePolicy::Apologize),
            _ => Err(ParseFailurePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Propagate => write!(f, "propagate"),
            FailurePolicy::Apologize => write!(f, "apologize"),
        }
    }
}

#[derive(Clone)]
pub struct QueryAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    roles: RoleRegistry,
    context_window: usize,
    failure_policy: FailurePolicy,
}

fn preview(query: &str) -> String {
    if query.chars().count() > LOG_QUERY_PREVIEW {
        let head: String = query.chars().take(LOG_QUERY_PREVIEW).collect();
        format!("{}...", head)
    } else {
        query.to_string()
    }
}

fn resolve_conversation_id(requested: Option<&str>) -> Result<String, AgentError> {
    let Some(id) = requested else {
        return Ok(Uuid::new_v4().to_string());
    };
    if id.trim().is_empty() {
        return Err(AgentError::InvalidInput("conversation_id must not be blank".into()));
    }
    if id.chars().count() > MAX_CONVERSATION_ID_LEN {
        return Err(
            AgentError::InvalidInput(
                format!("conversation_id exceeds {} characters", MAX_CONVERSATION_ID_LEN)
            )
        );
    }
    if id.chars().any(char::is_control) {
        return Err(
            AgentError::InvalidInput("conversation_id contains control characters".into())
        );
    }
    Ok(id.to_string())
}

pub fn system_instruction(role: &str) -> String {
    format!("You are a {}. Answer from this perspective.", role)
}

pub fn build_prompt(context: &str, query: &str) -> String {
    format!("{}User query: {}\nPlease provide a helpful response.", context, query)
}

impl QueryAgent {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        history_store: Arc<dyn HistoryStore>,
        roles: RoleRegistry
    ) -> Self {
        info!("Query agent initialized with provider: {}", chat_client.provider());
        Self {
            chat_client,
            history_store,
            roles,
            context_window: DEFAULT_CONTEXT_WINDOW,
            failure_policy: FailurePolicy::Propagate,
        }
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn provider(&self) -> LlmType {
        self.chat_client.provider()
    }

    pub fn list_roles(&self) -> Vec<String> {
        self.roles.list_roles().to_vec()
    }

    pub fn is_valid_role(&self, role: &str) -> bool {
        self.roles.is_valid(role)
    }

    pub fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, AgentError> {
        debug!("Retrieving conversation: {}", conversation_id);
        let conversation = self.history_store.get_conversation(conversation_id).map_err(|e| {
            error!("Failed to read conversation {}: {}", conversation_id, e);
            AgentError::Store(e)
        })?;
        conversation.ok_or_else(|| {
            warn!("Conversation not found: {}", conversation_id);
            AgentError::ConversationNotFound(conversation_id.to_string())
        })
    }

    pub fn list_conversations(&self) -> Result<Vec<ConversationSummary>, AgentError> {
        self.history_store.list_conversations().map_err(|e| {
            error!("Failed to list conversations: {}", e);
            AgentError::Store(e)
        })
    }

    /// Runs one query turn: records the user message, asks the LLM with
    /// bounded history as context, records the reply.
    pub async fn process(&self, request: QueryRequest) -> Result<QueryResponse, AgentError> {
        let query = request.query;
        if query.trim().is_empty() {
            warn!("Rejected request with empty query");
            return Err(AgentError::InvalidInput("query must not be empty".into()));
        }

        let conversation_id = resolve_conversation_id(request.conversation_id.as_deref()).map_err(
            |e| {
                warn!("{} (query: {})", e, preview(&query));
                e
            }
        )?;

        let role = request.role.filter(|r| !r.is_empty());
        if let Some(role) = &role {
            if !self.roles.is_valid(role) {
                let err = AgentError::InvalidRole(role.clone());
                warn!("{} [conversation: {}, query: {}]", err, conversation_id, preview(&query));
                return Err(err);
            }
        }

        info!(
            "Processing query for conversation: {} (role: {})",
            conversation_id,
            role.as_deref().unwrap_or("None")
        );
        debug!("Query text: {}", preview(&query));

        let position = self.history_store
            .append_message(&conversation_id, MessageRole::User, &query)
            .map_err(|e| self.log_failure(e.into(), &conversation_id, role.as_deref(), &query))?;

        let history = self.history_store
            .get_messages_for_generation(&conversation_id)
            .map_err(|e| self.log_failure(e.into(), &conversation_id, role.as_deref(), &query))?
            .filter(|h| h.len() >= position)
            .ok_or_else(||
                self.log_failure(
                    AgentError::Inconsistent(
                        format!("conversation {} lost messages after append", conversation_id)
                    ),
                    &conversation_id,
                    role.as_deref(),
                    &query
                )
            )?;

        let preceding = &history[..position - 1];
        let window = &preceding[preceding.len().saturating_sub(self.context_window)..];
        if !window.is_empty() {
            debug!("Including conversation context with {} previous messages", window.len());
        }
        let context = format_history_for_prompt(window);

        let completion = CompletionRequest::new(build_prompt(&context, &query)).with_system(
            role.as_deref().map(system_instruction)
        );

        let started = Instant::now();
        let outcome = self.chat_client.complete(&completion).await;
        let execution_time = started.elapsed().as_secs_f64();

        let (result, status) = match outcome {
            Ok(resp) => {
                info!("Query processed in {:.2} seconds", execution_time);
                (resp.response, ResponseStatus::Success)
            }
            Err(source) => {
                let err = AgentError::Generation {
                    conversation_id: conversation_id.clone(),
                    source,
                };
                let err = self.log_failure(err, &conversation_id, role.as_deref(), &query);
                match self.failure_policy {
                    FailurePolicy::Propagate => {
                        return Err(err);
                    }
                    FailurePolicy::Apologize => (FALLBACK_REPLY.to_string(), ResponseStatus::Error),
                }
            }
        };

        let message_count = self.history_store
            .append_message(&conversation_id, MessageRole::Assistant, &result)
            .map_err(|e| self.log_failure(e.into(), &conversation_id, role.as_deref(), &query))?;

        let response = QueryResponse {
            query,
            result,
            status,
            conversation_id,
            metadata: ResponseMetadata {
                execution_time: format!("{:.2}s", execution_time),
                llm_provider: self.chat_client.provider().to_string(),
                model: self.chat_client.model(),
                message_count,
                role,
            },
        };
        debug!("Response metadata: {:?}", response.metadata);
        Ok(response)
    }

    fn log_failure(
        &self,
        err: AgentError,
        conversation_id: &str,
        role: Option<&str>,
        query: &str
    ) -> AgentError {
        error!(
            "{} [conversation: {}, role: {}, query: {}]",
            err,
            conversation_id,
            role.unwrap_or("None"),
            preview(query)
        );
        err
    }
}
