mod memory;

pub use memory::InMemoryHistoryStore;

use crate::cli::Args;
use crate::models::chat::{ ChatMessage, Conversation, ConversationSummary, HistoryEntry, MessageRole };
use log::info;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history store lock poisoned while accessing conversation '{0}'")]
    Poisoned(String),
    #[error("history store index lock poisoned")]
    IndexPoisoned,
}

/// Append-only conversation logs shared by every request in the process.
///
/// Implementations must make each append atomic and create a missing
/// conversation in the same critical section as its first append.
/// Lookups on unknown ids return `Ok(None)`; `Err` is reserved for a broken store.
pub trait HistoryStore: Send + Sync {
    /// Returns the 1-based position of the appended message.
    fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str
    ) -> Result<usize, StoreError>;

    fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError>;

    fn get_messages(&self, conversation_id: &str) -> Result<Option<Vec<ChatMessage>>, StoreError> {
        Ok(self.get_conversation(conversation_id)?.map(|c| c.messages))
    }

    fn get_messages_for_generation(
        &self,
        conversation_id: &str
    ) -> Result<Option<Vec<HistoryEntry>>, StoreError> {
        Ok(
            self.get_messages(conversation_id)?.map(|messages|
                messages.iter().map(HistoryEntry::from).collect()
            )
        )
    }

    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError>;
}

pub fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn StdError + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryHistoryStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn StdError + Send + Sync>> {
    info!("Chat history will be stored in: {}", args.history_type);
    create_history_store(args)
}

/// Renders prior turns as `"<Role>: <content>"` lines under a fixed header.
pub fn format_history_for_prompt(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut result = String::from("Previous conversation:\n");
    for entry in entries {
        result.push_str(&format!("{}: {}\n", entry.role.label(), entry.content));
    }
    result.push('\n');

    result
}
