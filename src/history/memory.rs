use crate::history::{ HistoryStore, StoreError };
use crate::models::chat::{ ChatMessage, Conversation, ConversationSummary, MessageRole };
use chrono::Utc;
use log::{ debug, info };
use std::collections::HashMap;
use std::sync::{ Arc, Mutex, RwLock };

/// In-process history store.
///
/// The index lock is only held long enough to find or create a conversation;
/// each conversation log then has its own mutex, so appends to different ids
/// do not serialize behind each other.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    conversations: RwLock<HashMap<String, Arc<Mutex<Conversation>>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        info!("Conversation store initialized");
        Self::default()
    }

    fn lookup(&self, conversation_id: &str) -> Result<Option<Arc<Mutex<Conversation>>>, StoreError> {
        let index = self.conversations.read().map_err(|_| StoreError::IndexPoisoned)?;
        Ok(index.get(conversation_id).cloned())
    }

    fn lookup_or_create(
        &self,
        conversation_id: &str
    ) -> Result<Arc<Mutex<Conversation>>, StoreError> {
        if let Some(existing) = self.lookup(conversation_id)? {
            return Ok(existing);
        }

        let mut index = self.conversations
            .write()
            .map_err(|_| StoreError::IndexPoisoned)?;
        let entry = index.entry(conversation_id.to_string()).or_insert_with(|| {
            info!("Creating new conversation: {}", conversation_id);
            Arc::new(Mutex::new(Conversation::new(conversation_id)))
        });
        Ok(Arc::clone(entry))
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str
    ) -> Result<usize, StoreError> {
        let conversation = self.lookup_or_create(conversation_id)?;
        let mut conversation = conversation
            .lock()
            .map_err(|_| StoreError::Poisoned(conversation_id.to_string()))?;

        conversation.messages.push(ChatMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        let position = conversation.messages.len();
        debug!("Added {} message #{} to conversation {}", role, position, conversation_id);
        Ok(position)
    }

    fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError> {
        let Some(conversation) = self.lookup(conversation_id)? else {
            return Ok(None);
        };
        let snapshot = conversation
            .lock()
            .map_err(|_| StoreError::Poisoned(conversation_id.to_string()))?
            .clone();
        Ok(Some(snapshot))
    }

    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let handles: Vec<Arc<Mutex<Conversation>>> = self.conversations
            .read()
            .map_err(|_| StoreError::IndexPoisoned)?
            .values()
            .cloned()
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in &handles {
            let conversation = handle.lock().map_err(|poisoned|
                StoreError::Poisoned(poisoned.get_ref().id.clone())
            )?;
            summaries.push(ConversationSummary {
                id: conversation.id.clone(),
                message_count: conversation.messages.len(),
                created_at: conversation.created_at().map(str::to_string),
            });
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::HistoryEntry;

    #[test]
    fn unknown_conversation_is_not_found() {
        let store = InMemoryHistoryStore::new();
        assert!(store.get_messages("never-seen-id").unwrap().is_none());
        assert!(store.get_messages_for_generation("never-seen-id").unwrap().is_none());
        assert!(store.get_conversation("never-seen-id").unwrap().is_none());
    }

    #[test]
    fn first_append_creates_conversation() {
        let store = InMemoryHistoryStore::new();
        let position = store.append_message("never-seen-id", MessageRole::User, "hello").unwrap();
        assert_eq!(position, 1);

        let messages = store.get_messages("never-seen-id").unwrap().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hello");

        let conversation = store.get_conversation("never-seen-id").unwrap().unwrap();
        assert!(conversation.created_at().is_some());
    }

    #[test]
    fn generation_projection_only_drops_timestamps() {
        let store = InMemoryHistoryStore::new();
        let content = "  Multi-line\ncontent with  spacing  ";
        store.append_message("c1", MessageRole::Assistant, content).unwrap();

        let entries = store.get_messages_for_generation("c1").unwrap().unwrap();
        assert_eq!(
            entries,
            vec![HistoryEntry { role: MessageRole::Assistant, content: content.to_string() }]
        );
    }

    #[test]
    fn appends_keep_insertion_order() {
        let store = InMemoryHistoryStore::new();
        for i in 0..5 {
            let role = if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant };
            assert_eq!(store.append_message("c1", role, &format!("m{}", i)).unwrap(), i + 1);
        }
        let contents: Vec<String> = store
            .get_messages("c1").unwrap()
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn conversations_are_isolated_and_listed() {
        let store = InMemoryHistoryStore::new();
        store.append_message("a", MessageRole::User, "one").unwrap();
        store.append_message("b", MessageRole::User, "two").unwrap();
        store.append_message("b", MessageRole::Assistant, "three").unwrap();

        assert_eq!(store.get_messages("a").unwrap().unwrap().len(), 1);
        assert_eq!(store.get_messages("b").unwrap().unwrap().len(), 2);

        let mut listed: Vec<(String, usize)> = store
            .list_conversations().unwrap()
            .into_iter()
            .map(|s| (s.id, s.message_count))
            .collect();
        listed.sort();
        assert_eq!(listed, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    fn poison(store: &Arc<InMemoryHistoryStore>, conversation_id: &str) {
        let handle = store
            .lookup(conversation_id)
            .unwrap()
            .expect("conversation exists");
        let result = std::thread::spawn(move || {
            let _guard = handle.lock().unwrap();
            panic!("writer died while holding the conversation lock");
        }).join();
        assert!(result.is_err());
    }

    #[test]
    fn poisoned_conversation_is_an_error_not_a_miss() {
        let store = Arc::new(InMemoryHistoryStore::new());
        store.append_message("c", MessageRole::User, "hello").unwrap();
        store.append_message("other", MessageRole::User, "still fine").unwrap();
        poison(&store, "c");

        assert!(matches!(store.get_conversation("c"), Err(StoreError::Poisoned(ref id)) if id == "c"));
        assert!(matches!(store.get_messages("c"), Err(StoreError::Poisoned(_))));
        assert!(matches!(store.get_messages_for_generation("c"), Err(StoreError::Poisoned(_))));
        assert!(matches!(store.list_conversations(), Err(StoreError::Poisoned(ref id)) if id == "c"));
        assert!(matches!(
            store.append_message("c", MessageRole::Assistant, "late"),
            Err(StoreError::Poisoned(_))
        ));

        // Unrelated conversations and genuine misses are unaffected.
        assert_eq!(store.get_messages("other").unwrap().unwrap().len(), 1);
        assert!(store.get_messages("never-seen-id").unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let mut handles = Vec::new();
        for task in 0..8 {
            let store = Arc::clone(&store);
            handles.push(
                tokio::spawn(async move {
                    for i in 0..50 {
                        store
                            .append_message("shared", MessageRole::User, &format!("{}-{}", task, i))
                            .unwrap();
                    }
                })
            );
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let messages = store.get_messages("shared").unwrap().unwrap();
        assert_eq!(messages.len(), 400);

        let mut seen: Vec<&str> = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 400);

        // Per-task order survives interleaving.
        for task in 0..8 {
            let prefix = format!("{}-", task);
            let own: Vec<usize> = messages
                .iter()
                .filter_map(|m| m.content.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(own, (0..50).collect::<Vec<usize>>());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_appends_create_one_conversation() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.append_message("fresh", MessageRole::User, &i.to_string()).unwrap()
                })
            })
            .collect();

        let mut positions = Vec::new();
        for task in tasks {
            positions.push(task.await.unwrap());
        }
        positions.sort();
        assert_eq!(positions, (1..=16).collect::<Vec<usize>>());
        assert_eq!(store.list_conversations().unwrap().len(), 1);
    }
}
