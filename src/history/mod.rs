use log::debug;
use crate::models::chat::ChatMessage;

pub const DEFAULT_GREETING: &str = "Hello! How can I assist you today?";

/// Ordered, append-only transcript of one session.
///
/// A store is owned by exactly one session; nothing in it is shared
/// across connections.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    greeting: String,
    messages: Vec<ChatMessage>,
}

impl ConversationStore {
    /// Creates a store already seeded with the assistant greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        let mut store = Self {
            greeting: greeting.into(),
            messages: Vec::new(),
        };
        store.init();
        store
    }

    /// Seeds the greeting if the conversation is empty. Returns `false`
    /// and leaves the transcript untouched otherwise.
    pub fn init(&mut self) -> bool {
        if !self.messages.is_empty() {
            return false;
        }
        self.messages.push(ChatMessage::assistant(self.greeting.clone()));
        true
    }

    pub fn append(&mut self, message: ChatMessage) {
        debug!("Appending {} message #{}", message.role(), self.messages.len());
        self.messages.push(message);
    }

    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;

    #[test]
    fn fresh_store_holds_only_the_greeting() {
        let store = ConversationStore::default();
        assert_eq!(store.all(), &[ChatMessage::assistant(DEFAULT_GREETING)]);
        assert_eq!(store.all()[0].role(), Role::Assistant);
    }

    #[test]
    fn init_does_not_reset_existing_conversation() {
        let mut store = ConversationStore::new("hey");
        store.append(ChatMessage::user("first"));
        assert!(!store.init());
        assert_eq!(store.len(), 2);
        assert_eq!(store.last(), Some(&ChatMessage::user("first")));
    }

    #[test]
    fn append_grows_by_one_and_keeps_prior_entries() {
        let mut store = ConversationStore::default();
        let mut snapshot = store.all().to_vec();
        for i in 0..5 {
            let msg = if i % 2 == 0 {
                ChatMessage::user(format!("q{}", i))
            } else {
                ChatMessage::assistant(format!("a{}", i))
            };
            store.append(msg.clone());
            assert_eq!(store.len(), snapshot.len() + 1);
            assert_eq!(&store.all()[..snapshot.len()], snapshot.as_slice());
            snapshot.push(msg);
        }
    }
}
