//! Chat transcript types
//!
//! These are shared by every front end and carry no UI dependencies.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Identifier of a message, unique and increasing within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

/// A message in the document conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    timestamp: DateTime<Local>,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Time of day for display next to the message
    pub fn display_time(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Append-only, ordered log of messages.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            content: content.into(),
            timestamp: Local::now(),
        });
        id
    }

    /// Start a fresh conversation seeded with a single assistant message.
    ///
    /// Ids keep increasing across restarts so they stay unique for the session.
    pub fn restart(&mut self, seed: impl Into<String>) -> MessageId {
        self.messages.clear();
        self.push(Role::Assistant, seed)
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_increasing_ids() {
        let mut transcript = Transcript::new();
        let a = transcript.push(Role::User, "hello");
        let b = transcript.push(Role::Assistant, "hi");
        assert!(b > a);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.get(a).unwrap().content(), "hello");
        assert_eq!(transcript.last().unwrap().role(), Role::Assistant);
    }

    #[test]
    fn test_restart_keeps_ids_unique() {
        let mut transcript = Transcript::new();
        let first = transcript.push(Role::Assistant, "Report loaded.");
        transcript.push(Role::User, "What is the total?");

        let seed = transcript.restart("Invoice loaded.");
        assert_eq!(transcript.len(), 1);
        assert!(seed > first);
        assert!(transcript.get(first).is_none());
        assert_eq!(transcript.messages()[0].content(), "Invoice loaded.");
    }

    #[test]
    fn test_display_time_format() {
        let mut transcript = Transcript::new();
        transcript.push(Role::User, "x");
        let time = transcript.last().unwrap().display_time();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);
    }
}
