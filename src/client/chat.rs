use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::debug;

use crate::network::messages::ChatMessage;

/// Most recent chat messages retained
pub const MAX_CHAT_MESSAGES: usize = 200;
/// Bot commands start with this prefix and are never shown
pub const COMMAND_PREFIX: char = '!';

pub fn is_chat_command(text: &str) -> bool {
    text.trim().starts_with(COMMAND_PREFIX)
}

/// Sliding window over incoming chat
pub struct ChatLog {
    messages: RwLock<VecDeque<ChatMessage>>,
    capacity: usize,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CHAT_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a message, evicting the oldest ones past capacity.
    /// Returns false if the message was a command and got dropped.
    pub fn push(&self, message: ChatMessage) -> bool {
        if is_chat_command(&message.text) {
            debug!("Dropping chat command from {}", message.user.username);
            return false;
        }
        let mut messages = self.messages.write();
        messages.push_back(message);
        while messages.len() > self.capacity {
            messages.pop_front();
        }
        true
    }

    pub fn get_messages(&self) -> Vec<ChatMessage> {
        self.messages.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}
