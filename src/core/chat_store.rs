//! In-memory chats and messages shown to the user.
//!
//! Chats are kept newest-created first. Messages keep send order. Content
//! can only change on the single assistant message that is currently open for
//! streaming; every other message is frozen.

use chrono::Utc;
use thiserror::Error;

use super::message::{Chat, Message, Role};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown message: {0}")]
    UnknownMessage(String),
    #[error("{role} message {id} cannot be edited")]
    Immutable { id: String, role: &'static str },
    #[error("message {0} is not streaming")]
    NotStreaming(String),
}

#[derive(Debug, Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    selected: Option<String>,
    streaming_message: Option<String>,
    next_local_id: u64,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == chat_id)
    }

    /// Replace the chat list, ordering it newest-created first. Loaded
    /// messages of chats that no longer exist are dropped.
    pub fn set_chats(&mut self, mut chats: Vec<Chat>) {
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.chats = chats;

        let known: Vec<String> = self.chats.iter().map(|chat| chat.id.clone()).collect();
        self.messages.retain(|message| match &message.chat_id {
            Some(chat_id) => known.contains(chat_id),
            None => true,
        });
        if let Some(selected) = &self.selected {
            if !known.contains(selected) {
                self.selected = None;
            }
        }
    }

    /// Insert a freshly created chat at the front of the list.
    pub fn insert_chat(&mut self, chat: Chat) {
        self.chats.retain(|existing| existing.id != chat.id);
        self.chats.insert(0, chat);
    }

    /// Remove a chat together with every message it owns.
    pub fn remove_chat(&mut self, chat_id: &str) -> Option<Chat> {
        let index = self.chats.iter().position(|chat| chat.id == chat_id)?;
        let chat = self.chats.remove(index);

        self.messages
            .retain(|message| message.chat_id.as_deref() != Some(chat_id));
        if let Some(streaming) = &self.streaming_message {
            if self.message(streaming).is_none() {
                self.streaming_message = None;
            }
        }
        if self.selected.as_deref() == Some(chat_id) {
            self.selected = None;
        }
        Some(chat)
    }

    pub fn select_chat(&mut self, chat_id: &str) {
        self.selected = Some(chat_id.to_string());
    }

    pub fn selected_chat_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Swap in the history loaded for `chat_id`.
    pub fn replace_messages(&mut self, chat_id: &str, messages: Vec<Message>) {
        self.messages
            .retain(|message| message.chat_id.as_deref() != Some(chat_id));
        self.messages.extend(messages.into_iter().map(|mut message| {
            message.chat_id = Some(chat_id.to_string());
            message
        }));
    }

    /// Messages of the selected chat, or of the unsaved conversation when no
    /// chat is selected, in send order.
    pub fn messages(&self) -> Vec<&Message> {
        let selected = self.selected.as_deref();
        self.messages
            .iter()
            .filter(|message| message.chat_id.as_deref() == selected)
            .collect()
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == message_id)
    }


    /// Append a message and return its local id.
    pub fn append_message(
        &mut self,
        chat_id: Option<String>,
        role: Role,
        content: impl Into<String>,
    ) -> String {
        self.next_local_id += 1;
        let id = format!("local-{}", self.next_local_id);

        if let Some(chat) = chat_id
            .as_deref()
            .and_then(|chat_id| self.chats.iter_mut().find(|chat| chat.id == chat_id))
        {
            chat.message_count += 1;
            chat.updated_at = Utc::now();
        }

        self.messages
            .push(Message::new(id.clone(), chat_id, role, content));
        id
    }

    /// Append an empty assistant message and make it the open message. A
    /// previously open message stops accepting content updates.
    pub fn append_streaming_placeholder(&mut self, chat_id: Option<String>) -> String {
        let id = self.append_message(chat_id, Role::Assistant, String::new());
        self.streaming_message = Some(id.clone());
        id
    }

    pub fn append_content(&mut self, message_id: &str, fragment: &str) -> Result<(), StoreError> {
        let message = self.streaming_message_mut(message_id)?;
        message.content.push_str(fragment);
        Ok(())
    }

    pub fn set_content(&mut self, message_id: &str, content: String) -> Result<(), StoreError> {
        let message = self.streaming_message_mut(message_id)?;
        message.content = content;
        Ok(())
    }

    /// Freeze the open message. Its content no longer changes.
    pub fn close_stream(&mut self, message_id: &str) -> Result<(), StoreError> {
        if self.streaming_message.as_deref() != Some(message_id) {
            return Err(StoreError::NotStreaming(message_id.to_string()));
        }
        self.streaming_message = None;
        Ok(())
    }

    pub fn remove_message(&mut self, message_id: &str) -> Option<Message> {
        let index = self
            .messages
            .iter()
            .position(|message| message.id == message_id)?;
        let message = self.messages.remove(index);

        if self.streaming_message.as_deref() == Some(message_id) {
            self.streaming_message = None;
        }
        if let Some(chat) = message
            .chat_id
            .as_deref()
            .and_then(|chat_id| self.chats.iter_mut().find(|chat| chat.id == chat_id))
        {
            chat.message_count = chat.message_count.saturating_sub(1);
        }
        Some(message)
    }

    fn streaming_message_mut(&mut self, message_id: &str) -> Result<&mut Message, StoreError> {
        let open = self.streaming_message.as_deref() == Some(message_id);
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id == message_id)
            .ok_or_else(|| StoreError::UnknownMessage(message_id.to_string()))?;

        if !message.role.is_mutable() {
            return Err(StoreError::Immutable {
                id: message_id.to_string(),
                role: message.role.as_str(),
            });
        }
        if !open {
            return Err(StoreError::NotStreaming(message_id.to_string()));
        }
        Ok(message)
    }
}
