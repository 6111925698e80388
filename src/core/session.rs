//! Glue between the store, the generation controller and the backend.
//!
//! A [`ChatSession`] is owned by one task. Stream tasks report back through
//! the receiver returned by [`ChatSession::new`]; the owner feeds every
//! received update into [`ChatSession::apply`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::SendRequest;
use crate::auth::AuthProvider;
use crate::core::chat_store::ChatStore;
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::error::ChatError;
use crate::core::generation::{
    GenerationController, GenerationOutcome, GenerationState, GenerationTicket,
};
use crate::core::history::HistoryStore;
use crate::core::message::Chat;
use crate::core::transport::Transport;

/// Values used when a send leaves an option unset.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDefaults {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub files: Vec<String>,
}

pub struct ChatSession {
    store: ChatStore,
    generation: GenerationController,
    stream_service: ChatStreamService,
    transport: Arc<dyn Transport>,
    history: Arc<dyn HistoryStore>,
    auth: Arc<dyn AuthProvider>,
    defaults: RequestDefaults,
}

impl ChatSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        history: Arc<dyn HistoryStore>,
        auth: Arc<dyn AuthProvider>,
        defaults: RequestDefaults,
    ) -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (stream_service, rx) = ChatStreamService::new();
        let session = Self {
            store: ChatStore::new(),
            generation: GenerationController::new(),
            stream_service,
            transport,
            history,
            auth,
            defaults,
        };
        (session, rx)
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn state(&self) -> GenerationState {
        self.generation.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.generation.last_error()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub async fn load_chats(&mut self) -> Result<(), ChatError> {
        self.ensure_idle()?;
        let chats = self.history.list_chats().await;
        let chats = self.check_auth(chats)?;
        self.store.set_chats(chats);
        Ok(())
    }

    /// Create a chat on the backend, select it and start it empty.
    pub async fn create_chat(&mut self, title: Option<&str>) -> Result<Chat, ChatError> {
        self.ensure_idle()?;
        let chat = self.history.create_chat(title).await;
        let chat = self.check_auth(chat)?;
        self.store.insert_chat(chat.clone());
        self.store.select_chat(&chat.id);
        self.store.replace_messages(&chat.id, Vec::new());
        debug!(chat_id = %chat.id, "chat created");
        Ok(chat)
    }

    pub async fn delete_chat(&mut self, chat_id: &str) -> Result<(), ChatError> {
        self.ensure_idle()?;
        let result = self.history.delete_chat(chat_id).await;
        self.check_auth(result)?;
        self.store.remove_chat(chat_id);
        debug!(chat_id, "chat deleted");
        Ok(())
    }

    /// Select a chat and load its message history.
    pub async fn select_chat(&mut self, chat_id: &str) -> Result<(), ChatError> {
        self.ensure_idle()?;
        let messages = self.history.list_messages(chat_id).await;
        let messages = self.check_auth(messages)?;
        self.store.select_chat(chat_id);
        self.store.replace_messages(chat_id, messages);
        Ok(())
    }

    /// Append the user message and start streaming the reply into the
    /// selected chat (or a new one, when none is selected).
    pub fn send(
        &mut self,
        content: &str,
        options: SendOptions,
    ) -> Result<GenerationTicket, ChatError> {
        let chat_id = self.store.selected_chat_id().map(str::to_string);
        let ticket = self
            .generation
            .start(&mut self.store, chat_id.clone(), content)?;

        let request = SendRequest {
            message: content.to_string(),
            chat_id,
            model: options.model.or_else(|| self.defaults.model.clone()),
            temperature: options.temperature.or(self.defaults.temperature),
            max_tokens: options.max_tokens.or(self.defaults.max_tokens),
            files: if options.files.is_empty() {
                None
            } else {
                Some(options.files)
            },
        };

        self.stream_service.spawn_stream(StreamParams {
            transport: Arc::clone(&self.transport),
            request,
            cancel_token: ticket.cancel_token.clone(),
            stream_id: ticket.stream_id,
        });
        Ok(ticket)
    }

    pub fn cancel(&mut self) -> bool {
        self.generation.cancel(&mut self.store)
    }

    pub fn apply(&mut self, stream_id: u64, message: StreamMessage) -> Option<GenerationOutcome> {
        let outcome = self.generation.apply(&mut self.store, stream_id, message);
        if let Some(GenerationOutcome::Failed(ChatError::AuthExpired)) = &outcome {
            self.expire_auth();
        }
        outcome
    }

    fn ensure_idle(&self) -> Result<(), ChatError> {
        if self.generation.state().is_active() {
            return Err(ChatError::GenerationInProgress);
        }
        Ok(())
    }

    fn check_auth<T>(&self, result: Result<T, ChatError>) -> Result<T, ChatError> {
        if let Err(ChatError::AuthExpired) = &result {
            self.expire_auth();
        }
        result
    }

    fn expire_auth(&self) {
        info!("backend rejected credentials, logging out");
        self.auth.logout();
    }
}
