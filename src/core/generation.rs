//! State machine for the single in-flight assistant reply.
//!
//! ```text
//! Idle -> Sending -> Streaming -> Completed | Cancelled | Failed
//! ```
//!
//! Terminal states accept a new `start()`. Updates are tagged with the stream
//! id handed out by `start()`; anything tagged with an older id belongs to a
//! generation that has already ended and is dropped.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::chat_stream::StreamMessage;
use super::chat_store::ChatStore;
use super::error::ChatError;
use super::message::Role;
use super::stream_decoder::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl GenerationState {
    /// A request is out and the reply may still change.
    pub fn is_active(self) -> bool {
        matches!(self, GenerationState::Sending | GenerationState::Streaming)
    }
}

/// Returned by [`GenerationController::start`]; everything the caller needs
/// to launch the stream.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub stream_id: u64,
    pub user_message_id: String,
    pub assistant_message_id: String,
    pub cancel_token: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Completed { message_id: String, content: String },
    Failed(ChatError),
}

#[derive(Debug)]
struct Generation {
    stream_id: u64,
    message_id: String,
    cancel_token: CancellationToken,
    buffer: String,
}

#[derive(Debug, Default)]
pub struct GenerationController {
    state: GenerationState,
    active: Option<Generation>,
    current_stream_id: u64,
    last_error: Option<String>,
}

impl GenerationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Error text of the most recent failed generation. Cancellation never
    /// sets it; the next `start()` clears it.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|generation| generation.stream_id == stream_id)
    }

    /// Record the user message and an empty assistant placeholder, then move
    /// to `Sending`. Rejected while another generation is active.
    pub fn start(
        &mut self,
        store: &mut ChatStore,
        chat_id: Option<String>,
        content: &str,
    ) -> Result<GenerationTicket, ChatError> {
        if self.state.is_active() {
            warn!(state = ?self.state, "start rejected, generation in progress");
            return Err(ChatError::GenerationInProgress);
        }

        let user_message_id = store.append_message(chat_id.clone(), Role::User, content);
        let assistant_message_id = store.append_streaming_placeholder(chat_id);

        self.current_stream_id += 1;
        let cancel_token = CancellationToken::new();
        self.active = Some(Generation {
            stream_id: self.current_stream_id,
            message_id: assistant_message_id.clone(),
            cancel_token: cancel_token.clone(),
            buffer: String::new(),
        });
        self.state = GenerationState::Sending;
        self.last_error = None;
        debug!(stream_id = self.current_stream_id, "generation started");

        Ok(GenerationTicket {
            stream_id: self.current_stream_id,
            user_message_id,
            assistant_message_id,
            cancel_token,
        })
    }

    /// Apply one update from the stream task. A batch of events is applied
    /// in order within this call. Returns the outcome once the generation
    /// reaches `Completed` or `Failed`.
    pub fn apply(
        &mut self,
        store: &mut ChatStore,
        stream_id: u64,
        message: StreamMessage,
    ) -> Option<GenerationOutcome> {
        if !self.is_current_stream(stream_id) {
            debug!(stream_id, "dropping update for inactive stream");
            return None;
        }

        match message {
            StreamMessage::Opened => {
                self.enter_streaming();
                None
            }
            StreamMessage::Events(events) => {
                for event in events {
                    if let Some(outcome) = self.apply_event(store, event) {
                        return Some(outcome);
                    }
                }
                None
            }
            StreamMessage::Failed(error) => Some(self.fail(store, error)),
        }
    }

    /// Stop the active generation, keeping whatever text already arrived as
    /// the final content. Returns `false` when nothing was in flight.
    pub fn cancel(&mut self, store: &mut ChatStore) -> bool {
        if !self.state.is_active() {
            return false;
        }
        let Some(generation) = self.active.take() else {
            return false;
        };

        generation.cancel_token.cancel();
        if let Err(err) = store.close_stream(&generation.message_id) {
            warn!(error = %err, "cancelled message was not open");
        }
        self.state = GenerationState::Cancelled;
        debug!(
            stream_id = generation.stream_id,
            kept_bytes = generation.buffer.len(),
            "generation cancelled"
        );
        true
    }

    fn enter_streaming(&mut self) {
        if self.state == GenerationState::Sending {
            self.state = GenerationState::Streaming;
        }
    }

    fn apply_event(
        &mut self,
        store: &mut ChatStore,
        event: StreamEvent,
    ) -> Option<GenerationOutcome> {
        self.enter_streaming();

        match event {
            StreamEvent::Token(text) => {
                let generation = self.active.as_mut()?;
                generation.buffer.push_str(&text);
                if let Err(err) = store.append_content(&generation.message_id, &text) {
                    warn!(error = %err, "dropping token for closed message");
                }
                None
            }
            StreamEvent::Complete(final_text) => {
                let generation = self.active.take()?;
                let content = final_text.unwrap_or(generation.buffer);
                if let Err(err) = store
                    .set_content(&generation.message_id, content.clone())
                    .and_then(|()| store.close_stream(&generation.message_id))
                {
                    warn!(error = %err, "completed message was not open");
                }
                self.state = GenerationState::Completed;
                debug!(stream_id = generation.stream_id, "generation completed");
                Some(GenerationOutcome::Completed {
                    message_id: generation.message_id,
                    content,
                })
            }
            StreamEvent::Failure(reason) => {
                Some(self.fail(store, ChatError::StreamFailure { reason }))
            }
        }
    }

    fn fail(&mut self, store: &mut ChatStore, error: ChatError) -> GenerationOutcome {
        if let Some(generation) = self.active.take() {
            generation.cancel_token.cancel();
            store.remove_message(&generation.message_id);
        }
        self.state = GenerationState::Failed;
        self.last_error = Some(error.to_string());
        warn!(error = %error, "generation failed");
        GenerationOutcome::Failed(error)
    }
}
