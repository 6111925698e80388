//! Chat list and message history kept by the backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ChatInfo, MessageInfo, NewChatRequest};
use crate::auth::AuthProvider;
use crate::core::error::ChatError;
use crate::core::message::{Chat, Message};
use crate::utils::url::{
    construct_api_url, resource_url, CHAT_ENDPOINT, HISTORY_ENDPOINT, NEW_CHAT_ENDPOINT,
};

pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<Chat>, ChatError>;

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError>;

    /// Create an empty chat. A missing title becomes [`DEFAULT_CHAT_TITLE`].
    async fn create_chat(&self, title: Option<&str>) -> Result<Chat, ChatError>;

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ChatError>;
}

pub struct HttpHistoryStore {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
}

impl HttpHistoryStore {
    pub fn new(client: reqwest::Client, base_url: &str, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            auth,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ChatError> {
        let response = request
            .headers(self.auth.auth_headers())
            .send()
            .await
            .map_err(ChatError::from_request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::from_status(status));
        }
        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ChatError> {
        let response = self.send(self.client.get(url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ChatError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn list_chats(&self) -> Result<Vec<Chat>, ChatError> {
        let chats: Vec<ChatInfo> = self
            .fetch_json(construct_api_url(&self.base_url, HISTORY_ENDPOINT))
            .await?;
        debug!(count = chats.len(), "loaded chat list");
        Ok(chats.into_iter().map(Chat::from).collect())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError> {
        let url = resource_url(&self.base_url, HISTORY_ENDPOINT, &[chat_id, "messages"]);
        let messages: Vec<MessageInfo> = self.fetch_json(url).await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    async fn create_chat(&self, title: Option<&str>) -> Result<Chat, ChatError> {
        let body = NewChatRequest {
            title: title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(DEFAULT_CHAT_TITLE)
                .to_string(),
        };
        let request = self
            .client
            .post(construct_api_url(&self.base_url, NEW_CHAT_ENDPOINT))
            .json(&body);
        let chat = self
            .send(request)
            .await?
            .json::<ChatInfo>()
            .await
            .map_err(|err| ChatError::InvalidResponse(err.to_string()))?;
        Ok(chat.into())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        let url = resource_url(&self.base_url, CHAT_ENDPOINT, &[chat_id]);
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{spawn_http_server, StaticAuth};

    fn store_for(base_url: &str) -> HttpHistoryStore {
        HttpHistoryStore::new(
            reqwest::Client::new(),
            base_url,
            Arc::new(StaticAuth::with_token("t")),
        )
    }

    #[tokio::test]
    async fn list_chats_parses_backend_records() {
        let body = r#"[{"id":"c1","title":"First","created_at":"2024-05-01T10:00:00Z","updated_at":"2024-05-01T11:00:00Z","message_count":2}]"#;
        let (base_url, requests) = spawn_http_server(vec![(200, body.to_string())]).await;

        let chats = store_for(&base_url).list_chats().await.expect("chats");
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].title, "First");
        assert_eq!(chats[0].message_count, 2);
        assert_eq!(
            requests.lock().await[0].request_line,
            "GET /api/chat/history HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn list_messages_targets_chat_resource() {
        let body = r#"[{"id":"m1","role":"user","content":"hi","timestamp":"2024-05-01T10:00:00Z","chat_id":"c1"}]"#;
        let (base_url, requests) = spawn_http_server(vec![(200, body.to_string())]).await;

        let messages = store_for(&base_url)
            .list_messages("c1")
            .await
            .expect("messages");
        assert_eq!(messages[0].content, "hi");
        assert_eq!(
            requests.lock().await[0].request_line,
            "GET /api/chat/history/c1/messages HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn create_chat_defaults_title() {
        let body = r#"{"id":"c9","title":"New Chat","created_at":"2024-05-01T10:00:00Z","updated_at":"2024-05-01T10:00:00Z"}"#;
        let (base_url, requests) = spawn_http_server(vec![(200, body.to_string())]).await;

        let chat = store_for(&base_url).create_chat(None).await.expect("chat");
        assert_eq!(chat.id, "c9");
        assert_eq!(chat.message_count, 0);

        let captured = requests.lock().await;
        let sent: serde_json::Value = serde_json::from_slice(&captured[0].body).expect("json");
        assert_eq!(sent, serde_json::json!({"title": "New Chat"}));
    }

    #[tokio::test]
    async fn delete_chat_maps_unauthorized() {
        let (base_url, requests) = spawn_http_server(vec![(401, "{}".to_string())]).await;
        let result = store_for(&base_url).delete_chat("c1").await;
        assert_eq!(result, Err(ChatError::AuthExpired));
        assert_eq!(
            requests.lock().await[0].request_line,
            "DELETE /api/chat/c1 HTTP/1.1"
        );
    }
}
