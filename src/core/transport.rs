//! Delivery of a send request and its raw reply bytes.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::SendRequest;
use crate::auth::AuthProvider;
use crate::core::error::ChatError;
use crate::utils::url::{construct_api_url, SEND_ENDPOINT};

/// Reply body as it arrives, split wherever the network split it.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Resolves once response headers are in; the body
    /// follows through the returned stream, which ends early when
    /// `cancel_token` fires.
    async fn send(
        &self,
        request: &SendRequest,
        cancel_token: &CancellationToken,
    ) -> Result<ByteStream, ChatError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: &str, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            auth,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &SendRequest,
        cancel_token: &CancellationToken,
    ) -> Result<ByteStream, ChatError> {
        let url = construct_api_url(&self.base_url, SEND_ENDPOINT);
        debug!(%url, chat_id = ?request.chat_id, "sending message");

        let pending = self
            .client
            .post(url)
            .headers(self.auth.auth_headers())
            .json(request)
            .send();

        let response = tokio::select! {
            result = pending => result.map_err(ChatError::from_request)?,
            _ = cancel_token.cancelled() => return Err(ChatError::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            // The error body is never read; a stalled body must not delay the failure.
            warn!(status = status.as_u16(), "send rejected");
            return Err(ChatError::from_status(status));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|err| ChatError::Connection(err.to_string()))
            })
            .take_until(cancel_token.clone().cancelled_owned());
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{spawn_http_server, StaticAuth};

    fn transport_for(base_url: &str) -> HttpTransport {
        HttpTransport::new(
            reqwest::Client::new(),
            base_url,
            Arc::new(StaticAuth::with_token("secret")),
        )
    }

    async fn collect_body(mut stream: ByteStream) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.expect("chunk"));
        }
        body
    }

    #[tokio::test]
    async fn posts_json_body_with_auth_header_and_streams_reply() {
        let reply = "{\"type\":\"token\",\"content\":\"Hi\"}\n{\"type\":\"done\"}\n";
        let (base_url, requests) = spawn_http_server(vec![(200, reply.to_string())]).await;

        let request = SendRequest {
            message: "Hello".into(),
            chat_id: Some("c1".into()),
            ..Default::default()
        };
        let stream = transport_for(&base_url)
            .send(&request, &CancellationToken::new())
            .await
            .expect("send");
        assert_eq!(collect_body(stream).await, reply.as_bytes());

        let captured = requests.lock().await;
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].request_line, "POST /api/chat/send HTTP/1.1");
        assert_eq!(
            captured[0].header("authorization").as_deref(),
            Some("Bearer secret")
        );
        let body: serde_json::Value = serde_json::from_slice(&captured[0].body).expect("json");
        assert_eq!(
            body,
            serde_json::json!({"message": "Hello", "chat_id": "c1"})
        );
    }

    #[tokio::test]
    async fn server_error_status_maps_to_server_error() {
        let (base_url, _) = spawn_http_server(vec![(500, "boom".to_string())]).await;
        let result = transport_for(&base_url)
            .send(&SendRequest::default(), &CancellationToken::new())
            .await;
        assert_eq!(result.err(), Some(ChatError::Server { status: 500 }));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_expired() {
        let (base_url, _) = spawn_http_server(vec![(401, "{}".to_string())]).await;
        let result = transport_for(&base_url)
            .send(&SendRequest::default(), &CancellationToken::new())
            .await;
        assert_eq!(result.err(), Some(ChatError::AuthExpired));
    }

    #[tokio::test]
    async fn unreachable_backend_maps_to_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let result = transport_for(&format!("http://{addr}"))
            .send(&SendRequest::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ChatError::Connection(_))));
    }

    #[tokio::test]
    async fn cancelled_before_headers_returns_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");

        let result = transport_for(&format!("http://{addr}"))
            .send(&SendRequest::default(), &token)
            .await;
        assert_eq!(result.err(), Some(ChatError::Cancelled));
        drop(listener);
    }

    #[tokio::test]
    async fn error_status_is_reported_without_waiting_for_the_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buffer = [0u8; 4096];
            let _ = stream.read(&mut buffer).await;
            let head = "HTTP/1.1 500 Error\r\ncontent-length: 100000\r\n\r\npartial";
            stream.write_all(head.as_bytes()).await.expect("write");
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        });

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            transport_for(&format!("http://{addr}"))
                .send(&SendRequest::default(), &CancellationToken::new()),
        )
        .await
        .expect("error status should not wait for the body");
        assert_eq!(result.err(), Some(ChatError::Server { status: 500 }));
        server.abort();
    }
}
