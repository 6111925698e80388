use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use futures_util::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::api::SendRequest;
use crate::auth::AuthProvider;
use crate::core::chat_stream::StreamMessage;
use crate::core::error::ChatError;
use crate::core::history::{HistoryStore, DEFAULT_CHAT_TITLE};
use crate::core::message::{Chat, Message};
use crate::core::session::{ChatSession, RequestDefaults};
use crate::core::transport::{ByteStream, Transport};

/// A chat created `n` hours after a fixed point in the past; larger `n`
/// means newer.
pub fn create_test_chat(id: &str, n: i64) -> Chat {
    let base = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp");
    let created_at = base + Duration::hours(n);
    Chat {
        id: id.to_string(),
        title: format!("Chat {id}"),
        created_at,
        updated_at: created_at,
        message_count: 0,
    }
}

enum Script {
    Chunks(Vec<Result<Vec<u8>, ChatError>>),
    PendingAfter(Vec<Vec<u8>>),
    Fail(ChatError),
}

/// Transport that replays canned reply bytes and records every request.
pub struct ScriptedTransport {
    script: Script,
    requests: Arc<Mutex<Vec<SendRequest>>>,
}

impl ScriptedTransport {
    pub fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self::with_results(chunks.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<Vec<u8>, ChatError>>) -> Self {
        Self::new(Script::Chunks(results))
    }

    /// Yields `chunks`, then never produces another byte.
    pub fn pending_after(chunks: Vec<Vec<u8>>) -> Self {
        Self::new(Script::PendingAfter(chunks))
    }

    pub fn failing(error: ChatError) -> Self {
        Self::new(Script::Fail(error))
    }

    fn new(script: Script) -> Self {
        Self {
            script,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<SendRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &SendRequest,
        cancel_token: &CancellationToken,
    ) -> Result<ByteStream, ChatError> {
        self.requests.lock().await.push(request.clone());
        let body: ByteStream = match &self.script {
            Script::Fail(error) => return Err(error.clone()),
            Script::Chunks(results) => stream::iter(results.clone()).boxed(),
            Script::PendingAfter(chunks) => stream::iter(chunks.clone().into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
        };
        Ok(body
            .take_until(cancel_token.clone().cancelled_owned())
            .boxed())
    }
}

/// Auth provider with a fixed token that records logouts.
pub struct StaticAuth {
    token: String,
    logged_out: AtomicBool,
}

impl StaticAuth {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: token.to_string(),
            logged_out: AtomicBool::new(false),
        }
    }

    pub fn logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }
}

impl AuthProvider for StaticAuth {
    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.logged_out() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn is_authenticated(&self) -> bool {
        !self.logged_out()
    }

    fn logout(&self) {
        self.logged_out.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MemoryState {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    next_id: u64,
    failure: Option<ChatError>,
}

/// History store backed by plain vectors.
#[derive(Default)]
pub struct MemoryHistoryStore {
    state: StdMutex<MemoryState>,
}

impl MemoryHistoryStore {
    pub fn with_chats(chats: Vec<Chat>) -> Self {
        let store = Self::default();
        store.lock().chats = chats;
        store
    }

    /// Make every following call fail with `error`.
    pub fn fail_with(&self, error: ChatError) {
        self.lock().failure = Some(error);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("history state lock")
    }

    fn check(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, ChatError> {
        let state = self.lock();
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn list_chats(&self) -> Result<Vec<Chat>, ChatError> {
        Ok(self.check()?.chats.clone())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError> {
        Ok(self
            .check()?
            .messages
            .iter()
            .filter(|message| message.chat_id.as_deref() == Some(chat_id))
            .cloned()
            .collect())
    }

    async fn create_chat(&self, title: Option<&str>) -> Result<Chat, ChatError> {
        let mut state = self.check()?;
        state.next_id += 1;
        let now = Utc::now();
        let chat = Chat {
            id: format!("mem-{}", state.next_id),
            title: title.unwrap_or(DEFAULT_CHAT_TITLE).to_string(),
            created_at: now,
            updated_at: now,
            message_count: 0,
        };
        state.chats.insert(0, chat.clone());
        Ok(chat)
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        let mut state = self.check()?;
        state.chats.retain(|chat| chat.id != chat_id);
        state
            .messages
            .retain(|message| message.chat_id.as_deref() != Some(chat_id));
        Ok(())
    }
}

pub fn test_request_defaults() -> RequestDefaults {
    RequestDefaults {
        model: Some("test-model".to_string()),
        temperature: Some(0.7),
        max_tokens: Some(2048),
    }
}

pub fn create_test_session(
    transport: ScriptedTransport,
    history: MemoryHistoryStore,
) -> (
    ChatSession,
    mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    Arc<StaticAuth>,
) {
    let auth = Arc::new(StaticAuth::with_token("test-token"));
    let (session, rx) = ChatSession::new(
        Arc::new(transport),
        Arc::new(history),
        auth.clone(),
        test_request_defaults(),
    );
    (session, rx, auth)
}

/// One request as seen by [`spawn_http_server`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

pub type CapturedRequests = Arc<Mutex<Vec<CapturedRequest>>>;

/// Serve one canned `(status, body)` response per incoming connection, in
/// order. Returns the base URL and the captured requests.
pub async fn spawn_http_server(responses: Vec<(u16, String)>) -> (String, CapturedRequests) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let captured: CapturedRequests = Arc::new(Mutex::new(Vec::new()));
    let captured_for_server = Arc::clone(&captured);

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(request) = read_http_request(&mut stream).await else {
                return;
            };
            captured_for_server.lock().await.push(request);

            let reason = if status < 400 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{addr}"), captured)
}

async fn read_http_request(stream: &mut tokio::net::TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos;
        }
        let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
