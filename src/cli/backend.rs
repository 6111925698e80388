//! Shared wiring for commands that talk to the backend.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::auth::{AuthProvider, TokenAuth};
use crate::core::chat_stream::StreamMessage;
use crate::core::config::data::Config;
use crate::core::history::HttpHistoryStore;
use crate::core::session::ChatSession;
use crate::core::transport::HttpTransport;

pub struct Backend {
    pub client: reqwest::Client,
    pub base_url: String,
    pub auth: Arc<TokenAuth>,
    pub config: Config,
}

impl Backend {
    /// Load the config, build the HTTP client and restore any stored login.
    /// `base_url_override` wins over `CHATLINE_API_URL` and the config file.
    pub fn connect(base_url_override: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let base_url = match base_url_override {
            Some(url) => config.base_url_with_override(Some(url)),
            None => config.effective_base_url(),
        };
        debug!(%base_url, "using backend");

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        let auth = Arc::new(TokenAuth::new(client.clone(), &base_url)?);

        Ok(Self {
            client,
            base_url,
            auth,
            config,
        })
    }

    pub fn auth_provider(&self) -> Arc<dyn AuthProvider> {
        self.auth.clone()
    }

    pub fn history(&self) -> HttpHistoryStore {
        HttpHistoryStore::new(self.client.clone(), &self.base_url, self.auth_provider())
    }

    pub fn session(&self) -> (ChatSession, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let transport = HttpTransport::new(self.client.clone(), &self.base_url, self.auth_provider());
        ChatSession::new(
            Arc::new(transport),
            Arc::new(self.history()),
            self.auth_provider(),
            self.config.request_defaults(),
        )
    }

    /// Fail early with a hint instead of letting the backend answer 401.
    pub fn require_login(&self) -> Result<(), Box<dyn Error>> {
        if self.auth.is_authenticated() {
            return Ok(());
        }
        Err(format!(
            "Not logged in to {}. Run 'chatline login' first.",
            self.base_url
        )
        .into())
    }
}
