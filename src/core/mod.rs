pub mod chat_store;
pub mod chat_stream;
pub mod config;
pub mod error;
pub mod generation;
pub mod history;
pub mod keyring;
pub mod message;
pub mod session;
pub mod stream_decoder;
pub mod transport;
