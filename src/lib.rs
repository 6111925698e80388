//! Chatline is a terminal client for chat backends that stream replies as
//! line-delimited JSON.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the chat engine: the stream decoder, the generation state
//!   machine, the chat store, the HTTP transport and history store, and the
//!   session that ties them together.
//! - [`auth`] defines the credential capability the engine consumes and the
//!   keyring-backed bearer token implementation.
//! - [`api`] defines the request and response payloads exchanged with the
//!   backend.
//! - [`utils`] holds URL joining and tracing setup.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod utils;
