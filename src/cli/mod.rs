//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod account;
pub mod backend;
pub mod chats;
pub mod model_list;
pub mod say;

use std::error::Error;

use clap::{Parser, Subcommand};

use crate::auth::AuthError;
use crate::cli::backend::Backend;
use crate::core::config::data::Config;
use crate::core::config::defaults::SETTING_KEYS;
use crate::core::error::ChatError;
use crate::utils::logging::init_tracing;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    "\ndescribe: ",
    env!("VERGEN_GIT_DESCRIBE"),
    "\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser)]
#[command(name = "chatline")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Chat with a streaming backend from the terminal")]
#[command(
    long_about = "Chatline talks to a chat backend that streams replies as line-delimited JSON. \
It keeps your login in the system keyring and your settings in a small TOML file.\n\n\
Authentication:\n\
  Use 'chatline login' to sign in. The token is stored per backend URL.\n\n\
Environment Variables:\n\
  CHATLINE_API_URL   Backend URL (overrides the configured base-url)\n\
  CHATLINE_PASSWORD  Password used by 'chatline login' instead of prompting\n\
  CHATLINE_LOG       Log filter, e.g. 'chatline=debug' (default: warn)\n\n\
Controls:\n\
  Ctrl+C            Stop a reply that is still streaming"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Write diagnostics to this file instead of stderr
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,

    /// Backend URL for this invocation
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to the backend
    Login {
        /// Account email (prompted when omitted)
        email: Option<String>,
    },
    /// Log out and forget the stored token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List chats, newest first
    Chats,
    /// Print the messages of a chat
    History {
        chat_id: String,
    },
    /// Create an empty chat
    New {
        /// Chat title (defaults to "New Chat")
        #[arg(trailing_var_arg = true)]
        title: Vec<String>,
    },
    /// Delete a chat and its messages
    Delete {
        chat_id: String,
    },
    /// List models offered by the backend
    Models,
    /// Send one message and stream the reply to stdout
    Say {
        /// Continue an existing chat instead of starting a new one
        #[arg(short = 'c', long, value_name = "CHAT_ID")]
        chat: Option<String>,
        /// Model to use for this message
        #[arg(short = 'm', long)]
        model: Option<String>,
        #[arg(short = 't', long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Attach a file reference (repeatable)
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        files: Vec<String>,
        /// Message text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        message: Vec<String>,
    },
    /// Set configuration values, or show them when no value is given
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if let Err(err) = init_tracing(args.log.as_deref()) {
        eprintln!("⚠️  Logging disabled: {err}");
    }

    if let Err(err) = run(args).await {
        exit_with_error(err.as_ref());
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let base_url = args.base_url;
    match args.command {
        Commands::Set { key, value } => set_config(key, value),
        Commands::Unset { key } => {
            Config::mutate(|config| config.unset_value(&key))?;
            println!("✅ Unset {key}");
            Ok(())
        }
        Commands::Login { email } => {
            let backend = Backend::connect(base_url.as_deref())?;
            account::login(&backend, email).await
        }
        Commands::Logout => account::logout(&Backend::connect(base_url.as_deref())?).await,
        Commands::Whoami => account::whoami(&Backend::connect(base_url.as_deref())?).await,
        Commands::Chats => chats::list_chats(&Backend::connect(base_url.as_deref())?).await,
        Commands::History { chat_id } => {
            chats::show_history(&Backend::connect(base_url.as_deref())?, &chat_id).await
        }
        Commands::New { title } => {
            chats::new_chat(&Backend::connect(base_url.as_deref())?, &title.join(" ")).await
        }
        Commands::Delete { chat_id } => {
            chats::delete_chat(&Backend::connect(base_url.as_deref())?, &chat_id).await
        }
        Commands::Models => model_list::list_models(&Backend::connect(base_url.as_deref())?).await,
        Commands::Say {
            chat,
            model,
            temperature,
            max_tokens,
            files,
            message,
        } => {
            let backend = Backend::connect(base_url.as_deref())?;
            say::run_say(
                &backend,
                say::SayRequest {
                    chat_id: chat,
                    model,
                    temperature,
                    max_tokens,
                    files,
                    message: message.join(" "),
                },
            )
            .await
        }
    }
}

fn set_config(key: Option<String>, value: Vec<String>) -> Result<(), Box<dyn Error>> {
    let Some(key) = key else {
        Config::load()?.print_all();
        return Ok(());
    };
    if value.is_empty() {
        Config::load()?.print_all();
        eprintln!();
        eprintln!("Usage: chatline set <key> <value>");
        eprintln!("Keys: {}", SETTING_KEYS.join(", "));
        return Ok(());
    }

    let value = value.join(" ");
    Config::mutate(|config| config.set_value(&key, &value))?;
    println!("✅ Set {key} to: {value}");
    Ok(())
}

fn is_auth_expired(err: &(dyn Error + 'static)) -> bool {
    if let Some(chat_err) = err.downcast_ref::<ChatError>() {
        return chat_err.is_auth_expired();
    }
    matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::Request(ChatError::AuthExpired))
    )
}

fn exit_with_error(err: &(dyn Error + 'static)) -> ! {
    eprintln!("❌ {err}");
    if is_auth_expired(err) {
        eprintln!("💡 Run 'chatline login' to sign in again.");
    }
    std::process::exit(1);
}
