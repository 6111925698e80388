//! Chat listing and management commands

use std::error::Error;

use chrono::{DateTime, Local, Utc};

use crate::cli::backend::Backend;
use crate::core::message::{Message, Role};

fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub async fn list_chats(backend: &Backend) -> Result<(), Box<dyn Error>> {
    backend.require_login()?;
    let (mut session, _rx) = backend.session();
    session.load_chats().await?;
    let chats = session.store().chats();

    println!("💬 Chats on {}", backend.base_url);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if chats.is_empty() {
        println!("No chats yet. Start one with 'chatline say <message>'.");
        return Ok(());
    }

    for chat in chats {
        println!("  • {}", chat.title);
        println!("    ID: {}", chat.id);
        println!(
            "    Messages: {}   Updated: {}",
            chat.message_count,
            format_time(&chat.updated_at)
        );
        println!();
    }
    Ok(())
}

fn role_label(message: &Message) -> &'static str {
    match message.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
        Role::System => "System",
    }
}

pub async fn show_history(backend: &Backend, chat_id: &str) -> Result<(), Box<dyn Error>> {
    backend.require_login()?;
    let (mut session, _rx) = backend.session();
    session.load_chats().await?;
    session.select_chat(chat_id).await?;

    if let Some(chat) = session.store().chat(chat_id) {
        println!("💬 {}", chat.title);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!();
    }

    let messages = session.store().messages();
    if messages.is_empty() {
        println!("No messages in chat {chat_id}.");
        return Ok(());
    }

    for message in messages {
        println!(
            "{} ({}):",
            role_label(message),
            format_time(&message.timestamp)
        );
        println!("{}", message.content);
        println!();
    }
    Ok(())
}

pub async fn new_chat(backend: &Backend, title: &str) -> Result<(), Box<dyn Error>> {
    backend.require_login()?;
    let title = Some(title).filter(|title| !title.trim().is_empty());
    let (mut session, _rx) = backend.session();
    let chat = session.create_chat(title).await?;
    println!("✅ Created chat \"{}\" ({})", chat.title, chat.id);
    Ok(())
}

pub async fn delete_chat(backend: &Backend, chat_id: &str) -> Result<(), Box<dyn Error>> {
    backend.require_login()?;
    let (mut session, _rx) = backend.session();
    session.delete_chat(chat_id).await?;
    println!("✅ Deleted chat {chat_id}");
    Ok(())
}
