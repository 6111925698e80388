//! One-shot "say" command: send a message and stream the reply to stdout

use std::error::Error;
use std::io::{self, Write};

use crate::cli::backend::Backend;
use crate::core::generation::GenerationOutcome;
use crate::core::session::{ChatSession, SendOptions};

pub struct SayRequest {
    pub chat_id: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub files: Vec<String>,
    pub message: String,
}

/// Print whatever part of the streaming message has not been printed yet.
fn print_delta(
    session: &ChatSession,
    message_id: &str,
    printed: &mut usize,
    out: &mut impl Write,
) -> io::Result<()> {
    let Some(message) = session.store().message(message_id) else {
        return Ok(());
    };
    write_delta(&message.content, printed, out)
}

fn write_delta(content: &str, printed: &mut usize, out: &mut impl Write) -> io::Result<()> {
    if let Some(delta) = content.get(*printed..) {
        if !delta.is_empty() {
            out.write_all(delta.as_bytes())?;
            out.flush()?;
            *printed = content.len();
        }
    }
    Ok(())
}

pub async fn run_say(backend: &Backend, request: SayRequest) -> Result<(), Box<dyn Error>> {
    if request.message.trim().is_empty() {
        eprintln!("Usage: chatline say <message>");
        std::process::exit(1);
    }
    backend.require_login()?;

    let (mut session, mut rx) = backend.session();
    if let Some(chat_id) = &request.chat_id {
        session.select_chat(chat_id).await?;
    }

    let ticket = session.send(
        &request.message,
        SendOptions {
            model: request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            files: request.files,
        },
    )?;

    let mut stdout = io::stdout();
    let mut printed = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = rx.recv() => {
                let Some((message, stream_id)) = update else {
                    break;
                };
                let outcome = session.apply(stream_id, message);
                print_delta(&session, &ticket.assistant_message_id, &mut printed, &mut stdout)?;

                match outcome {
                    Some(GenerationOutcome::Completed { content, .. }) => {
                        write_delta(&content, &mut printed, &mut stdout)?;
                        println!();
                        break;
                    }
                    Some(GenerationOutcome::Failed(err)) => {
                        if printed > 0 {
                            println!();
                        }
                        return Err(err.into());
                    }
                    None => {}
                }
            }
            _ = &mut ctrl_c => {
                session.cancel();
                println!();
                eprintln!("⏹️  Stopped. Partial reply kept.");
                break;
            }
        }
    }

    Ok(())
}
