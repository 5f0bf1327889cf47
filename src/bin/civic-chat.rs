//! Terminal chat client for a running Civic-AI backend.
//!
//! Commands: `/chats`, `/open <n>`, `/new`, `/delete`, `/image <path>`,
//! `/lang <code>`, `/quit`. Anything else is sent as a question.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use civic_ai_lib::client::render::{render_markdown, to_plain_text};
use civic_ai_lib::client::{ChatSession, HttpChatApi, ImageUpload, SendOutcome};
use civic_ai_lib::language;
use civic_ai_lib::models::{LoginRequest, Message, Sender, SignUpRequest};

const PROMPT: &str = "\x1b[1;34mcivic-ai>\x1b[0m ";

/// Chat with Civic-AI from the terminal.
///
/// Arguments fall back to environment variables when omitted.
#[derive(Parser, Debug)]
#[command(name = "civic-chat", version, about)]
struct Cli {
    /// Backend base URL [env: CIVIC_API_URL] [default: http://127.0.0.1:8000]
    #[arg(long, short = 'u')]
    url: Option<String>,

    /// Account email [env: CIVIC_EMAIL]
    #[arg(long, short = 'e')]
    email: Option<String>,

    /// Account password [env: CIVIC_PASSWORD]
    #[arg(long, short = 'p')]
    password: Option<String>,

    /// Create the account first, using this display name
    #[arg(long)]
    sign_up: Option<String>,

    /// Answer language code [default: en]
    #[arg(long, short = 'l', default_value = language::DEFAULT_LANGUAGE)]
    language: String,
}

fn print_message(message: &Message) {
    match message.sender {
        Sender::User => println!("\x1b[1myou:\x1b[0m {}", message.content),
        Sender::Ai => println!("{}", to_plain_text(&render_markdown(&message.content))),
    }
}

fn print_chats(session: &ChatSession<HttpChatApi>) {
    if session.chats().is_empty() {
        println!("(no chats yet)");
    }
    for (i, thread) in session.chats().iter().enumerate() {
        let marker = if Some(thread.chat.id) == session.active_chat() { "*" } else { " " };
        println!(
            "{} {:>2}. {} ({})",
            marker,
            i + 1,
            thread.chat.title,
            thread.chat.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
}

async fn handle_line(session: &mut ChatSession<HttpChatApi>, line: &str) -> anyhow::Result<bool> {
    let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
    let arg = arg.trim();
    match command {
        "/quit" | "/exit" => return Ok(false),
        "/chats" => {
            if let Err(e) = session.fetch_chats().await {
                println!("{}", e.user_message());
            }
            print_chats(session);
        }
        "/open" => {
            let index: usize = arg.parse().context("usage: /open <number>")?;
            let id = session
                .chats()
                .get(index.saturating_sub(1))
                .map(|t| t.chat.id)
                .context("no chat with that number")?;
            if let Err(e) = session.select_chat(id).await {
                println!("{}", e.user_message());
            }
            session.visible_messages().iter().for_each(print_message);
        }
        "/new" => {
            session.new_chat();
            println!("Started a new chat.");
        }
        "/delete" => match session.active_chat() {
            Some(id) => match session.delete_chat(id).await {
                Ok(()) => println!("Chat deleted."),
                Err(e) => println!("{}", e.user_message()),
            },
            None => println!("No chat is open."),
        },
        "/image" => {
            let upload = ImageUpload::from_path(&PathBuf::from(arg)).await?;
            match session.select_image(upload) {
                Ok(()) => println!("Image attached. Press enter to send it, or type a question about it."),
                Err(e) => println!("{}", e),
            }
        }
        "/lang" => match language::find(arg) {
            Some(lang) => {
                session.set_language(lang.code);
                println!("Answers will be in {}.", lang.label);
            }
            None => println!("Unknown language '{}'.", arg),
        },
        _ => {
            if session.send_message(line).await != SendOutcome::Ignored {
                // Either the answer or the error bubble.
                if let Some(last) = session.visible_messages().last() {
                    print_message(last);
                }
            }
        }
    }
    Ok(true)
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let url = cli
        .url
        .or_else(|| std::env::var("CIVIC_API_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
    let email = cli
        .email
        .or_else(|| std::env::var("CIVIC_EMAIL").ok())
        .context("an email is required (--email or CIVIC_EMAIL)")?;
    let password = cli
        .password
        .or_else(|| std::env::var("CIVIC_PASSWORD").ok())
        .context("a password is required (--password or CIVIC_PASSWORD)")?;

    let session = match cli.sign_up {
        Some(name) => HttpChatApi::sign_up(&url, &SignUpRequest { name, email, password }).await,
        None => HttpChatApi::sign_in(&url, &LoginRequest { email, password }).await,
    }
    .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("Signed in as {}.", session.user.email);
    let mut chat = ChatSession::new(HttpChatApi::new(url, session));
    chat.set_language(cli.language);

    if let Err(e) = chat.fetch_chats().await {
        println!("{}", e.user_message());
    }
    print_chats(&chat);
    chat.visible_messages().iter().for_each(print_message);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PROMPT);
        std::io::Write::flush(&mut std::io::stdout())?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() && chat.selected_image().is_none() {
            continue;
        }
        match handle_line(&mut chat, line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {:#}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(error) = run().await {
        eprintln!("error: {:#}", error);
        std::process::exit(1);
    }
}
