//! # rylie-chat
//!
//! Terminal client for a single chat thread. Every stdin line is sent to the
//! thread; new messages and connection changes are printed as they happen.
//! `/more` loads the next older history page.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use rylie_shared::constants::APP_NAME;

use rylie_client::{
    init_tracing, ChatClient, ClientConfig, Credential, CredentialProvider, Message, MessageId,
    SharedCredentials, ThreadId,
};

#[derive(Parser, Debug)]
#[command(name = "rylie-chat", version, about = "Chat with a Rylie thread from the terminal")]
struct Cli {
    /// Thread to open. Without it, the first line typed starts a new thread.
    #[arg(long)]
    thread: Option<String>,

    /// Bearer token for the chat backend.
    #[arg(long, env = "RYLIE_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    init_tracing();
    let cli = Cli::parse();

    info!("Starting {} chat v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let credentials: Arc<dyn CredentialProvider> = match cli.token {
        Some(token) => Arc::new(SharedCredentials::new(Credential::new(token))),
        None => Arc::new(SharedCredentials::signed_out()),
    };
    let client = ChatClient::new(config, credentials)?;

    // -----------------------------------------------------------------------
    // 3. Open or start the thread
    // -----------------------------------------------------------------------
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut view = match cli.thread {
        Some(id) => client
            .open_thread(ThreadId::new(id))
            .await
            .context("Could not open thread")?,
        None => {
            eprintln!("Type a message to start a new thread.");
            let Some(first) = next_message(&mut lines).await? else {
                return Ok(());
            };
            let (view, _) = client
                .start_thread(first, None)
                .await
                .context("Could not start thread")?;
            view
        }
    };
    println!("thread {}", view.thread_id());

    // -----------------------------------------------------------------------
    // 4. Event loop (blocks until stdin closes or Ctrl+C)
    // -----------------------------------------------------------------------
    let mut printed: HashSet<MessageId> = HashSet::new();
    print_new(&view.snapshot(), &mut printed);

    let mut snapshots = view.subscribe();
    let mut connection = view.watch_connection();
    let mut watching_connection = true;
    println!("[{}]", view.connection_state());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_new(&snapshot, &mut printed);
            }
            changed = connection.changed(), if watching_connection => {
                if changed.is_err() {
                    watching_connection = false;
                    continue;
                }
                let state = *connection.borrow_and_update();
                println!("[{state}]");
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }
                if line == "/more" {
                    match view.load_more().await {
                        Ok(0) => eprintln!("(no older messages)"),
                        Ok(_) => {}
                        Err(e) => eprintln!("could not load older messages: {e}"),
                    }
                    continue;
                }
                // Printed through the snapshot subscription once stored.
                if let Err(e) = view.send(line, None).await {
                    eprintln!("not sent: {e}");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // 5. Shutdown
    // -----------------------------------------------------------------------
    view.close().await;
    client.shutdown().await;
    Ok(())
}

/// Next non-blank stdin line, or `None` at end of input.
async fn next_message(lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<Option<String>> {
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
    Ok(None)
}

fn print_new(messages: &[Message], printed: &mut HashSet<MessageId>) {
    for message in messages {
        if printed.insert(message.id.clone()) {
            println!(
                "{} {:>9}: {}",
                message.created_at.format("%H:%M:%S"),
                message.sender.as_str(),
                message.content
            );
        }
    }
}
