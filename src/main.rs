use anyhow::Context;
use log::{error, info, warn};
use movie_manager::communication::{MessageHandler, OutgoingMessage, Response};
use movie_manager::utils::PluginError;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr so it doesn't interfere with JSON communication
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("Starting movie-manager");

    let (outbox, mut outgoing) = mpsc::unbounded_channel::<Response>();

    // Single writer keeps protocol lines from interleaving
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(payload) = outgoing.recv().await {
            let line = OutgoingMessage::new(payload).to_line()?;
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<(), anyhow::Error>(())
    });

    outbox
        .send(Response::Startup { status: "ready".to_string() })
        .context("writer stopped before startup")?;

    let mut handler = MessageHandler::new(outbox);
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if handler.handle_line(&line).await {
                    break;
                }
            }
            Ok(None) => {
                info!("Host closed stdin");
                break;
            }
            Err(e) => {
                let err = PluginError::from(e);
                if err.is_recoverable() {
                    warn!("Skipping unreadable request: {}", err);
                    handler.report_error(&err);
                    continue;
                }
                error!("Error reading from stdin: {}", err);
                break;
            }
        }
    }

    if !handler.is_shut_down() {
        if let Err(e) = handler.shutdown().await {
            error!("Failed to flush settings on exit: {}", e);
        }
    }

    // Dropping the handler closes the outbox so the writer can finish
    drop(handler);
    writer.await.context("writer task panicked")??;

    info!("Message loop ended, shutting down");
    Ok(())
}
