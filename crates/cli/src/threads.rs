use anyhow::{Context, Result};
use threadline_runtime_config::ClientConfig;

use crate::output::{print_history, print_thread_rows, thread_rows};
use crate::session::Session;

/// `threadline threads`: fetch the directory once and list it.
pub async fn run_threads(config: ClientConfig, json: bool) -> Result<()> {
    let session = Session::connect(config)?;
    session.directory.fetch_threads().await;
    let rows = thread_rows(&session.directory.snapshot(), &session.labeler);

    if json {
        let out = serde_json::to_string_pretty(&rows).context("Failed to serialize threads")?;
        println!("{out}");
        return Ok(());
    }
    if rows.is_empty() {
        println!(
            "No threads found for assistant '{}' at {}.",
            session.config.server.assistant_id,
            session.client.base_url()
        );
        return Ok(());
    }
    print_thread_rows(&rows);
    Ok(())
}

/// `threadline show`: print one thread's messages.
pub async fn run_show(config: ClientConfig, thread_id: &str) -> Result<()> {
    let session = Session::connect(config)?;
    let messages = session.runtime.switch_to_thread(thread_id).await?;
    if messages.is_empty() {
        println!("Thread {thread_id} has no messages.");
        return Ok(());
    }
    print_history(&session, &messages);
    Ok(())
}

/// `threadline ping`: check the service is reachable.
pub async fn run_ping(config: ClientConfig) -> Result<()> {
    let session = Session::connect(config)?;
    session
        .client
        .health()
        .await
        .with_context(|| format!("{} is not reachable", session.client.base_url()))?;
    println!("ok: {}", session.client.base_url());
    Ok(())
}
