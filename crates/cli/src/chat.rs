use std::collections::HashSet;
use std::io::Write;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use threadline_api::{Command, Message, MessageRole};
use threadline_core::{MessageAccumulator, StreamUpdate, spawn_refresher};
use threadline_runtime_config::ClientConfig;

use crate::output::{print_history, print_thread_rows, print_tool_call, thread_rows, tool_call_for};
use crate::session::Session;

/// `threadline send`: one turn, streamed to stdout.
pub async fn run_send(config: ClientConfig, thread: Option<String>, text: String) -> Result<()> {
    let session = Session::connect(config)?;
    if let Some(id) = thread {
        session.runtime.switch_to_thread(&id).await?;
    }
    stream_turn(&session, vec![human(text)], None).await?;
    if let Some(id) = session.runtime.current_thread_id() {
        eprintln!("thread: {id}");
    }
    Ok(())
}

/// `threadline chat`: interactive loop with a live thread list.
pub async fn run_chat(config: ClientConfig, thread: Option<String>) -> Result<()> {
    let session = Session::connect(config)?;
    if let Some(id) = thread {
        let history = session.runtime.switch_to_thread(&id).await?;
        sync_active(&session);
        print_history(&session, &history);
    }

    let refresher = spawn_refresher(
        session.directory.clone(),
        session.refresh_interval(),
        session.runtime.watch_thread(),
    );
    println!("Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle_line(&session, line).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }

    refresher.shutdown().await;
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
/new             start a new thread
/threads         list threads (newest first)
/switch <n|id>   switch to a thread by list number or id
/resume <value>  resume an interrupted run (JSON or plain text)
/quit            exit";

async fn handle_line(session: &Session, line: &str) -> Result<Flow> {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => return Ok(Flow::Quit),
        "/help" => println!("{HELP}"),
        "/new" => {
            let id = session.runtime.switch_to_new_thread().await?;
            sync_active(session);
            println!("New thread {id}");
        }
        "/threads" => {
            let snapshot = session.directory.snapshot();
            if snapshot.loading {
                println!("(loading...)");
            }
            print_thread_rows(&thread_rows(&snapshot, &session.labeler));
        }
        "/switch" => {
            let id = resolve_thread_arg(session, arg)?;
            let history = session.runtime.switch_to_thread(&id).await?;
            sync_active(session);
            print_history(session, &history);
        }
        "/resume" => {
            if arg.is_empty() {
                bail!("/resume needs a value");
            }
            let value = serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()));
            stream_turn(session, Vec::new(), Some(Command::resume(value))).await?;
        }
        _ if command.starts_with('/') => bail!("Unknown command {command}; try /help"),
        _ => stream_turn(session, vec![human(line.to_string())], None).await?,
    }
    Ok(Flow::Continue)
}

/// A list number from `/threads`, or a raw thread id.
fn resolve_thread_arg(session: &Session, arg: &str) -> Result<String> {
    if arg.is_empty() {
        bail!("/switch needs a thread number or id");
    }
    if let Ok(n) = arg.parse::<usize>() {
        let snapshot = session.directory.snapshot();
        return match n.checked_sub(1).and_then(|i| snapshot.threads.get(i)) {
            Some(entry) => Ok(entry.thread_id().to_string()),
            None => bail!("No thread #{n} (list has {})", snapshot.threads.len()),
        };
    }
    Ok(arg.to_string())
}

fn sync_active(session: &Session) {
    session
        .directory
        .set_active_thread_id(session.runtime.current_thread_id());
}

fn human(text: String) -> Message {
    Message::human(text).with_id(uuid::Uuid::new_v4().to_string())
}

/// Send one turn and print assistant text as it streams. Tool results are
/// rendered once their answering tool message arrives.
pub async fn stream_turn(
    session: &Session,
    messages: Vec<Message>,
    command: Option<Command>,
) -> Result<()> {
    let mut stream = session.runtime.send_message(messages, command).await?;
    sync_active(session);

    let mut acc = MessageAccumulator::new(session.runtime.messages());
    let mut line_open = false;
    let mut rendered: HashSet<String> = HashSet::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = stream.next_event().await {
        let event = event?;
        match acc.apply(&event) {
            StreamUpdate::Delta { index, text } => {
                if acc.messages()[index].role.is_assistant() && !text.is_empty() {
                    print!("{text}");
                    stdout.flush().context("Failed to flush stdout")?;
                    line_open = true;
                }
            }
            StreamUpdate::Upserted(indices) => {
                for index in indices {
                    let message = &acc.messages()[index];
                    if message.role != MessageRole::Tool {
                        continue;
                    }
                    // Snapshots and node updates may both carry the same result.
                    let Some(call_id) = message.tool_call_id.clone() else {
                        continue;
                    };
                    if rendered.contains(&call_id) {
                        continue;
                    }
                    if let Some(call) = tool_call_for(message, acc.messages()) {
                        rendered.insert(call_id);
                        if line_open {
                            println!();
                            line_open = false;
                        }
                        print_tool_call(session, &call);
                    }
                }
            }
            StreamUpdate::RunStarted(run_id) => debug!("Run {run_id} started"),
            StreamUpdate::End => break,
            StreamUpdate::Error(_) | StreamUpdate::Replaced | StreamUpdate::Ignored => {}
        }
    }
    if line_open {
        println!();
    }

    let error = acc.error().map(str::to_string);
    session.runtime.record_messages(acc.into_messages());
    if let Some(message) = error {
        bail!("Run failed: {message}");
    }
    Ok(())
}
