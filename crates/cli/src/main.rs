mod chat;
mod config;
mod output;
mod render_cmd;
mod session;
mod threads;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use threadline_runtime_config::ThemePreference;

#[derive(Parser)]
#[command(
    name = "threadline",
    version,
    about = "threadline - chat with a graph-execution service from the terminal"
)]
struct Cli {
    /// Log threadline internals at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List threads for the configured assistant, newest first
    Threads {
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the messages of one thread
    Show {
        /// Thread id
        thread_id: String,
    },

    /// Send one message and stream the reply
    Send {
        /// Continue an existing thread instead of creating one
        #[arg(long)]
        thread: Option<String>,

        /// Message text
        message: String,
    },

    /// Interactive chat with a live thread list
    Chat {
        /// Start on an existing thread
        #[arg(long)]
        thread: Option<String>,
    },

    /// Render a tool invocation the way chat shows it
    RenderTool {
        /// Tool name, e.g. sql_db_query
        #[arg(long)]
        name: String,

        /// Raw argument text (usually JSON)
        #[arg(long, default_value = "{}")]
        args: String,

        /// Result text
        #[arg(long, conflicts_with = "result_file")]
        result: Option<String>,

        /// Read the result text from a file
        #[arg(long)]
        result_file: Option<PathBuf>,

        /// Treat the result as a JSON value
        #[arg(long)]
        json_result: bool,

        /// Emit HTML instead of terminal text
        #[arg(long)]
        html: bool,

        /// light, dark or auto
        #[arg(long, default_value = "auto")]
        theme: String,

        /// Show collapsed panels expanded
        #[arg(long)]
        expand: bool,
    },

    /// Show or set configuration
    Config {
        /// Set the API root URL (empty string clears it)
        #[arg(long)]
        url: Option<String>,

        /// Set the origin used when no URL is set
        #[arg(long)]
        origin: Option<String>,

        /// Set the assistant (graph) id
        #[arg(long)]
        assistant_id: Option<String>,

        /// Set the theme: light, dark or auto
        #[arg(long)]
        theme: Option<String>,
    },

    /// Check that the API is reachable
    Ping,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose {
        for target in ["threadline", "threadline_core", "threadline_api_client"] {
            if let Ok(directive) = format!("{target}=debug").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli.command).await;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Threads { json } => threads::run_threads(config::resolve_config()?, json).await,
        Commands::Show { thread_id } => {
            threads::run_show(config::resolve_config()?, &thread_id).await
        }
        Commands::Send { thread, message } => {
            chat::run_send(config::resolve_config()?, thread, message).await
        }
        Commands::Chat { thread } => chat::run_chat(config::resolve_config()?, thread).await,
        Commands::RenderTool {
            name,
            args,
            result,
            result_file,
            json_result,
            html,
            theme,
            expand,
        } => {
            let theme = parse_theme(&theme)?;
            let colorfgbg = std::env::var("COLORFGBG").ok();
            render_cmd::run_render(render_cmd::RenderArgs {
                name,
                args,
                result,
                result_file,
                json_result,
                html,
                dark: theme.is_dark(colorfgbg.as_deref()),
                expand,
            })
        }
        Commands::Config {
            url,
            origin,
            assistant_id,
            theme,
        } => {
            let update = config::ConfigUpdate {
                url,
                origin,
                assistant_id,
                theme: theme.as_deref().map(parse_theme).transpose()?,
            };
            if update.is_empty() {
                config::show_config()
            } else {
                config::set_config(update)
            }
        }
        Commands::Ping => threads::run_ping(config::resolve_config()?).await,
    }
}

fn parse_theme(value: &str) -> anyhow::Result<ThemePreference> {
    ThemePreference::parse(value)
        .ok_or_else(|| anyhow::anyhow!("Unknown theme '{value}' (expected light, dark or auto)"))
}
