//! taskfeed - follow a running task's event stream from the terminal
//!
//! - `watch` connects to a task, prints events as they arrive and exports a
//!   snapshot when the session ends
//! - `render` turns a snapshot's writer output into a standalone HTML page
//! - `views` summarizes the derived views of a snapshot

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use taskfeed_client::backend::WsConnector;
use taskfeed_client::config::{self, Settings};
use taskfeed_client::protocol::Event;
use taskfeed_client::render::{html, ProseRenderer};
use taskfeed_client::snapshot::load_snapshot;
use taskfeed_client::{logging, views, ConnectionStatus, MessageStore};

/// How often `watch` checks the store for new events
const POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Longest content preview printed per event
const PREVIEW_CHARS: usize = 100;

#[derive(Parser)]
#[command(name = "taskfeed")]
#[command(about = "Follow and render multi-agent task event streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a task's events until it disconnects or the duration elapses
    Watch {
        /// Task identifier
        task_id: String,

        /// WebSocket base URL (overrides settings and TASKFEED_WS_URL)
        #[arg(long)]
        url: Option<String>,

        /// Snapshot replayed before live events
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Directory for the exported snapshot
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Render a snapshot's writer messages to HTML
    Render {
        /// Snapshot file produced by `watch`
        snapshot: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Summarize the derived views of a snapshot
    Views {
        /// Snapshot file produced by `watch`
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match config::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Using default settings: {}", e);
            Settings::default()
        }
    }
    .with_env_overrides();
    logging::init(&settings.log_filter);

    match cli.command {
        Commands::Watch {
            task_id,
            url,
            fixture,
            export_dir,
            duration,
        } => {
            let mut settings = settings;
            if let Some(url) = url {
                settings.ws_base_url = url;
            }
            if fixture.is_some() {
                settings.fixture = fixture;
            }
            if export_dir.is_some() {
                settings.export_dir = export_dir;
            }
            watch(settings, &task_id, duration.map(Duration::from_secs))
        }
        Commands::Render { snapshot, out } => render(&snapshot, out.as_deref()),
        Commands::Views { snapshot } => summarize(&snapshot),
    }
}

fn watch(settings: Settings, task_id: &str, duration: Option<Duration>) -> Result<()> {
    let export_dir = settings.resolved_export_dir();
    let mut store = MessageStore::with_settings(Arc::new(WsConnector::new()), settings);
    store
        .begin(task_id)
        .with_context(|| format!("Failed to start session for task {}", task_id))?;

    let started = Instant::now();
    let mut printed = 0;
    loop {
        let events = store.events();
        for event in &events[printed..] {
            println!("{}", describe(event));
        }
        printed = events.len();

        match store.status() {
            ConnectionStatus::Disconnected(reason) => {
                eprintln!("Disconnected: {}", reason);
                break;
            }
            ConnectionStatus::Failed(reason) => {
                eprintln!("Connection failed: {}", reason);
                break;
            }
            _ => {}
        }
        if duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    store.end();

    if store.malformed_count() > 0 {
        warn!(count = store.malformed_count(), "malformed payloads were dropped");
    }
    if store.is_empty() {
        return Ok(());
    }
    let path = store
        .export_to_dir(&export_dir)
        .context("Failed to export snapshot")?;
    eprintln!("Saved {} events to {}", store.len(), path.display());
    Ok(())
}

fn render(snapshot: &Path, out: Option<&Path>) -> Result<()> {
    let events = load_snapshot(snapshot)?;
    let body = ProseRenderer::default().render_writer_feed(&events);
    let title = snapshot
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "taskfeed".to_string());
    let page = html::document(&title, &body);

    match out {
        Some(path) => std::fs::write(path, page)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", page),
    }
    Ok(())
}

fn summarize(snapshot: &Path) -> Result<()> {
    let events = load_snapshot(snapshot)?;
    println!("events:  {}", events.len());
    println!("chat:    {}", views::chat_view(&events).len());
    println!("coder:   {}", views::coder_view(&events).len());
    println!("writer:  {}", views::writer_view(&events).len());

    let files = views::current_files(&events);
    if files.is_empty() {
        println!("files:   (none)");
    } else {
        let names: Vec<&str> = files.iter().map(|f| f.as_str()).collect();
        println!("files:   {}", names.join(", "));
    }
    Ok(())
}

fn describe(event: &Event) -> String {
    let preview = event.content().map(preview).unwrap_or_default();
    format!("[{}] {} {}", event.kind(), event.id(), preview)
}

fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    let mut short: String = line.chars().take(PREVIEW_CHARS).collect();
    if short.len() < line.len() || content.lines().nth(1).is_some() {
        short.push_str("...");
    }
    short
}
