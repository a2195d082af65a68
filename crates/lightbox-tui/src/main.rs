use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use lightbox_client::{CacheKey, KeyBus, RemoteCache, ViewerController};
use lightbox_core::MediaKind;
use lightbox_service::{HttpService, MediaService};
use lightbox_store::Materializer;
use lightbox_tui::app::{App, AppAction};
use lightbox_tui::commands;
use lightbox_tui::config::{CliConfig, Command};
use lightbox_tui::gate::AdminGate;
use lightbox_tui::terminal::TerminalGuard;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let config = CliConfig::parse();

    // Keep log lines off the full-screen viewer unless asked for.
    let default_level = match config.command {
        Command::View { .. } => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if config.command.is_mutating() {
        AdminGate::new(config.admin_password.clone()).require(config.password.as_deref())?;
    }
    let queue_config = config.queue_config()?;

    let service: Arc<dyn MediaService> = Arc::new(match &config.api_key {
        Some(key) => HttpService::with_api_key(&config.server_url, key.clone()),
        None => HttpService::new(&config.server_url),
    });
    let cache = Arc::new(RemoteCache::new(service));
    cache
        .connect()
        .await
        .with_context(|| format!("cannot reach {}", config.server_url))?;

    let mut stdout = io::stdout();
    let notice = match &config.command {
        Command::Upload { files, .. } => Some(
            commands::upload(&mut stdout, cache, MediaKind::Image, files, queue_config).await?,
        ),
        Command::UploadDoc { file } => Some(
            commands::upload(
                &mut stdout,
                cache,
                MediaKind::Document,
                std::slice::from_ref(file),
                queue_config,
            )
            .await?,
        ),
        Command::List => {
            commands::list(&mut stdout, &cache).await?;
            None
        }
        Command::Remove { index } => Some(commands::remove(&cache, *index).await),
        Command::Clear { document } => Some(commands::clear(&cache, *document).await),
        Command::View { document } => {
            let key = if *document {
                CacheKey::Document
            } else {
                CacheKey::Images
            };
            run_viewer(cache, key).await?;
            None
        }
    };

    match notice {
        Some(notice) if notice.is_error() => bail!("{notice}"),
        Some(notice) => println!("{notice}"),
        None => {}
    }
    Ok(())
}

async fn run_viewer(cache: Arc<RemoteCache>, key: CacheKey) -> Result<()> {
    // Dropped after the terminal, on every exit path.
    let _guard = TerminalGuard::enter(io::stdout())?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::unbounded_channel();
    let reader = spawn_key_reader(tx, stop.clone());

    let controller = ViewerController::new(key, cache, Materializer::default());
    let app = App::new(controller, KeyBus::new());
    let result = event_loop(&mut terminal, app, rx).await;

    stop.store(true, Ordering::SeqCst);
    let _ = reader.join();
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut keys: mpsc::UnboundedReceiver<KeyEvent>,
) -> Result<()> {
    app.refresh(false).await;
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    loop {
        terminal.draw(|frame| app.render(frame))?;

        tokio::select! {
            key = keys.recv() => {
                let Some(key) = key else { break };
                match app.handle_key(key) {
                    AppAction::Quit => break,
                    AppAction::Refresh => app.refresh(true).await,
                    AppAction::None => {}
                }
            }
            // Key navigation and preview loads land asynchronously.
            _ = redraw.tick() => {}
        }
    }
    Ok(())
}

/// crossterm's reader blocks, so it runs on its own thread and forwards
/// key presses to the async loop.
fn spawn_key_reader(
    tx: mpsc::UnboundedSender<KeyEvent>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            match event::poll(REDRAW_INTERVAL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if tx.send(key).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        }
    })
}
