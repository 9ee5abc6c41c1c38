use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod config;
mod conversation;
mod files;
mod format;
mod handler;
mod store;
mod tui;
mod ui;

use app::App;
use client::ChatClient;
use config::Config;
use store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let store = Store::open()?;
    init_tracing(store.dir())?;

    let client = ChatClient::new(
        config.resolved_api_url(),
        config.resolved_api_key(),
        config.resolved_model(),
    );
    let mut app = App::new(client, store);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "quill started");

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }

        poll_pending(app).await;
    }
    Ok(())
}

/// Resolve a finished chat request back onto the UI state. The join handle is
/// taken exactly once, so the typing placeholder is removed exactly once.
async fn poll_pending(app: &mut App) {
    let finished = app
        .pending
        .as_ref()
        .map(|task| task.is_finished())
        .unwrap_or(false);
    if !finished {
        return;
    }
    let Some(task) = app.pending.take() else { return };
    match task.await {
        Ok(Ok(reply)) => app.resolve_reply(reply),
        Ok(Err(err)) => app.fail_reply(&err),
        Err(err) => app.fail_reply(&err),
    }
}

/// The TUI owns stderr, so log lines go to a file in the data directory.
fn init_tracing(dir: &std::path::Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("quill.log"))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
