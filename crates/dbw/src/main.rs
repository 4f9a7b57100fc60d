mod cli;
mod executor;

use dbw_core::app;
use dbw_core::diff;
use dbw_core::events;
use dbw_core::input;
use dbw_core::model::BuildId;
#[cfg(feature = "desktop-notify")]
use dbw_core::notify;
use dbw_core::poller::{PollerConfig, StatusPoller};
use dbw_core::traits::StatusEndpoint;
use dbw_core::tui;

use app::{AppConfig, BuildViewModel};
use clap::Parser;
use cli::Cli;
use color_eyre::eyre::{eyre, Result};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use events::{AppEvent, EventHandler};
use executor::HttpEndpoint;
use input::{Action, InputContext};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tui::startup::SnapshotSource;

fn setup_verbose_logging() -> Result<()> {
    let state_dir = dirs_next_or_fallback();
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| eyre!("Failed to create log directory {state_dir:?}: {e}"))?;
    let log_path = state_dir.join("debug.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    tracing::info!(
        "dbw v{} starting with verbose logging",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn dirs_next_or_fallback() -> std::path::PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
        std::path::PathBuf::from(state).join("dbw")
    } else if let Some(home) = std::env::var_os("HOME") {
        std::path::PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("dbw")
    } else {
        std::path::PathBuf::from("/tmp/dbw")
    }
}

fn spawn_monitored(
    tx: tokio::sync::mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                match join_err.into_panic().downcast::<String>() {
                    Ok(s) => *s,
                    Err(payload) => match payload.downcast::<&str>() {
                        Ok(s) => s.to_string(),
                        Err(_) => "unknown panic".to_string(),
                    },
                }
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, SetTitle(""))?;
    terminal.show_cursor()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    if args.verbose {
        setup_verbose_logging()?;
    }

    cli::validate_build_id(&args.build_id).map_err(|e| eyre!("{e}"))?;
    let build_id = BuildId::new(args.build_id.clone());

    // Read before entering the alternate screen so errors print normally
    let snapshot = match &args.snapshot {
        Some(path) => {
            let contents = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| eyre!("Failed to read snapshot {path:?}: {e}"))?;
            Some(SnapshotSource {
                label: path.display().to_string(),
                contents,
            })
        }
        None => None,
    };

    let endpoint: Arc<dyn StatusEndpoint> = Arc::new(HttpEndpoint::new(
        args.endpoint.clone(),
        Duration::from_secs(args.timeout),
    )?);

    // Setup terminal with panic hook early, before any data fetching
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("Failed to disable raw mode during panic: {e}");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, SetTitle("")) {
            eprintln!("Failed to leave alternate screen during panic: {e}");
        }
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let startup_result =
        match tui::startup::run_startup(&mut terminal, &*endpoint, &build_id, snapshot).await {
            Ok(result) => result,
            Err(e) => {
                restore_terminal(&mut terminal)?;
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        };

    execute!(io::stdout(), SetTitle(format!("dbw #{build_id}")))?;

    let version_string = format!("v{}+{}", env!("CARGO_PKG_VERSION"), env!("BUILD_NUMBER"));

    let mut state = BuildViewModel::new(AppConfig {
        build_id: build_id.clone(),
        version_string,
    });
    state.poll_interval = args.interval;
    state.desktop_notify = !args.no_notify;

    // Redraw only after something visible changed
    let dirty = Arc::new(AtomicBool::new(true));
    let dirty_flag = dirty.clone();
    state.subscribe(move |regions| {
        tracing::trace!(?regions, "view model changed");
        dirty_flag.store(true, Ordering::Relaxed);
    });

    let mut initial_is_terminal = false;
    let had_initial = startup_result.build.is_some();
    if let Some(build) = startup_result.build {
        initial_is_terminal = build.state.is_terminal();
        state.ingest(build);
    }

    let events = EventHandler::new(Duration::from_millis(100));
    let tx = events.sender();

    // A build that was already over at startup is never polled
    let cancel = if initial_is_terminal {
        tracing::info!(%build_id, "build already finished, not polling");
        state.polling_stopped = true;
        None
    } else {
        let config = PollerConfig {
            interval_secs: args.interval,
            max_retries: args.max_retries,
        };
        let (poller, cancel) = StatusPoller::new(endpoint.clone(), build_id, config, tx.clone());
        let poller = if had_initial {
            poller.with_initial_delay(Duration::from_secs(args.interval))
        } else {
            poller
        };
        spawn_monitored(tx.clone(), "poller", async move {
            let exit = poller.run().await;
            tracing::info!(?exit, "poller exited");
        });
        Some(cancel)
    };

    let result = run_app(&mut terminal, &mut state, events, &tx, &endpoint, &dirty).await;

    if let Some(cancel) = cancel {
        cancel.cancel();
    }
    restore_terminal(&mut terminal)?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut BuildViewModel,
    mut events: EventHandler,
    tx: &tokio::sync::mpsc::UnboundedSender<AppEvent>,
    endpoint: &Arc<dyn StatusEndpoint>,
    dirty: &AtomicBool,
) -> Result<()> {
    let mut poll_start = Instant::now();

    loop {
        if dirty.swap(false, Ordering::Relaxed) {
            terminal.draw(|f| tui::render::render(f, state))?;
        }

        let Some(event) = events.next().await else {
            return Ok(());
        };

        match event {
            AppEvent::Key(key) => {
                let ctx = InputContext {
                    has_error: state.error_message().is_some(),
                    has_overlay: state.has_overlay(),
                };
                let overlay_height = terminal
                    .size()
                    .map(|s| tui::output_overlay::visible_height(s.height))
                    .unwrap_or_else(|e| {
                        tracing::warn!("terminal size query failed: {e}");
                        20
                    });
                handle_action(input::map_key(key, &ctx), state, endpoint, overlay_height);
                dirty.store(true, Ordering::Relaxed);
            }
            AppEvent::Tick => {
                state.advance_spinner();
                if !state.polling_stopped {
                    let elapsed = poll_start.elapsed().as_secs();
                    state.next_poll_in = state.poll_interval.saturating_sub(elapsed);
                }
                let had_transients =
                    !state.notifications.is_empty() || state.error_message().is_some();
                state.prune_notifications();
                state.prune_error();
                // Spinner and countdown only move while the build runs
                if !state.finished() || had_transients {
                    dirty.store(true, Ordering::Relaxed);
                }
            }
            AppEvent::Resize => dirty.store(true, Ordering::Relaxed),
            AppEvent::Snapshot { seq, build } => {
                let previous = state.build().cloned();
                if state.apply(seq, build) {
                    diff::detect_changes(state, previous.as_ref());
                    poll_start = Instant::now();
                    dirty.store(true, Ordering::Relaxed);
                }
            }
            AppEvent::PollTerminal { build_id } => {
                tracing::info!(%build_id, "polling finished");
                state.polling_stopped = true;
                state.next_poll_in = 0;
                if state.desktop_notify {
                    send_desktop_notification(state, tx);
                }
                dirty.store(true, Ordering::Relaxed);
            }
            AppEvent::PollFatal(msg) => {
                state.set_fatal(msg);
                state.next_poll_in = 0;
            }
            AppEvent::Error(e) => {
                state.set_error(e);
                dirty.store(true, Ordering::Relaxed);
            }
        }

        if state.should_quit {
            return Ok(());
        }
    }
}

fn handle_action(
    action: Action,
    state: &mut BuildViewModel,
    endpoint: &Arc<dyn StatusEndpoint>,
    overlay_height: usize,
) {
    match action {
        Action::Quit => state.should_quit = true,
        Action::DismissError => state.clear_error(),
        Action::MoveUp => state.move_cursor_up(),
        Action::MoveDown => state.move_cursor_down(),
        Action::Toggle => {
            if state.is_legacy() {
                state.show_legacy_output();
            } else {
                state.toggle_current();
            }
        }
        Action::QuickSelect(n) => state.select(n - 1),
        Action::OpenDocs => match state.docs_url().map(str::to_string) {
            Some(url) => {
                if let Err(e) = endpoint.open_in_browser(&url) {
                    state.set_error(format!("{e}"));
                }
            }
            None => state.set_error(
                "Docs link is available once the build finishes successfully".to_string(),
            ),
        },
        Action::OpenCommit => {
            match state.build().and_then(|b| b.commit_url.clone()) {
                Some(url) => {
                    if let Err(e) = endpoint.open_in_browser(&url) {
                        state.set_error(format!("{e}"));
                    }
                }
                None => state.set_error("No commit link for this build".to_string()),
            }
        }
        Action::ViewOutput => {
            if state.is_legacy() {
                state.show_legacy_output();
            }
            if !state.open_output_overlay() {
                state.set_error("No output to show".to_string());
            }
        }
        Action::CloseOverlay => state.close_overlay(),
        Action::ScrollUp => state.scroll_overlay_up(1),
        Action::ScrollDown => state.scroll_overlay_down(1, overlay_height),
        Action::PageUp => state.scroll_overlay_up(overlay_height),
        Action::PageDown => state.scroll_overlay_down(overlay_height, overlay_height),
        Action::ScrollToTop => state.scroll_overlay_to_top(),
        Action::ScrollToBottom => state.scroll_overlay_to_bottom(overlay_height),
        Action::None => {}
    }
}

#[cfg(feature = "desktop-notify")]
fn send_desktop_notification(
    state: &BuildViewModel,
    tx: &tokio::sync::mpsc::UnboundedSender<AppEvent>,
) {
    let Some(build) = state.build().cloned() else {
        return;
    };
    let tx = tx.clone();
    tokio::task::spawn_blocking(move || {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            notify::send_desktop(&build);
        }));
        if let Err(panic_payload) = result {
            let msg = panic_payload
                .downcast::<String>()
                .map(|s| *s)
                .unwrap_or_else(|p| {
                    p.downcast::<&str>()
                        .map_or_else(|_| "unknown panic".to_string(), |s| (*s).to_string())
                });
            tracing::error!("notify panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("Notification crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("notify: channel closed");
            }
        }
    });
}

#[cfg(not(feature = "desktop-notify"))]
fn send_desktop_notification(
    _state: &BuildViewModel,
    _tx: &tokio::sync::mpsc::UnboundedSender<AppEvent>,
) {
}
