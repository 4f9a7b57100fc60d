//! Terminal input thread and application event channel.
//!
//! [`EventHandler`] spawns an OS thread (not tokio task) because `crossterm::event::poll()`
//! blocks and would starve the async runtime.

use crate::model::{Build, BuildId};
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Tick,
    /// The terminal changed size; everything needs a redraw.
    Resize,
    /// A successfully fetched and parsed build resource. `seq` increases with
    /// every fetch the poller issues.
    Snapshot {
        seq: u64,
        build: Build,
    },
    /// Sent once, after the snapshot that carried a terminal state.
    PollTerminal {
        build_id: BuildId,
    },
    /// Polling gave up. Persistent, unlike `Error`.
    PollFatal(String),
    /// Global toast for local failures, auto-dismisses after `ERROR_TTL_SECS`.
    Error(String),
}

/// Reads terminal input on a dedicated thread and merges it with the poller's
/// events into one channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
    shutdown: Arc<AtomicBool>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let input_tx = tx.clone();
        let stop = shutdown.clone();
        std::thread::spawn(move || {
            if let Err(msg) = pump_input(&input_tx, &stop, tick_rate) {
                tracing::error!("input thread stopped: {msg}");
                // Receiver may already be gone during shutdown
                let _ = input_tx.send(AppEvent::Error(msg));
            }
        });

        Self { rx, tx, shutdown }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        // Not joined: the thread notices on its next poll timeout.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Forward key presses and resizes, and emit a `Tick` whenever `tick_rate` passes
/// without input. Returns `Ok` once the receiver is gone or shutdown is requested.
fn pump_input(
    tx: &mpsc::UnboundedSender<AppEvent>,
    shutdown: &AtomicBool,
    tick_rate: Duration,
) -> Result<(), String> {
    while !shutdown.load(Ordering::Relaxed) {
        let ready = event::poll(tick_rate).map_err(|e| format!("Terminal poll error: {e}"))?;
        let forwarded = if ready {
            match event::read() {
                Ok(CrosstermEvent::Key(key)) => AppEvent::Key(key),
                Ok(CrosstermEvent::Resize(..)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(format!("Terminal read error: {e}")),
            }
        } else {
            AppEvent::Tick
        };
        if tx.send(forwarded).is_err() {
            break;
        }
    }
    Ok(())
}
