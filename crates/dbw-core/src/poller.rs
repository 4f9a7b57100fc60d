//! Background polling loop for a single build.
//!
//! The poller fetches the build resource on a fixed interval and forwards every
//! successfully parsed snapshot to the event loop, tagged with a sequence number that
//! increases with each fetch it issues. At most one fetch is outstanding: a tick that
//! fires while the previous fetch is still running is skipped.
//!
//! Polling stops for good when a snapshot reports a terminal state, when the build does
//! not exist, when more than `max_retries` consecutive fetches fail, or when the
//! [`CancelHandle`] is used or dropped. Cancellation drops the in-flight fetch, so its
//! result is never delivered.
//!
//! On consecutive failures, exponential backoff (`base × 2^failures`) is applied up
//! to `MAX_BACKOFF_SECS` (5 minutes). The backoff resets to the base interval on the next
//! successful poll.

use crate::error::FetchError;
use crate::events::AppEvent;
use crate::model::{Build, BuildId};
use crate::parser::parse_build;
use crate::traits::StatusEndpoint;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration, Instant};

/// 5 minutes — the longest a user should wait between automatic retries.
const MAX_BACKOFF_SECS: u64 = 300;

/// Compute backoff delay: `min(base_interval * 2^failures, MAX_BACKOFF_SECS)`.
pub fn backoff_delay(base_interval: u64, failures: u32) -> u64 {
    let multiplier = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
    base_interval
        .saturating_mul(multiplier)
        .clamp(1, MAX_BACKOFF_SECS)
}

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval_secs: u64,
    /// Consecutive failed fetches tolerated before giving up.
    pub max_retries: u32,
}

/// Why [`StatusPoller::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollExit {
    Terminal,
    Cancelled,
    Fatal(FetchError),
    ChannelClosed,
}

/// Stops the poller. Dropping the handle has the same effect as [`CancelHandle::cancel`].
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Receiver gone means the poller already exited.
        let _ = self.tx.send(true);
    }
}

type InFlight = Pin<Box<dyn Future<Output = (u64, Result<Build, FetchError>)> + Send>>;

pub struct StatusPoller {
    endpoint: Arc<dyn StatusEndpoint>,
    build_id: BuildId,
    config: PollerConfig,
    tx: mpsc::UnboundedSender<AppEvent>,
    cancel_rx: watch::Receiver<bool>,
    initial_delay: Duration,
}

enum Step {
    Continue(Duration),
    Exit(PollExit),
}

impl StatusPoller {
    pub fn new(
        endpoint: Arc<dyn StatusEndpoint>,
        build_id: BuildId,
        config: PollerConfig,
        tx: mpsc::UnboundedSender<AppEvent>,
    ) -> (Self, CancelHandle) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let poller = Self {
            endpoint,
            build_id,
            config,
            tx,
            cancel_rx,
            initial_delay: Duration::ZERO,
        };
        (poller, CancelHandle { tx: cancel_tx })
    }

    /// Postpone the first fetch, e.g. when a snapshot was already loaded at startup.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub async fn run(self) -> PollExit {
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut cancel = self.cancel_rx.clone();
        let mut failures: u32 = 0;
        let mut seq: u64 = 0;
        let mut in_flight: Option<InFlight> = None;

        let tick = time::sleep(self.initial_delay);
        tokio::pin!(tick);

        loop {
            tokio::select! {
                biased;

                () = cancelled(&mut cancel) => {
                    tracing::debug!(build_id = %self.build_id, "polling cancelled");
                    return PollExit::Cancelled;
                }

                (fetch_seq, result) = settle(&mut in_flight) => {
                    in_flight = None;
                    match self.handle_result(fetch_seq, result, &mut failures) {
                        Step::Continue(delay) => tick.as_mut().reset(Instant::now() + delay),
                        Step::Exit(exit) => return exit,
                    }
                }

                () = &mut tick => {
                    if in_flight.is_some() {
                        tracing::debug!(build_id = %self.build_id, "previous fetch still running, skipping tick");
                    } else {
                        seq += 1;
                        in_flight = Some(self.start_fetch(seq));
                    }
                    tick.as_mut().reset(Instant::now() + interval);
                }
            }
        }
    }

    fn start_fetch(&self, seq: u64) -> InFlight {
        let endpoint = Arc::clone(&self.endpoint);
        let build_id = self.build_id.clone();
        tracing::debug!(%build_id, seq, "fetching build");
        Box::pin(async move {
            let result = endpoint
                .fetch_build(&build_id)
                .await
                .and_then(|body| parse_build(&body));
            (seq, result)
        })
    }

    fn handle_result(
        &self,
        seq: u64,
        result: Result<Build, FetchError>,
        failures: &mut u32,
    ) -> Step {
        match result {
            Ok(build) => {
                *failures = 0;
                let terminal = build.state.is_terminal();
                let build_id = build.id.clone();
                if self.tx.send(AppEvent::Snapshot { seq, build }).is_err() {
                    return Step::Exit(PollExit::ChannelClosed);
                }
                if terminal {
                    tracing::info!(%build_id, seq, "build reached a terminal state, polling stopped");
                    if self.tx.send(AppEvent::PollTerminal { build_id }).is_err() {
                        tracing::warn!("poller: channel closed before terminal notice");
                    }
                    return Step::Exit(PollExit::Terminal);
                }
                Step::Continue(Duration::from_secs(self.config.interval_secs.max(1)))
            }
            Err(e) if e.is_fatal() => self.give_up(e),
            Err(e) => {
                *failures = failures.saturating_add(1);
                if *failures > self.config.max_retries {
                    return self.give_up(FetchError::RetriesExhausted {
                        attempts: *failures,
                        last: e.to_string(),
                    });
                }
                let delay = backoff_delay(self.config.interval_secs, *failures);
                tracing::warn!(
                    build_id = %self.build_id,
                    seq,
                    failures = *failures,
                    malformed = matches!(e, FetchError::Malformed(_)),
                    "fetch failed, retrying in {delay}s: {e}"
                );
                Step::Continue(Duration::from_secs(delay))
            }
        }
    }

    fn give_up(&self, error: FetchError) -> Step {
        tracing::error!(build_id = %self.build_id, "polling stopped: {error}");
        if self.tx.send(AppEvent::PollFatal(error.to_string())).is_err() {
            return Step::Exit(PollExit::ChannelClosed);
        }
        Step::Exit(PollExit::Fatal(error))
    }
}

/// Resolves once cancel is requested or the handle is dropped.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

/// Resolves with the in-flight fetch, or never when nothing is outstanding.
async fn settle(in_flight: &mut Option<InFlight>) -> (u64, Result<Build, FetchError>) {
    match in_flight.as_mut() {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}
