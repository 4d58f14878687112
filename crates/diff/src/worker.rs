use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::budget::CancellationToken;
use crate::config::DiffOptions;
use crate::diff_result::DiffResult;
use crate::engine::{compute_diff_with, DiffControl};
use crate::error::DiffError;

/// Debounce used by editors that diff on every keystroke
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Result of one background computation
#[derive(Debug)]
pub struct DiffOutcome {
    /// Generation returned by the [`DiffWorker::submit`] call that produced it
    pub generation: u64,
    pub result: Result<DiffResult, DiffError>,
}

struct DiffRequest {
    old: String,
    new: String,
    options: DiffOptions,
    generation: u64,
    cancel: CancellationToken,
}

enum Message {
    Diff(Box<DiffRequest>),
    Shutdown,
}

/// Owns a background thread that computes diffs on request.
///
/// A burst of submissions within the debounce window collapses into one
/// computation of the newest request. Each submission gets a generation so
/// the host can drop outcomes that were superseded in flight.
pub struct DiffWorker {
    requests: Sender<Message>,
    outcomes: Receiver<DiffOutcome>,
    generation: Arc<AtomicU64>,
    /// Token of the most recently submitted request
    in_flight: Mutex<Option<CancellationToken>>,
    handle: Option<JoinHandle<()>>,
    debounce: Duration,
}

impl std::fmt::Debug for DiffWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffWorker")
            .field("generation", &self.latest_generation())
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl DiffWorker {
    /// Start the background thread
    pub fn spawn(debounce: Duration) -> Result<Self> {
        let (request_tx, request_rx) = channel();
        let (outcome_tx, outcome_rx) = channel();

        let handle = thread::Builder::new()
            .name("diff-worker".to_string())
            .spawn(move || run(request_rx, outcome_tx, debounce))
            .context("Failed to spawn diff worker thread")?;
        log::debug!("diff worker started with {debounce:?} debounce");

        Ok(Self {
            requests: request_tx,
            outcomes: outcome_rx,
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
            handle: Some(handle),
            debounce,
        })
    }

    /// Queue a comparison and return its generation.
    ///
    /// The previously submitted computation is cancelled; its outcome, if it
    /// still arrives, fails [`is_current`](Self::is_current).
    pub fn submit(
        &self,
        old: impl Into<String>,
        new: impl Into<String>,
        options: DiffOptions,
    ) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let cancel = CancellationToken::new();
        if let Some(previous) = self.in_flight.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        let request = DiffRequest {
            old: old.into(),
            new: new.into(),
            options,
            generation,
            cancel,
        };
        if let Err(e) = self.requests.send(Message::Diff(Box::new(request))) {
            log::error!("Failed to queue diff generation {generation}: {e}");
        }
        generation
    }

    /// The generation of the most recent submission, 0 before the first
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Check whether an outcome belongs to the most recent submission
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest_generation()
    }

    /// Wait up to `timeout` for the next outcome
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DiffOutcome> {
        self.outcomes.recv_timeout(timeout).ok()
    }

    /// Take the next outcome if one is ready
    pub fn try_recv(&self) -> Option<DiffOutcome> {
        self.outcomes.try_recv().ok()
    }

    /// Drain all ready outcomes and return the current one, if any
    pub fn poll_latest(&self) -> Option<DiffOutcome> {
        let mut latest = None;
        while let Some(outcome) = self.try_recv() {
            if self.is_current(outcome.generation) {
                latest = Some(outcome);
            } else {
                log::trace!("dropping stale diff generation {}", outcome.generation);
            }
        }
        latest
    }
}

impl Drop for DiffWorker {
    fn drop(&mut self) {
        if let Some(token) = self.in_flight.lock().take() {
            token.cancel();
        }
        let _ = self.requests.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("diff worker thread panicked");
            }
        }
        log::debug!("diff worker stopped");
    }
}

fn run(requests: Receiver<Message>, outcomes: Sender<DiffOutcome>, debounce: Duration) {
    while let Ok(Message::Diff(mut request)) = requests.recv() {
        // Keep replacing the request until the window passes quietly
        let mut quiet_until = Instant::now() + debounce;
        loop {
            let wait = quiet_until.saturating_duration_since(Instant::now());
            match requests.recv_timeout(wait) {
                Ok(Message::Diff(newer)) => {
                    log::trace!(
                        "diff generation {} superseded by {}",
                        request.generation,
                        newer.generation
                    );
                    request = newer;
                    quiet_until = Instant::now() + debounce;
                }
                Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => break,
            }
        }

        let DiffRequest {
            old,
            new,
            options,
            generation,
            cancel,
        } = *request;
        let control = DiffControl::new().generation(generation).cancellation(cancel);
        let result = compute_diff_with(&old, &new, &options, &control);
        if let Err(e) = &result {
            log::debug!("diff generation {generation} failed: {e}");
        }

        if outcomes.send(DiffOutcome { generation, result }).is_err() {
            return;
        }
    }
}
