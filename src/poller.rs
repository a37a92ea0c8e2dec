use std::{
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, warn};
use thiserror::Error;

use crate::model::RawRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("daemon unreachable: {0}")]
    Unreachable(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Anything that can produce a complete batch of torrent records.
pub trait SnapshotSource: Send + 'static {
    fn poll(&self) -> Result<Vec<RawRecord>, PollError>;
}

/// Poll period that doubles on each consecutive failure, capped at the
/// ceiling, and snaps back to the base after a success.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    current: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
            current: base,
            failures: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.current
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        self.current
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.current = self.base;
    }
}

/// Sending half of a one-slot channel where a newer value evicts an unread
/// older one instead of queueing behind it.
pub struct LatestSender<T> {
    tx: Sender<T>,
    drain: Receiver<T>,
}

pub fn latest_channel<T>() -> (LatestSender<T>, Receiver<T>) {
    let (tx, rx) = bounded(1);
    (
        LatestSender {
            tx,
            drain: rx.clone(),
        },
        rx,
    )
}

impl<T> LatestSender<T> {
    /// Returns true when an unread value was discarded to make room.
    pub fn publish(&self, value: T) -> bool {
        let mut value = value;
        let mut replaced = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(pending)) => {
                    replaced |= self.drain.try_recv().is_ok();
                    value = pending;
                }
                Err(TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    Refresh,
}

#[derive(Debug)]
pub struct PollReport {
    pub result: Result<Vec<RawRecord>, PollError>,
    pub consecutive_failures: u32,
    pub retry_in: Duration,
    pub finished_at: Instant,
}

pub fn spawn_poller<S: SnapshotSource>(
    source: S,
    commands: Receiver<PollCommand>,
    reports: LatestSender<PollReport>,
    backoff: Backoff,
) -> thread::JoinHandle<()> {
    thread::spawn(move || poll_loop(source, commands, reports, backoff))
}

fn poll_loop<S: SnapshotSource>(
    source: S,
    commands: Receiver<PollCommand>,
    reports: LatestSender<PollReport>,
    mut backoff: Backoff,
) {
    run_poll(&source, &mut backoff, &reports);
    loop {
        let wait = backoff.interval();
        // A zero period disables the timer; only explicit refreshes poll.
        let next = if wait.is_zero() {
            commands
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            commands.recv_timeout(wait)
        };
        match next {
            Ok(PollCommand::Refresh) | Err(RecvTimeoutError::Timeout) => {
                run_poll(&source, &mut backoff, &reports)
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("poll worker stopped");
}

fn run_poll<S: SnapshotSource>(
    source: &S,
    backoff: &mut Backoff,
    reports: &LatestSender<PollReport>,
) {
    let result = source.poll();
    match &result {
        Ok(records) => {
            if backoff.failures() > 0 {
                warn!("daemon reachable again after {} failed polls", backoff.failures());
            }
            backoff.record_success();
            debug!("polled {} torrents", records.len());
        }
        Err(err) => {
            let next = backoff.record_failure();
            warn!(
                "poll failed ({} in a row): {err}; next attempt in {:.1}s",
                backoff.failures(),
                next.as_secs_f64()
            );
        }
    }
    let replaced = reports.publish(PollReport {
        result,
        consecutive_failures: backoff.failures(),
        retry_in: backoff.interval(),
        finished_at: Instant::now(),
    });
    if replaced {
        debug!("dropped an unread poll result in favour of a newer one");
    }
}
