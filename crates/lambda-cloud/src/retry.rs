//! Launch-with-retry loop.
//!
//! [`RetryEngine`] drives [`LaunchCoordinator::attempt_launch`] until the launch
//! succeeds, fails for a non-capacity reason, runs out of attempts, or is
//! cancelled. Cancellation is cooperative: the token is checked before every
//! attempt and raced against the inter-attempt sleep, but an HTTP call already
//! in flight is allowed to finish.
//!
//! ```text
//!            ┌────────────── Unavailable, budget left, slept ─────────┐
//!            ▼                                                        │
//! Idle ──► Attempting ──► Launched ──► Succeeded                      │
//!            │   │                                                    │
//!            │   ├──────► Failed ────► Aborted                        │
//!            │   └──────► Unavailable ─┬─ budget spent ─► Exhausted   │
//!            │                         └──────────────────────────────┘
//!            └── token cancelled (before attempt or during sleep) ─► Cancelled
//! ```

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::launch::{LaunchCoordinator, LaunchOutcome, LaunchRequest};
use crate::providers::traits::ProviderError;

/// Default delay between attempts.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 5;

/// How often and how long to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Maximum number of attempts; `None` retries until success or cancellation.
    pub max_retries: Option<NonZeroU32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given interval in seconds and optional attempt cap.
    #[must_use]
    pub fn new(interval_secs: u64, max_retries: Option<NonZeroU32>) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            max_retries,
        }
    }
}

/// Terminal state of a retry run.
#[derive(Debug)]
pub enum RetryOutcome {
    /// An attempt launched instances.
    Succeeded {
        region: String,
        instance_ids: Vec<String>,
        attempts: u32,
        elapsed: Duration,
    },
    /// The cancellation token fired.
    Cancelled { attempts: u32, elapsed: Duration },
    /// Every allowed attempt found no capacity.
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last_reason: String,
    },
    /// An attempt failed for a non-capacity reason.
    Aborted { error: ProviderError, attempts: u32 },
}

impl RetryOutcome {
    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Cancelled { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }
}

impl fmt::Display for RetryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded {
                instance_ids,
                region,
                attempts,
                ..
            } => write!(
                f,
                "launched {} instance(s) in {region} after {attempts} attempt(s)",
                instance_ids.len()
            ),
            Self::Cancelled { attempts, .. } => {
                write!(f, "cancelled after {attempts} attempt(s)")
            }
            Self::Exhausted {
                attempts,
                last_reason,
                ..
            } => write!(f, "gave up after {attempts} attempt(s): {last_reason}"),
            Self::Aborted { error, attempts } => {
                write!(f, "aborted on attempt {attempts}: {error}")
            }
        }
    }
}

/// Progress callbacks for a retry run. All methods default to no-ops.
pub trait RetryObserver: Send {
    /// Attempt number `attempt` (1-based) is about to start.
    fn attempt_started(&mut self, _attempt: u32, _elapsed: Duration) {}

    /// Attempt `attempt` produced `outcome`.
    fn attempt_finished(&mut self, _attempt: u32, _outcome: &LaunchOutcome) {}

    /// The engine is about to sleep for `interval`.
    fn waiting(&mut self, _interval: Duration) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl RetryObserver for NoopObserver {}

/// State of one retry run.
struct RetrySession {
    attempts: u32,
    started_at: Instant,
    interval: Duration,
    max_retries: Option<NonZeroU32>,
    cancel: CancellationToken,
}

impl RetrySession {
    fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            attempts: 0,
            started_at: Instant::now(),
            interval: policy.interval,
            max_retries: policy.max_retries,
            cancel,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn exhausted(&self) -> bool {
        self.max_retries
            .is_some_and(|max| self.attempts >= max.get())
    }

    fn cancelled(&self) -> RetryOutcome {
        info!(attempts = self.attempts, "Launch retry cancelled");
        RetryOutcome::Cancelled {
            attempts: self.attempts,
            elapsed: self.elapsed(),
        }
    }
}

/// Retries a launch until it succeeds, fails, is exhausted or is cancelled.
pub struct RetryEngine {
    coordinator: LaunchCoordinator,
    policy: RetryPolicy,
}

impl RetryEngine {
    /// Create an engine around `coordinator`.
    #[must_use]
    pub fn new(coordinator: LaunchCoordinator, policy: RetryPolicy) -> Self {
        Self {
            coordinator,
            policy,
        }
    }

    /// Retry policy in use.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run the retry loop on the current task.
    pub async fn run(
        &mut self,
        request: &LaunchRequest,
        cancel: &CancellationToken,
        observer: &mut dyn RetryObserver,
    ) -> RetryOutcome {
        let mut session = RetrySession::new(self.policy, cancel.clone());

        info!(
            instance_type = %request.instance_type,
            region = request.region.as_deref().unwrap_or("any"),
            interval_secs = session.interval.as_secs(),
            max_retries = session.max_retries.map(NonZeroU32::get),
            "Starting launch retry loop"
        );

        loop {
            if session.cancel.is_cancelled() {
                return session.cancelled();
            }

            let attempt = session.attempts + 1;
            observer.attempt_started(attempt, session.elapsed());
            debug!(attempt, "Launch attempt");

            let outcome = self.coordinator.attempt_launch(request).await;
            observer.attempt_finished(attempt, &outcome);

            match outcome {
                LaunchOutcome::Launched {
                    region,
                    instance_ids,
                } => {
                    return RetryOutcome::Succeeded {
                        region,
                        instance_ids,
                        attempts: attempt,
                        elapsed: session.elapsed(),
                    };
                }
                LaunchOutcome::Failed { error } => {
                    warn!(attempt, error = %error, "Launch failed, not retrying");
                    return RetryOutcome::Aborted {
                        error,
                        attempts: attempt,
                    };
                }
                LaunchOutcome::Unavailable { reason } => {
                    session.attempts = attempt;
                    if session.exhausted() {
                        info!(attempts = session.attempts, "Launch retries exhausted");
                        return RetryOutcome::Exhausted {
                            attempts: session.attempts,
                            elapsed: session.elapsed(),
                            last_reason: reason,
                        };
                    }

                    debug!(attempt, %reason, "No capacity, waiting");
                    observer.waiting(session.interval);
                    tokio::select! {
                        biased;
                        () = session.cancel.cancelled() => return session.cancelled(),
                        () = tokio::time::sleep(session.interval) => {}
                    }
                }
            }
        }
    }

    /// Run the retry loop on a background task.
    ///
    /// The returned handle cancels the run and yields its outcome exactly once.
    #[must_use]
    pub fn spawn<O>(mut self, request: LaunchRequest, mut observer: O) -> RetryHandle
    where
        O: RetryObserver + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task =
            tokio::spawn(async move { self.run(&request, &token, &mut observer).await });
        RetryHandle { cancel, task }
    }
}

/// Handle to a retry loop running on a background task.
pub struct RetryHandle {
    cancel: CancellationToken,
    task: JoinHandle<RetryOutcome>,
}

impl RetryHandle {
    /// Ask the loop to stop at its next check point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run, for wiring to other signal sources.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the loop to reach a terminal state.
    ///
    /// # Errors
    /// Returns the join error if the task panicked.
    pub async fn join(self) -> Result<RetryOutcome, tokio::task::JoinError> {
        self.task.await
    }
}
