//! Job status polling with multicast to any number of observers.
//!
//! [`JobPoller`] owns one poll loop per printer. Each cycle cancels the
//! previous status request (if it is still running) and tags the new one
//! with a generation number; only the response of the latest generation may
//! publish, so a slow older response can never overwrite a fresher one.
//!
//! Observers subscribe to a [`ReplayBus`]: subscribing never causes a
//! request, and a late subscriber immediately receives the last snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use printdeck_core::{normalize, GatewayError, JobSnapshot, NormalizeContext, RawJobStatus};
use printdeck_events::{Notification, NotificationCenter, ReplayBus, ReplayReceiver};
use tokio_util::sync::CancellationToken;

use crate::api::Gateway;
use crate::config::ConfigProvider;

/// Delay before the first poll after [`JobPoller::start`].
pub const INITIAL_DELAY: Duration = Duration::from_millis(750);

/// What observers receive: `None` when no job is loaded.
pub type SnapshotUpdate = Option<Arc<JobSnapshot>>;

/// Bookkeeping for the request of the current cycle.
#[derive(Default)]
struct Cycle {
    generation: u64,
    in_flight: Option<CancellationToken>,
}

struct PollerInner {
    gateway: Arc<dyn Gateway>,
    config: Arc<dyn ConfigProvider>,
    notifications: NotificationCenter,
    bus: ReplayBus<SnapshotUpdate>,
    cycle: Mutex<Cycle>,
    started: AtomicBool,
    /// Master cancellation token; cancelled by [`JobPoller::shutdown`].
    cancel: CancellationToken,
}

/// Shared handle to the job status feed.
#[derive(Clone)]
pub struct JobPoller {
    inner: Arc<PollerInner>,
}

impl JobPoller {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        config: Arc<dyn ConfigProvider>,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                gateway,
                config,
                notifications,
                bus: ReplayBus::default(),
                cycle: Mutex::new(Cycle::default()),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Spawn the poll loop. Calling it again has no effect.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run().await });
    }

    /// Receive every published snapshot, starting with the latest one.
    pub fn subscribe(&self) -> ReplayReceiver<SnapshotUpdate> {
        self.inner.bus.subscribe()
    }

    /// The last published value, if any cycle has completed.
    pub fn latest(&self) -> Option<SnapshotUpdate> {
        self.inner.bus.latest()
    }

    /// Publish "no job" right away, e.g. after a job was cancelled.
    pub fn clear(&self) {
        tracing::debug!("Clearing job snapshot");
        self.inner.bus.publish(None);
    }

    /// Stop the poll loop and cancel any request in flight.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

impl PollerInner {
    async fn run(self: Arc<Self>) {
        let mut delay = INITIAL_DELAY;
        tracing::info!(
            interval_ms = self.config.polling_interval().as_millis() as u64,
            "Job poller started",
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Job poller shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            self.dispatch();
            // Re-read every cycle so interval changes apply without a restart.
            delay = self.config.polling_interval();
        }
    }

    /// Start a new status request, superseding the previous one.
    fn dispatch(self: &Arc<Self>) {
        let token = self.cancel.child_token();
        let generation = {
            let mut cycle = self.lock_cycle();
            if let Some(previous) = cycle.in_flight.replace(token.clone()) {
                tracing::debug!(
                    generation = cycle.generation,
                    "Previous status request still pending, cancelling",
                );
                previous.cancel();
            }
            cycle.generation += 1;
            cycle.generation
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = inner.gateway.job_status() => result,
            };
            inner.complete(generation, result);
        });
    }

    /// Apply the result of request `generation` if it is still current.
    fn complete(&self, generation: u64, result: Result<RawJobStatus, GatewayError>) {
        let mut cycle = self.lock_cycle();
        if cycle.generation != generation {
            tracing::debug!(
                generation,
                current = cycle.generation,
                "Discarding stale status response",
            );
            return;
        }
        cycle.in_flight = None;

        match result {
            Ok(raw) => {
                let ctx = NormalizeContext::now(self.config.filament());
                let snapshot = normalize(&raw, &ctx).map(Arc::new);
                // Published under the cycle lock so publications follow
                // generation order.
                self.bus.publish(snapshot);
            }
            Err(e) => {
                tracing::warn!(error = %e, class = ?e.class, "Failed to retrieve job status");
                drop(cycle);
                self.notifications.submit(
                    Notification::error("Can't retrieve jobs!", e.message).with_cause(e.class),
                );
            }
        }
    }

    fn lock_cycle(&self) -> std::sync::MutexGuard<'_, Cycle> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
