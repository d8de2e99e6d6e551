//! Job feed observer.
//!
//! Subscribes to the poller and logs what changed between two snapshots,
//! so the agent's log reads like the status panel of the touchscreen.

use std::pin::pin;

use futures::StreamExt;
use printdeck_core::{JobSnapshot, PrinterState};
use printdeck_events::ReplayReceiver;
use printdeck_octoprint::SnapshotUpdate;

/// Difference between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobChange {
    /// A job appeared, or a different file was loaded.
    Loaded,
    Cleared,
    StatusChanged { from: PrinterState, to: PrinterState },
    Progressed(u8),
    Unchanged,
}

/// Compare the previous snapshot with the next one.
pub fn classify(previous: Option<&JobSnapshot>, next: Option<&JobSnapshot>) -> JobChange {
    match (previous, next) {
        (None, None) => JobChange::Unchanged,
        (None, Some(_)) => JobChange::Loaded,
        (Some(_), None) => JobChange::Cleared,
        (Some(prev), Some(next)) if prev.filename != next.filename => JobChange::Loaded,
        (Some(prev), Some(next)) if prev.status != next.status => JobChange::StatusChanged {
            from: prev.status.clone(),
            to: next.status.clone(),
        },
        (Some(prev), Some(next)) if prev.progress_percent != next.progress_percent => {
            JobChange::Progressed(next.progress_percent)
        }
        (Some(_), Some(_)) => JobChange::Unchanged,
    }
}

/// Log every change on the job feed until the poller goes away.
pub async fn run(updates: ReplayReceiver<SnapshotUpdate>) {
    let mut updates = pin!(updates.into_stream());
    let mut previous: SnapshotUpdate = None;

    while let Some(update) = updates.next().await {
        match classify(previous.as_deref(), update.as_deref()) {
            JobChange::Loaded => {
                if let Some(job) = &update {
                    tracing::info!(
                        file = %job.filename,
                        status = %job.status,
                        progress = job.progress_percent,
                        filament_g = ?job.filament_amount,
                        estimated = %job.estimated_print_time.value,
                        "Job loaded",
                    );
                }
            }
            JobChange::Cleared => tracing::info!("No job loaded"),
            JobChange::StatusChanged { from, to } => {
                tracing::info!(%from, %to, "Printer state changed");
            }
            JobChange::Progressed(percent) => {
                if let Some(job) = &update {
                    tracing::debug!(
                        progress = percent,
                        left = %job.time_left.value,
                        ends_at = %job.estimated_end_time,
                        "Job progress",
                    );
                }
            }
            JobChange::Unchanged => {}
        }
        previous = update;
    }

    tracing::debug!("Job feed closed");
}
