//! Notification surface that writes to the log instead of a screen.

use printdeck_events::{NotificationKind, SurfaceEvent, SurfaceReceiver};

/// Render notifications until the center is dropped.
///
/// Returns how many notifications were shown.
pub async fn run(mut events: SurfaceReceiver) -> usize {
    let mut shown = 0;

    while let Some(event) = events.recv().await {
        match event {
            SurfaceEvent::Show(view) => {
                shown += 1;
                match view.kind {
                    NotificationKind::Error => tracing::error!(
                        id = view.id,
                        sticky = view.sticky,
                        text = %view.text,
                        "{}",
                        view.heading,
                    ),
                    NotificationKind::Warning => tracing::warn!(
                        id = view.id,
                        sticky = view.sticky,
                        text = %view.text,
                        "{}",
                        view.heading,
                    ),
                    NotificationKind::Info => tracing::info!(
                        id = view.id,
                        sticky = view.sticky,
                        text = %view.text,
                        "{}",
                        view.heading,
                    ),
                }
            }
            SurfaceEvent::Close => tracing::debug!("Notification closed"),
        }
    }

    tracing::info!(shown, "Notification surface detached");
    shown
}
