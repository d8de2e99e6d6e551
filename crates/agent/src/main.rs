//! `printdeck-agent` -- headless OctoPrint status daemon.
//!
//! Polls the printer's job status, logs every change, renders
//! notifications to the log and accepts printer commands on stdin.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                      | Description                    |
//! |------------------------|----------|------------------------------|--------------------------------|
//! | `OCTOPRINT_URL`        | no       | `http://localhost:5000/api/` | Base URL of the REST API       |
//! | `OCTOPRINT_API_KEY`    | yes      | --                           | Application key                |
//! | `POLLING_INTERVAL_MS`  | no       | `2000`                       | Delay between status polls     |
//! | `FILAMENT_THICKNESS`   | no       | `1.75`                       | Filament diameter in mm        |
//! | `FILAMENT_DENSITY`     | no       | `1.25`                       | Filament density in g/cm³      |
//! | `NOTIFICATIONS_MUTED`  | no       | `false`                      | Start with notifications muted |
//! | `REQUEST_TIMEOUT_SECS` | no       | `10`                         | Per-request HTTP timeout       |

use std::sync::Arc;
use std::time::Duration;

use printdeck_agent::console::Console;
use printdeck_agent::{observer, surface};
use printdeck_events::{NotificationCenter, NotificationSettings};
use printdeck_octoprint::{
    CommandDispatcher, ConfigProvider, EnvConfig, FileBrowser, Gateway, JobPoller, OctoPrintApi,
};
use tokio::io::BufReader;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "printdeck_agent=info,printdeck_octoprint=info,printdeck_events=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EnvConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    let config = Arc::new(config);

    tracing::info!(
        url = config.base_url(),
        interval_ms = config.polling_interval().as_millis() as u64,
        "Starting printdeck-agent",
    );

    let api = OctoPrintApi::new(config.clone()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build HTTP client");
        std::process::exit(1);
    });
    let gateway: Arc<dyn Gateway> = Arc::new(api);

    // --- Notification surface ---
    let notifications = NotificationCenter::new(NotificationSettings {
        muted: config.notifications_muted(),
        ..Default::default()
    });
    let surface_handle = tokio::spawn(surface::run(notifications.attach_surface()));

    // --- Job feed ---
    let poller = JobPoller::new(gateway.clone(), config.clone(), notifications.clone());
    let observer_handle = tokio::spawn(observer::run(poller.subscribe()));
    poller.start();

    // --- Operator console ---
    let console = Console {
        config: config.clone(),
        poller: poller.clone(),
        dispatcher: CommandDispatcher::with_poller(
            gateway.clone(),
            notifications.clone(),
            poller.clone(),
        ),
        files: FileBrowser::new(gateway, config, notifications.clone()),
        notifications: notifications.clone(),
    };
    let console_handle = tokio::spawn(console.run(BufReader::new(tokio::io::stdin())));

    shutdown_signal().await;

    // --- Shutdown ---
    poller.shutdown();
    notifications.close_all();
    console_handle.abort();
    observer_handle.abort();

    // The surface ends once the last center handle is gone.
    drop(poller);
    drop(notifications);
    let _ = tokio::time::timeout(Duration::from_secs(1), surface_handle).await;

    tracing::info!("Shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
